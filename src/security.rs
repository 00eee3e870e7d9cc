use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::constants::{INVITE_CODE_ALPHABET, INVITE_CODE_LEN};
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a PHC-format hash string.
///
/// A malformed stored hash is reported as an error, a mismatch as `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::PasswordHash(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// [`hash_password`] off the async runtime; Argon2 is deliberately slow
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}

/// Canonical form of a security answer: case and spacing do not matter
pub fn normalize_security_answer(answer: &str) -> String {
    answer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn hash_security_answer(answer: &str) -> Result<String> {
    hash_password(&normalize_security_answer(answer))
}

pub fn verify_security_answer(answer: &str, hash: &str) -> Result<bool> {
    if hash.is_empty() {
        // Accounts created before security questions existed
        return Ok(false);
    }
    verify_password(&normalize_security_answer(answer), hash)
}

// =============================================================================
// Session Tokens
// =============================================================================

/// Which cookie a token was minted for; an access token never refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Verified contents of a session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: i64,
    pub kind: TokenKind,
    pub expires_at: i64,
}

fn sign(payload: &str, secret: &str) -> Option<HmacSha256> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return None;
        }
    };
    mac.update(payload.as_bytes());
    Some(mac)
}

/// Mint a session token: `<user_id>.<kind>.<expires_at>.<hex HMAC-SHA256>`
pub fn issue_token(user_id: i64, kind: TokenKind, expires_at: i64, secret: &str) -> String {
    let payload = format!("{}.{}.{}", user_id, kind.as_str(), expires_at);
    let signature = sign(&payload, secret)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{}.{}", payload, signature)
}

/// Verify a session token's signature, kind and expiry
///
/// Returns `None` for anything that is not a live token of the expected kind.
pub fn verify_token(token: &str, expected: TokenKind, secret: &str, now: i64) -> Option<SessionClaims> {
    let (payload, signature) = token.rsplit_once('.')?;

    let mut parts = payload.split('.');
    let user_id: i64 = parts.next()?.parse().ok()?;
    let kind = parts.next()?;
    let expires_at: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || kind != expected.as_str() {
        return None;
    }

    let sig_bytes = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!("Invalid hex signature format in session token");
            return None;
        }
    };
    sign(payload, secret)?.verify_slice(&sig_bytes).ok()?;

    if expires_at <= now {
        tracing::debug!("Expired {} token for user {}", kind, user_id);
        return None;
    }

    Some(SessionClaims {
        user_id,
        kind: expected,
        expires_at,
    })
}

// =============================================================================
// Invite Codes
// =============================================================================

pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-0123456789";

    // =========================================================================
    // Password Tests
    // =========================================================================

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_hash_password_is_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        assert!(verify_password("whatever", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_security_answer_ignores_case_and_spacing() {
        let hash = hash_security_answer("  Beijing   Road ").unwrap();
        assert!(verify_security_answer("beijing road", &hash).unwrap());
        assert!(verify_security_answer("BEIJING ROAD", &hash).unwrap());
        assert!(!verify_security_answer("shanghai road", &hash).unwrap());
    }

    #[test]
    fn test_security_answer_missing_hash() {
        assert!(!verify_security_answer("anything", "").unwrap());
    }

    // =========================================================================
    // Session Token Tests
    // =========================================================================

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token(42, TokenKind::Access, 2_000, SECRET);
        let claims = verify_token(&token, TokenKind::Access, SECRET, 1_000).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.expires_at, 2_000);
    }

    #[test]
    fn test_token_expired() {
        let token = issue_token(42, TokenKind::Access, 2_000, SECRET);
        assert!(verify_token(&token, TokenKind::Access, SECRET, 2_000).is_none());
        assert!(verify_token(&token, TokenKind::Access, SECRET, 3_000).is_none());
    }

    #[test]
    fn test_token_wrong_kind() {
        let token = issue_token(42, TokenKind::Access, 2_000, SECRET);
        assert!(verify_token(&token, TokenKind::Refresh, SECRET, 1_000).is_none());
    }

    #[test]
    fn test_token_wrong_secret() {
        let token = issue_token(42, TokenKind::Refresh, 2_000, SECRET);
        assert!(verify_token(&token, TokenKind::Refresh, "another-secret-value", 1_000).is_none());
    }

    #[test]
    fn test_token_tampered_user_id() {
        let token = issue_token(42, TokenKind::Access, 2_000, SECRET);
        let forged = token.replacen("42.", "1.", 1);
        assert!(verify_token(&forged, TokenKind::Access, SECRET, 1_000).is_none());
    }

    #[test]
    fn test_token_garbage() {
        assert!(verify_token("", TokenKind::Access, SECRET, 0).is_none());
        assert!(verify_token("a.b.c.d", TokenKind::Access, SECRET, 0).is_none());
        assert!(verify_token("1.access.5.zz", TokenKind::Access, SECRET, 0).is_none());
    }

    // =========================================================================
    // Invite Code Tests
    // =========================================================================

    #[test]
    fn test_invite_code_format() {
        for _ in 0..50 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b)));
        }
    }
}
