use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: String,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub session_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub login_max_failures: u32,
    pub login_window_secs: i64,
    pub login_lockout_secs: i64,
    pub log_requests: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_var("SERVER_PORT", "8080")?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/gift_ledger.db".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| "SESSION_SECRET must be set for signing session cookies")?;
        if session_secret.len() < 16 {
            return Err("SESSION_SECRET must be at least 16 characters".to_string());
        }

        Ok(Config {
            server_host,
            server_port,
            database_path,
            allowed_origins,
            environment,
            session_secret,
            access_token_ttl_secs: parse_var("ACCESS_TOKEN_TTL_SECS", "7200")?,
            refresh_token_ttl_secs: parse_var("REFRESH_TOKEN_TTL_SECS", "2592000")?,
            login_max_failures: parse_var("LOGIN_MAX_FAILURES", "5")?,
            login_window_secs: parse_var("LOGIN_WINDOW_SECS", "900")?,
            login_lockout_secs: parse_var("LOGIN_LOCKOUT_SECS", "900")?,
            log_requests: parse_var("LOG_REQUESTS", "false")?,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Session cookies are only marked `Secure` in production
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| format!("Invalid {}", key))
}
