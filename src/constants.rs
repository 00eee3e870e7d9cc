/// Session cookie carrying the short-lived access token
pub const ACCESS_COOKIE: &str = "access_token";

/// Session cookie carrying the long-lived refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Username length bounds (in characters, not bytes)
pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 32;

pub const PASSWORD_MIN_CHARS: usize = 6;
pub const PASSWORD_MAX_CHARS: usize = 128;

pub const NICKNAME_MAX_CHARS: usize = 32;
pub const BIO_MAX_CHARS: usize = 200;
pub const AVATAR_MAX_CHARS: usize = 512;
pub const SECURITY_TEXT_MAX_CHARS: usize = 100;

pub const FAMILY_NAME_MAX_CHARS: usize = 50;

/// Invite codes avoid 0/O and 1/I so they can be read aloud
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const INVITE_CODE_LEN: usize = 6;

pub const RELATED_PERSON_MAX_CHARS: usize = 50;
pub const LABEL_MAX_CHARS: usize = 20;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Largest single gift accepted (10 million yuan)
pub const MAX_RECORD_AMOUNT: i64 = 10_000_000;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;
pub const MAX_NOTIFICATION_LIMIT: i64 = 200;

pub const NOTIFICATION_TITLE_MAX_CHARS: usize = 100;
pub const NOTIFICATION_CONTENT_MAX_CHARS: usize = 1000;

/// Label used when a record has no relation or event type
pub const UNLABELED: &str = "其他";

// =============================================================================
// Error Messages
// =============================================================================

/// Deliberately vague so usernames cannot be probed through the login form
pub const ERR_INVALID_CREDENTIALS: &str = "用户名或密码错误";

pub const ERR_NOT_AUTHENTICATED: &str = "未登录或登录已过期";

pub const ERR_NOT_FAMILY_MEMBER: &str = "您不是该家庭的成员";

pub const ERR_NOT_RECORD_OWNER: &str = "只能修改或删除自己创建的记录";
