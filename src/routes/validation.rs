use chrono::NaiveDate;

use crate::error::AppError;

/// Trim a required text field and enforce its length in characters
pub fn required_text(field: &str, value: &str, max_chars: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("{}不能为空", field)));
    }
    optional_text(field, value, max_chars)
}

/// Trim an optional text field; empty is allowed
pub fn optional_text(field: &str, value: &str, max_chars: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.chars().count() > max_chars {
        return Err(AppError::InvalidInput(format!(
            "{}不能超过 {} 个字符",
            field, max_chars
        )));
    }
    Ok(value.to_string())
}

/// Passwords are not trimmed; only the length is checked
pub fn password(value: &str, min_chars: usize, max_chars: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min_chars {
        return Err(AppError::InvalidInput(format!("密码至少需要 {} 个字符", min_chars)));
    }
    if len > max_chars {
        return Err(AppError::InvalidInput(format!("密码不能超过 {} 个字符", max_chars)));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date
pub fn date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("{}格式应为 YYYY-MM-DD", field)))
}

/// Parse an optional enum-like query parameter, treating empty as absent
pub fn parse_optional<T: std::str::FromStr>(field: &str, value: Option<&str>) -> Result<Option<T>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::InvalidInput(format!("无效的{}: {}", field, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationCategory;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("名称", "  家 ", 10).unwrap(), "家");
        assert!(matches!(
            required_text("名称", "   ", 10),
            Err(AppError::InvalidInput(_))
        ));
        // Length counts characters, not bytes
        assert!(required_text("名称", "一二三", 3).is_ok());
        assert!(required_text("名称", "一二三四", 3).is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(password("12345", 6, 128).is_err());
        assert!(password("123456", 6, 128).is_ok());
        assert!(password(&"x".repeat(129), 6, 128).is_err());
    }

    #[test]
    fn test_date() {
        assert_eq!(
            date("日期", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(date("日期", "2023-02-29").is_err());
        assert!(date("日期", "29/02/2024").is_err());
    }

    #[test]
    fn test_parse_optional() {
        let none: Option<NotificationCategory> = parse_optional("分类", None).unwrap();
        assert!(none.is_none());
        let empty: Option<NotificationCategory> = parse_optional("分类", Some("")).unwrap();
        assert!(empty.is_none());
        assert_eq!(
            parse_optional::<NotificationCategory>("分类", Some("family")).unwrap(),
            Some(NotificationCategory::Family)
        );
        assert!(parse_optional::<NotificationCategory>("分类", Some("spam")).is_err());
    }
}
