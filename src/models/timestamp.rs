use chrono::{DateTime, Utc};
use serde::Serializer;

/// Convert Unix timestamp to RFC3339 string, defaulting to now if invalid
pub fn timestamp_to_rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

/// Rows store Unix seconds; the API speaks RFC3339
pub fn serialize<S: Serializer>(timestamp: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp_to_rfc3339(*timestamp))
}

pub fn serialize_option<S: Serializer>(
    timestamp: &Option<i64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match timestamp {
        Some(ts) => serializer.serialize_some(&timestamp_to_rfc3339(*ts)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_to_rfc3339() {
        assert_eq!(timestamp_to_rfc3339(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(timestamp_to_rfc3339(1733788800), "2024-12-10T00:00:00+00:00");
    }
}
