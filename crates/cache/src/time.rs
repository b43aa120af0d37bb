use chrono::Utc;

/// Current Unix timestamp in seconds, used for every cache's time-based
/// expiry and timestamp fields.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}
