use chrono::{SecondsFormat, Utc};

/// Current UTC time as an ISO-8601 string ("2024-01-15T10:30:00.000Z").
/// All created_at/updated_at columns store this format.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
