use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_PATTERNS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M%z"];
const NAIVE_PATTERNS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse a pass timestamp. Offsets like `+0000` are tried first, then
/// RFC 3339, then offset-less forms read as UTC. Anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = OFFSET_PATTERNS
        .iter()
        .find_map(|pattern| DateTime::parse_from_str(raw, pattern).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_PATTERNS
                .iter()
                .find_map(|pattern| NaiveDateTime::parse_from_str(raw, pattern).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        });

    if parsed.is_none() {
        tracing::debug!(value = raw, "unparseable pass date ignored");
    }
    parsed
}
