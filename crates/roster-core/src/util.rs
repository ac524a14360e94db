//! Small helpers for config parsing, error text and timestamps

const MAX_ERROR_BODY_CHARS: usize = 180;

/// Trimmed value of an environment setting; blank counts as unset
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// One-line, length-capped rendering of a response body for error messages
pub fn compact_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}

/// `synced_at` stamp for stored reservations
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
