// Renderer module - formatting utilities
// Most rendering logic is in layout.rs

/// Format a reading for axis labels and the status line
pub fn format_value(value: f64) -> String {
    format!("{:.2}", value)
}

/// Format seconds since origin as `m:ss`
pub fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format a Unix millisecond timestamp as wall-clock time
pub fn format_timestamp_ms(timestamp_ms: i64) -> String {
    use chrono::DateTime;
    use chrono::Utc;

    if let Some(dt) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        dt.format("%H:%M:%S%.3f").to_string()
    } else {
        "N/A".to_string()
    }
}
