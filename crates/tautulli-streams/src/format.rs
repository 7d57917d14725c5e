//! Display helpers for durations and bandwidth

/// Milliseconds as `H:MM:SS`
pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// kbps to Mbps, one decimal
pub fn kbps_to_mbps(kbps: u64) -> f64 {
    (kbps as f64 / 100.0).round() / 10.0
}

/// kbps as a readable string, e.g. `10.1 Mbps`
pub fn format_mbps(kbps: u64) -> String {
    format!("{:.1} Mbps", kbps_to_mbps(kbps))
}
