//! Timecode formatting for position and selection readouts

/// Format seconds as `m:ss.cc` (minutes, seconds, centiseconds)
///
/// Each field is truncated, not rounded. Negative and non-finite inputs
/// render as `0:00.00`.
///
/// # Example
/// ```
/// use wavestudio::engine::format_time;
///
/// assert_eq!(format_time(67.25), "1:07.25");
/// ```
pub fn format_time(seconds: f64) -> String {
    let centis = total_centis(seconds);
    format!(
        "{}:{:02}.{:02}",
        centis / 6000,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Format seconds as `m:ss`
pub fn format_time_short(seconds: f64) -> String {
    let secs = total_centis(seconds) / 100;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn total_centis(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    // absorb binary noise such as 0.29 * 100 = 28.999999999999996
    (seconds * 100.0 + 1e-6).floor() as u64
}
