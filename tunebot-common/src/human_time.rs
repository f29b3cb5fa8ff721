//! Human-readable time formatting
//!
//! Track lengths are shown the way chat users expect them: `M:SS` for single
//! tracks, `H:MM:SS` once a total runs past an hour.

/// Seconds per hour, the point where `format_total` switches format
const HOUR: u64 = 3600;

/// Format a track length as `M:SS`.
///
/// Minutes are not padded and may exceed 59; seconds are always two digits.
///
/// # Examples
///
/// ```
/// use tunebot_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0), "0:00");
/// assert_eq!(format_clock(65), "1:05");
/// assert_eq!(format_clock(3725), "62:05");
/// ```
pub fn format_clock(seconds: u64) -> String {
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{}:{:02}", minutes, secs)
}

/// Format an accumulated duration (e.g. a whole queue).
///
/// Below one hour this is identical to [`format_clock`]; from one hour on the
/// result is `H:MM:SS`.
///
/// # Examples
///
/// ```
/// use tunebot_common::human_time::format_total;
///
/// assert_eq!(format_total(59 * 60 + 59), "59:59");
/// assert_eq!(format_total(3600), "1:00:00");
/// assert_eq!(format_total(3661), "1:01:01");
/// ```
pub fn format_total(seconds: u64) -> String {
    if seconds < HOUR {
        return format_clock(seconds);
    }
    let hours = seconds / HOUR;
    let mins = (seconds % HOUR) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, mins, secs)
}
