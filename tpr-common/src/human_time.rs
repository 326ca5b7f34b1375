//! Human-readable playback position formatting
//!
//! Provides consistent position display for progress output.

/// Format selection threshold: below 100 minutes positions use `M:SS`
const MEDIUM_FORMAT_MAX_MS: u64 = 6_000_000;

/// Format a playback position given in milliseconds.
///
/// The format is chosen by the typical maximum of the field (usually the
/// recording duration) so that a column of positions keeps one width:
/// - Medium format (`M:SS`): typical max below 100 minutes
/// - Long format (`H:MM:SS`): anything longer
///
/// # Examples
///
/// ```
/// use tpr_common::human_time::format_position_ms;
///
/// assert_eq!(format_position_ms(65_000, 180_000), "1:05");
/// assert_eq!(format_position_ms(0, 180_000), "0:00");
/// assert_eq!(format_position_ms(3_661_000, 7_200_000), "1:01:01");
/// assert_eq!(format_position_ms(61_000, 7_200_000), "0:01:01");
/// ```
pub fn format_position_ms(position_ms: u64, typical_max_ms: u64) -> String {
    let total_secs = position_ms / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if typical_max_ms < MEDIUM_FORMAT_MAX_MS && hours == 0 {
        format!("{}:{:02}", mins, secs)
    } else {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Format a `played / total` progress string.
///
/// Without a known total only the played position is shown.
///
/// # Examples
///
/// ```
/// use tpr_common::human_time::format_progress;
///
/// assert_eq!(format_progress(30_000, Some(90_000)), "0:30 / 1:30");
/// assert_eq!(format_progress(30_000, None), "0:30");
/// ```
pub fn format_progress(played_ms: u64, total_ms: Option<u64>) -> String {
    match total_ms {
        Some(total) => format!(
            "{} / {}",
            format_position_ms(played_ms, total),
            format_position_ms(total, total)
        ),
        None => format_position_ms(played_ms, played_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medium_format_rounds_down() {
        assert_eq!(format_position_ms(59_999, 60_000), "0:59");
        assert_eq!(format_position_ms(60_000, 60_000), "1:00");
    }

    #[test]
    fn test_medium_format_overflows_to_long_past_one_hour() {
        // Typical max says short, but the value itself is over an hour
        assert_eq!(format_position_ms(3_600_000, 60_000), "1:00:00");
    }

    #[test]
    fn test_long_format_keeps_width_for_small_values() {
        assert_eq!(format_position_ms(5_000, 36_000_000), "0:00:05");
    }

    #[test]
    fn test_progress_without_total() {
        assert_eq!(format_progress(125_000, None), "2:05");
    }
}
