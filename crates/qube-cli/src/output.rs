//! Formatted output helpers for CLI commands.

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";
pub const RESET: &str = "\x1b[0m";

/// Formats an uptime in seconds into the shortest readable unit pair.
#[must_use]
pub fn format_uptime(seconds: u64) -> String {
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3600)
    }
}

/// Formats a memory figure in MiB, switching to GiB past 1024.
#[must_use]
pub fn format_memory_mb(mb: f64) -> String {
    if mb < 100.0 {
        format!("{mb:.1}M")
    } else if mb < 1024.0 {
        format!("{mb:.0}M")
    } else {
        format!("{:.1}G", mb / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_under_a_minute_is_seconds() {
        assert_eq!(format_uptime(45), "45s");
    }

    #[test]
    fn uptime_under_an_hour_is_minutes() {
        assert_eq!(format_uptime(150), "2m");
    }

    #[test]
    fn uptime_under_a_day_is_hours_and_minutes() {
        assert_eq!(format_uptime(3 * 3600 + 20 * 60), "3h 20m");
    }

    #[test]
    fn uptime_over_a_day_is_days_and_hours() {
        assert_eq!(format_uptime(2 * 86_400 + 5 * 3600), "2d 5h");
    }

    #[test]
    fn memory_scales_units() {
        assert_eq!(format_memory_mb(12.34), "12.3M");
        assert_eq!(format_memory_mb(512.4), "512M");
        assert_eq!(format_memory_mb(2048.0), "2.0G");
    }
}
