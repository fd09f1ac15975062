use chrono::{DateTime, NaiveTime, Timelike, Utc};

/// A UTC maintenance window `(HH:MM, duration)` during which C7 skips
/// publishing, per §4.2 step 4 and the glossary entry "Maintenance window".
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceWindow {
    pub start: NaiveTime,
    pub duration_minutes: i64,
}

impl MaintenanceWindow {
    pub fn new(start: NaiveTime, duration_minutes: i64) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    /// Parse `"HH:MM"` into a window of `duration_minutes`.
    pub fn parse(hhmm: &str, duration_minutes: i64) -> Option<Self> {
        NaiveTime::parse_from_str(hhmm, "%H:%M")
            .ok()
            .map(|start| Self::new(start, duration_minutes))
    }

    /// Whether `now` (UTC) falls inside this window, correctly handling
    /// windows that span midnight (e.g. start `23:50`, duration `30`).
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let minute_of_day = now.time().num_seconds_from_midnight() / 60;
        let start_minute = self.start.num_seconds_from_midnight() / 60;
        let end_minute = start_minute as i64 + self.duration_minutes;

        if end_minute <= 1440 {
            (minute_of_day as i64) >= start_minute as i64 && (minute_of_day as i64) < end_minute
        } else {
            // Spans midnight: the window is [start, 1440) union [0, end-1440).
            let wrapped_end = end_minute - 1440;
            (minute_of_day as i64) >= start_minute as i64 || (minute_of_day as i64) < wrapped_end
        }
    }

    pub fn label(&self) -> String {
        format!("{} +{}m", self.start.format("%H:%M"), self.duration_minutes)
    }
}

/// True if `now` falls inside any configured maintenance window.
pub fn in_any_window(windows: &[MaintenanceWindow], now: DateTime<Utc>) -> Option<&MaintenanceWindow> {
    windows.iter().find(|w| w.contains(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn s6_window_skip_at_offset_within_window() {
        let window = MaintenanceWindow::parse("02:00", 30).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 2, 15, 0).unwrap();
        assert!(window.contains(now));
    }

    #[test]
    fn outside_window_is_not_skipped() {
        let window = MaintenanceWindow::parse("02:00", 30).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 2, 31, 0).unwrap();
        assert!(!window.contains(now));
    }

    #[test]
    fn window_spanning_midnight() {
        let window = MaintenanceWindow::parse("23:50", 30).unwrap();
        let just_after_midnight = Utc.with_ymd_and_hms(2026, 7, 27, 0, 10, 0).unwrap();
        let before_midnight = Utc.with_ymd_and_hms(2026, 7, 27, 23, 55, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2026, 7, 27, 0, 25, 0).unwrap();
        assert!(window.contains(just_after_midnight));
        assert!(window.contains(before_midnight));
        assert!(!window.contains(outside));
    }
}
