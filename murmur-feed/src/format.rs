use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Compact age of a timestamp: "now", "5m", "3h", "2d", then a calendar
/// date ("Jan 4", or "Jan 4, 2023" outside the current year).
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds();

    match seconds {
        s if s < 60 => "now".to_string(),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s if s < 604_800 => format!("{}d", s / 86_400),
        _ if at.year() == now.year() => at.format("%b %-d").to_string(),
        _ => at.format("%b %-d, %Y").to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailTime {
    pub time: String,
    pub date: String,
}

/// "11:38 AM" and "Oct 17, 2025", as shown on a post's own page.
pub fn detail_time(at: DateTime<Utc>) -> DetailTime {
    DetailTime {
        time: at.format("%-I:%M %p").to_string(),
        date: at.format("%b %-d, %Y").to_string(),
    }
}

/// "January 2024".
pub fn joined_date(at: DateTime<Utc>) -> String {
    at.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 17, 11, 38, 0).unwrap()
    }

    #[test]
    fn recent_times() {
        let now = now();
        assert_eq!(relative_time(now, now), "now");
        assert_eq!(relative_time(now - Duration::seconds(59), now), "now");
        assert_eq!(relative_time(now - Duration::seconds(60), now), "1m");
        assert_eq!(relative_time(now - Duration::minutes(59), now), "59m");
        assert_eq!(relative_time(now - Duration::hours(1), now), "1h");
        assert_eq!(relative_time(now - Duration::hours(23), now), "23h");
        assert_eq!(relative_time(now - Duration::days(1), now), "1d");
        assert_eq!(relative_time(now - Duration::days(6), now), "6d");
    }

    #[test]
    fn older_times_use_dates() {
        let now = now();
        let same_year = Utc.with_ymd_and_hms(2025, 1, 4, 9, 0, 0).unwrap();
        let last_year = Utc.with_ymd_and_hms(2023, 1, 4, 9, 0, 0).unwrap();

        assert_eq!(relative_time(same_year, now), "Jan 4");
        assert_eq!(relative_time(last_year, now), "Jan 4, 2023");
    }

    #[test]
    fn future_reads_as_now() {
        let now = now();
        assert_eq!(relative_time(now + Duration::hours(2), now), "now");
    }

    #[test]
    fn detail_format() {
        let detail = detail_time(now());
        assert_eq!(detail.time, "11:38 AM");
        assert_eq!(detail.date, "Oct 17, 2025");

        let evening = Utc.with_ymd_and_hms(2025, 10, 17, 21, 5, 0).unwrap();
        assert_eq!(detail_time(evening).time, "9:05 PM");

        let midnight = Utc.with_ymd_and_hms(2025, 10, 17, 0, 0, 0).unwrap();
        assert_eq!(detail_time(midnight).time, "12:00 AM");
    }

    #[test]
    fn joined() {
        let at = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        assert_eq!(joined_date(at), "January 2024");
    }
}
