//! Relative received-time labels for message lists

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Timelike, Utc, Weekday};

/// Label for a message received at `timestamp` (seconds since the epoch),
/// relative to `now` and in `now`'s time zone.
///
/// * today: `H:MM`
/// * yesterday: `Yesterday`
/// * within the last week: the weekday name
/// * anything older, or from tomorrow on: `YYYY-MM-DD`
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use mail_ui_core::format_received;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap();
/// let earlier = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 0).unwrap();
/// assert_eq!(format_received(earlier.timestamp(), &now), "9:05");
/// ```
#[must_use]
pub fn format_received<Tz: TimeZone>(timestamp: i64, now: &DateTime<Tz>) -> String {
    let Some(time) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return String::new();
    };
    let time = time.with_timezone(&now.timezone()).naive_local();

    let today = now.date_naive().and_time(NaiveTime::MIN);
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let week_ago = today.checked_sub_days(Days::new(7)).unwrap_or(today);

    if time >= tomorrow || time < week_ago {
        time.format("%Y-%m-%d").to_string()
    } else if time >= today {
        format!("{}:{:02}", time.hour(), time.minute())
    } else if time >= yesterday {
        "Yesterday".to_string()
    } else {
        weekday_name(time.weekday()).to_string()
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().timestamp()
    }

    // Friday afternoon.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 16, 30, 0).unwrap()
    }

    #[test]
    fn today_shows_clock_time() {
        assert_eq!(format_received(at(2024, 3, 15, 0, 0), &now()), "0:00");
        assert_eq!(format_received(at(2024, 3, 15, 14, 7), &now()), "14:07");
    }

    #[test]
    fn yesterday_and_weekdays() {
        assert_eq!(format_received(at(2024, 3, 14, 23, 59), &now()), "Yesterday");
        assert_eq!(format_received(at(2024, 3, 12, 10, 0), &now()), "Tuesday");
        assert_eq!(format_received(at(2024, 3, 8, 0, 0), &now()), "Friday");
    }

    #[test]
    fn old_and_future_show_date() {
        assert_eq!(format_received(at(2024, 3, 7, 23, 59), &now()), "2024-03-07");
        assert_eq!(format_received(at(2024, 3, 16, 0, 0), &now()), "2024-03-16");
    }

    #[test]
    fn uses_the_zone_of_now() {
        let zone = FixedOffset::east_opt(3 * 3600).unwrap();
        let local_now = now().with_timezone(&zone);
        // 22:30 UTC on the 14th is 01:30 on the 15th three hours east.
        assert_eq!(format_received(at(2024, 3, 14, 22, 30), &local_now), "1:30");
    }

    #[test]
    fn out_of_range_timestamp_is_blank() {
        assert_eq!(format_received(i64::MAX, &now()), "");
    }
}
