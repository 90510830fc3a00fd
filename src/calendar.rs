//! Jalali (Solar Hijri) calendar helpers.
//!
//! Model years in the Iranian market and the admin's broadcast schedule are
//! written in the Jalali calendar, so the bot converts between it and chrono's
//! Gregorian dates.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use lazy_static::lazy_static;
use regex::Regex;

/// Years below this are read as Jalali, the rest as Gregorian
const JALALI_YEAR_LIMIT: i32 = 1700;

lazy_static! {
    static ref SCHEDULE_REGEX: Regex =
        Regex::new(r"^\s*(\d{4})/(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{2})\s*$")
            .expect("Schedule pattern should be valid");
}

/// Convert a Jalali date to its Gregorian equivalent
pub fn jalali_to_gregorian(jy: i32, jm: u32, jd: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&jm) || jd == 0 || jd > 31 || jy < 1 {
        return None;
    }
    let jy = jy as i64 + 1595;
    let jm = jm as i64;
    let month_days = if jm < 7 { (jm - 1) * 31 } else { (jm - 7) * 30 + 186 };
    let mut days =
        -355_668 + 365 * jy + (jy / 33) * 8 + ((jy % 33) + 3) / 4 + jd as i64 + month_days;

    let mut gy = 400 * (days / 146_097);
    days %= 146_097;
    if days > 36_524 {
        days -= 1;
        gy += 100 * (days / 36_524);
        days %= 36_524;
        if days >= 365 {
            days += 1;
        }
    }
    gy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        gy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    NaiveDate::from_yo_opt(gy as i32, (days + 1) as u32)
}

/// Convert a Gregorian date to a Jalali `(year, month, day)` triple
pub fn gregorian_to_jalali(date: NaiveDate) -> (i32, u32, u32) {
    const CUMULATIVE_DAYS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let gy = date.year() as i64;
    let gm = date.month() as usize;
    let gd = date.day() as i64;
    let gy2 = if gm > 2 { gy + 1 } else { gy };

    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
        + gd
        + CUMULATIVE_DAYS[gm - 1];
    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };

    (jy as i32, jm as u32, jd as u32)
}

/// The Jalali year of `date`
pub fn jalali_year(date: NaiveDate) -> i32 {
    gregorian_to_jalali(date).0
}

/// Format a UTC instant as a Jalali `YYYY/MM/DD HH:MM` string in the given offset
pub fn format_jalali(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = instant.with_timezone(&offset);
    let (jy, jm, jd) = gregorian_to_jalali(local.date_naive());
    format!("{jy:04}/{jm:02}/{jd:02} {}", local.format("%H:%M"))
}

/// Parse a broadcast schedule (`YYYY/MM/DD HH:MM`) into a UTC instant.
///
/// Years below 1700 are Jalali, others Gregorian. The wall-clock time is
/// interpreted in `offset`.
pub fn parse_schedule(input: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let caps = SCHEDULE_REGEX.captures(input)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;

    let date = if year < JALALI_YEAR_LIMIT {
        let max_day = if month <= 6 { 31 } else { 30 };
        if day > max_day {
            return None;
        }
        jalali_to_gregorian(year, month, day)?
    } else {
        NaiveDate::from_ymd_opt(year, month, day)?
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build a fixed offset from minutes east of UTC, defaulting to UTC when invalid
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nowruz_conversions() {
        assert_eq!(jalali_to_gregorian(1403, 1, 1), Some(ymd(2024, 3, 20)));
        assert_eq!(jalali_to_gregorian(1404, 1, 1), Some(ymd(2025, 3, 21)));
        assert_eq!(jalali_to_gregorian(1403, 12, 29), Some(ymd(2025, 3, 19)));
    }

    #[test]
    fn test_gregorian_to_jalali() {
        assert_eq!(gregorian_to_jalali(ymd(2024, 3, 20)), (1403, 1, 1));
        assert_eq!(gregorian_to_jalali(ymd(2025, 3, 21)), (1404, 1, 1));
        assert_eq!(gregorian_to_jalali(ymd(2025, 3, 20)), (1403, 12, 30));
        assert_eq!(jalali_year(ymd(2026, 10, 18)), 1405);
    }

    #[test]
    fn test_invalid_jalali_dates() {
        assert_eq!(jalali_to_gregorian(1403, 13, 1), None);
        assert_eq!(jalali_to_gregorian(1403, 1, 0), None);
    }

    #[test]
    fn test_parse_schedule_jalali_in_tehran() {
        let tehran = offset_from_minutes(210);
        let instant = parse_schedule("1403/12/29 18:30", tehran).unwrap();
        // 18:30 at UTC+03:30 is 15:00 UTC
        assert_eq!(instant.to_rfc3339(), "2025-03-19T15:00:00+00:00");
    }

    #[test]
    fn test_parse_schedule_gregorian_and_garbage() {
        let utc = offset_from_minutes(0);
        let instant = parse_schedule("2025/01/02 08:05", utc).unwrap();
        assert_eq!(instant.to_rfc3339(), "2025-01-02T08:05:00+00:00");

        assert!(parse_schedule("tomorrow", utc).is_none());
        assert!(parse_schedule("1403/07/31 10:00", utc).is_none());
        assert!(parse_schedule("2025/01/02 25:00", utc).is_none());
    }

    #[test]
    fn test_format_jalali() {
        let tehran = offset_from_minutes(210);
        let instant = parse_schedule("1404/01/01 09:00", tehran).unwrap();
        assert_eq!(format_jalali(instant, tehran), "1404/01/01 09:00");
    }
}
