//! Portal service-hour gate.
//!
//! The registry portal only serves requests 08:30-23:00 on weekdays and
//! 08:30-18:00 on weekends and public holidays, and is closed entirely from
//! Dec 29 through Jan 3. Addresses hitting the gate are skipped, not
//! retried.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Whether a request may be issued at the given local time.
pub fn is_within_service_hours(now: NaiveDateTime) -> bool {
    let date = now.date();

    // Year-end/New-Year blackout, all day.
    if (date.month() == 12 && date.day() >= 29) || (date.month() == 1 && date.day() <= 3) {
        return false;
    }

    let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    let restricted = weekend || is_public_holiday(date);

    let open = NaiveTime::from_hms_opt(8, 30, 0).expect("valid opening time");
    let close_hour = if restricted { 18 } else { 23 };
    let close = NaiveTime::from_hms_opt(close_hour, 0, 0).expect("valid closing time");

    let time = now.time();
    time >= open && time < close
}

/// Japan public holiday calendar (valid for 2000-2099).
///
/// Fixed-date holidays, Happy-Monday holidays, the two equinoxes, substitute
/// holidays for holidays falling on Sunday, and the citizens' holiday rule
/// for a weekday sandwiched between two holidays.
pub fn is_public_holiday(date: NaiveDate) -> bool {
    if is_base_holiday(date) {
        return true;
    }

    // Substitute holiday: the first non-holiday day after a base holiday
    // that fell on a Sunday.
    let mut cursor = date;
    loop {
        let Some(prev) = cursor.pred_opt() else {
            break;
        };
        if !is_base_holiday(prev) {
            break;
        }
        if prev.weekday() == Weekday::Sun {
            return true;
        }
        cursor = prev;
    }

    // Citizens' holiday: a single weekday between two base holidays.
    if date.weekday() != Weekday::Sun {
        if let (Some(prev), Some(next)) = (date.pred_opt(), date.succ_opt()) {
            if is_base_holiday(prev) && is_base_holiday(next) {
                return true;
            }
        }
    }

    false
}

fn is_base_holiday(date: NaiveDate) -> bool {
    let year = date.year();
    let (month, day) = (date.month(), date.day());

    match (month, day) {
        (1, 1) => return true,            // 元日
        (2, 11) => return true,           // 建国記念の日
        (2, 23) if year >= 2020 => return true, // 天皇誕生日
        (4, 29) => return true,           // 昭和の日
        (5, 3) | (5, 4) | (5, 5) => return true, // 憲法記念日/みどりの日/こどもの日
        (8, 11) if year >= 2016 => return true, // 山の日
        (11, 3) => return true,           // 文化の日
        (11, 23) => return true,          // 勤労感謝の日
        _ => {}
    }

    // Happy-Monday holidays.
    if date == nth_monday(year, 1, 2)
        || date == nth_monday(year, 7, 3)
        || date == nth_monday(year, 9, 3)
        || date == nth_monday(year, 10, 2)
    {
        return true;
    }

    (month == 3 && day == vernal_equinox_day(year))
        || (month == 9 && day == autumnal_equinox_day(year))
}

fn nth_monday(year: i32, month: u32, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
    let offset = (7 + Weekday::Mon.num_days_from_monday() as i64
        - first.weekday().num_days_from_monday() as i64)
        % 7;
    first + chrono::Days::new((offset + (n as i64 - 1) * 7) as u64)
}

/// Vernal equinox day-of-March, standard approximation for 2000-2099.
fn vernal_equinox_day(year: i32) -> u32 {
    let shift = (year - 2000) / 4;
    (20.69115 + 0.242194 * (year - 2000) as f64 - shift as f64).floor() as u32
}

/// Autumnal equinox day-of-September, standard approximation for 2000-2099.
fn autumnal_equinox_day(year: i32) -> u32 {
    let shift = (year - 2000) / 4;
    (23.09 + 0.242194 * (year - 2000) as f64 - shift as f64).floor() as u32
}
