use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

/// Server-local wall clock, truncated to whole seconds to match `DATETIME`.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = month_start(date);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next.and_then(|n| n.pred_opt()).unwrap_or(start);
    (start, end)
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let (_, end) = month_bounds(date);
    end.day()
}

/// Parses `YYYY-MM` (or a full `YYYY-MM-DD`) into the first day of that month.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
        .map(month_start)
}
