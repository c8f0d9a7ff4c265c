use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::calendar::ExpectedWeek;

/// Monday of an ISO week, or `None` when the week does not exist in that year.
pub fn week_start(year: i32, week: u32) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

pub fn week_bounds(year: i32, week: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let start = week_start(year, week).ok_or_else(|| {
        AppError::validation_with_details(
            "week does not exist in the ISO calendar",
            json!({"year": year, "week": week}),
        )
    })?;
    Ok((start, start + Duration::days(6)))
}

/// Days between the Mondays of two ISO weeks, `None` if either week is invalid.
pub fn days_between_weeks(from: (i32, u32), to: (i32, u32)) -> Option<i64> {
    let from = week_start(from.0, from.1)?;
    let to = week_start(to.0, to.1)?;
    Some(to.signed_duration_since(from).num_days())
}

/// Every ISO week whose Monday..Sunday span intersects `[start, end]`.
pub fn expected_weeks(start: NaiveDate, end: NaiveDate) -> Vec<ExpectedWeek> {
    let mut weeks = Vec::new();
    if end < start {
        return weeks;
    }

    let mut monday = start - Duration::days(start.weekday().num_days_from_monday() as i64);
    while monday <= end {
        let iso = monday.iso_week();
        weeks.push(ExpectedWeek {
            week: iso.week(),
            year: iso.year(),
            week_start: monday,
            week_end: monday + Duration::days(6),
        });
        monday += Duration::days(7);
    }

    weeks
}
