//! Curriculum cycle position.
//!
//! Maps an enrollment timestamp onto a 52-week programme year made of
//! thirteen 4-week months. Week 1 starts on the enrollment day itself.
//! Time-of-day is ignored; only UTC calendar dates matter.

use crate::error::{QuestError, QuestResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Weeks in one programme year
pub const WEEKS_PER_YEAR: i64 = 52;

/// Weeks in one programme month
pub const WEEKS_PER_MONTH: i64 = 4;

/// Normalized curriculum position of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePosition {
    /// Whole days between the enrollment date and today
    pub days_since_enrollment: i64,
    /// 1-based week count since enrollment
    pub total_weeks: i64,
    /// 1-based programme year
    pub programme_year: i64,
    /// Week inside the programme year, always in 1..=52
    pub week_of_programme_year: i64,
    /// Month inside the programme year, always in 1..=13
    pub month_of_programme_year: i64,
    /// Most recent Monday-aligned boundary on or before today
    pub start_of_current_week: NaiveDate,
}

/// Compute the cycle position for `enrolled_at` as seen at `now`.
///
/// Returns `InvalidInput` when `now` falls on a date before enrollment.
pub fn compute_cycle(enrolled_at: DateTime<Utc>, now: DateTime<Utc>) -> QuestResult<CyclePosition> {
    compute_cycle_for_dates(enrolled_at.date_naive(), now.date_naive())
}

/// Date-level variant of [`compute_cycle`].
pub fn compute_cycle_for_dates(enrolled: NaiveDate, today: NaiveDate) -> QuestResult<CyclePosition> {
    let days = (today - enrolled).num_days();
    if days < 0 {
        return Err(QuestError::invalid(format!(
            "now ({}) precedes enrollment ({})",
            today, enrolled
        )));
    }

    // ceil((days + 1) / 7) for days >= 0
    let total_weeks = days / 7 + 1;
    let programme_year = (total_weeks + WEEKS_PER_YEAR - 1) / WEEKS_PER_YEAR;
    let week_of_programme_year = (total_weeks - 1) % WEEKS_PER_YEAR + 1;
    let month_of_programme_year = (week_of_programme_year + WEEKS_PER_MONTH - 1) / WEEKS_PER_MONTH;

    Ok(CyclePosition {
        days_since_enrollment: days,
        total_weeks,
        programme_year,
        week_of_programme_year,
        month_of_programme_year,
        start_of_current_week: start_of_current_week(enrolled, today),
    })
}

/// Monday on or before the enrollment date, advanced in whole weeks to the
/// latest boundary that is still on or before `today`.
fn start_of_current_week(enrolled: NaiveDate, today: NaiveDate) -> NaiveDate {
    let anchor = enrolled - Duration::days(enrolled.weekday().num_days_from_monday() as i64);
    let elapsed_weeks = (today - anchor).num_days().div_euclid(7);
    anchor + Duration::weeks(elapsed_weeks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_enrollment_day_is_week_one() {
        let enrolled = Utc.with_ymd_and_hms(2023, 11, 2, 19, 12, 24).unwrap();
        let now = Utc.with_ymd_and_hms(2023, 11, 2, 1, 0, 0).unwrap();
        let pos = compute_cycle(enrolled, now).unwrap();
        assert_eq!(pos.days_since_enrollment, 0);
        assert_eq!(pos.total_weeks, 1);
        assert_eq!(pos.week_of_programme_year, 1);
        assert_eq!(pos.month_of_programme_year, 1);
        assert_eq!(pos.programme_year, 1);
    }

    #[test]
    fn test_day_seven_starts_week_two() {
        let pos = compute_cycle_for_dates(date(2024, 1, 1), date(2024, 1, 7)).unwrap();
        assert_eq!(pos.total_weeks, 1);
        let pos = compute_cycle_for_dates(date(2024, 1, 1), date(2024, 1, 8)).unwrap();
        assert_eq!(pos.total_weeks, 2);
    }

    #[test]
    fn test_week_53_rolls_into_year_two() {
        // 52 full weeks later
        let pos = compute_cycle_for_dates(date(2024, 1, 1), date(2024, 12, 30)).unwrap();
        assert_eq!(pos.total_weeks, 53);
        assert_eq!(pos.programme_year, 2);
        assert_eq!(pos.week_of_programme_year, 1);
        assert_eq!(pos.month_of_programme_year, 1);
    }

    #[test]
    fn test_last_week_is_month_thirteen() {
        let pos = compute_cycle_for_dates(date(2024, 1, 1), date(2024, 12, 29)).unwrap();
        assert_eq!(pos.total_weeks, 52);
        assert_eq!(pos.programme_year, 1);
        assert_eq!(pos.week_of_programme_year, 52);
        assert_eq!(pos.month_of_programme_year, 13);
    }

    #[test]
    fn test_now_before_enrollment_is_rejected() {
        let err = compute_cycle_for_dates(date(2024, 3, 10), date(2024, 3, 9)).unwrap_err();
        assert!(matches!(err, QuestError::InvalidInput(_)));
    }

    #[test]
    fn test_start_of_week_is_monday_aligned() {
        // 2023-11-02 is a Thursday; its Monday is 2023-10-30
        let pos = compute_cycle_for_dates(date(2023, 11, 2), date(2023, 11, 2)).unwrap();
        assert_eq!(pos.start_of_current_week, date(2023, 10, 30));

        let pos = compute_cycle_for_dates(date(2023, 11, 2), date(2023, 11, 15)).unwrap();
        assert_eq!(pos.start_of_current_week, date(2023, 11, 13));
        assert_eq!(pos.start_of_current_week.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_start_of_week_across_year_boundary() {
        let pos = compute_cycle_for_dates(date(2024, 12, 25), date(2025, 1, 2)).unwrap();
        assert_eq!(pos.start_of_current_week, date(2024, 12, 30));
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let enrolled = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 8, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 5, 8, 23, 59, 59).unwrap();
        assert_eq!(compute_cycle(enrolled, early).unwrap(), compute_cycle(enrolled, late).unwrap());
    }
}
