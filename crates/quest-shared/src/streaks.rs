//! Daily activity streaks.
//!
//! A streak is a run of consecutive UTC calendar days with at least one
//! score or activity event.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Streak statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    /// Consecutive active days ending today or yesterday, else 0
    pub current_streak: u32,
    /// Longest run ever
    pub best_streak: u32,
    /// Unique days with activity
    pub active_days: u32,
}

/// Calculate streaks from event timestamps as seen on `today`
pub fn streaks_from_timestamps(timestamps: &[DateTime<Utc>], today: NaiveDate) -> StreakStats {
    let days: Vec<NaiveDate> = timestamps.iter().map(|ts| ts.date_naive()).collect();
    calculate_streaks(&days, today)
}

/// Calculate streaks from activity dates (any order, duplicates allowed)
pub fn calculate_streaks(dates: &[NaiveDate], today: NaiveDate) -> StreakStats {
    let mut days: Vec<NaiveDate> = dates.iter().copied().filter(|d| *d <= today).collect();
    days.sort();
    days.dedup();

    let Some(&last_day) = days.last() else {
        return StreakStats::default();
    };

    let mut best_streak = 1u32;
    let mut streak = 1u32;
    for window in days.windows(2) {
        if window[1] - window[0] == Duration::days(1) {
            streak += 1;
            best_streak = best_streak.max(streak);
        } else {
            streak = 1;
        }
    }

    // The trailing run is live only if it reaches today or yesterday
    let current_streak = if today - last_day <= Duration::days(1) {
        streak
    } else {
        0
    };

    StreakStats {
        current_streak,
        best_streak,
        active_days: days.len() as u32,
    }
}
