//! Participant activity counters and flags.
//!
//! Activity is recorded as append-only deltas against declared names.
//! A snapshot sums them: counters read as the sum, flags are true when
//! the sum is positive. Declared names with no events read as 0 / false.

use crate::error::{QuestError, QuestResult};
use crate::participant::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counter derived from completion records of badges
pub const BADGES_COMPLETED: &str = "badges_completed";

/// Counter derived from completion records of challenges
pub const CHALLENGES_COMPLETED: &str = "challenges_completed";

/// Largest magnitude accepted for a single activity delta
pub const MAX_DELTA_MAGNITUDE: i64 = 1_000_000;

/// One recorded change to a counter or flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub participant_id: ParticipantId,
    pub name: String,
    pub delta: i64,
    pub recorded_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(participant_id: ParticipantId, name: impl Into<String>, delta: i64) -> Self {
        Self {
            participant_id,
            name: name.into(),
            delta,
            recorded_at: Utc::now(),
        }
    }

    /// Reject zero deltas and deltas outside `±MAX_DELTA_MAGNITUDE`
    pub fn check_delta(delta: i64) -> QuestResult<()> {
        if delta == 0 {
            return Err(QuestError::invalid("activity delta must be non-zero"));
        }
        if delta.unsigned_abs() > MAX_DELTA_MAGNITUDE as u64 {
            return Err(QuestError::invalid(format!(
                "activity delta {} is outside ±{}",
                delta, MAX_DELTA_MAGNITUDE
            )));
        }
        Ok(())
    }
}

/// Point-in-time view of a participant's activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    counters: BTreeMap<String, i64>,
    flags: BTreeMap<String, i64>,
}

impl ActivitySnapshot {
    /// Empty snapshot knowing the given counter and flag names
    pub fn declared<C, F>(counters: C, flags: F) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            counters: counters.into_iter().map(|c| (c.into(), 0)).collect(),
            flags: flags.into_iter().map(|f| (f.into(), 0)).collect(),
        }
    }

    /// Fold `events` into a snapshot of the declared names
    pub fn from_events<'a, C, F>(
        counters: C,
        flags: F,
        events: impl IntoIterator<Item = &'a ActivityEvent>,
    ) -> QuestResult<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let mut snapshot = Self::declared(counters, flags);
        for event in events {
            snapshot.apply(&event.name, event.delta)?;
        }
        Ok(snapshot)
    }

    /// Add `delta` to a declared counter or flag.
    ///
    /// Undeclared names are `UnknownCounter`; a sum that leaves `i64` is
    /// `InvalidInput` and leaves the value unchanged.
    pub fn apply(&mut self, name: &str, delta: i64) -> QuestResult<()> {
        let value = match self.counters.get_mut(name) {
            Some(value) => value,
            None => self
                .flags
                .get_mut(name)
                .ok_or_else(|| QuestError::UnknownCounter(name.to_string()))?,
        };
        *value = value
            .checked_add(delta)
            .ok_or_else(|| QuestError::invalid(format!("activity total for '{}' overflows", name)))?;
        Ok(())
    }

    /// Set a counter outright, declaring it if needed
    pub fn set_counter(&mut self, name: impl Into<String>, value: i64) {
        self.counters.insert(name.into(), value);
    }

    pub fn with_counter(mut self, name: impl Into<String>, value: i64) -> Self {
        self.set_counter(name, value);
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, on: bool) -> Self {
        self.flags.insert(name.into(), i64::from(on));
        self
    }

    pub fn counter(&self, name: &str) -> QuestResult<i64> {
        self.counters
            .get(name)
            .copied()
            .ok_or_else(|| QuestError::UnknownCounter(name.to_string()))
    }

    pub fn flag(&self, name: &str) -> QuestResult<bool> {
        self.flags
            .get(name)
            .map(|v| *v > 0)
            .ok_or_else(|| QuestError::UnknownCounter(name.to_string()))
    }
}
