//! Cohort score aggregation and ranking.
//!
//! Totals are the sum of a participant's score events in one cohort.
//! Ranks use standard competition ranking: equal totals share a rank and
//! the next distinct total skips ahead (1, 1, 3).

use crate::error::{QuestError, QuestResult};
use crate::participant::{CohortId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Largest magnitude accepted for a single score event
pub const MAX_SCORE_MAGNITUDE: i64 = 1_000_000_000;

/// Append-only score contribution. Corrections are new, possibly negative, events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub participant_id: ParticipantId,
    pub cohort_id: CohortId,
    pub score: i64,
    pub recorded_at: DateTime<Utc>,
}

impl ScoreEvent {
    pub fn new(participant_id: ParticipantId, cohort_id: CohortId, score: i64) -> Self {
        Self {
            participant_id,
            cohort_id,
            score,
            recorded_at: Utc::now(),
        }
    }

    pub fn at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    /// Reject scores outside `±MAX_SCORE_MAGNITUDE`
    pub fn check_score(score: i64) -> QuestResult<()> {
        if score.unsigned_abs() > MAX_SCORE_MAGNITUDE as u64 {
            return Err(QuestError::invalid(format!(
                "score {} is outside ±{}",
                score, MAX_SCORE_MAGNITUDE
            )));
        }
        Ok(())
    }
}

/// One ranked row of a cohort leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub total_score: i64,
    pub rank: u32,
    /// Number of events folded into the total
    pub events: u32,
}

/// Full ranking of a cohort computed from a snapshot of its score events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    pub cohort_id: CohortId,
    standings: Vec<Standing>,
}

impl Leaderboard {
    /// Aggregate `events` for `cohort_id`. Events for other cohorts are skipped.
    ///
    /// `names` maps participant ids to display names; missing entries fall
    /// back to the id itself. A total that does not fit in `i64` is
    /// `InvalidInput`.
    pub fn from_events(
        cohort_id: CohortId,
        events: &[ScoreEvent],
        names: &HashMap<ParticipantId, String>,
    ) -> QuestResult<Self> {
        let mut totals: HashMap<ParticipantId, (i64, u32)> = HashMap::new();
        for event in events.iter().filter(|e| e.cohort_id == cohort_id) {
            let entry = totals.entry(event.participant_id).or_insert((0, 0));
            entry.0 = entry.0.checked_add(event.score).ok_or_else(|| {
                QuestError::invalid(format!(
                    "score total of participant {} in cohort {} overflows",
                    event.participant_id, cohort_id
                ))
            })?;
            entry.1 = entry.1.saturating_add(1);
        }

        let mut standings: Vec<Standing> = totals
            .into_iter()
            .map(|(participant_id, (total_score, events))| Standing {
                participant_id,
                display_name: names
                    .get(&participant_id)
                    .cloned()
                    .unwrap_or_else(|| participant_id.to_string()),
                total_score,
                rank: 0,
                events,
            })
            .collect();

        // Id order inside a tie group only keeps output reproducible
        standings.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then(a.participant_id.cmp(&b.participant_id))
        });

        let mut previous: Option<(i64, u32)> = None;
        for (i, standing) in standings.iter_mut().enumerate() {
            standing.rank = match previous {
                Some((total, rank)) if total == standing.total_score => rank,
                _ => i as u32 + 1,
            };
            previous = Some((standing.total_score, standing.rank));
        }

        Ok(Self { cohort_id, standings })
    }

    /// At most `top_n` standings, best first
    pub fn top(&self, top_n: usize) -> &[Standing] {
        &self.standings[..top_n.min(self.standings.len())]
    }

    /// Like [`Leaderboard::top`] but rejects a zero limit
    pub fn checked_top(&self, top_n: usize) -> QuestResult<&[Standing]> {
        if top_n == 0 {
            return Err(QuestError::invalid("top_n must be at least 1"));
        }
        Ok(self.top(top_n))
    }

    /// Rank over the full population. `None` when the participant has no
    /// events in this cohort; a zero total is still ranked.
    pub fn rank_of(&self, participant_id: ParticipantId) -> Option<&Standing> {
        self.standings.iter().find(|s| s.participant_id == participant_id)
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    /// Sum of every participant's total
    pub fn grand_total(&self) -> i128 {
        self.standings.iter().map(|s| i128::from(s.total_score)).sum()
    }
}
