//! Participants and the identifiers shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a participant (a learner)
pub type ParticipantId = i64;

/// Row id of a cohort (one scored challenge)
pub type CohortId = i64;

/// Row id of the account that owns participants
pub type AccountId = i64;

/// A learner whose progression and scores are tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub account_id: AccountId,
    pub display_name: String,
    /// Anchor for cycle math
    pub enrolled_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        account_id: AccountId,
        display_name: impl Into<String>,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            display_name: display_name.into(),
            enrolled_at,
        }
    }
}
