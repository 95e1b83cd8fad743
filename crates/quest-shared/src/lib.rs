//! Shared types and pure computations for the Quest progression engine.
//!
//! Nothing in this crate performs I/O. Every function is deterministic in
//! its arguments, including the "now" used for date math.

pub mod activity;
pub mod badges;
pub mod completion;
pub mod condition;
pub mod cycle;
pub mod error;
pub mod leaderboard;
pub mod participant;
pub mod streaks;

pub use activity::{ActivityEvent, ActivitySnapshot};
pub use completion::{
    evaluate, CompletableItem, CompletionRecord, CompletionReport, CompletionStatus,
    ItemEvaluation, ItemKind,
};
pub use condition::{Clause, Condition};
pub use cycle::{compute_cycle, CyclePosition};
pub use error::{QuestError, QuestResult};
pub use leaderboard::{Leaderboard, ScoreEvent, Standing};
pub use participant::{AccountId, CohortId, Participant, ParticipantId};
pub use streaks::{calculate_streaks, StreakStats};
