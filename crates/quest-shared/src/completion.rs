//! Badge and challenge completion.
//!
//! The evaluator decides, it never persists. Items already recorded as
//! complete stay complete no matter what the counters say now; the
//! orchestrator commits whatever [`CompletionReport::newly_satisfied`] lists.

use crate::activity::ActivitySnapshot;
use crate::condition::Condition;
use crate::error::QuestError;
use crate::participant::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// What kind of completable item this is. Parsing ignores case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ItemKind {
    Badge,
    Challenge,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Badge => "badge",
            ItemKind::Challenge => "challenge",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = QuestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "badge" => Ok(ItemKind::Badge),
            "challenge" => Ok(ItemKind::Challenge),
            _ => Err(QuestError::invalid(format!("unknown item kind: {}", s))),
        }
    }
}

impl TryFrom<String> for ItemKind {
    type Error = QuestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Catalog entry with a static unlock condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletableItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub condition: Condition,
}

impl CompletableItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, title: impl Into<String>, condition: Condition) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            condition,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// First time a participant satisfied an item. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub participant_id: ParticipantId,
    pub item_id: String,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of evaluating one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CompletionStatus {
    /// A completion record already exists
    AlreadyComplete,
    /// The condition holds and no record exists yet
    NewlySatisfied,
    Unsatisfied,
    /// The condition could not be evaluated
    Failed(String),
}

/// Evaluation of one catalog item for one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEvaluation {
    pub item: CompletableItem,
    pub status: CompletionStatus,
}

impl ItemEvaluation {
    pub fn satisfied(&self) -> bool {
        matches!(
            self.status,
            CompletionStatus::AlreadyComplete | CompletionStatus::NewlySatisfied
        )
    }
}

/// Result of evaluating a catalog for one participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub participant_id: ParticipantId,
    pub items: Vec<ItemEvaluation>,
}

impl CompletionReport {
    /// Item ids that need a completion record
    pub fn newly_satisfied(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|e| e.status == CompletionStatus::NewlySatisfied)
            .map(|e| e.item.id.as_str())
            .collect()
    }

    pub fn satisfied(&self) -> impl Iterator<Item = &ItemEvaluation> {
        self.items.iter().filter(|e| e.satisfied())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemEvaluation> {
        self.items
            .iter()
            .filter(|e| matches!(e.status, CompletionStatus::Failed(_)))
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemEvaluation> {
        self.items.iter().find(|e| e.item.id == item_id)
    }
}

/// Evaluate `catalog` for a participant.
///
/// `completed` holds the ids of items that already have a completion record.
/// An unknown counter fails only the item that references it.
pub fn evaluate(
    participant_id: ParticipantId,
    catalog: &[CompletableItem],
    completed: &HashSet<String>,
    activity: &ActivitySnapshot,
) -> CompletionReport {
    let items = catalog
        .iter()
        .map(|item| {
            let status = if completed.contains(&item.id) {
                CompletionStatus::AlreadyComplete
            } else {
                match item.condition.evaluate(activity) {
                    Ok(true) => CompletionStatus::NewlySatisfied,
                    Ok(false) => CompletionStatus::Unsatisfied,
                    Err(e) => {
                        warn!(
                            item = %item.id,
                            condition = %item.condition,
                            "Cannot evaluate unlock condition: {}",
                            e
                        );
                        CompletionStatus::Failed(e.to_string())
                    }
                }
            };
            ItemEvaluation { item: item.clone(), status }
        })
        .collect();

    CompletionReport { participant_id, items }
}
