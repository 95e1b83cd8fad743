//! Declarative unlock conditions.
//!
//! Grammar, one or more clauses joined by `&&`:
//!
//! ```text
//! search_count >= 5
//! topics_read = 3
//! profile_complete
//! search_count >= 5 && profile_complete
//! ```
//!
//! A bare name is a flag that must be true.

use crate::activity::ActivitySnapshot;
use crate::error::{QuestError, QuestResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single comparison inside a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// counter >= threshold
    AtLeast { counter: String, threshold: i64 },
    /// counter = value
    Equals { counter: String, value: i64 },
    /// flag is set
    Flag(String),
}

impl Clause {
    fn holds(&self, snapshot: &ActivitySnapshot) -> QuestResult<bool> {
        match self {
            Clause::AtLeast { counter, threshold } => Ok(snapshot.counter(counter)? >= *threshold),
            Clause::Equals { counter, value } => Ok(snapshot.counter(counter)? == *value),
            Clause::Flag(flag) => snapshot.flag(flag),
        }
    }

    /// Reject names that are not declared with the kind this clause needs
    fn check(&self, snapshot: &ActivitySnapshot) -> QuestResult<()> {
        match self {
            Clause::AtLeast { counter, .. } | Clause::Equals { counter, .. } => {
                snapshot.counter(counter).map(|_| ())
            }
            Clause::Flag(flag) => snapshot.flag(flag).map(|_| ()),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::AtLeast { counter, threshold } => write!(f, "{} >= {}", counter, threshold),
            Clause::Equals { counter, value } => write!(f, "{} = {}", counter, value),
            Clause::Flag(flag) => write!(f, "{}", flag),
        }
    }
}

impl FromStr for Clause {
    type Err = QuestError;

    fn from_str(s: &str) -> QuestResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(QuestError::InvalidCondition("empty clause".to_string()));
        }

        if let Some((name, rhs)) = s.split_once(">=") {
            return Ok(Clause::AtLeast {
                counter: parse_name(name)?,
                threshold: parse_number(rhs)?,
            });
        }

        for op in ["<=", "!=", "<", ">"] {
            if s.contains(op) {
                return Err(QuestError::InvalidCondition(format!(
                    "unsupported operator '{}' in '{}'",
                    op, s
                )));
            }
        }

        if let Some((name, rhs)) = s.split_once("==").or_else(|| s.split_once('=')) {
            return Ok(Clause::Equals {
                counter: parse_name(name)?,
                value: parse_number(rhs)?,
            });
        }

        Ok(Clause::Flag(parse_name(s)?))
    }
}

fn parse_name(raw: &str) -> QuestResult<String> {
    let name = raw.trim();
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return Err(QuestError::InvalidCondition(format!("bad name '{}'", name)));
    }
    Ok(name.to_string())
}

fn parse_number(raw: &str) -> QuestResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| QuestError::InvalidCondition(format!("bad threshold '{}'", raw.trim())))
}

/// Conjunction of clauses; all must hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    pub fn at_least(counter: impl Into<String>, threshold: i64) -> Self {
        Self {
            clauses: vec![Clause::AtLeast { counter: counter.into(), threshold }],
        }
    }

    pub fn equals(counter: impl Into<String>, value: i64) -> Self {
        Self {
            clauses: vec![Clause::Equals { counter: counter.into(), value }],
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            clauses: vec![Clause::Flag(name.into())],
        }
    }

    pub fn and(mut self, other: Condition) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// Fail on the first clause naming something the snapshot does not know
    pub fn validate(&self, snapshot: &ActivitySnapshot) -> QuestResult<()> {
        self.clauses.iter().try_for_each(|c| c.check(snapshot))
    }

    /// Whether every clause holds. Names are validated before any
    /// comparison, so an unknown name fails even if an earlier clause is false.
    pub fn evaluate(&self, snapshot: &ActivitySnapshot) -> QuestResult<bool> {
        self.validate(snapshot)?;
        for clause in &self.clauses {
            if !clause.holds(snapshot)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(" && "))
    }
}

impl FromStr for Condition {
    type Err = QuestError;

    fn from_str(s: &str) -> QuestResult<Self> {
        let clauses = s
            .split("&&")
            .map(str::parse)
            .collect::<QuestResult<Vec<Clause>>>()?;
        Ok(Self { clauses })
    }
}

impl TryFrom<String> for Condition {
    type Error = QuestError;

    fn try_from(s: String) -> QuestResult<Self> {
        s.parse()
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> String {
        c.to_string()
    }
}
