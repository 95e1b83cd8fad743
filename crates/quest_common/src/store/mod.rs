// Quest data store
//
// SQLite tables for participants, append-only score/activity events,
// the item catalog and completion records. Query helpers take a plain
// `&Connection` so callers can batch several reads in one `execute` call.

pub mod activity;
pub mod catalog;
pub mod completions;
pub mod db;
pub mod participants;
pub mod scores;

pub use db::{DbLocation, QuestStore};
