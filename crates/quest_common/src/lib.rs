//! Quest Common - storage, configuration and orchestration for the
//! progression engine.
//!
//! `quest_shared` holds the pure computations; this crate loads their
//! inputs from SQLite and commits their decisions.

pub mod catalog_file;
pub mod config;
pub mod identity;
pub mod service;
pub mod store;

pub use catalog_file::CatalogFile;
pub use config::QuestConfig;
pub use identity::{Identity, IdentityProvider, RequestContext, StaticIdentity, TokenTable};
pub use service::{ProgressReport, ProgressionService};
pub use store::{DbLocation, QuestStore};
