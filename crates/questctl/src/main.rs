//! Quest Control - CLI for the progression and ranking engine.
//!
//! Operators record scores and activity, catalog authors import badge and
//! challenge definitions, and anyone on an account can inspect progress.

mod commands;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quest_common::{
    DbLocation, ProgressionService, QuestConfig, QuestStore, RequestContext, StaticIdentity,
};
use quest_shared::{CohortId, ItemKind, ParticipantId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "questctl")]
#[command(about = "Quest - weekly programme cycles, leaderboards and badges", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (overrides $QUEST_CONFIG and the default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides [store] path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Authenticated account id; omitted means anonymous
    #[arg(long, global = true, env = "QUEST_ACCOUNT")]
    account: Option<i64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new participant under the account
    Enroll {
        /// Display name
        name: String,

        /// Enrollment time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List the account's participants
    Participants,

    /// Record a score event
    Score {
        cohort: CohortId,

        #[arg(allow_negative_numbers = true)]
        score: i64,

        #[arg(long)]
        participant: Option<ParticipantId>,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Record an activity delta (e.g. search_count 1)
    Activity {
        name: String,

        #[arg(allow_negative_numbers = true)]
        delta: i64,

        #[arg(long)]
        participant: Option<ParticipantId>,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Show the programme year, week and month
    Cycle {
        #[arg(long)]
        participant: Option<ParticipantId>,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Show the top of a cohort
    Leaderboard {
        cohort: CohortId,

        /// Number of rows (defaults to [leaderboard] default_top_n)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Show one participant's rank in a cohort
    Rank {
        cohort: CohortId,

        #[arg(long)]
        participant: Option<ParticipantId>,
    },

    /// Evaluate badges and challenges and record new completions
    Evaluate {
        #[arg(long)]
        participant: Option<ParticipantId>,

        /// Only evaluate one kind (badge or challenge)
        #[arg(long)]
        kind: Option<ItemKind>,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Cycle position, completions and streak
    Progress {
        #[arg(long)]
        participant: Option<ParticipantId>,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Manage the badge and challenge catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate and import a TOML catalog file
    Import { file: PathBuf },

    /// List catalog items
    List,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => QuestConfig::load_from(path)?,
        None => QuestConfig::load()?,
    };
    if let Some(db) = &cli.db {
        config.store.path = Some(db.clone());
    }
    init_tracing(&config.log_level);

    let location = DbLocation::from_config(config.store.path.clone());
    let db_path = location.path()?;
    debug!(
        config = ?cli.config,
        db = %db_path.display(),
        account = ?cli.account,
        counters = config.activity.counters.len(),
        flags = config.activity.flags.len(),
        "Resolved configuration"
    );
    let store = QuestStore::open(location).await?;
    let identity = cli
        .account
        .map_or_else(StaticIdentity::anonymous, StaticIdentity::account);

    let session = commands::Session {
        service: ProgressionService::new(Arc::new(store), identity, config),
        request: RequestContext::anonymous(),
        json: cli.json,
    };
    let now = Utc::now();

    match cli.command {
        Commands::Enroll { name, at } => session.enroll(&name, at.unwrap_or(now)).await,
        Commands::Participants => session.participants().await,
        Commands::Score {
            cohort,
            score,
            participant,
            at,
        } => {
            session
                .score(participant, cohort, score, at.unwrap_or(now))
                .await
        }
        Commands::Activity {
            name,
            delta,
            participant,
            at,
        } => {
            session
                .activity(participant, &name, delta, at.unwrap_or(now))
                .await
        }
        Commands::Cycle { participant, at } => session.cycle(participant, at.unwrap_or(now)).await,
        Commands::Leaderboard { cohort, top } => session.leaderboard(cohort, top).await,
        Commands::Rank {
            cohort,
            participant,
        } => session.rank(participant, cohort).await,
        Commands::Evaluate {
            participant,
            kind,
            at,
        } => session.evaluate(participant, kind, at.unwrap_or(now)).await,
        Commands::Progress { participant, at } => {
            session.progress(participant, at.unwrap_or(now)).await
        }
        Commands::Catalog { action } => match action {
            CatalogAction::Import { file } => session.import_catalog(&file).await,
            CatalogAction::List => session.list_catalog().await,
        },
    }
}
