//! Quest configuration.
//!
//! Config file: $QUEST_CONFIG, ~/.config/quest/config.toml or /etc/quest/config.toml

use anyhow::{Context, Result};
use quest_shared::activity::{BADGES_COMPLETED, CHALLENGES_COMPLETED};
use quest_shared::ActivitySnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "QUEST_CONFIG";

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Declared activity names. Anything else is an unknown counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_counters")]
    pub counters: Vec<String>,

    #[serde(default = "default_flags")]
    pub flags: Vec<String>,
}

fn default_counters() -> Vec<String> {
    [
        "search_count",
        "topics_read",
        "news_read",
        "quizzes_completed",
        "debates_joined",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_flags() -> Vec<String> {
    vec!["profile_complete".to_string()]
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            counters: default_counters(),
            flags: default_flags(),
        }
    }
}

impl ActivityConfig {
    /// Names that participants may record activity against
    pub fn is_recordable(&self, name: &str) -> bool {
        self.counters.iter().any(|c| c == name) || self.flags.iter().any(|f| f == name)
    }

    /// Empty snapshot with every declared name plus the derived completion counters
    pub fn empty_snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot::declared(self.counters.iter().cloned(), self.flags.iter().cloned())
            .with_counter(BADGES_COMPLETED, 0)
            .with_counter(CHALLENGES_COMPLETED, 0)
    }
}

/// Leaderboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
}

fn default_top_n() -> usize {
    10
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            default_top_n: default_top_n(),
        }
    }
}

/// Main Quest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub activity: ActivityConfig,

    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            activity: ActivityConfig::default(),
            leaderboard: LeaderboardConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl QuestConfig {
    /// Get default user config path: ~/.config/quest/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("quest").join("config.toml"))
    }

    /// Get system config path: /etc/quest/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/quest/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. $QUEST_CONFIG
    /// 2. User config (~/.config/quest/config.toml)
    /// 3. System config (/etc/quest/config.toml)
    /// 4. Defaults
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&explicit));
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from(&system_path);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: QuestConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.leaderboard.default_top_n == 0 {
            anyhow::bail!("leaderboard.default_top_n must be at least 1");
        }
        for name in &self.activity.counters {
            if self.activity.flags.contains(name) {
                anyhow::bail!("'{}' is declared as both a counter and a flag", name);
            }
        }
        let declared = self.activity.counters.iter().chain(&self.activity.flags);
        for name in declared {
            if name == BADGES_COMPLETED || name == CHALLENGES_COMPLETED {
                anyhow::bail!("'{}' is derived from completion records and cannot be declared", name);
            }
        }
        Ok(())
    }
}
