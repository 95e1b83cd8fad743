//! TOML catalog files written by catalog authors.
//!
//! ```toml
//! [[item]]
//! id = "search_5"
//! kind = "badge"
//! title = "Curious Mind"
//! description = "Search five times"
//! condition = "search_count >= 5"
//! ```

use anyhow::{Context, Result};
use quest_shared::{ActivitySnapshot, CompletableItem};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, rename = "item")]
    pub items: Vec<CompletableItem>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse a catalog. Conditions are parsed here, so syntax errors fail the whole file.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents)?;
        let mut seen = HashSet::new();
        for item in &file.items {
            if item.id.trim().is_empty() {
                anyhow::bail!("catalog item with empty id");
            }
            if !seen.insert(item.id.as_str()) {
                anyhow::bail!("duplicate catalog item id '{}'", item.id);
            }
        }
        Ok(file)
    }

    /// Check every condition only names declared counters and flags
    pub fn validate(&self, declared: &ActivitySnapshot) -> Result<()> {
        for item in &self.items {
            item.condition
                .validate(declared)
                .with_context(|| format!("catalog item '{}'", item.id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_shared::{Condition, ItemKind};

    const SAMPLE: &str = r#"
        [[item]]
        id = "search_5"
        kind = "badge"
        title = "Curious Mind"
        description = "Search five times"
        condition = "search_count >= 5"

        [[item]]
        id = "all_about_me"
        kind = "challenge"
        title = "All About Me"
        condition = "profile_complete && badges_completed >= 1"
    "#;

    #[test]
    fn test_parse_catalog() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        assert_eq!(file.items.len(), 2);
        assert_eq!(file.items[0].condition, Condition::at_least("search_count", 5));
        assert_eq!(file.items[1].kind, ItemKind::Challenge);
        assert!(file.items[1].description.is_empty());
    }

    #[test]
    fn test_bad_condition_fails_parse() {
        let bad = SAMPLE.replace("search_count >= 5", "search_count > 5");
        assert!(CatalogFile::parse(&bad).is_err());
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let mixed = SAMPLE.replace("kind = \"badge\"", "kind = \"Badge\"");
        let file = CatalogFile::parse(&mixed).unwrap();
        assert_eq!(file.items[0].kind, ItemKind::Badge);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dup = SAMPLE.replace("all_about_me", "search_5");
        assert!(CatalogFile::parse(&dup).is_err());
    }

    #[test]
    fn test_validate_against_declared_names() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        let declared = ActivitySnapshot::declared(["search_count", "badges_completed"], ["profile_complete"]);
        assert!(file.validate(&declared).is_ok());

        let missing = ActivitySnapshot::declared(["search_count"], ["profile_complete"]);
        assert!(file.validate(&missing).is_err());
    }
}
