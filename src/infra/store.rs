//! Persistent on-disk store for item metadata, recipes and the item → recipe index.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;

use crate::domain::Knowledge;

const STORE_DIRNAME: &str = "craft-checker";
const STORE_FILENAME: &str = "knowledge.json";

/// Bumped whenever the on-disk layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored knowledge at {path} is unreadable ({source}); move it away to start fresh")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored knowledge at {path} has format {found}, expected {}", FORMAT_VERSION)]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Timestamp(#[from] time::error::Format),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredKnowledge {
    format_version: u32,
    /// RFC 3339 timestamp of the save.
    saved_at: String,
    knowledge: Knowledge,
}

#[derive(Clone, Debug)]
pub struct Store {
    path: PathBuf,
    store_recipes: bool,
}

impl Store {
    /// Store in `dir`, or in the platform data directory when `None`.
    pub fn new(dir: Option<&Path>, store_recipes: bool) -> Self {
        let base = match dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(STORE_DIRNAME),
        };
        Self {
            path: base.join(STORE_FILENAME),
            store_recipes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored knowledge. A missing file is a first run, not an error.
    pub fn load(&self) -> Result<Knowledge, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no stored knowledge yet; starting fresh");
            return Ok(Knowledge::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let stored: StoredKnowledge =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        if stored.format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                found: stored.format_version,
            });
        }

        info!(
            items = stored.knowledge.items.len(),
            recipes = stored.knowledge.recipes.len(),
            age = age_string(&stored.saved_at).as_deref().unwrap_or("unknown"),
            "loaded stored knowledge"
        );
        Ok(stored.knowledge)
    }

    /// Save atomically: the previous file stays intact until the new one is complete.
    pub fn save(&self, knowledge: &Knowledge) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let knowledge = if self.store_recipes {
            knowledge.clone()
        } else {
            Knowledge {
                items: knowledge.items.clone(),
                ..Knowledge::default()
            }
        };
        let stored = StoredKnowledge {
            format_version: FORMAT_VERSION,
            saved_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
            knowledge,
        };
        let content = serde_json::to_string(&stored)?; // compact, not pretty (can be large)

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(
            items = stored.knowledge.items.len(),
            recipes = stored.knowledge.recipes.len(),
            path = %self.path.display(),
            "saved knowledge"
        );
        Ok(())
    }
}

/// Human-readable age of an RFC 3339 timestamp.
fn age_string(saved_at: &str) -> Option<String> {
    let saved = OffsetDateTime::parse(saved_at, &Rfc3339).ok()?;
    let secs = (OffsetDateTime::now_utc() - saved).whole_seconds().max(0);
    Some(if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ingredient, Item};
    use crate::test_support::recipe;
    use std::collections::BTreeSet;

    fn sample() -> Knowledge {
        let mut knowledge = Knowledge::default();
        knowledge.learn_item(Item::named(19721, "Glob of Ectoplasm"));
        knowledge.learn_recipe(recipe(7, 46742, 1, vec![Ingredient::item(19721, 5)]));
        knowledge.set_consumers(19721, BTreeSet::from([7]));
        knowledge.set_consumers(46742, BTreeSet::new());
        knowledge
    }

    #[test]
    fn missing_file_is_a_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Some(dir.path()), true);
        assert_eq!(store.load().unwrap(), Knowledge::default());
    }

    #[test]
    fn round_trips_all_three_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Some(&dir.path().join("nested")), true);
        let knowledge = sample();

        store.save(&knowledge).unwrap();
        assert_eq!(store.load().unwrap(), knowledge);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn keeps_only_items_when_recipes_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Some(dir.path()), false);

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert!(loaded.recipes.is_empty());
        assert!(loaded.index.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Some(dir.path()), true);
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[test]
    fn rejects_other_format_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(Some(dir.path()), true);
        fs::write(
            store.path(),
            r#"{"format_version": 99, "saved_at": "2024-01-01T00:00:00Z", "knowledge": {}}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load(),
            Err(StoreError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn formats_ages() {
        assert_eq!(age_string("not a date"), None);
        assert!(age_string("2020-01-01T00:00:00Z").unwrap().ends_with('d'));
    }
}
