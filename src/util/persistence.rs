use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;
use tracing::warn;

use crate::domain::PricingMode;
use crate::infra::gw2::{ClientOptions, DEFAULT_BASE_URL, DEFAULT_NAMES_URL};
use crate::util::batch::MAX_IDS_PER_REQUEST;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "CraftChecker";
const APP_NAME: &str = "CraftChecker";

/// User settings, stored as JSON in the platform config directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    /// Bulk `[id, name]` list used to look items up by name.
    pub names_url: String,
    /// Persist recipes and the recipe index, not only item names.
    pub store_recipes: bool,
    /// API key with the `unlocks` permission, used to flag skins not yet unlocked.
    pub api_key: Option<String>,
    pub pricing_mode: PricingMode,
    /// Share of the sale price left after trading post fees.
    pub payout_rate: f64,
    pub request_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
    pub batch_size: usize,
    pub report_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            names_url: DEFAULT_NAMES_URL.to_string(),
            store_recipes: true,
            api_key: None,
            pricing_mode: PricingMode::Instant,
            payout_rate: 0.85,
            request_timeout_secs: 5,
            retry_backoff_ms: 2000,
            max_retries: 3,
            batch_size: MAX_IDS_PER_REQUEST,
            report_limit: 10,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), InvalidSettings> {
        if !(self.payout_rate > 0.0 && self.payout_rate <= 1.0) {
            return Err(InvalidSettings::PayoutRate(self.payout_rate));
        }
        if self.request_timeout_secs == 0 {
            return Err(InvalidSettings::Timeout);
        }
        if self.batch_size == 0 || self.batch_size > MAX_IDS_PER_REQUEST {
            return Err(InvalidSettings::BatchSize(self.batch_size));
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_retries: self.max_retries,
            batch_size: self.batch_size,
        }
    }
}

fn settings_file() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

/// Load saved settings, falling back to defaults when none are saved or readable.
pub fn load_settings() -> Settings {
    settings_file()
        .and_then(|path| load_settings_from(&path))
        .unwrap_or_default()
}

pub fn load_settings_from(path: &Path) -> Option<Settings> {
    let data = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!(path = %path.display(), "ignoring unreadable settings file: {err}");
            None
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<(), PersistSaveError> {
    let path = settings_file().ok_or(PersistSaveError::StorageUnavailable)?;
    save_settings_to(&path, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), PersistSaveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PersistSaveError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum InvalidSettings {
    #[error("payout rate must be in (0, 1], got {0}")]
    PayoutRate(f64),
    #[error("request timeout must be at least one second")]
    Timeout,
    #[error("batch size must be between 1 and 200, got {0}")]
    BatchSize(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.client_options().batch_size, 200);
        assert_eq!(settings.client_options().retry_backoff, Duration::from_secs(2));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let settings = Settings {
            payout_rate: 1.5,
            ..Settings::default()
        };
        assert_eq!(settings.validate(), Err(InvalidSettings::PayoutRate(1.5)));

        let settings = Settings {
            batch_size: 500,
            ..Settings::default()
        };
        assert_eq!(settings.validate(), Err(InvalidSettings::BatchSize(500)));
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pricing_mode": "listed", "report_limit": 3}"#).unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.pricing_mode, PricingMode::Listed);
        assert_eq!(settings.report_limit, 3);
        assert_eq!(settings.payout_rate, 0.85);
    }

    #[test]
    fn saves_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            api_key: Some("ABC-123".into()),
            store_recipes: false,
            ..Settings::default()
        };

        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), Some(settings));
        assert_eq!(load_settings_from(&dir.path().join("missing.json")), None);
    }
}
