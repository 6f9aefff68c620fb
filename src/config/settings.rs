//! User settings
//!
//! Persisted as `config.json` in the base directory. Missing fields fall back
//! to their defaults so older files keep loading.

use serde::{Deserialize, Serialize};

use super::paths::SurplusPaths;
use crate::error::LedgerError;
use crate::models::OwnerId;

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Pending-retry passes allowed per rule before the run is declared
    /// non-convergent
    #[serde(default = "default_max_passes_per_rule")]
    pub max_passes_per_rule: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_passes_per_rule: default_max_passes_per_rule(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Owner used by the CLI when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_owner: Option<OwnerId>,

    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Date format preference (strftime format)
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_max_passes_per_rule() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            default_owner: None,
            currency_symbol: default_currency(),
            date_format: default_date_format(),
            log_level: default_log_level(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &SurplusPaths) -> Result<Self, LedgerError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                LedgerError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                LedgerError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &SurplusPaths) -> Result<(), LedgerError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            LedgerError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents).map_err(|e| {
            LedgerError::Io(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }

    /// The default owner, creating one if none is set yet
    ///
    /// Returns the owner and whether it was newly created.
    pub fn ensure_default_owner(&mut self) -> (OwnerId, bool) {
        match self.default_owner {
            Some(owner) => (owner, false),
            None => {
                let owner = OwnerId::new();
                self.default_owner = Some(owner);
                (owner, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.currency_symbol, "$");
        assert_eq!(settings.scheduler.max_passes_per_rule, 1);
        assert!(settings.default_owner.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SurplusPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        let (owner, created) = settings.ensure_default_owner();
        assert!(created);
        settings.scheduler.max_passes_per_rule = 3;
        settings.save(&paths).unwrap();

        let mut loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.scheduler.max_passes_per_rule, 3);
        assert_eq!(loaded.ensure_default_owner(), (owner, false));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"currency_symbol":"€"}"#).unwrap();
        assert_eq!(settings.currency_symbol, "€");
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.schema_version, 1);
    }
}
