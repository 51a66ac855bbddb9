use super::{ConfigError, ConfigPaths};
use crate::client::ApiVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroU32;

/// Behavioural switches read from `config.json`.
///
/// Keys missing from the file keep their defaults and unknown keys are
/// ignored, so a partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scheduling stays off until explicitly enabled; drafts only otherwise.
    pub scheduling_enabled: bool,
    pub default_threadify: bool,
    pub default_share: bool,
    pub default_api_version: ApiVersion,
    pub default_account: Option<String>,
    pub page_size: u32,
    pub max_items: usize,
    pub requests_per_minute: NonZeroU32,
    pub daily_quota: Option<NonZeroU32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scheduling_enabled: false,
            default_threadify: true,
            default_share: true,
            default_api_version: ApiVersion::V1,
            default_account: None,
            page_size: 50,
            max_items: 200,
            requests_per_minute: NonZeroU32::MIN.saturating_add(59),
            daily_quota: None,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        let path = paths.settings_file();
        match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Self::default()),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_settings(contents: &str) -> (ConfigPaths, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = ConfigPaths::from_base_dir(tmp.path());
        fs::write(paths.settings_file(), contents).expect("write settings");
        (paths, tmp)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(&ConfigPaths::from_base_dir(tmp.path())).expect("load");
        assert_eq!(settings, Settings::default());
        assert!(!settings.scheduling_enabled);
        assert_eq!(settings.requests_per_minute.get(), 60);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let (paths, _tmp) = write_settings(
            r#"{ "scheduling_enabled": true, "default_api_version": "v2", "unknown": 1 }"#,
        );
        let settings = Settings::load(&paths).expect("load");
        assert!(settings.scheduling_enabled);
        assert_eq!(settings.default_api_version, ApiVersion::V2);
        assert!(settings.default_threadify);
        assert!(settings.default_share);
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn malformed_file_is_reported() {
        let (paths, _tmp) = write_settings("{ not json");
        let err = Settings::load(&paths).expect_err("parse failure");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
