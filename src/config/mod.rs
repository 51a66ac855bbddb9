use std::path::{Path, PathBuf};

pub mod accounts;
pub mod env;
pub mod settings;

pub use settings::Settings;

/// Namespace for resolving configuration directories and filenames.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    base_dir: PathBuf,
}

impl ConfigPaths {
    /// Create configuration paths using the user's platform conventions.
    pub fn with_project_dirs() -> Result<Self, ConfigError> {
        let project_dirs = directories::ProjectDirs::from("com", "typefully", "typefully-cli")
            .ok_or(ConfigError::UnsupportedPlatform)?;
        Ok(Self {
            base_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    /// Use an explicit directory when given, the platform default otherwise.
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self, ConfigError> {
        match override_dir {
            Some(dir) => Ok(Self::from_base_dir(dir)),
            None => Self::with_project_dirs(),
        }
    }

    /// Construct from a custom base directory.
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Settings merged over the built-in defaults.
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Env-style file holding `TYPEFULLY_API_KEY_<ACCOUNT>` lines.
    pub fn env_file(&self) -> PathBuf {
        self.base_dir.join(".env")
    }

    /// Directory that stores rate-limit usage counters.
    pub fn usage_dir(&self) -> PathBuf {
        self.base_dir.join("usage")
    }

    /// Directory that stores API keys of accounts added through the CLI.
    pub fn accounts_dir(&self) -> PathBuf {
        self.base_dir.join("accounts")
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.base_dir.join("accounts.json")
    }

    /// Ensure the configuration root exists on disk.
    pub fn ensure_exists(&self) -> Result<(), ConfigError> {
        for dir in [self.base_dir.clone(), self.accounts_dir(), self.usage_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to determine configuration directory for this platform")]
    UnsupportedPlatform,
    #[error("I/O error interacting with {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn config_paths_resolve_expected_files() {
        let tmp = tempfile::tempdir().expect("temporary dir");
        let paths = ConfigPaths::from_base_dir(tmp.path());

        assert_eq!(paths.settings_file(), tmp.path().join("config.json"));
        assert_eq!(paths.env_file(), tmp.path().join(".env"));
        assert_eq!(paths.usage_dir(), tmp.path().join("usage"));
        assert_eq!(paths.accounts_file(), tmp.path().join("accounts.json"));
    }

    #[test]
    fn explicit_directory_wins_over_platform_default() {
        let tmp = tempfile::tempdir().expect("temporary dir");
        let paths = ConfigPaths::resolve(Some(tmp.path())).expect("resolve");
        assert_eq!(paths.base_dir(), tmp.path());
    }

    #[test]
    fn ensure_exists_creates_directory_tree() {
        let tmp = tempfile::tempdir().expect("temporary dir");
        let base = tmp.path().join("nested").join("typefully");
        let paths = ConfigPaths::from_base_dir(&base);

        paths.ensure_exists().expect("create dirs");
        assert!(fs::metadata(paths.accounts_dir())
            .expect("metadata")
            .is_dir());
        assert!(fs::metadata(paths.usage_dir()).expect("metadata").is_dir());
    }
}
