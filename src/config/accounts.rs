use super::env::EnvAccount;
use super::{ConfigError, ConfigPaths};
use crate::client::ApiVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persisted accounts added through `typefully accounts add`.
#[derive(Debug, Clone)]
pub struct AccountStore {
    paths: ConfigPaths,
}

impl AccountStore {
    pub fn new(paths: ConfigPaths) -> Result<Self, AccountStoreError> {
        paths.ensure_exists()?;
        Ok(Self { paths })
    }

    /// Add an account entry and store its API key.
    pub fn add_account(
        &self,
        alias: &str,
        api_key: &str,
        profile: AccountProfile,
    ) -> Result<(), AccountStoreError> {
        validate_alias(alias)?;
        if api_key.trim().is_empty() {
            return Err(AccountStoreError::EmptyApiKey);
        }
        let mut state = self.read_state()?;
        if state.accounts.contains_key(alias) {
            return Err(AccountStoreError::DuplicateAlias(alias.to_string()));
        }
        state.accounts.insert(alias.to_string(), profile);
        if state.default_account.is_none() {
            state.default_account = Some(alias.to_string());
        }
        self.write_state(&state)?;
        self.write_secret(alias, api_key.trim())?;
        Ok(())
    }

    pub fn get_account(&self, alias: &str) -> Result<AccountRecord, AccountStoreError> {
        let state = self.read_state()?;
        let profile = state
            .accounts
            .get(alias)
            .cloned()
            .ok_or_else(|| AccountStoreError::AccountNotFound(alias.to_string()))?;
        let api_key = self.read_secret(alias)?;
        Ok(AccountRecord {
            alias: alias.to_string(),
            api_key,
            is_default: state.default_account.as_deref() == Some(alias),
            profile,
            source: AccountSource::Stored,
        })
    }

    /// Every stored account with its key.
    pub fn records(&self) -> Result<Vec<AccountRecord>, AccountStoreError> {
        let state = self.read_state()?;
        state
            .accounts
            .keys()
            .map(|alias| self.get_account(alias))
            .collect()
    }

    pub fn default_alias(&self) -> Result<Option<String>, AccountStoreError> {
        Ok(self.read_state()?.default_account)
    }

    pub fn set_default(&self, alias: &str) -> Result<(), AccountStoreError> {
        let mut state = self.read_state()?;
        if !state.accounts.contains_key(alias) {
            return Err(AccountStoreError::AccountNotFound(alias.to_string()));
        }
        state.default_account = Some(alias.to_string());
        self.write_state(&state)
    }

    /// Remove an account and its key; the next alias becomes default if needed.
    pub fn remove_account(&self, alias: &str) -> Result<(), AccountStoreError> {
        let mut state = self.read_state()?;
        if state.accounts.remove(alias).is_none() {
            return Err(AccountStoreError::AccountNotFound(alias.to_string()));
        }
        if state.default_account.as_deref() == Some(alias) {
            state.default_account = state.accounts.keys().next().cloned();
        }
        self.write_state(&state)?;
        self.delete_secret(alias)
    }

    /// Export account metadata without secrets.
    pub fn export_accounts(&self) -> Result<Vec<AccountExport>, AccountStoreError> {
        let AccountsState {
            default_account,
            accounts,
        } = self.read_state()?;
        Ok(accounts
            .into_iter()
            .map(|(alias, profile)| AccountExport {
                is_default: default_account.as_deref() == Some(alias.as_str()),
                alias,
                label: profile.label,
                description: profile.description,
                api_version: profile.api_version,
                social_set: profile.social_set,
            })
            .collect())
    }

    fn read_state(&self) -> Result<AccountsState, AccountStoreError> {
        let path = self.paths.accounts_file();
        match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Ok(AccountsState::default()),
            Ok(contents) => serde_json::from_str(&contents).map_err(AccountStoreError::Deserialize),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AccountsState::default()),
            Err(source) => Err(AccountStoreError::Io { path, source }),
        }
    }

    fn write_state(&self, state: &AccountsState) -> Result<(), AccountStoreError> {
        let path = self.paths.accounts_file();
        let contents = serde_json::to_string_pretty(state).map_err(AccountStoreError::Serialize)?;
        fs::write(&path, contents).map_err(|source| AccountStoreError::Io { path, source })
    }

    fn write_secret(&self, alias: &str, api_key: &str) -> Result<(), AccountStoreError> {
        let path = self.secret_path(alias);
        let mut file = fs::File::create(&path).map_err(|source| AccountStoreError::Io {
            path: path.clone(),
            source,
        })?;
        set_restricted_permissions(&path)?;
        file.write_all(api_key.as_bytes())
            .map_err(|source| AccountStoreError::Io { path, source })
    }

    fn read_secret(&self, alias: &str) -> Result<String, AccountStoreError> {
        let path = self.secret_path(alias);
        let contents = fs::read_to_string(&path)
            .map_err(|source| AccountStoreError::Io { path, source })?;
        Ok(contents.trim().to_string())
    }

    fn delete_secret(&self, alias: &str) -> Result<(), AccountStoreError> {
        let path = self.secret_path(alias);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AccountStoreError::Io { path, source }),
        }
    }

    fn secret_path(&self, alias: &str) -> PathBuf {
        self.paths.accounts_dir().join(format!("{alias}.key"))
    }
}

/// Combine stored accounts with env-declared ones. Stored entries win on the
/// same alias; env accounts without an explicit version get `default_version`.
pub fn merge_accounts(
    stored: Vec<AccountRecord>,
    env: Vec<EnvAccount>,
    default_version: ApiVersion,
) -> BTreeMap<String, AccountRecord> {
    let mut merged = BTreeMap::new();
    for account in env {
        let record = AccountRecord {
            alias: account.alias.clone(),
            api_key: account.api_key,
            profile: AccountProfile {
                api_version: account.api_version.unwrap_or(default_version),
                ..AccountProfile::default()
            },
            is_default: false,
            source: AccountSource::Environment,
        };
        merged.insert(account.alias, record);
    }
    for record in stored {
        merged.insert(record.alias.clone(), record);
    }
    merged
}

fn validate_alias(alias: &str) -> Result<(), AccountStoreError> {
    if alias.trim().is_empty() {
        return Err(AccountStoreError::InvalidAlias(
            "alias cannot be empty".to_string(),
        ));
    }
    if alias.contains('/') || alias.contains('\\') {
        return Err(AccountStoreError::InvalidAlias(
            "alias may not contain path separators".to_string(),
        ));
    }
    if alias.contains("..") {
        return Err(AccountStoreError::InvalidAlias(
            "alias may not contain parent directory segments".to_string(),
        ));
    }
    Ok(())
}

#[cfg(unix)]
fn set_restricted_permissions(path: &Path) -> Result<(), AccountStoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
        AccountStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_restricted_permissions(_path: &Path) -> Result<(), AccountStoreError> {
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AccountProfile {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub api_version: ApiVersion,
    /// Default social set (name or id) for v2 accounts.
    #[serde(default)]
    pub social_set: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountSource {
    Stored,
    Environment,
}

/// Exported account metadata for sharing without secrets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountExport {
    pub alias: String,
    pub is_default: bool,
    pub label: Option<String>,
    pub description: Option<String>,
    pub api_version: ApiVersion,
    pub social_set: Option<String>,
}

/// Full account record with its API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub alias: String,
    pub api_key: String,
    pub profile: AccountProfile,
    pub is_default: bool,
    pub source: AccountSource,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsState {
    #[serde(default)]
    default_account: Option<String>,
    #[serde(default)]
    accounts: BTreeMap<String, AccountProfile>,
}

#[derive(thiserror::Error, Debug)]
pub enum AccountStoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse accounts file: {0}")]
    Deserialize(serde_json::Error),
    #[error("failed to serialise accounts file: {0}")]
    Serialize(serde_json::Error),
    #[error("account alias already exists: {0}")]
    DuplicateAlias(String),
    #[error("account alias is invalid: {0}")]
    InvalidAlias(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("API key cannot be empty")]
    EmptyApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_for_test() -> (AccountStore, tempfile::TempDir) {
        let tmp = tempdir().expect("tmpdir");
        let paths = ConfigPaths::from_base_dir(tmp.path());
        let store = AccountStore::new(paths).expect("store");
        (store, tmp)
    }

    #[test]
    fn add_account_persists_profile_and_key() {
        let (store, _tmp) = store_for_test();
        store
            .add_account(
                "company",
                " company-key \n",
                AccountProfile {
                    label: Some("Company".into()),
                    api_version: ApiVersion::V2,
                    social_set: Some("Brand".into()),
                    ..AccountProfile::default()
                },
            )
            .expect("add account");

        let exports = store.export_accounts().expect("export");
        assert_eq!(exports.len(), 1);
        assert!(exports[0].is_default);
        assert_eq!(exports[0].api_version, ApiVersion::V2);
        assert_eq!(exports[0].social_set.as_deref(), Some("Brand"));

        let record = store.get_account("company").expect("get account");
        assert_eq!(record.api_key, "company-key");
        assert_eq!(record.source, AccountSource::Stored);
    }

    #[test]
    fn cannot_add_duplicate_alias() {
        let (store, _tmp) = store_for_test();
        store
            .add_account("dup", "k1", AccountProfile::default())
            .expect("add first");
        let err = store
            .add_account("dup", "k2", AccountProfile::default())
            .expect_err("duplicate");
        assert!(matches!(
            err,
            AccountStoreError::DuplicateAlias(alias) if alias == "dup"
        ));
    }

    #[test]
    fn remove_account_selects_new_default() {
        let (store, _tmp) = store_for_test();
        store
            .add_account("first", "k1", AccountProfile::default())
            .expect("add first");
        store
            .add_account("second", "k2", AccountProfile::default())
            .expect("add second");
        store.set_default("second").expect("set default");
        store.set_default("first").expect("set default back");

        store.remove_account("first").expect("remove account");
        let records = store.records().expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].alias, "second");
        assert!(records[0].is_default);
        assert!(store.get_account("first").is_err());
    }

    #[test]
    fn stored_accounts_shadow_env_accounts() {
        let (store, _tmp) = store_for_test();
        store
            .add_account("personal", "stored-key", AccountProfile::default())
            .expect("add");
        let env = vec![
            EnvAccount {
                alias: "personal".into(),
                api_key: "env-key".into(),
                api_version: None,
            },
            EnvAccount {
                alias: "side".into(),
                api_key: "side-key".into(),
                api_version: None,
            },
        ];

        let merged = merge_accounts(store.records().expect("records"), env, ApiVersion::V2);
        assert_eq!(merged["personal"].api_key, "stored-key");
        assert_eq!(merged["side"].source, AccountSource::Environment);
        assert_eq!(merged["side"].profile.api_version, ApiVersion::V2);
    }

    #[test]
    fn alias_validation_rejects_path_segments() {
        assert!(validate_alias("valid-alias").is_ok());
        assert!(validate_alias("nested/alias").is_err());
        assert!(validate_alias("..").is_err());
        assert!(validate_alias("").is_err());
    }
}
