//! Accounts declared as `TYPEFULLY_API_KEY_<ACCOUNT>=<key>` variables, either
//! in the `.env` file next to the settings or in the process environment.

use super::ConfigError;
use crate::client::ApiVersion;
use std::collections::BTreeMap;
use std::path::Path;

const V1_PREFIX: &str = "TYPEFULLY_API_KEY_";
const V2_PREFIX: &str = "TYPEFULLY_V2_API_KEY_";

/// An account discovered from an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAccount {
    pub alias: String,
    pub api_key: String,
    /// `None` means the plain prefix was used and the configured default applies.
    pub api_version: Option<ApiVersion>,
}

/// Extract accounts from `(name, value)` pairs. Later pairs win on alias clashes.
pub fn scan<I, K, V>(vars: I) -> Vec<EnvAccount>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut found = BTreeMap::new();
    for (name, value) in vars {
        let name = name.as_ref();
        let (suffix, api_version) = if let Some(rest) = name.strip_prefix(V2_PREFIX) {
            (rest, Some(ApiVersion::V2))
        } else if let Some(rest) = name.strip_prefix(V1_PREFIX) {
            (rest, None)
        } else {
            continue;
        };
        let api_key = value.as_ref().trim();
        if suffix.is_empty() || api_key.is_empty() {
            continue;
        }
        let alias = suffix.to_lowercase();
        found.insert(
            alias.clone(),
            EnvAccount {
                alias,
                api_key: api_key.to_string(),
                api_version,
            },
        );
    }
    found.into_values().collect()
}

/// Read accounts from an env file. A missing file yields no accounts.
pub fn scan_file(path: &Path) -> Result<Vec<EnvAccount>, ConfigError> {
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "env file not found; add lines like TYPEFULLY_API_KEY_<ACCOUNT>=your_key_here"
        );
        return Ok(Vec::new());
    }
    let iter = dotenvy::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut pairs = Vec::new();
    for item in iter {
        let pair = item.map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        pairs.push(pair);
    }
    Ok(scan(pairs))
}

/// Accounts from the env file followed by the process environment, which
/// takes precedence for the same alias.
pub fn discover(path: &Path) -> Result<Vec<EnvAccount>, ConfigError> {
    let mut merged: BTreeMap<String, EnvAccount> = scan_file(path)?
        .into_iter()
        .map(|account| (account.alias.clone(), account))
        .collect();
    for account in scan(std::env::vars()) {
        merged.insert(account.alias.clone(), account);
    }
    Ok(merged.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_lowercases_aliases_and_skips_unrelated_keys() {
        let accounts = scan([
            ("TYPEFULLY_API_KEY_PERSONAL", "key-1"),
            ("TYPEFULLY_V2_API_KEY_Company", "key-2"),
            ("OTHER_VAR", "ignored"),
            ("TYPEFULLY_API_KEY_", "no-alias"),
            ("TYPEFULLY_API_KEY_EMPTY", "  "),
        ]);
        assert_eq!(
            accounts,
            vec![
                EnvAccount {
                    alias: "company".into(),
                    api_key: "key-2".into(),
                    api_version: Some(ApiVersion::V2),
                },
                EnvAccount {
                    alias: "personal".into(),
                    api_key: "key-1".into(),
                    api_version: None,
                },
            ]
        );
    }

    #[test]
    fn scan_file_ignores_comments_and_blank_lines() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join(".env");
        fs::write(
            &path,
            "# personal account\nTYPEFULLY_API_KEY_MAIN=abc123\n\nEDITOR=vim\nTYPEFULLY_API_KEY_SIDE=\"quoted\"\n",
        )
        .expect("write env");

        let accounts = scan_file(&path).expect("scan");
        let aliases: Vec<_> = accounts.iter().map(|a| a.alias.as_str()).collect();
        assert_eq!(aliases, vec!["main", "side"]);
        assert_eq!(accounts[1].api_key, "quoted");
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let accounts = scan_file(&tmp.path().join(".env")).expect("scan");
        assert!(accounts.is_empty());
    }
}
