//! Process settings stored in `gatekeeper.toml`.
//!
//! Keys are colon-separated paths into the TOML document, so
//! `git:gitosis-repo` reads:
//!
//! ```toml
//! [git]
//! gitosis-repo = "/var/lib/gatekeeper/gitosis-admin"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};
use tracing::debug;

use crate::error::AccessError;
use crate::io::git::Identity;

pub const GITOSIS_REPO_KEY: &str = "git:gitosis-repo";
pub const REMOTE_KEY: &str = "git:remote";
pub const AUTHOR_NAME_KEY: &str = "git:author-name";
pub const AUTHOR_EMAIL_KEY: &str = "git:author-email";
pub const AUTHORITY_URL_KEY: &str = "git:authority-url";

pub const CONF_FILE_NAME: &str = "gitosis.conf";
pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("key '{0}' is not a string")]
    NotAString(String),
}

/// Read-only string lookup used to resolve working-copy settings.
pub trait ConfigProvider {
    fn get_string(&self, key: &str) -> Result<String, SettingsError>;
}

/// [`ConfigProvider`] over a parsed TOML table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TomlSettings {
    table: Table,
}

impl TomlSettings {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parse settings toml")
    }

    /// Load settings from a TOML file.
    ///
    /// A missing file yields empty settings; lookups then fail per key.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "settings file missing, using empty settings");
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parse {}", path.display()))
    }
}

impl ConfigProvider for TomlSettings {
    fn get_string(&self, key: &str) -> Result<String, SettingsError> {
        let mut parts = key.split(':');
        let first = parts.next().unwrap_or_default();
        let mut value = self.table.get(first);
        for part in parts {
            value = value.and_then(|v| v.as_table()).and_then(|t| t.get(part));
        }
        match value {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(SettingsError::NotAString(key.to_string())),
            None => Err(SettingsError::KeyNotFound(key.to_string())),
        }
    }
}

/// `<git:gitosis-repo>/gitosis.conf`.
pub fn conf_path(provider: &dyn ConfigProvider) -> Result<PathBuf, AccessError> {
    Ok(repo_root(provider)?.join(CONF_FILE_NAME))
}

/// Everything needed to open or provision the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopySettings {
    pub root: PathBuf,
    pub remote: String,
    pub identity: Option<Identity>,
    pub authority_url: Option<String>,
}

impl WorkingCopySettings {
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, AccessError> {
        let root = repo_root(provider)?;
        let remote = optional(provider, REMOTE_KEY)?.unwrap_or_else(|| DEFAULT_REMOTE.to_string());
        let identity = match (
            optional(provider, AUTHOR_NAME_KEY)?,
            optional(provider, AUTHOR_EMAIL_KEY)?,
        ) {
            (Some(name), Some(email)) => Some(Identity { name, email }),
            _ => None,
        };
        let authority_url = optional(provider, AUTHORITY_URL_KEY)?;
        Ok(Self {
            root,
            remote,
            identity,
            authority_url,
        })
    }
}

fn repo_root(provider: &dyn ConfigProvider) -> Result<PathBuf, AccessError> {
    provider
        .get_string(GITOSIS_REPO_KEY)
        .map(PathBuf::from)
        .map_err(|source| AccessError::ConfigurationMissing {
            key: GITOSIS_REPO_KEY,
            source,
        })
}

fn optional(provider: &dyn ConfigProvider, key: &'static str) -> Result<Option<String>, AccessError> {
    match provider.get_string(key) {
        Ok(value) => Ok(Some(value)),
        Err(SettingsError::KeyNotFound(_)) => Ok(None),
        Err(source) => Err(AccessError::ConfigurationMissing { key, source }),
    }
}
