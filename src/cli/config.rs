use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const DEFAULT_TOKEN_ENV: &str = "POLSYNC_TOKEN";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// API base URL, e.g. `https://controller.example/sdwan/v2.1/api`
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ConfigFile {
    /// Load configuration file
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| SyncError::ConfigParse {
            path: PathBuf::from(path),
            source,
        })
    }
}
