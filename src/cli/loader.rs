use std::{env, time::Duration};

use crate::{
    error::SyncError,
    store::{DryRunStore, HttpStore, PolicyStore},
};

use super::{
    args::{Args, Command},
    config::ConfigFile,
};

/// Controller settings merged from the config file and command line
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub token_env: String,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub dry_run: bool,
}

impl Settings {
    /// Command line flags win over the config file
    pub fn load(args: &Args) -> Result<Self, SyncError> {
        let config = match args.config.as_ref() {
            Some(config_path) => ConfigFile::load(config_path)?,
            None => ConfigFile::default(),
        };
        Self::merge(args, config)
    }

    fn merge(args: &Args, config: ConfigFile) -> Result<Self, SyncError> {
        let base_url = args
            .base_url
            .clone()
            .or(config.controller.base_url)
            .ok_or(SyncError::MissingBaseUrl)?;
        let dry_run = match &args.command {
            Command::Push { dry_run, .. } => *dry_run || config.sync.dry_run,
            Command::Pull { .. } => false,
        };

        Ok(Self {
            base_url,
            token_env: config.controller.token_env,
            timeout: Duration::from_secs(config.controller.timeout_secs),
            headers: config.controller.headers.into_iter().collect(),
            dry_run,
        })
    }

    /// Open the controller store, wrapped for preview when dry-run is set
    pub fn open_store(&self) -> Result<Box<dyn PolicyStore>, SyncError> {
        let token = self.token(|var| env::var(var).ok())?;
        let store = HttpStore::new(&self.base_url, token, self.timeout, self.headers.clone())?;
        if self.dry_run {
            log::info!("dry run: no changes will be written");
            Ok(Box::new(DryRunStore::new(store)))
        } else {
            Ok(Box::new(store))
        }
    }

    fn token(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String, SyncError> {
        lookup(&self.token_env)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| SyncError::MissingToken {
                var: self.token_env.clone(),
            })
    }
}
