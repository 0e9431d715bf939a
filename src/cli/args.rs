use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::policy::domain::Selector;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Declarative SD-WAN policy reconciliation against a live controller"
)]
pub struct Args {
    /// Path to configuration file (TOML)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Controller API base URL (overrides [controller] base_url)
    #[arg(long = "base-url", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile the controller against a policy document
    Push {
        /// Domain to reconcile: path, qos, nat, security, performance or all
        #[arg(long = "domain", value_name = "DOMAIN", default_value = "all")]
        domain: Selector,

        /// Policy document (YAML)
        #[arg(long = "file", value_name = "PATH")]
        file: PathBuf,

        /// Log the writes that would be issued without sending them
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Export live policy as a document
    Pull {
        /// Domain to export: path, qos, nat, security, performance or all
        #[arg(long = "domain", value_name = "DOMAIN", default_value = "all")]
        domain: Selector,

        /// Write the document here instead of stdout
        #[arg(long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}
