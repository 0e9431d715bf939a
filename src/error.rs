use thiserror::Error;

use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse policy document {path}: {source}")]
    DocumentParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("malformed policy document section '{section}': {reason}")]
    DocumentShape { section: String, reason: String },

    #[error("failed to render policy document: {0}")]
    DocumentRender(#[from] serde_yaml::Error),

    #[error("unknown policy domain '{0}' (expected path, qos, nat, security, performance or all)")]
    UnknownDomain(String),

    #[error("environment variable {var} holding the controller token is not set")]
    MissingToken { var: String },

    #[error("no controller base URL configured (use --base-url or [controller] base_url)")]
    MissingBaseUrl,

    #[error("HTTP request to {collection} failed: {source}")]
    Http {
        collection: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("controller rejected request on {collection} with status {status}: {body}")]
    Remote {
        collection: String,
        status: u16,
        body: String,
    },

    #[error("controller response for {collection} carries no object id")]
    MissingId { collection: String },

    #[error("cannot export {collection}: live state could not be read")]
    ExportIncomplete { collection: String },

    #[error("malformed object in {collection}: {reason}")]
    MalformedObject { collection: String, reason: String },
}
