pub mod dry_run;
pub mod http;

use std::fmt;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::{
    error::SyncError,
    policy::{Attributes, Domain, InventoryKind},
};

pub use dry_run::DryRunStore;
pub use http::HttpStore;

/// A remote collection of objects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    Sets(Domain),
    Stacks(Domain),
    /// Rules nested under one Set
    Rules { domain: Domain, set_id: String },
    Inventory(InventoryKind),
}

impl Collection {
    pub fn rules(domain: Domain, set_id: &str) -> Self {
        Collection::Rules {
            domain,
            set_id: set_id.to_string(),
        }
    }

    /// Path relative to the controller base URL
    pub fn path(&self) -> String {
        match self {
            Collection::Sets(domain) => domain.descriptor().sets.to_string(),
            Collection::Stacks(domain) => domain.descriptor().stacks.to_string(),
            Collection::Rules { domain, set_id } => {
                let descriptor = domain.descriptor();
                format!("{}/{}/{}", descriptor.sets, set_id, descriptor.rules)
            }
            Collection::Inventory(kind) => kind.collection().to_string(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Remote Policy Store abstraction for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn list(&self, collection: &Collection) -> Result<Vec<Attributes>, SyncError>;

    async fn get(&self, collection: &Collection, id: &str) -> Result<Attributes, SyncError>;

    /// Returns the stored object, carrying its new `id`
    async fn create(
        &self,
        collection: &Collection,
        body: &Attributes,
    ) -> Result<Attributes, SyncError>;

    async fn update(
        &self,
        collection: &Collection,
        id: &str,
        body: &Attributes,
    ) -> Result<Attributes, SyncError>;

    async fn delete(&self, collection: &Collection, id: &str) -> Result<(), SyncError>;
}
