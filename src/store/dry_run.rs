use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::Value;

use super::{Collection, PolicyStore};
use crate::{
    error::SyncError,
    policy::{
        Attributes,
        model::{ID, NAME, object_name},
    },
};

/// Preview wrapper: reads hit the inner store, writes are only logged
///
/// Created objects get a synthetic `dry-run-N` id and are remembered so a
/// later read of that id (or of a rule list under it) still answers.
pub struct DryRunStore<S> {
    inner: S,
    next_id: AtomicUsize,
    created: Mutex<HashMap<(String, String), Attributes>>,
}

impl<S: PolicyStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            next_id: AtomicUsize::new(0),
            created: Mutex::new(HashMap::new()),
        }
    }

    fn remembered(&self, collection: &Collection, id: &str) -> Option<Attributes> {
        self.created
            .lock()
            .ok()?
            .get(&(collection.path(), id.to_string()))
            .cloned()
    }

    fn remember(&self, collection: &Collection, id: &str, object: Attributes) {
        if let Ok(mut created) = self.created.lock() {
            created.insert((collection.path(), id.to_string()), object);
        }
    }
}

fn is_synthetic(collection: &Collection) -> bool {
    matches!(collection, Collection::Rules { set_id, .. } if set_id.starts_with("dry-run-"))
}

#[async_trait]
impl<S: PolicyStore> PolicyStore for DryRunStore<S> {
    async fn list(&self, collection: &Collection) -> Result<Vec<Attributes>, SyncError> {
        if is_synthetic(collection) {
            return Ok(Vec::new());
        }
        self.inner.list(collection).await
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<Attributes, SyncError> {
        match self.remembered(collection, id) {
            Some(object) => Ok(object),
            None => self.inner.get(collection, id).await,
        }
    }

    async fn create(
        &self,
        collection: &Collection,
        body: &Attributes,
    ) -> Result<Attributes, SyncError> {
        let id = format!("dry-run-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        log::info!(
            "[dry-run] would create '{}' in {}",
            object_name(body).unwrap_or("<unnamed>"),
            collection
        );
        let mut object = body.clone();
        object.insert(ID.to_string(), Value::String(id.clone()));
        self.remember(collection, &id, object.clone());
        Ok(object)
    }

    async fn update(
        &self,
        collection: &Collection,
        id: &str,
        body: &Attributes,
    ) -> Result<Attributes, SyncError> {
        log::info!(
            "[dry-run] would update {}/{} ({} field(s))",
            collection,
            id,
            body.keys().filter(|key| *key != ID && *key != NAME).count()
        );
        let mut object = self.remembered(collection, id).unwrap_or_default();
        for (key, value) in body {
            object.insert(key.clone(), value.clone());
        }
        object.insert(ID.to_string(), Value::String(id.to_string()));
        self.remember(collection, id, object.clone());
        Ok(object)
    }

    async fn delete(&self, collection: &Collection, id: &str) -> Result<(), SyncError> {
        log::info!("[dry-run] would delete {}/{}", collection, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{policy::Domain, store::MockPolicyStore};
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn writes_never_reach_the_inner_store() {
        let mut inner = MockPolicyStore::new();
        inner.expect_create().never();
        inner.expect_update().never();
        inner.expect_delete().never();
        inner
            .expect_list()
            .times(1)
            .returning(|_| Ok(vec![attrs(json!({"id": "1", "name": "A"}))]));

        let store = DryRunStore::new(inner);
        let sets = Collection::Sets(Domain::Qos);

        assert_eq!(store.list(&sets).await.unwrap().len(), 1);
        let first = store.create(&sets, &attrs(json!({"name": "B"}))).await.unwrap();
        let second = store.create(&sets, &attrs(json!({"name": "C"}))).await.unwrap();
        assert_eq!(first["id"], "dry-run-1");
        assert_eq!(second["id"], "dry-run-2");
        store.update(&sets, "1", &attrs(json!({"description": "x"}))).await.unwrap();
        store.delete(&sets, "1").await.unwrap();
    }

    #[tokio::test]
    async fn synthetic_sets_answer_locally() {
        let mut inner = MockPolicyStore::new();
        inner.expect_list().never();
        inner.expect_get().never();

        let store = DryRunStore::new(inner);
        let sets = Collection::Sets(Domain::Security);
        let created = store.create(&sets, &attrs(json!({"name": "Corp"}))).await.unwrap();
        let id = created["id"].as_str().unwrap();

        let rules = store.list(&Collection::rules(Domain::Security, id)).await.unwrap();
        assert!(rules.is_empty());

        let fetched = store.get(&sets, id).await.unwrap();
        assert_eq!(fetched["name"], "Corp");
    }
}
