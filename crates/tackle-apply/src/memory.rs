//! In-process object store
//!
//! Behaves like a minimal API server for the parts the applier relies on:
//! objects are keyed by kind/namespace/name, every write bumps a
//! monotonically increasing resource version, and updates carrying a stale
//! version are rejected. Deployments can be given a simulated rollout so
//! readiness waits complete after a fixed number of reads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tackle_common::{Error, Result};
use tracing::trace;

use crate::object::{ManifestObject, ObjectKey};
use crate::store::ObjectStore;

type ResourceId = (String, String, String);

/// One call observed by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `get` of a key
    Get(ObjectKey),
    /// `create` of a key
    Create(ObjectKey),
    /// `update` of a key with the resource version it carried
    Update {
        /// Object key
        key: ObjectKey,
        /// Resource version on the written object
        resource_version: Option<String>,
    },
    /// `delete` of a key
    Delete(ObjectKey),
}

impl StoreCall {
    /// Key the call targeted
    pub fn key(&self) -> &ObjectKey {
        match self {
            StoreCall::Get(key) | StoreCall::Create(key) | StoreCall::Delete(key) => key,
            StoreCall::Update { key, .. } => key,
        }
    }

    /// Whether the call wrote to the store
    pub fn is_write(&self) -> bool {
        !matches!(self, StoreCall::Get(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Rollout {
    after_gets: usize,
    seen: usize,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ResourceId, ManifestObject>,
    journal: Vec<StoreCall>,
    rollouts: HashMap<(String, String), Rollout>,
    next_version: u64,
}

impl Inner {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    /// Count a read of a Deployment with a pending rollout, completing it
    /// once enough reads have happened
    fn observe_rollout(&mut self, id: &ResourceId) {
        if id.0 != "Deployment" {
            return;
        }
        let rollout_key = (id.1.clone(), id.2.clone());
        let done = match self.rollouts.get_mut(&rollout_key) {
            Some(rollout) => {
                rollout.seen += 1;
                rollout.seen >= rollout.after_gets
            }
            None => return,
        };
        trace!(namespace = %id.1, name = %id.2, done, "rollout observed");
        if done {
            self.rollouts.remove(&rollout_key);
            if let Some(object) = self.objects.get_mut(id) {
                mark_available(object);
            }
        }
    }
}

fn resource_id(key: &ObjectKey) -> ResourceId {
    let (kind, namespace, name) = key.resource_id();
    (kind.to_string(), namespace.to_string(), name.to_string())
}

/// Declared replicas of a Deployment body (1 when unset)
fn declared_replicas(body: &Value) -> i64 {
    body.pointer("/spec/replicas")
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

fn mark_available(object: &mut ManifestObject) {
    let replicas = declared_replicas(object.body());
    let mut body = object.body().clone();
    if let Some(map) = body.as_object_mut() {
        let status = map.entry("status").or_insert_with(|| json!({}));
        if let Some(status) = status.as_object_mut() {
            status.insert("replicas".to_string(), json!(replicas));
            status.insert("readyReplicas".to_string(), json!(replicas));
            status.insert("availableReplicas".to_string(), json!(replicas));
        }
    }
    *object = ManifestObject::new(object.key().clone(), body);
}

/// CRDs are served as soon as they are stored
fn mark_established(object: &mut ManifestObject) {
    let mut body = object.body().clone();
    if let Some(map) = body.as_object_mut() {
        map.insert(
            "status".to_string(),
            json!({ "conditions": [{ "type": "Established", "status": "True" }] }),
        );
    }
    *object = ManifestObject::new(object.key().clone(), body);
}

/// Thread-safe in-memory [`ObjectStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::internal_with_context("memory_store", "store lock poisoned"))
    }

    /// Seed an object without recording a call; returns its resource version
    pub fn insert(&self, object: ManifestObject) -> Result<String> {
        let mut inner = self.lock()?;
        let version = inner.bump_version();
        let mut object = object.with_resource_version(&version);
        if object.is_crd() {
            mark_established(&mut object);
        }
        inner.objects.insert(resource_id(object.key()), object);
        Ok(version)
    }

    /// Make a Deployment report `availableReplicas == spec.replicas` once it
    /// has been read `after_gets` times (reads of a missing object don't count)
    pub fn simulate_rollout(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        after_gets: usize,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        inner.rollouts.insert(
            (namespace.into(), name.into()),
            Rollout {
                after_gets: after_gets.max(1),
                seen: 0,
            },
        );
        Ok(())
    }

    /// Snapshot of stored objects, ordered by kind/namespace/name
    pub fn objects(&self) -> Result<Vec<ManifestObject>> {
        Ok(self.lock()?.objects.values().cloned().collect())
    }

    /// Number of stored objects
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.objects.len())
    }

    /// Whether the store holds no objects
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.objects.is_empty())
    }

    /// Stored copy of an object, without recording a call
    pub fn peek(&self, key: &ObjectKey) -> Result<Option<ManifestObject>> {
        Ok(self.lock()?.objects.get(&resource_id(key)).cloned())
    }

    /// Every call made through the [`ObjectStore`] interface, in order
    pub fn journal(&self) -> Result<Vec<StoreCall>> {
        Ok(self.lock()?.journal.clone())
    }

    /// Forget recorded calls
    pub fn clear_journal(&self) -> Result<()> {
        self.lock()?.journal.clear();
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManifestObject>> {
        let mut inner = self.lock()?;
        inner.journal.push(StoreCall::Get(key.clone()));

        let id = resource_id(key);
        if !inner.objects.contains_key(&id) {
            return Ok(None);
        }
        inner.observe_rollout(&id);
        Ok(inner.objects.get(&id).cloned())
    }

    async fn create(&self, object: &ManifestObject) -> Result<()> {
        let mut inner = self.lock()?;
        inner.journal.push(StoreCall::Create(object.key().clone()));

        let id = resource_id(object.key());
        if inner.objects.contains_key(&id) {
            return Err(Error::store_conflict(
                "create",
                object.to_string(),
                "already exists",
            ));
        }

        let version = inner.bump_version();
        let mut stored = object.with_resource_version(&version);
        if stored.is_crd() {
            mark_established(&mut stored);
        }
        inner.objects.insert(id, stored);
        Ok(())
    }

    async fn update(&self, object: &ManifestObject) -> Result<()> {
        let mut inner = self.lock()?;
        inner.journal.push(StoreCall::Update {
            key: object.key().clone(),
            resource_version: object.resource_version().map(str::to_string),
        });

        let id = resource_id(object.key());
        let existing = inner
            .objects
            .get(&id)
            .ok_or_else(|| Error::store("update", object.to_string(), "not found"))?;

        match (existing.resource_version(), object.resource_version()) {
            (Some(current), Some(offered)) if current == offered => {}
            (current, offered) => {
                return Err(Error::store_conflict(
                    "update",
                    object.to_string(),
                    format!(
                        "resource version {} does not match stored {}",
                        offered.unwrap_or("<none>"),
                        current.unwrap_or("<none>")
                    ),
                ))
            }
        }

        // Status is owned by the store, not by the writer
        let previous_status = existing.body().get("status").cloned();
        let version = inner.bump_version();
        let mut stored = object.with_resource_version(&version);
        if stored.body().get("status").is_none() {
            if let Some(status) = previous_status {
                let mut body = stored.body().clone();
                if let Some(map) = body.as_object_mut() {
                    map.insert("status".to_string(), status);
                }
                stored = ManifestObject::new(stored.key().clone(), body);
            }
        }
        inner.objects.insert(id, stored);
        Ok(())
    }

    async fn delete(&self, object: &ManifestObject) -> Result<()> {
        let mut inner = self.lock()?;
        inner.journal.push(StoreCall::Delete(object.key().clone()));

        match inner.objects.remove(&resource_id(object.key())) {
            Some(_) => Ok(()),
            None => Err(Error::store("delete", object.to_string(), "not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(replicas: i64) -> ManifestObject {
        ManifestObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "namespace": "apps" },
            "spec": { "replicas": replicas }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_versions() {
        let store = MemoryStore::new();
        store.create(&deployment(1)).await.unwrap();
        let first = store.peek(deployment(1).key()).unwrap().unwrap();
        assert_eq!(first.resource_version(), Some("1"));

        let update = deployment(2).with_resource_version("1");
        store.update(&update).await.unwrap();
        let second = store.peek(deployment(1).key()).unwrap().unwrap();
        assert_eq!(second.resource_version(), Some("2"));
        assert_eq!(second.body()["spec"]["replicas"], 2);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_a_conflict() {
        let store = MemoryStore::new();
        store.create(&deployment(1)).await.unwrap();
        let err = store.create(&deployment(1)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let store = MemoryStore::new();
        store.insert(deployment(1)).unwrap();
        store
            .update(&deployment(3).with_resource_version("1"))
            .await
            .unwrap();

        let err = store
            .update(&deployment(4).with_resource_version("1"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.object(), Some("Deployment apps/web"));

        let err = store.update(&deployment(4)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_of_missing_object_fails() {
        let store = MemoryStore::new();
        let err = store
            .update(&deployment(1).with_resource_version("1"))
            .await
            .unwrap_err();
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_get_of_missing_object_is_none_and_journaled() {
        let store = MemoryStore::new();
        assert!(store.get(deployment(1).key()).await.unwrap().is_none());
        assert_eq!(
            store.journal().unwrap(),
            vec![StoreCall::Get(deployment(1).key().clone())]
        );
    }

    #[tokio::test]
    async fn test_rollout_completes_after_configured_reads() {
        let store = MemoryStore::new();
        store.simulate_rollout("apps", "web", 2).unwrap();
        store.insert(deployment(3)).unwrap();
        let key = deployment(3).key().clone();

        let first = store.get(&key).await.unwrap().unwrap();
        assert!(first.body().pointer("/status/availableReplicas").is_none());

        let second = store.get(&key).await.unwrap().unwrap();
        assert_eq!(second.body()["status"]["availableReplicas"], 3);
    }

    #[tokio::test]
    async fn test_update_keeps_store_owned_status() {
        let store = MemoryStore::new();
        store.simulate_rollout("apps", "web", 1).unwrap();
        store.insert(deployment(1)).unwrap();
        let live = store.get(deployment(1).key()).await.unwrap().unwrap();
        let token = live.resource_version().unwrap().to_string();

        store
            .update(&deployment(1).with_resource_version(&token))
            .await
            .unwrap();
        let stored = store.peek(deployment(1).key()).unwrap().unwrap();
        assert_eq!(stored.body()["status"]["availableReplicas"], 1);
    }

    #[tokio::test]
    async fn test_crds_are_established_on_create() {
        let store = MemoryStore::new();
        let crd = ManifestObject::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": "widgets.example.dev" }
        }))
        .unwrap();
        store.create(&crd).await.unwrap();
        let stored = store.peek(crd.key()).unwrap().unwrap();
        assert_eq!(stored.body()["status"]["conditions"][0]["type"], "Established");
    }

    #[tokio::test]
    async fn test_delete_removes_and_missing_delete_fails() {
        let store = MemoryStore::new();
        store.insert(deployment(1)).unwrap();
        store.delete(&deployment(1)).await.unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.delete(&deployment(1)).await.is_err());
    }
}
