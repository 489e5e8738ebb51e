//! Readiness Waiter
//!
//! Polls the store until a Deployment's available replicas match its declared
//! replicas, or until a CRD reports `Established`. A missing object counts as
//! "not ready yet"; any other store error ends the wait immediately.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use k8s_openapi::api::apps::v1::DeploymentStatus;
use serde_json::Value;
use tackle_common::{Error, Result, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use tracing::{debug, trace};

use crate::object::{ManifestObject, ObjectKey, CRD_KIND};
use crate::store::ObjectStore;

const CRD_API_VERSION: &str = "apiextensions.k8s.io/v1";
const CONDITION_ESTABLISHED: &str = "Established";

/// A Deployment that must become ready
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentRef {
    /// Namespace of the Deployment
    pub namespace: String,
    /// Name of the Deployment
    pub name: String,
}

impl DeploymentRef {
    /// Reference a Deployment by namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Store key of the Deployment
    pub fn key(&self) -> ObjectKey {
        ObjectKey::deployment(&self.namespace, &self.name)
    }
}

impl fmt::Display for DeploymentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deployment {}/{}", self.namespace, self.name)
    }
}

/// Replica counts of a stored Deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentView {
    /// `spec.replicas`, 1 when unset
    pub desired: i32,
    /// `status.availableReplicas`, 0 when unset
    pub available: i32,
}

impl DeploymentView {
    /// Decode the replica counts from a stored object
    pub fn from_object(object: &ManifestObject) -> std::result::Result<Self, String> {
        let desired = match object.body().pointer("/spec/replicas") {
            None | Some(Value::Null) => 1,
            Some(value) => value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| format!("spec.replicas is not an integer: {}", value))?,
        };

        let status: DeploymentStatus = match object.body().get("status") {
            None | Some(Value::Null) => DeploymentStatus::default(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| format!("invalid Deployment status: {}", e))?,
        };

        Ok(Self {
            desired,
            available: status.available_replicas.unwrap_or(0),
        })
    }

    /// Available replicas match the declared count
    pub fn is_ready(&self) -> bool {
        self.available == self.desired
    }
}

/// Whether a stored CRD reports `Established=True`
pub fn crd_established(object: &ManifestObject) -> bool {
    object
        .body()
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(CONDITION_ESTABLISHED)
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        })
        .unwrap_or(false)
}

/// Polls the store until a readiness predicate holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT)
    }
}

impl ReadinessWaiter {
    /// Waiter polling every `poll_interval` for at most `timeout`
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Wait until `availableReplicas == spec.replicas`
    pub async fn wait_for_deployment(
        &self,
        store: &dyn ObjectStore,
        target: &DeploymentRef,
    ) -> Result<()> {
        let key = &target.key();
        let target_name = &target.to_string();

        self.poll_until(target_name, move || async move {
            let Some(object) = store.get(key).await? else {
                trace!(namespace = %target.namespace, name = %target.name, "deployment not found yet");
                return Ok(false);
            };
            let view = DeploymentView::from_object(&object)
                .map_err(|msg| Error::store("get", target_name.clone(), msg))?;
            trace!(
                namespace = %target.namespace,
                name = %target.name,
                desired = view.desired,
                available = view.available,
                "deployment status"
            );
            Ok(view.is_ready())
        })
        .await?;

        debug!(namespace = %target.namespace, name = %target.name, "deployment ready");
        Ok(())
    }

    /// Wait until a CRD reports `Established=True`
    pub async fn wait_for_crd_established(&self, store: &dyn ObjectStore, name: &str) -> Result<()> {
        let key = &ObjectKey::new(CRD_API_VERSION, CRD_KIND, "", name);

        self.poll_until(&key.to_string(), move || async move {
            match store.get(key).await? {
                Some(object) => Ok(crd_established(&object)),
                None => Ok(false),
            }
        })
        .await?;

        debug!(crd = %name, "CRD established");
        Ok(())
    }

    /// Run `check` every poll interval until it returns `true`.
    ///
    /// Errors from `check` end the wait. Dropping the returned future cancels it.
    async fn poll_until<F, Fut>(&self, target: &str, mut check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let poll = async {
            loop {
                if check().await? {
                    return Ok::<(), Error>(());
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(target, self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::MockObjectStore;
    use serde_json::json;
    use std::time::Instant;

    fn deployment(replicas: Option<i64>, available: Option<i64>) -> ManifestObject {
        let mut body = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "controller", "namespace": "flux-system" },
            "spec": {}
        });
        if let Some(r) = replicas {
            body["spec"]["replicas"] = json!(r);
        }
        if let Some(a) = available {
            body["status"] = json!({ "availableReplicas": a });
        }
        ManifestObject::from_value(body).unwrap()
    }

    fn target() -> DeploymentRef {
        DeploymentRef::new("flux-system", "controller")
    }

    #[test]
    fn test_view_defaults_replicas_to_one_and_available_to_zero() {
        let view = DeploymentView::from_object(&deployment(None, None)).unwrap();
        assert_eq!(view, DeploymentView { desired: 1, available: 0 });
        assert!(!view.is_ready());
    }

    #[test]
    fn test_zero_replicas_is_vacuously_ready() {
        let view = DeploymentView::from_object(&deployment(Some(0), None)).unwrap();
        assert!(view.is_ready());
    }

    #[test]
    fn test_crd_established_condition() {
        let mut body = json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": "widgets.example.dev" },
            "status": { "conditions": [
                { "type": "NamesAccepted", "status": "True" },
                { "type": "Established", "status": "False" }
            ]}
        });
        let pending = ManifestObject::from_value(body.clone()).unwrap();
        assert!(!crd_established(&pending));

        body["status"]["conditions"][1]["status"] = json!("True");
        let ready = ManifestObject::from_value(body).unwrap();
        assert!(crd_established(&ready));
    }

    #[tokio::test]
    async fn test_returns_once_available_matches_desired() {
        let store = MemoryStore::new();
        store.simulate_rollout("flux-system", "controller", 2).unwrap();
        store.insert(deployment(Some(2), None)).unwrap();

        let waiter = ReadinessWaiter::new(Duration::from_millis(5), Duration::from_secs(5));
        waiter.wait_for_deployment(&store, &target()).await.unwrap();

        let gets = store.journal().unwrap().len();
        assert_eq!(gets, 2);
    }

    #[tokio::test]
    async fn test_missing_deployment_keeps_polling() {
        let mut store = MockObjectStore::new();
        let mut calls = 0;
        store.expect_get().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Ok(None)
            } else {
                Ok(Some(deployment(Some(1), Some(1))))
            }
        });

        let waiter = ReadinessWaiter::new(Duration::from_millis(1), Duration::from_secs(5));
        waiter.wait_for_deployment(&store, &target()).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_error_fails_immediately() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|key| Err(Error::store("get", key.to_string(), "forbidden")));

        let waiter = ReadinessWaiter::new(Duration::from_millis(1), Duration::from_secs(5));
        let err = waiter
            .wait_for_deployment(&store, &target())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("forbidden"));
    }

    #[tokio::test]
    async fn test_times_out_when_never_ready() {
        let store = MemoryStore::new();
        store.insert(deployment(Some(1), Some(0))).unwrap();

        let waiter = ReadinessWaiter::new(Duration::from_millis(10), Duration::from_millis(50));
        let started = Instant::now();
        let err = waiter
            .wait_for_deployment(&store, &target())
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        match err {
            Error::Timeout { target, waited } => {
                assert_eq!(target, "Deployment flux-system/controller");
                assert_eq!(waited, Duration::from_millis(50));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert!(elapsed >= Duration::from_millis(50), "returned too early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200), "returned too late: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_waits_for_crd_established() {
        let store = MemoryStore::new();
        store
            .insert(
                ManifestObject::from_value(json!({
                    "apiVersion": "apiextensions.k8s.io/v1",
                    "kind": "CustomResourceDefinition",
                    "metadata": { "name": "widgets.example.dev" }
                }))
                .unwrap(),
            )
            .unwrap();

        let waiter = ReadinessWaiter::new(Duration::from_millis(1), Duration::from_secs(1));
        waiter
            .wait_for_crd_established(&store, "widgets.example.dev")
            .await
            .unwrap();
    }
}
