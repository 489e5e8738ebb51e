//! Kubernetes-backed object store
//!
//! Every object is handled as a `DynamicObject`; the REST path for its kind is
//! resolved through API discovery. Discovery is cached and re-run when a kind
//! is missing, so instances of a CRD applied earlier in the same run become
//! resolvable.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, GroupVersionKind, PostParams};
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;
use tackle_common::kube_utils::{is_conflict, is_not_found};
use tackle_common::retry::{retry_with_backoff, RetryConfig};
use tackle_common::{Error, Result, FIELD_MANAGER};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::object::{ManifestObject, ObjectKey};
use crate::store::ObjectStore;

/// [`ObjectStore`] over the Kubernetes API
pub struct KubeStore {
    client: Client,
    discovery: RwLock<Option<Discovery>>,
    retry: RetryConfig,
}

impl KubeStore {
    /// Wrap a client. Discovery runs lazily on first use.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            discovery: RwLock::new(None),
            // Discovery enumerates every API group; back off gently
            retry: RetryConfig {
                max_attempts: 5,
                initial_delay: Duration::from_secs(1),
                ..RetryConfig::default()
            },
        }
    }

    async fn run_discovery(&self) -> Result<Discovery> {
        let client = self.client.clone();
        retry_with_backoff(&self.retry, "api-discovery", || {
            let client = client.clone();
            async move {
                Discovery::new(client)
                    .run()
                    .await
                    .map_err(|e| Error::internal_with_context("api-discovery", e.to_string()))
            }
        })
        .await
    }

    /// Resolve a key's kind, refreshing discovery once on a miss
    async fn resolve(&self, key: &ObjectKey) -> Result<Option<(ApiResource, ApiCapabilities)>> {
        let gvk = GroupVersionKind::gvk(&key.group, &key.version, &key.kind);

        {
            let cached = self.discovery.read().await;
            if let Some(discovery) = cached.as_ref() {
                if let Some(found) = discovery.resolve_gvk(&gvk) {
                    return Ok(Some(found));
                }
            }
        }

        debug!(
            group = %key.group,
            version = %key.version,
            kind = %key.kind,
            "kind not in discovery cache, refreshing"
        );
        let fresh = self.run_discovery().await?;
        let found = fresh.resolve_gvk(&gvk);
        *self.discovery.write().await = Some(fresh);
        Ok(found)
    }

    fn api_for(
        &self,
        key: &ObjectKey,
        resource: &ApiResource,
        caps: &ApiCapabilities,
    ) -> Api<DynamicObject> {
        match caps.scope {
            Scope::Cluster => Api::all_with(self.client.clone(), resource),
            Scope::Namespaced if key.namespace.is_empty() => {
                Api::default_namespaced_with(self.client.clone(), resource)
            }
            Scope::Namespaced => {
                Api::namespaced_with(self.client.clone(), &key.namespace, resource)
            }
        }
    }

    /// Resolve a key for a write, where an unknown kind is an error
    async fn writable_api(&self, operation: &str, object: &ManifestObject) -> Result<Api<DynamicObject>> {
        match self.resolve(object.key()).await? {
            Some((resource, caps)) => Ok(self.api_for(object.key(), &resource, &caps)),
            None => Err(unknown_kind(operation, object)),
        }
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

fn to_dynamic(operation: &str, object: &ManifestObject) -> Result<DynamicObject> {
    serde_json::from_value(object.body().clone()).map_err(|e| {
        Error::store(
            operation,
            object.to_string(),
            format!("body is not a valid object: {}", e),
        )
    })
}

fn unknown_kind(operation: &str, object: &ManifestObject) -> Error {
    Error::store(
        operation,
        object.to_string(),
        format!(
            "unknown resource type {} {}",
            object.key().api_version(),
            object.kind()
        ),
    )
}

/// Map a delete failure, where a 404 means the object is already gone
fn delete_result(object: &ManifestObject, err: kube::Error) -> Result<()> {
    if is_not_found(&err) {
        debug!(object = %object, "object vanished before delete");
        Ok(())
    } else {
        Err(store_error("delete", &object.to_string(), err))
    }
}

fn store_error(operation: &str, object: &str, err: kube::Error) -> Error {
    if is_conflict(&err) {
        Error::store_conflict(operation, object, err.to_string())
    } else {
        Error::store(operation, object, err.to_string())
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManifestObject>> {
        let Some((resource, caps)) = self.resolve(key).await? else {
            // A kind the server doesn't serve has no instances
            trace!(object = %key, "kind not served, treating as absent");
            return Ok(None);
        };

        let api = self.api_for(key, &resource, &caps);
        let found = api
            .get_opt(&key.name)
            .await
            .map_err(|e| store_error("get", &key.to_string(), e))?;

        match found {
            Some(live) => {
                let body = serde_json::to_value(&live).map_err(|e| {
                    Error::store("get", key.to_string(), format!("failed to encode object: {}", e))
                })?;
                Ok(Some(ManifestObject::new(key.clone(), body)))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, object: &ManifestObject) -> Result<()> {
        let api = self.writable_api("create", object).await?;
        let body = to_dynamic("create", object)?;
        api.create(&post_params(), &body)
            .await
            .map_err(|e| store_error("create", &object.to_string(), e))?;
        Ok(())
    }

    async fn update(&self, object: &ManifestObject) -> Result<()> {
        let api = self.writable_api("update", object).await?;
        let body = to_dynamic("update", object)?;
        api.replace(object.name(), &post_params(), &body)
            .await
            .map_err(|e| store_error("update", &object.to_string(), e))?;
        Ok(())
    }

    async fn delete(&self, object: &ManifestObject) -> Result<()> {
        let Some((resource, caps)) = self.resolve(object.key()).await? else {
            trace!(object = %object, "kind not served, nothing to delete");
            return Ok(());
        };

        let api = self.api_for(object.key(), &resource, &caps);
        match api.delete(object.name(), &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) => delete_result(object, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} from apiserver", reason),
            reason: reason.to_string(),
            code,
        })
    }

    fn service() -> ManifestObject {
        ManifestObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": "webhook", "namespace": "tackle-system" },
            "spec": { "ports": [{ "port": 443 }] }
        }))
        .unwrap()
    }

    #[test]
    fn test_409_is_a_conflict() {
        let err = store_error("update", "Service tackle-system/webhook", api_error(409, "Conflict"));
        assert!(err.is_conflict());
        assert_eq!(err.object(), Some("Service tackle-system/webhook"));
    }

    #[test]
    fn test_other_api_errors_are_plain_store_errors() {
        for (code, reason) in [(403, "Forbidden"), (404, "NotFound"), (500, "InternalError")] {
            let err = store_error("create", "Service tackle-system/webhook", api_error(code, reason));
            assert!(matches!(err, Error::Store { conflict: false, .. }), "{}", code);
            assert!(err.to_string().contains(reason));
        }
    }

    #[test]
    fn test_delete_treats_404_as_done() {
        assert!(delete_result(&service(), api_error(404, "NotFound")).is_ok());
    }

    #[test]
    fn test_delete_surfaces_other_failures() {
        let err = delete_result(&service(), api_error(403, "Forbidden")).unwrap_err();
        assert!(!err.is_conflict());
        assert_eq!(err.object(), Some("Service tackle-system/webhook"));

        let err = delete_result(&service(), api_error(409, "Conflict")).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_unknown_kind_on_write_names_the_object() {
        let gadget = ManifestObject::from_value(json!({
            "apiVersion": "integration.tackle.dev/v1",
            "kind": "Gadget",
            "metadata": { "name": "g1", "namespace": "tackle-system" }
        }))
        .unwrap();

        let err = unknown_kind("create", &gadget);
        assert!(!err.is_conflict());
        assert_eq!(err.object(), Some("Gadget tackle-system/g1"));
        assert!(err.to_string().contains("integration.tackle.dev/v1"));
    }

    #[test]
    fn test_body_converts_to_dynamic_object() {
        let dynamic = to_dynamic("create", &service()).unwrap();
        assert_eq!(dynamic.metadata.name.as_deref(), Some("webhook"));
        assert_eq!(dynamic.metadata.namespace.as_deref(), Some("tackle-system"));
        assert_eq!(dynamic.data["spec"]["ports"][0]["port"], 443);
    }

    #[test]
    fn test_body_with_malformed_metadata_is_rejected() {
        let mut body = service().into_body();
        body["metadata"]["labels"] = json!("not-a-map");
        let broken = ManifestObject::new(service().key().clone(), body);

        let err = to_dynamic("update", &broken).unwrap_err();
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("not a valid object"));
    }
}
