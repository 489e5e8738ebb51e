//! Generic structured objects decoded from manifests
//!
//! A [`ManifestObject`] carries its identity (group, version, kind, namespace,
//! name) next to the full document body. Typed views such as a Deployment's
//! replica counts are decoded from the body on demand.

use std::fmt;

use serde_json::Value;
use tackle_common::kube_utils::format_api_version;

/// Kind name of CustomResourceDefinitions
pub const CRD_KIND: &str = "CustomResourceDefinition";

/// Kind name of Namespaces
pub const NAMESPACE_KIND: &str = "Namespace";

/// Store lookup key: `(group, version, kind, namespace, name)`
///
/// `namespace` is empty for cluster-scoped kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// API group ("" for the core group)
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Resource kind
    pub kind: String,
    /// Namespace, empty for cluster-scoped objects
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Build a key from an apiVersion string
    pub fn new(
        api_version: &str,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let (group, version) = tackle_common::kube_utils::parse_api_version(api_version);
        Self {
            group,
            version,
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an `apps/v1` Deployment
    pub fn deployment(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new("apps/v1", "Deployment", namespace, name)
    }

    /// apiVersion string for this key
    pub fn api_version(&self) -> String {
        format_api_version(&self.group, &self.version)
    }

    /// Identity used when deciding whether two objects are the same resource.
    ///
    /// Group and version are deliberately left out: the same Deployment
    /// served at two versions is still one resource.
    pub fn resource_id(&self) -> (&str, &str, &str) {
        (&self.kind, &self.namespace, &self.name)
    }

    /// Whether the object is namespaced
    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.kind, self.name)
        } else {
            write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Apply ordering class for a kind (lower applies first)
///
/// CRDs go first so instances of the types they introduce can be created,
/// then namespaces, then everything else in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApplyTier {
    /// CustomResourceDefinitions
    Definitions = 0,
    /// Namespaces
    Namespaces = 1,
    /// All other resources
    Resources = 2,
}

impl ApplyTier {
    /// Tier for a kind
    pub fn for_kind(kind: &str) -> Self {
        match kind {
            CRD_KIND => ApplyTier::Definitions,
            NAMESPACE_KIND => ApplyTier::Namespaces,
            _ => ApplyTier::Resources,
        }
    }
}

/// One cluster resource decoded from a manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    key: ObjectKey,
    body: Value,
}

impl ManifestObject {
    /// Wrap a body whose identity has already been validated
    pub fn new(key: ObjectKey, body: Value) -> Self {
        Self { key, body }
    }

    /// Build an object from a JSON/YAML body, reading identity from its fields
    ///
    /// Returns a description of the first missing field on failure.
    pub fn from_value(body: Value) -> Result<Self, String> {
        let api_version = body
            .get("apiVersion")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing apiVersion".to_string())?;
        let kind = body
            .get("kind")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing kind".to_string())?;
        let name = body
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("{} missing metadata.name", kind))?;
        let namespace = body
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let key = ObjectKey::new(api_version, kind, namespace, name);
        Ok(Self { key, body })
    }

    /// Store lookup key
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// API group
    pub fn group(&self) -> &str {
        &self.key.group
    }

    /// API version within the group
    pub fn version(&self) -> &str {
        &self.key.version
    }

    /// Resource kind
    pub fn kind(&self) -> &str {
        &self.key.kind
    }

    /// Namespace, empty for cluster-scoped objects
    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Full document body
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Consume the object, returning its body
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Whether this object is a CustomResourceDefinition
    pub fn is_crd(&self) -> bool {
        self.key.kind == CRD_KIND
    }

    /// Apply ordering class
    pub fn tier(&self) -> ApplyTier {
        ApplyTier::for_kind(&self.key.kind)
    }

    /// Concurrency token recorded by the store, if any
    pub fn resource_version(&self) -> Option<&str> {
        self.body
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
    }

    /// Copy with `metadata.resourceVersion` set to the given token
    pub fn with_resource_version(&self, resource_version: &str) -> Self {
        let mut copy = self.clone();
        copy.set_resource_version(resource_version);
        copy
    }

    /// Set `metadata.resourceVersion` in place
    pub fn set_resource_version(&mut self, resource_version: &str) {
        if !self.body.is_object() {
            self.body = Value::Object(Default::default());
        }
        let metadata = self
            .body
            .as_object_mut()
            .map(|obj| {
                obj.entry("metadata")
                    .or_insert_with(|| Value::Object(Default::default()))
            });
        if let Some(Value::Object(meta)) = metadata {
            meta.insert(
                "resourceVersion".to_string(),
                Value::String(resource_version.to_string()),
            );
        }
    }
}

impl fmt::Display for ManifestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> ManifestObject {
        ManifestObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "source-controller", "namespace": "flux-system" },
            "spec": { "replicas": 1 }
        }))
        .unwrap()
    }

    #[test]
    fn test_identity_is_read_from_body() {
        let obj = deployment();
        assert_eq!(obj.group(), "apps");
        assert_eq!(obj.version(), "v1");
        assert_eq!(obj.kind(), "Deployment");
        assert_eq!(obj.namespace(), "flux-system");
        assert_eq!(obj.name(), "source-controller");
        assert_eq!(obj.to_string(), "Deployment flux-system/source-controller");
    }

    #[test]
    fn test_cluster_scoped_objects_have_empty_namespace() {
        let obj = ManifestObject::from_value(json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRole",
            "metadata": { "name": "tackle-helm-controller" }
        }))
        .unwrap();
        assert_eq!(obj.namespace(), "");
        assert!(!obj.key().is_namespaced());
        assert_eq!(obj.to_string(), "ClusterRole tackle-helm-controller");
    }

    #[test]
    fn test_missing_identity_fields_are_reported() {
        let err = ManifestObject::from_value(json!({ "kind": "Service" })).unwrap_err();
        assert_eq!(err, "missing apiVersion");

        let err = ManifestObject::from_value(json!({ "apiVersion": "v1" })).unwrap_err();
        assert_eq!(err, "missing kind");

        let err = ManifestObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {}
        }))
        .unwrap_err();
        assert_eq!(err, "Service missing metadata.name");
    }

    #[test]
    fn test_resource_version_is_borrowed_onto_a_copy() {
        let obj = deployment();
        assert_eq!(obj.resource_version(), None);

        let versioned = obj.with_resource_version("42");
        assert_eq!(versioned.resource_version(), Some("42"));
        assert_eq!(obj.resource_version(), None);
        assert_eq!(versioned.body()["spec"]["replicas"], 1);
    }

    #[test]
    fn test_tiers_order_crds_then_namespaces_then_rest() {
        assert_eq!(ApplyTier::for_kind(CRD_KIND), ApplyTier::Definitions);
        assert_eq!(ApplyTier::for_kind(NAMESPACE_KIND), ApplyTier::Namespaces);
        assert_eq!(ApplyTier::for_kind("Deployment"), ApplyTier::Resources);
        assert!(ApplyTier::Definitions < ApplyTier::Namespaces);
        assert!(ApplyTier::Namespaces < ApplyTier::Resources);
    }

    #[test]
    fn test_deployment_key_helper() {
        let key = ObjectKey::deployment("cert-manager", "cert-manager");
        assert_eq!(key.api_version(), "apps/v1");
        assert_eq!(key.to_string(), "Deployment cert-manager/cert-manager");
    }
}
