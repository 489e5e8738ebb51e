//! cert-manager
//!
//! Installed into the operator namespace. A cluster that already runs the
//! community install in the `cert-manager` namespace counts as present, so
//! callers checking existence first never install a second copy.

use tackle_apply::{DeploymentRef, TemplateValues};

use crate::component::{ComponentSpec, ExistenceProbe};

/// Component name
pub const NAME: &str = "cert-manager";

/// Namespace used by the community cert-manager install
pub const EXTERNAL_NAMESPACE: &str = "cert-manager";

const CRDS: &str = include_str!("manifests/cert-manager/crds.yaml");
const MANIFEST: &str = include_str!("manifests/cert-manager/cert-manager.yaml");

/// Controller deployment, also the existence probe target
const CONTROLLER: &str = "cert-manager";
const CAINJECTOR: &str = "cert-manager-cainjector";
const WEBHOOK: &str = "cert-manager-webhook";

/// cert-manager component description
pub fn spec(values: &TemplateValues) -> ComponentSpec {
    let namespace = values.namespace.as_str();
    let probe = ExistenceProbe::ExternalFirst {
        external: DeploymentRef::new(EXTERNAL_NAMESPACE, CONTROLLER),
        managed: DeploymentRef::new(namespace, CONTROLLER),
    };

    // The webhook only serves once the CA injector has patched its CA bundle
    ComponentSpec::new(NAME, probe)
        .manifest(CRDS)
        .manifest(MANIFEST)
        .wait_for(DeploymentRef::new(namespace, CAINJECTOR))
        .wait_for(DeploymentRef::new(namespace, CONTROLLER))
        .wait_for(DeploymentRef::new(namespace, WEBHOOK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_in_dependency_order() {
        let spec = spec(&TemplateValues::default());
        let names: Vec<&str> = spec.readiness.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![CAINJECTOR, CONTROLLER, WEBHOOK]);
        assert!(spec
            .readiness
            .iter()
            .all(|t| t.namespace == tackle_common::TACKLE_SYSTEM_NAMESPACE));
    }

    #[test]
    fn test_probe_checks_community_namespace_first() {
        let spec = spec(&TemplateValues::new("ops", "unused"));
        match spec.probe {
            ExistenceProbe::ExternalFirst { external, managed } => {
                assert_eq!(external, DeploymentRef::new("cert-manager", "cert-manager"));
                assert_eq!(managed, DeploymentRef::new("ops", "cert-manager"));
            }
            other => panic!("expected ExternalFirst, got {:?}", other),
        }
    }
}
