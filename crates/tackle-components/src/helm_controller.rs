//! Flux helm-controller
//!
//! Reconciles HelmRelease objects. Runs in the operator namespace and watches
//! all namespaces.

use tackle_apply::{DeploymentRef, TemplateValues};

use crate::component::{ComponentSpec, ExistenceProbe};

/// Component name
pub const NAME: &str = "helm-controller";

const CRDS: &str = include_str!("manifests/helm-controller/crds.yaml");
const MANIFEST: &str = include_str!("manifests/helm-controller/helm-controller.yaml");

const DEPLOYMENT: &str = "helm-controller";

/// helm-controller component description
pub fn spec(values: &TemplateValues) -> ComponentSpec {
    let controller = DeploymentRef::new(&values.namespace, DEPLOYMENT);
    ComponentSpec::new(NAME, ExistenceProbe::Deployment(controller.clone()))
        .manifest(CRDS)
        .manifest(MANIFEST)
        .wait_for(controller)
}
