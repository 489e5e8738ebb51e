//! Flux GitOps controllers
//!
//! Source and kustomize controllers in `flux-system`. The manifest carries its
//! own Namespace, so it does not depend on the operator namespace.

use tackle_apply::{DeploymentRef, TemplateValues};

use crate::component::{ComponentSpec, ExistenceProbe};

/// Component name
pub const NAME: &str = "flux";

/// Namespace the Flux controllers run in
pub const FLUX_NAMESPACE: &str = "flux-system";

const CRDS: &str = include_str!("manifests/flux/crds.yaml");
const MANIFEST: &str = include_str!("manifests/flux/flux.yaml");

const SOURCE_CONTROLLER: &str = "source-controller";
const KUSTOMIZE_CONTROLLER: &str = "kustomize-controller";

/// Flux component description
pub fn spec(_values: &TemplateValues) -> ComponentSpec {
    ComponentSpec::new(
        NAME,
        ExistenceProbe::Deployment(DeploymentRef::new(FLUX_NAMESPACE, SOURCE_CONTROLLER)),
    )
    .manifest(CRDS)
    .manifest(MANIFEST)
    .wait_for(DeploymentRef::new(FLUX_NAMESPACE, SOURCE_CONTROLLER))
    .wait_for(DeploymentRef::new(FLUX_NAMESPACE, KUSTOMIZE_CONTROLLER))
}
