//! Admission webhook
//!
//! Runs the operator image in webhook mode. Its serving certificate is issued
//! by cert-manager, so cert-manager has to be installed first.

use tackle_apply::{DeploymentRef, TemplateValues};

use crate::component::{ComponentSpec, ExistenceProbe};

/// Component name
pub const NAME: &str = "admission-webhook";

const MANIFEST: &str = include_str!("manifests/admission-webhook/webhook.yaml");

const DEPLOYMENT: &str = "tackle-webhook";

/// Admission webhook component description
pub fn spec(values: &TemplateValues) -> ComponentSpec {
    let webhook = DeploymentRef::new(&values.namespace, DEPLOYMENT);
    ComponentSpec::new(NAME, ExistenceProbe::Deployment(webhook.clone()))
        .manifest(MANIFEST)
        .wait_for(webhook)
}
