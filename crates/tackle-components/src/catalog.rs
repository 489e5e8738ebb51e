//! The bundled add-ons

use std::sync::Arc;

use tackle_apply::{ObjectStore, TemplateValues};

use crate::component::{ComponentSettings, ComponentSpec, ManifestComponent};
use crate::{cert_manager, flux, helm_controller, webhook};

/// Names of the bundled components, in install order
pub const COMPONENT_NAMES: &[&str] = &[
    cert_manager::NAME,
    flux::NAME,
    helm_controller::NAME,
    webhook::NAME,
];

/// Specs of all bundled components, in install order
pub fn specs(values: &TemplateValues) -> Vec<ComponentSpec> {
    vec![
        cert_manager::spec(values),
        flux::spec(values),
        helm_controller::spec(values),
        webhook::spec(values),
    ]
}

/// All bundled components bound to a store
pub fn components(
    store: Arc<dyn ObjectStore>,
    settings: ComponentSettings,
    values: TemplateValues,
) -> Vec<ManifestComponent> {
    specs(&values)
        .into_iter()
        .map(|spec| ManifestComponent::new(spec, store.clone(), settings, values.clone()))
        .collect()
}

/// One bundled component by name
pub fn find(
    name: &str,
    store: Arc<dyn ObjectStore>,
    settings: ComponentSettings,
    values: TemplateValues,
) -> Option<ManifestComponent> {
    let spec = specs(&values).into_iter().find(|spec| spec.name == name)?;
    Some(ManifestComponent::new(spec, store, settings, values))
}
