//! CLI commands

use std::sync::Arc;

use tackle_apply::{KubeStore, ObjectStore, TemplateValues};
use tackle_common::kube_utils;
use tackle_components::catalog::{self, COMPONENT_NAMES};
use tackle_components::{ComponentSettings, ManifestComponent};

use crate::config::GlobalArgs;
use crate::{Error, Result};

pub mod check;
pub mod install;
pub mod list;
pub mod render;
pub mod uninstall;

/// Kube client plus the store built on it
pub(crate) struct Connection {
    pub client: kube::Client,
    pub store: Arc<KubeStore>,
}

/// Connect to the cluster named by the global flags
pub(crate) async fn connect(global: &GlobalArgs) -> Result<Connection> {
    let client = kube_utils::create_client(global.kubeconfig.as_deref()).await?;
    let store = Arc::new(KubeStore::new(client.clone()));
    Ok(Connection { client, store })
}

/// Resolve component names against the catalog, keeping the given order.
///
/// An empty list selects every bundled component.
pub(crate) fn resolve(
    names: &[String],
    store: Arc<dyn ObjectStore>,
    settings: ComponentSettings,
    values: TemplateValues,
) -> Result<Vec<ManifestComponent>> {
    if names.is_empty() {
        return Ok(catalog::components(store, settings, values));
    }

    names
        .iter()
        .map(|name| {
            catalog::find(name, store.clone(), settings, values.clone()).ok_or_else(|| {
                Error::UnknownComponent {
                    name: name.clone(),
                    available: COMPONENT_NAMES.join(", "),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tackle_apply::MemoryStore;
    use tackle_components::Component;

    #[test]
    fn test_resolve_keeps_requested_order() {
        let names = vec!["admission-webhook".to_string(), "cert-manager".to_string()];
        let resolved = resolve(
            &names,
            Arc::new(MemoryStore::new()),
            ComponentSettings::default(),
            TemplateValues::default(),
        )
        .unwrap();
        let got: Vec<&str> = resolved.iter().map(|c| c.name()).collect();
        assert_eq!(got, vec!["admission-webhook", "cert-manager"]);
    }

    #[test]
    fn test_resolve_empty_selects_everything() {
        let resolved = resolve(
            &[],
            Arc::new(MemoryStore::new()),
            ComponentSettings::default(),
            TemplateValues::default(),
        )
        .unwrap();
        assert_eq!(resolved.len(), COMPONENT_NAMES.len());
    }

    #[test]
    fn test_unknown_component_lists_alternatives() {
        let err = resolve(
            &["istio".to_string()],
            Arc::new(MemoryStore::new()),
            ComponentSettings::default(),
            TemplateValues::default(),
        )
        .err()
        .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("istio"));
        assert!(msg.contains("cert-manager"));
    }
}
