//! Render command - print a component's manifests without touching a cluster
//!
//! Usage: tackle render <component> [--plan]
//!
//! With `--plan`, the manifests are applied to an in-memory store and the
//! resulting create order is printed instead.

use std::sync::Arc;

use clap::Args;
use tackle_apply::{Applier, MemoryStore, StoreCall};
use tackle_components::ManifestComponent;

use super::resolve;
use crate::config::GlobalArgs;
use crate::Result;

/// Render a component's manifests
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Component to render
    pub component: String,

    /// Print the apply order instead of the manifests
    #[arg(long)]
    pub plan: bool,
}

pub async fn run(args: RenderArgs, global: &GlobalArgs) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut components = resolve(
        std::slice::from_ref(&args.component),
        store,
        global.settings(),
        global.template_values(),
    )?;
    // resolve() yields exactly one component per requested name
    let Some(component) = components.pop() else {
        return Ok(());
    };

    if args.plan {
        for line in plan(&component).await? {
            println!("{}", line);
        }
    } else {
        let rendered = component.rendered()?;
        println!("{}", rendered.join("\n---\n"));
    }
    Ok(())
}

/// Objects in the order an install would create them on an empty cluster
pub async fn plan(component: &ManifestComponent) -> Result<Vec<String>> {
    let store = MemoryStore::new();
    let applier = Applier::new(&store);

    for document in component.documents()? {
        applier.apply(&document).await?;
    }

    Ok(store
        .journal()?
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Create(key) => Some(key.to_string()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tackle_apply::TemplateValues;
    use tackle_components::{catalog, ComponentSettings};

    fn component(name: &str) -> ManifestComponent {
        catalog::find(
            name,
            Arc::new(MemoryStore::new()),
            ComponentSettings::default(),
            TemplateValues::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plan_creates_crds_before_workloads() {
        let planned = plan(&component("helm-controller")).await.unwrap();
        assert!(!planned.is_empty());
        assert!(planned[0].starts_with("CustomResourceDefinition "));

        let first_crd_free = planned
            .iter()
            .position(|line| !line.starts_with("CustomResourceDefinition "))
            .unwrap();
        assert!(planned[first_crd_free..]
            .iter()
            .all(|line| !line.starts_with("CustomResourceDefinition ")));
        assert!(planned
            .iter()
            .any(|line| line == "Deployment tackle-system/helm-controller"));
    }

    #[tokio::test]
    async fn test_plan_does_not_touch_the_component_store() {
        let store = Arc::new(MemoryStore::new());
        let webhook = catalog::find(
            "admission-webhook",
            store.clone(),
            ComponentSettings::default(),
            TemplateValues::default(),
        )
        .unwrap();

        plan(&webhook).await.unwrap();
        assert!(store.is_empty().unwrap());
    }
}
