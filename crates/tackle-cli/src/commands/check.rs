//! Check command - report which add-ons are present

use clap::Args;
use tackle_components::Component;

use super::{connect, resolve};
use crate::config::GlobalArgs;
use crate::Result;

/// Report whether components are installed
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Components to check (all when omitted)
    pub components: Vec<String>,
}

pub async fn run(args: CheckArgs, global: &GlobalArgs) -> Result<()> {
    let conn = connect(global).await?;
    let components = resolve(
        &args.components,
        conn.store,
        global.settings(),
        global.template_values(),
    )?;

    let components: Vec<&dyn Component> = components.iter().map(|c| c as &dyn Component).collect();
    for (name, present) in check_all(&components).await? {
        println!("{:<20} {}", name, if present { "present" } else { "absent" });
    }
    Ok(())
}

/// Existence of each component, in order
pub async fn check_all(components: &[&dyn Component]) -> Result<Vec<(String, bool)>> {
    let mut results = Vec::with_capacity(components.len());
    for component in components {
        let present = component.check_exists().await?;
        results.push((component.name().to_string(), present));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tackle_apply::{MemoryStore, TemplateValues};
    use tackle_components::{catalog, ComponentSettings};

    fn settings() -> ComponentSettings {
        ComponentSettings {
            poll_interval: Duration::from_millis(1),
            ..ComponentSettings::default()
        }
    }

    #[tokio::test]
    async fn test_empty_cluster_reports_everything_absent() {
        let store = Arc::new(MemoryStore::new());
        let components = catalog::components(store, settings(), TemplateValues::default());
        let refs: Vec<&dyn Component> = components.iter().map(|c| c as &dyn Component).collect();

        let results = check_all(&refs).await.unwrap();
        assert_eq!(results.len(), catalog::COMPONENT_NAMES.len());
        assert!(results.iter().all(|(_, present)| !present));
    }

    #[tokio::test]
    async fn test_installed_component_reports_present() {
        let store = Arc::new(MemoryStore::new());
        store
            .simulate_rollout("tackle-system", "helm-controller", 1)
            .unwrap();
        let components = catalog::components(store, settings(), TemplateValues::default());
        let helm = components
            .iter()
            .find(|c| c.name() == "helm-controller")
            .unwrap();
        helm.install().await.unwrap();

        let refs: Vec<&dyn Component> = components.iter().map(|c| c as &dyn Component).collect();
        let results = check_all(&refs).await.unwrap();
        for (name, present) in results {
            assert_eq!(present, name == "helm-controller", "{}", name);
        }
    }
}
