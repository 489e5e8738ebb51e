//! Install command - apply add-ons and wait for their workloads
//!
//! Usage: tackle install <component>...
//!
//! Components run one after another in the order given. The managed
//! namespace is created first if it doesn't exist.

use clap::Args;
use tackle_common::{kube_utils, FIELD_MANAGER};
use tackle_components::Component;
use tracing::info;

use super::{connect, resolve};
use crate::config::GlobalArgs;
use crate::Result;

/// Install one or more components
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Components to install, in order
    #[arg(required = true)]
    pub components: Vec<String>,

    /// Leave components alone when an installation is already present
    #[arg(long)]
    pub skip_existing: bool,
}

pub async fn run(args: InstallArgs, global: &GlobalArgs) -> Result<()> {
    let conn = connect(global).await?;
    let components = resolve(
        &args.components,
        conn.store.clone(),
        global.settings(),
        global.template_values(),
    )?;

    kube_utils::ensure_namespace(&conn.client, &global.namespace, FIELD_MANAGER).await?;

    let components: Vec<&dyn Component> = components.iter().map(|c| c as &dyn Component).collect();
    let installed = install_all(&components, args.skip_existing).await?;
    for name in installed {
        println!("{} installed", name);
    }
    Ok(())
}

/// Install components in order, stopping at the first failure.
///
/// Returns the names of the components that were installed.
pub async fn install_all(components: &[&dyn Component], skip_existing: bool) -> Result<Vec<String>> {
    let mut installed = Vec::new();

    for component in components {
        if skip_existing && component.check_exists().await? {
            info!(component = %component.name(), "already present, skipping");
            continue;
        }
        component.install().await?;
        installed.push(component.name().to_string());
    }

    Ok(installed)
}
