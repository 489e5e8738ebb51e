//! Uninstall command - delete add-on manifests
//!
//! Usage: tackle uninstall <component>...
//!
//! Objects already gone are skipped, so uninstalling twice is safe.

use clap::Args;
use tackle_components::Component;

use super::{connect, resolve};
use crate::config::GlobalArgs;
use crate::Result;

/// Uninstall one or more components
#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Components to uninstall, in order
    #[arg(required = true)]
    pub components: Vec<String>,
}

pub async fn run(args: UninstallArgs, global: &GlobalArgs) -> Result<()> {
    let conn = connect(global).await?;
    let components = resolve(
        &args.components,
        conn.store,
        global.settings(),
        global.template_values(),
    )?;

    for component in &components {
        component.uninstall().await?;
        println!("{} uninstalled", component.name());
    }
    Ok(())
}
