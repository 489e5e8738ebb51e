//! List command - show the bundled components
//!
//! Needs no cluster access.

use tackle_apply::{ManifestDocument, ManifestRenderer, TemplateValues};
use tackle_components::{catalog, ComponentSpec};

use crate::config::GlobalArgs;
use crate::Result;

pub fn run(global: &GlobalArgs) -> Result<()> {
    let values = global.template_values();
    print!("{}", format_list(&catalog::specs(&values), &values)?);
    Ok(())
}

/// One block per component: object count and readiness targets
pub fn format_list(specs: &[ComponentSpec], values: &TemplateValues) -> Result<String> {
    let renderer = ManifestRenderer::new();
    let mut out = String::new();

    for spec in specs {
        let mut objects = 0;
        for template in &spec.manifests {
            objects += ManifestDocument::parse(&renderer.render(template, values)?)?.len();
        }
        out.push_str(&format!(
            "{} ({} objects in {} manifest sets)\n",
            spec.name,
            objects,
            spec.manifests.len()
        ));
        for target in &spec.readiness {
            out.push_str(&format!("  waits for {}\n", target));
        }
    }

    Ok(out)
}
