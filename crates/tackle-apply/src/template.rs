//! Manifest templating
//!
//! Embedded manifests reference runtime parameters as `{{ namespace }}`,
//! `{{ image }}` and `{{ values.<key> }}`. Rendering uses minijinja with
//! strict undefined handling so a typo in a placeholder fails the install
//! instead of applying an empty string.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use tackle_common::{Error, Result, DEFAULT_OPERATOR_IMAGE, TACKLE_SYSTEM_NAMESPACE};

/// Runtime parameters substituted into manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValues {
    /// Namespace where operator-managed resources live
    pub namespace: String,
    /// Operator container image reference
    pub image: String,
    /// Additional free-form values, available as `values.<key>`
    pub values: BTreeMap<String, String>,
}

impl Default for TemplateValues {
    fn default() -> Self {
        Self {
            namespace: TACKLE_SYSTEM_NAMESPACE.to_string(),
            image: DEFAULT_OPERATOR_IMAGE.to_string(),
            values: BTreeMap::new(),
        }
    }
}

impl TemplateValues {
    /// Values for a namespace and image
    pub fn new(namespace: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            image: image.into(),
            values: BTreeMap::new(),
        }
    }

    /// Add a free-form value
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// Renders manifest templates
pub struct ManifestRenderer {
    env: Environment<'static>,
}

impl Default for ManifestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestRenderer {
    /// Create a renderer with strict undefined handling
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render one manifest template
    pub fn render(&self, template: &str, values: &TemplateValues) -> Result<String> {
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }

        self.env
            .render_str(template, values)
            .map_err(|e| Error::template(describe(&e)))
    }
}

fn describe(err: &minijinja::Error) -> String {
    match err.line() {
        Some(line) => format!("{} (line {})", err, line),
        None => err.to_string(),
    }
}
