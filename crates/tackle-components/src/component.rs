//! Component Lifecycle Facade
//!
//! Every add-on is a [`ManifestComponent`]: a name, one or more embedded
//! manifest sets, the Deployments to wait on after apply, and an
//! [`ExistenceProbe`]. Install/Uninstall/CheckExists each run under their own
//! operation deadline, separate from the readiness waiter's budget.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tackle_apply::{
    Applier, ApplyOptions, DeploymentRef, ManifestDocument, ManifestRenderer, ObjectStore,
    ReadinessWaiter, TemplateValues,
};
use tackle_common::{
    Error, Result, DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT,
};
use tracing::{debug, info};

/// An installable cluster add-on
#[async_trait]
pub trait Component: Send + Sync {
    /// Stable component name
    fn name(&self) -> &str;

    /// Apply the component's manifests and wait for its workloads
    async fn install(&self) -> Result<()>;

    /// Delete the component's manifests
    async fn uninstall(&self) -> Result<()>;

    /// Whether a satisfying installation is present
    async fn check_exists(&self) -> Result<bool>;
}

/// How a component decides whether it is already installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceProbe {
    /// Present iff this Deployment exists
    Deployment(DeploymentRef),
    /// Present if `external` exists (an independently managed install);
    /// otherwise present iff `managed` exists
    ExternalFirst {
        /// Deployment of the community/external installation
        external: DeploymentRef,
        /// Deployment of the operator-managed installation
        managed: DeploymentRef,
    },
}

impl ExistenceProbe {
    /// Run the probe against a store
    pub async fn check(&self, store: &dyn ObjectStore) -> Result<bool> {
        match self {
            ExistenceProbe::Deployment(target) => deployment_exists(store, target).await,
            ExistenceProbe::ExternalFirst { external, managed } => {
                if deployment_exists(store, external).await? {
                    info!(
                        namespace = %external.namespace,
                        name = %external.name,
                        "found externally managed installation"
                    );
                    return Ok(true);
                }
                deployment_exists(store, managed).await
            }
        }
    }
}

async fn deployment_exists(store: &dyn ObjectStore, target: &DeploymentRef) -> Result<bool> {
    let found = store.get(&target.key()).await?.is_some();
    debug!(namespace = %target.namespace, name = %target.name, found, "existence probe");
    Ok(found)
}

/// Timing and apply behavior shared by all components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSettings {
    /// Interval between readiness polls
    pub poll_interval: Duration,
    /// Budget for each readiness wait
    pub wait_timeout: Duration,
    /// Budget for one whole Install/Uninstall/CheckExists call
    pub operation_timeout: Duration,
    /// Applier options
    pub apply: ApplyOptions,
}

impl Default for ComponentSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            apply: ApplyOptions::default(),
        }
    }
}

/// Static description of an add-on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Component name
    pub name: String,
    /// Manifest templates, applied in order and deleted in reverse
    pub manifests: Vec<Cow<'static, str>>,
    /// Deployments waited on, in order, after apply
    pub readiness: Vec<DeploymentRef>,
    /// Existence policy
    pub probe: ExistenceProbe,
}

impl ComponentSpec {
    /// Spec with no manifests, probing `probe`
    pub fn new(name: impl Into<String>, probe: ExistenceProbe) -> Self {
        Self {
            name: name.into(),
            manifests: Vec::new(),
            readiness: Vec::new(),
            probe,
        }
    }

    /// Add a manifest set
    pub fn manifest(mut self, template: impl Into<Cow<'static, str>>) -> Self {
        self.manifests.push(template.into());
        self
    }

    /// Add a Deployment to wait on after apply
    pub fn wait_for(mut self, target: DeploymentRef) -> Self {
        self.readiness.push(target);
        self
    }
}

/// A component backed by embedded manifests
pub struct ManifestComponent {
    spec: ComponentSpec,
    store: Arc<dyn ObjectStore>,
    settings: ComponentSettings,
    values: TemplateValues,
    renderer: ManifestRenderer,
}

impl ManifestComponent {
    /// Bind a spec to a store
    pub fn new(
        spec: ComponentSpec,
        store: Arc<dyn ObjectStore>,
        settings: ComponentSettings,
        values: TemplateValues,
    ) -> Self {
        Self {
            spec,
            store,
            settings,
            values,
            renderer: ManifestRenderer::new(),
        }
    }

    /// Static description
    pub fn spec(&self) -> &ComponentSpec {
        &self.spec
    }

    /// Manifest sets rendered with this component's values
    pub fn rendered(&self) -> Result<Vec<String>> {
        self.spec
            .manifests
            .iter()
            .map(|template| self.renderer.render(template, &self.values))
            .collect()
    }

    /// Rendered and parsed manifest sets, in declaration order
    pub fn documents(&self) -> Result<Vec<ManifestDocument>> {
        self.rendered()?
            .iter()
            .map(|text| ManifestDocument::parse(text))
            .collect()
    }

    async fn with_deadline<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget = self.settings.operation_timeout;
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::deadline_exceeded(operation, &self.spec.name, budget)),
        }
    }

    async fn run_install(&self) -> Result<()> {
        let documents = self.documents()?;
        let applier = Applier::with_options(self.store.as_ref(), self.settings.apply);
        for document in &documents {
            applier.apply(document).await?;
        }

        let waiter = ReadinessWaiter::new(self.settings.poll_interval, self.settings.wait_timeout);
        for target in &self.spec.readiness {
            info!(
                component = %self.spec.name,
                namespace = %target.namespace,
                name = %target.name,
                "waiting for deployment"
            );
            waiter.wait_for_deployment(self.store.as_ref(), target).await?;
        }
        Ok(())
    }

    async fn run_uninstall(&self) -> Result<()> {
        let documents = self.documents()?;
        let applier = Applier::new(self.store.as_ref());
        // Dependents first, their CRDs last
        for document in documents.iter().rev() {
            applier.delete(document).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Component for ManifestComponent {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn install(&self) -> Result<()> {
        info!(component = %self.spec.name, "installing");
        self.with_deadline("install", self.run_install()).await?;
        info!(component = %self.spec.name, "installed");
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        info!(component = %self.spec.name, "uninstalling");
        self.with_deadline("uninstall", self.run_uninstall()).await?;
        info!(component = %self.spec.name, "uninstalled");
        Ok(())
    }

    async fn check_exists(&self) -> Result<bool> {
        self.with_deadline("check", self.spec.probe.check(self.store.as_ref()))
            .await
    }
}
