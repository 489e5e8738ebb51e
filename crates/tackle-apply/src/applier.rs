//! Reconciling Applier
//!
//! Converges the store toward a [`ManifestDocument`] with create-or-update:
//! objects that are absent get created, objects that exist are overwritten
//! carrying the store's current resource version. Objects are applied in
//! tier order (CRDs, then namespaces, then everything else), document order
//! within a tier. Nothing is retried here; the first failure aborts and names
//! the object.

use std::time::Duration;

use tackle_common::{Result, DEFAULT_CRD_ESTABLISHED_TIMEOUT};
use tracing::{debug, info};

use crate::manifest::ManifestDocument;
use crate::object::ManifestObject;
use crate::readiness::ReadinessWaiter;
use crate::store::ObjectStore;

/// Poll settings for waiting on freshly applied CRDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrdGate {
    /// Interval between `Established` checks
    pub poll_interval: Duration,
    /// Budget for each CRD
    pub timeout: Duration,
}

impl Default for CrdGate {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: DEFAULT_CRD_ESTABLISHED_TIMEOUT,
        }
    }
}

/// Applier behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// When set, every CRD in a document must report `Established` before
    /// any later-tier object is applied
    pub crd_gate: Option<CrdGate>,
}

impl ApplyOptions {
    /// Options with the CRD gate enabled
    pub fn with_crd_gate(gate: CrdGate) -> Self {
        Self {
            crd_gate: Some(gate),
        }
    }
}

/// What `create_or_update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    /// The object was absent and has been created
    Created,
    /// The object existed and has been overwritten
    Updated,
}

/// Counts from one apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Objects created
    pub created: usize,
    /// Objects updated
    pub updated: usize,
}

impl ApplySummary {
    fn record(&mut self, action: ApplyAction) {
        match action {
            ApplyAction::Created => self.created += 1,
            ApplyAction::Updated => self.updated += 1,
        }
    }
}

/// Counts from one delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Objects deleted
    pub deleted: usize,
    /// Objects that were already absent
    pub skipped: usize,
}

/// Applies and deletes manifest objects against a store
pub struct Applier<'a> {
    store: &'a dyn ObjectStore,
    options: ApplyOptions,
}

impl<'a> Applier<'a> {
    /// Applier over `store` with default options (no CRD gate)
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self::with_options(store, ApplyOptions::default())
    }

    /// Applier with explicit options
    pub fn with_options(store: &'a dyn ObjectStore, options: ApplyOptions) -> Self {
        Self { store, options }
    }

    /// Create or update every object in the document, CRDs first
    pub async fn apply(&self, document: &ManifestDocument) -> Result<ApplySummary> {
        let (crds, rest): (Vec<&ManifestObject>, Vec<&ManifestObject>) = document
            .apply_order()
            .into_iter()
            .partition(|obj| obj.is_crd());

        let mut summary = ApplySummary::default();

        for obj in &crds {
            summary.record(self.create_or_update(obj).await?);
        }

        if let Some(gate) = self.options.crd_gate {
            let waiter = ReadinessWaiter::new(gate.poll_interval, gate.timeout);
            for crd in &crds {
                waiter.wait_for_crd_established(self.store, crd.name()).await?;
            }
        }

        for obj in &rest {
            summary.record(self.create_or_update(obj).await?);
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            "manifest applied"
        );
        Ok(summary)
    }

    /// Create the object if absent, otherwise overwrite it with the stored
    /// resource version borrowed onto a copy
    pub async fn create_or_update(&self, obj: &ManifestObject) -> Result<ApplyAction> {
        match self.store.get(obj.key()).await? {
            None => {
                self.store.create(obj).await?;
                info!(
                    kind = %obj.kind(),
                    namespace = %obj.namespace(),
                    name = %obj.name(),
                    "created"
                );
                Ok(ApplyAction::Created)
            }
            Some(existing) => {
                let mut desired = obj.clone();
                if let Some(version) = existing.resource_version() {
                    desired.set_resource_version(version);
                }
                self.store.update(&desired).await?;
                debug!(
                    kind = %obj.kind(),
                    namespace = %obj.namespace(),
                    name = %obj.name(),
                    resource_version = ?existing.resource_version(),
                    "updated"
                );
                Ok(ApplyAction::Updated)
            }
        }
    }

    /// Delete every object in reverse apply order, skipping ones already gone
    pub async fn delete(&self, document: &ManifestDocument) -> Result<DeleteSummary> {
        let teardown: Vec<&ManifestObject> = document.apply_order().into_iter().rev().collect();
        self.delete_objects(&teardown).await
    }

    /// Delete the given objects in order, skipping ones already gone.
    ///
    /// The first failure aborts; objects deleted before it stay deleted.
    pub async fn delete_objects(&self, objects: &[&ManifestObject]) -> Result<DeleteSummary> {
        let mut summary = DeleteSummary::default();

        for &obj in objects {
            if self.store.get(obj.key()).await?.is_none() {
                info!(
                    kind = %obj.kind(),
                    namespace = %obj.namespace(),
                    name = %obj.name(),
                    "already deleted"
                );
                summary.skipped += 1;
                continue;
            }

            self.store.delete(obj).await?;
            info!(
                kind = %obj.kind(),
                namespace = %obj.namespace(),
                name = %obj.name(),
                "deleted"
            );
            summary.deleted += 1;
        }

        Ok(summary)
    }
}
