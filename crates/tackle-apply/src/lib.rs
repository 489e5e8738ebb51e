//! Manifest reconciliation for tackle
//!
//! Parses embedded manifests into [`ManifestObject`]s, applies them through an
//! [`ObjectStore`] with create-or-update semantics, and waits for the
//! resulting workloads to become ready.

#![deny(missing_docs)]

pub mod applier;
pub mod kube_store;
pub mod manifest;
pub mod memory;
pub mod object;
pub mod readiness;
pub mod store;
pub mod template;

pub use applier::{ApplyAction, ApplyOptions, ApplySummary, Applier, CrdGate, DeleteSummary};
pub use kube_store::KubeStore;
pub use manifest::ManifestDocument;
pub use memory::{MemoryStore, StoreCall};
pub use object::{ApplyTier, ManifestObject, ObjectKey};
pub use readiness::{DeploymentRef, DeploymentView, ReadinessWaiter};
pub use store::ObjectStore;
pub use tackle_common::{Error, Result};
pub use template::{ManifestRenderer, TemplateValues};
