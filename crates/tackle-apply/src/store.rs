//! Object Store Adapter
//!
//! The applier and readiness waiter only ever talk to the cluster through
//! [`ObjectStore`]. "Not found" is an ordinary outcome (`Ok(None)` from
//! [`ObjectStore::get`]); every other failure is an [`Error::Store`].
//!
//! [`Error::Store`]: tackle_common::Error::Store

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tackle_common::Result;

use crate::object::{ManifestObject, ObjectKey};

/// Authoritative object store keyed by `(group, version, kind, namespace, name)`
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, `None` if it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<ManifestObject>>;

    /// Create a new object
    async fn create(&self, object: &ManifestObject) -> Result<()>;

    /// Overwrite an existing object.
    ///
    /// The object must carry the resource version last read from the store;
    /// stale versions are rejected as conflicts.
    async fn update(&self, object: &ManifestObject) -> Result<()>;

    /// Delete an object
    async fn delete(&self, object: &ManifestObject) -> Result<()>;
}
