//! Backend collaborator interfaces (spec.md §4.6, §6).
//!
//! `MetadataStore`, `ContentStore`, and `Cache` are the seams this core
//! dispatches CREATE/FLUSH/CLOSE work through; no concrete implementation
//! ships here (the backing store is explicitly out of scope). Modeled as
//! `#[async_trait]` traits -- needed for object-safe `dyn` dispatch over
//! heterogeneous store backends, since native async-fn-in-trait isn't
//! object safe -- grounded on `wraith-transport`'s use of `async-trait` for
//! its own pluggable transport trait in the example pack.

use async_trait::async_trait;
use smb2_msg::{FileId, Status};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("object not found")]
    NotFound,
    #[error("backend access denied")]
    AccessDenied,
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl StoreError {
    /// Maps a backend failure to the NT status the dispatcher reports, per
    /// spec.md §7's error taxonomy.
    pub fn to_status(&self) -> Status {
        match self {
            StoreError::Unavailable(_) => Status::InternalError,
            StoreError::NotFound => Status::ObjectNameNotFound,
            StoreError::AccessDenied => Status::AccessDenied,
            StoreError::NotImplemented(_) => Status::NotSupported,
        }
    }
}

/// Looks up shares by name for TREE_CONNECT (spec.md §4.6). A deployment
/// wires its real share configuration in behind this; the core only needs
/// existence + an opaque handle to pass through to the stores.
#[async_trait]
pub trait ShareRegistry: Send + Sync {
    async fn resolve(&self, share_name: &str) -> Option<Arc<dyn Share>>;
}

/// The "Registry" collaborator from spec.md §6: resolves the metadata/
/// content/cache backends for a given share name. Distinct from
/// [`ShareRegistry`] (which answers "does this share exist and what's its
/// policy") -- a share can exist with no cache configured at all, which
/// [`FlushCoordinator`](crate::flush::FlushCoordinator) treats as a no-op
/// flush per spec.md §4.7 step 4.
#[async_trait]
pub trait StoreRegistry: Send + Sync {
    async fn metadata_store_for_share(&self, share_name: &str) -> Option<Arc<dyn MetadataStore>>;
    async fn content_store_for_share(&self, share_name: &str) -> Option<Arc<dyn ContentStore>>;
    async fn cache_for_share(&self, share_name: &str) -> Option<Arc<dyn Cache>>;
}

/// An individual resolved share: enough identity to route CREATE/FLUSH to
/// the right backend namespace, and to decide TREE_CONNECT access.
pub trait Share: Send + Sync {
    fn name(&self) -> &str;
    fn read_only(&self) -> bool;
}

/// Tracks filesystem-shaped metadata (names, attributes, directory
/// structure) for a share's content. This core only calls into it for the
/// subset CREATE/CLOSE/delete-on-close/flush need; it does not itself
/// implement a namespace.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Confirms the metadata handle behind `file_id` is still valid, per
    /// spec.md §4.7 step 3's `get_file`. `NotFound`/`AccessDenied` map to
    /// the statuses named there; any other error is a generic backend
    /// failure.
    async fn get_file(&self, share: &str, file_id: FileId) -> Result<(), StoreError>;
    async fn delete(&self, share: &str, path: &str) -> Result<(), StoreError>;

    /// Releases every byte-range lock `session_id` holds on `file_id`, per
    /// spec.md §4.6 CLOSE cascade step 2. Locks are tracked entirely inside
    /// the metadata store; the core has no lock table of its own to clear.
    async fn unlock_all_for_session(
        &self,
        share: &str,
        file_id: FileId,
        session_id: u64,
    ) -> Result<(), StoreError>;
}

/// Reads/writes file content on behalf of an [`crate::open::OpenFile`].
/// FLUSH (spec.md §4.7) calls [`ContentStore::sync`] to push any
/// backend-buffered writes to stable storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn sync(&self, share: &str, file_id: FileId) -> Result<(), StoreError>;

    /// Whether this store's flush path should stream incremental multipart
    /// uploads rather than write a byte range at an offset (spec.md §4.7
    /// step 6a vs 6b). The flush routine discriminates on this at runtime,
    /// per spec.md §6's "feature-probe" guidance.
    fn supports_incremental_upload(&self) -> bool {
        false
    }
}

/// A write-back cache sitting in front of a [`ContentStore`]. FLUSH queries
/// [`Cache::size`] to decide whether there is anything to flush at all
/// (spec.md §4.7 step 4), then calls [`Cache::drain`] to push buffered
/// writes toward the content store before [`ContentStore::sync`] runs.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn size(&self, content_id: &str) -> Result<u64, StoreError>;
    async fn drain(&self, share: &str, file_id: FileId) -> Result<(), StoreError>;
}
