//! Flush coordinator (spec.md §4.7): the synchronous cache→backend flush
//! path shared by the FLUSH command and the CLOSE cascade.

use log::{debug, trace};
use smb2_msg::{FileId, Status};

use crate::open::OpenFileManager;
use crate::stores::{StoreError, StoreRegistry};
use std::sync::Arc;

pub struct FlushCoordinator {
    open_files: Arc<OpenFileManager>,
    stores: Arc<dyn StoreRegistry>,
}

impl FlushCoordinator {
    pub fn new(open_files: Arc<OpenFileManager>, stores: Arc<dyn StoreRegistry>) -> Self {
        FlushCoordinator { open_files, stores }
    }

    /// Runs the six-step procedure from spec.md §4.7. Idempotent: a second
    /// call with no intervening writes observes `cache.size() == 0` and
    /// returns at step 4 without touching the content store.
    pub async fn flush(&self, file_id: FileId) -> Result<(), Status> {
        // (1) lookup OpenFile
        let open = self
            .open_files
            .files
            .load(&file_id)
            .ok_or(Status::InvalidHandle)?;

        // (2) resolve metadata store for its share
        let metadata = self
            .stores
            .metadata_store_for_share(&open.share_name)
            .await
            .ok_or(Status::BadNetworkName)?;

        // (3) get_file, mapping backend errors through StoreError::to_status
        metadata
            .get_file(&open.share_name, file_id)
            .await
            .map_err(|err| err.to_status())?;

        let Some(content_id) = open.content_id.as_deref() else {
            trace!("flush: {file_id:?} has no content_id, no-op");
            return Ok(());
        };

        // (4) no-op if no cache configured, or cache is empty
        let cache = match self.stores.cache_for_share(&open.share_name).await {
            Some(cache) => cache,
            None => {
                trace!("flush: {file_id:?} share has no cache configured, no-op");
                return Ok(());
            }
        };
        let size = cache
            .size(content_id)
            .await
            .map_err(|err| err.to_status())?;
        if size == 0 {
            trace!("flush: {file_id:?} cache size 0, no-op");
            return Ok(());
        }

        // (5) resolve content store
        let content_store = self
            .stores
            .content_store_for_share(&open.share_name)
            .await
            .ok_or(Status::InternalError)?;

        // (6) drain cache into the content store, then sync
        self.flush_cache_to_content_store(cache.as_ref(), content_store.as_ref(), &open.share_name, file_id)
            .await
    }

    /// The shared `flush_cache_to_content_store` routine from spec.md §4.7
    /// step 6: for incremental-upload-capable stores this would stream parts
    /// and mark the cache "uploading"; for random-write stores it writes
    /// only `[last_flushed_offset, current_size)`. Both capabilities are
    /// delegated to the collaborator traits themselves -- this core has no
    /// byte-range bookkeeping of its own to add on top, since READ/WRITE
    /// payload shaping is out of scope (spec.md §1).
    async fn flush_cache_to_content_store(
        &self,
        cache: &dyn crate::stores::Cache,
        content_store: &dyn crate::stores::ContentStore,
        share_name: &str,
        file_id: FileId,
    ) -> Result<(), Status> {
        let map_io_err = |_: StoreError| Status::UnexpectedIoError;
        cache.drain(share_name, file_id).await.map_err(map_io_err)?;
        content_store.sync(share_name, file_id).await.map_err(map_io_err)?;
        debug!(
            "flush: {file_id:?} synced to content store (incremental={})",
            content_store.supports_incremental_upload()
        );
        Ok(())
    }
}
