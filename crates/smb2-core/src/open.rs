//! Open-file handle lifecycle and the CLOSE cascade (spec.md §4.6).

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use log::{debug, warn};
use smb2_msg::FileId;

use crate::flush::FlushCoordinator;
use crate::registry::Registry;
use crate::stores::StoreRegistry;

/// Oplock level held for an [`OpenFile`]. Written at CREATE (before the
/// handle is published) and potentially again during an OPLOCK_BREAK for
/// the same `file_id` -- spec.md §9 Open Question #3 calls for this to be
/// safely racy against that pattern, hence the `AtomicU8` backing rather
/// than a plain field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OplockLevel {
    None = 0,
    Level2 = 1,
    Exclusive = 2,
    Batch = 3,
}

impl OplockLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => OplockLevel::Level2,
            2 => OplockLevel::Exclusive,
            3 => OplockLevel::Batch,
            _ => OplockLevel::None,
        }
    }
}

/// An atomic cell for [`OpenFile::oplock_level`].
#[derive(Debug)]
pub struct OplockCell(AtomicU8);

impl OplockCell {
    pub fn new(level: OplockLevel) -> Self {
        OplockCell(AtomicU8::new(level as u8))
    }

    pub fn get(&self) -> OplockLevel {
        OplockLevel::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, level: OplockLevel) {
        self.0.store(level as u8, Ordering::Release);
    }
}

impl Clone for OplockCell {
    fn clone(&self) -> Self {
        OplockCell::new(self.get())
    }
}

/// An open file or directory handle (spec.md §3). Enumeration cursors and
/// per-command READ/WRITE/QUERY state are out of scope for this core; only
/// the fields the CLOSE cascade and FLUSH coordinator need are modeled.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub file_id: FileId,
    pub tree_id: u32,
    pub session_id: u64,
    pub share_name: String,
    pub path: String,
    pub open_time: Instant,
    pub is_directory: bool,
    pub is_pipe: bool,
    pub content_id: Option<String>,
    pub delete_pending: bool,
    pub oplock_level: std::sync::Arc<OplockCell>,
}

pub struct OpenFileManager {
    pub files: Registry<FileId, OpenFile>,
}

impl Default for OpenFileManager {
    fn default() -> Self {
        OpenFileManager {
            files: Registry::new(),
        }
    }
}

impl OpenFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the four-step CLOSE cascade from spec.md §4.6 for a single
    /// handle, then removes it from the registry. Missing handles are a
    /// no-op (the dispatcher has already mapped that to `INVALID_HANDLE`
    /// before ever reaching here).
    pub async fn close(
        &self,
        stores: &dyn StoreRegistry,
        flush: &FlushCoordinator,
        file_id: FileId,
    ) {
        let Some(open) = self.files.remove(&file_id) else {
            return;
        };
        self.run_cascade(stores, flush, &open).await;
    }

    async fn run_cascade(&self, stores: &dyn StoreRegistry, flush: &FlushCoordinator, open: &OpenFile) {
        // (1) pipe close
        if open.is_pipe {
            debug!("close: releasing pipe handle for {}", open.path);
        }
        // (2) release byte-range locks held by this session on this handle.
        // Lock tracking lives in the metadata store, which is the sole
        // authority on what locks exist; the core only asks it to drop this
        // session's locks on this handle.
        if let Some(metadata) = stores.metadata_store_for_share(&open.share_name).await {
            if let Err(err) = metadata
                .unlock_all_for_session(&open.share_name, open.file_id, open.session_id)
                .await
            {
                warn!(
                    "close: releasing locks for {:?} failed during cascade: {err}",
                    open.file_id
                );
            }
        }

        // (3) flush cache to content store for non-directory files with
        // content, via the shared flush routine (spec.md §4.7).
        if !open.is_directory && open.content_id.is_some() {
            if let Err(err) = flush.flush(open.file_id).await {
                warn!("close: flush for {:?} failed during cascade: {err}", open.file_id);
            }
        }

        // (4) delete-on-close: remove the entry from its parent. Deliberate
        // trust boundary per spec.md §4.6: this can only have been set
        // after an authorized open, so no further permission check is
        // performed here even if the owning session is already gone.
        if open.delete_pending {
            if let Some(metadata) = stores.metadata_store_for_share(&open.share_name).await {
                if let Err(err) = metadata.delete(&open.share_name, &open.path).await {
                    warn!("close: delete-on-close for {} failed: {err}", open.path);
                }
            } else {
                warn!(
                    "close: delete-on-close for {} skipped, no metadata store for share {}",
                    open.path, open.share_name
                );
            }
        }
    }

    /// `close_all_for_session(S)` (spec.md §4.6): closes every handle owned
    /// by `session_id`, two-pass.
    pub async fn close_all_for_session(
        &self,
        stores: &dyn StoreRegistry,
        flush: &FlushCoordinator,
        session_id: u64,
    ) -> usize {
        let keys = self
            .files
            .keys_matching(|_, open| open.session_id == session_id);
        self.close_many(stores, flush, keys).await
    }

    /// `close_all_for_tree(T, S)` (spec.md §4.6): filters on BOTH tree id
    /// and session id.
    pub async fn close_all_for_tree(
        &self,
        stores: &dyn StoreRegistry,
        flush: &FlushCoordinator,
        tree_id: u32,
        session_id: u64,
    ) -> usize {
        let keys = self
            .files
            .keys_matching(|_, open| open.tree_id == tree_id && open.session_id == session_id);
        self.close_many(stores, flush, keys).await
    }

    async fn close_many(
        &self,
        stores: &dyn StoreRegistry,
        flush: &FlushCoordinator,
        keys: Vec<FileId>,
    ) -> usize {
        let mut closed = 0;
        for key in keys {
            if let Some(open) = self.files.remove(&key) {
                self.run_cascade(stores, flush, &open).await;
                closed += 1;
            }
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerConfig;
    use crate::handler::Handler;
    use crate::stores::{Cache, ContentStore, MetadataStore, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingMetadataStore {
        unlock_calls: AtomicU32,
        delete_calls: AtomicU32,
    }

    #[async_trait]
    impl MetadataStore for RecordingMetadataStore {
        async fn get_file(&self, _share: &str, _file_id: FileId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete(&self, _share: &str, _path: &str) -> Result<(), StoreError> {
            self.delete_calls.fetch_add(1, AtomicOrdering::Relaxed);
            Ok(())
        }
        async fn unlock_all_for_session(
            &self,
            _share: &str,
            _file_id: FileId,
            _session_id: u64,
        ) -> Result<(), StoreError> {
            self.unlock_calls.fetch_add(1, AtomicOrdering::Relaxed);
            Ok(())
        }
    }

    struct RecordingStores(Arc<RecordingMetadataStore>);

    #[async_trait]
    impl StoreRegistry for RecordingStores {
        async fn metadata_store_for_share(&self, _share_name: &str) -> Option<Arc<dyn MetadataStore>> {
            Some(self.0.clone())
        }
        async fn content_store_for_share(&self, _share_name: &str) -> Option<Arc<dyn ContentStore>> {
            None
        }
        async fn cache_for_share(&self, _share_name: &str) -> Option<Arc<dyn Cache>> {
            None
        }
    }

    fn sample_open(file_id: FileId, tree_id: u32, session_id: u64) -> OpenFile {
        OpenFile {
            file_id,
            tree_id,
            session_id,
            share_name: "public".to_string(),
            path: "foo.txt".to_string(),
            open_time: Instant::now(),
            is_directory: false,
            is_pipe: false,
            content_id: None,
            delete_pending: false,
            oplock_level: Arc::new(OplockCell::new(OplockLevel::None)),
        }
    }

    #[test]
    fn oplock_cell_is_racy_safe() {
        let cell = OplockCell::new(OplockLevel::None);
        assert_eq!(cell.get(), OplockLevel::None);
        cell.set(OplockLevel::Exclusive);
        assert_eq!(cell.get(), OplockLevel::Exclusive);
    }

    #[tokio::test]
    async fn close_on_missing_handle_is_noop() {
        let handler = Handler::new(HandlerConfig::default());
        handler.open_files.close(handler.stores.as_ref(), &handler.flush, [9u8; 16]).await;
    }

    #[tokio::test]
    async fn close_all_for_session_removes_only_that_sessions_files() {
        let handler = Handler::new(HandlerConfig::default());
        handler.open_files.files.store([1; 16], sample_open([1; 16], 1, 10));
        handler.open_files.files.store([2; 16], sample_open([2; 16], 1, 10));
        handler.open_files.files.store([3; 16], sample_open([3; 16], 1, 20));

        let closed = handler
            .open_files
            .close_all_for_session(handler.stores.as_ref(), &handler.flush, 10)
            .await;
        assert_eq!(closed, 2);
        assert!(handler.open_files.files.contains(&[3; 16]));
    }

    #[tokio::test]
    async fn close_all_for_tree_filters_both_tree_and_session() {
        let handler = Handler::new(HandlerConfig::default());
        handler.open_files.files.store([1; 16], sample_open([1; 16], 1, 10));
        handler.open_files.files.store([2; 16], sample_open([2; 16], 2, 10));

        let closed = handler
            .open_files
            .close_all_for_tree(handler.stores.as_ref(), &handler.flush, 1, 10)
            .await;
        assert_eq!(closed, 1);
        assert!(handler.open_files.files.contains(&[2; 16]));
    }

    #[tokio::test]
    async fn close_releases_locks_and_deletes_on_delete_pending() {
        let metadata = Arc::new(RecordingMetadataStore::default());
        let stores = RecordingStores(metadata.clone());
        let open_files = OpenFileManager::new();
        let flush = FlushCoordinator::new(Arc::new(OpenFileManager::new()), Arc::new(NoCache));
        let mut open = sample_open([1; 16], 1, 10);
        open.delete_pending = true;
        open_files.files.store([1; 16], open);

        open_files.close(&stores, &flush, [1; 16]).await;

        assert_eq!(metadata.unlock_calls.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(metadata.delete_calls.load(AtomicOrdering::Relaxed), 1);
    }

    #[tokio::test]
    async fn close_releases_locks_but_skips_delete_when_not_pending() {
        let metadata = Arc::new(RecordingMetadataStore::default());
        let stores = RecordingStores(metadata.clone());
        let open_files = OpenFileManager::new();
        let flush = FlushCoordinator::new(Arc::new(OpenFileManager::new()), Arc::new(NoCache));
        open_files.files.store([1; 16], sample_open([1; 16], 1, 10));

        open_files.close(&stores, &flush, [1; 16]).await;

        assert_eq!(metadata.unlock_calls.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(metadata.delete_calls.load(AtomicOrdering::Relaxed), 0);
    }

    struct NoCache;
    #[async_trait]
    impl StoreRegistry for NoCache {
        async fn metadata_store_for_share(&self, _share_name: &str) -> Option<Arc<dyn MetadataStore>> {
            None
        }
        async fn content_store_for_share(&self, _share_name: &str) -> Option<Arc<dyn ContentStore>> {
            None
        }
        async fn cache_for_share(&self, _share_name: &str) -> Option<Arc<dyn Cache>> {
            None
        }
    }
}
