//! The process-wide singleton state `Handler` (spec.md §3), composing the
//! session/tree/open-file state machines and owning the background
//! PendingAuth sweep task (spec.md §9 Open Question #1).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use smb2_dtyp::{FileTime, Guid};
use tokio::task::JoinHandle;

use crate::auth::{CredentialVerifier, GuestVerifier};
use crate::config::HandlerConfig;
use crate::flush::FlushCoordinator;
use crate::ids::IdAllocator;
use crate::open::OpenFileManager;
use crate::session::SessionManager;
use crate::stores::{Cache, ContentStore, MetadataStore, Share, ShareRegistry, StoreRegistry};
use crate::tree::TreeManager;

/// A `ShareRegistry`/`StoreRegistry` that knows no shares, for running the
/// core without a deployment's real backend wired in (e.g. unit tests that
/// only exercise plumbing above the store seam).
struct NoShares;

#[async_trait]
impl ShareRegistry for NoShares {
    async fn resolve(&self, _share_name: &str) -> Option<Arc<dyn Share>> {
        None
    }
}

#[async_trait]
impl StoreRegistry for NoShares {
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

pub struct Handler {
    pub server_guid: Guid,
    /// Wall-clock time this `Handler` was constructed, surfaced to clients
    /// as NEGOTIATE's `server_start_time` (spec.md §4.5).
    pub start_time: FileTime,
    pub config: HandlerConfig,
    pub ids: IdAllocator,
    pub sessions: SessionManager,
    pub trees: TreeManager,
    pub open_files: Arc<OpenFileManager>,
    pub flush: FlushCoordinator,
    pub shares: Arc<dyn ShareRegistry>,
    pub stores: Arc<dyn StoreRegistry>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl Handler {
    /// Builds a `Handler` with no backend wired in -- suitable for tests
    /// exercising the session/tree/open-file state machines in isolation.
    pub fn new(config: HandlerConfig) -> Self {
        let no_shares = Arc::new(NoShares);
        Self::with_backends(config, no_shares.clone(), no_shares, Arc::new(GuestVerifier))
    }

    pub fn with_backends(
        config: HandlerConfig,
        shares: Arc<dyn ShareRegistry>,
        stores: Arc<dyn StoreRegistry>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let open_files = Arc::new(OpenFileManager::new());
        let flush = FlushCoordinator::new(open_files.clone(), stores.clone());
        Handler {
            server_guid: Guid::generate(),
            start_time: FileTime::now(),
            config,
            ids: IdAllocator::new(),
            sessions: SessionManager::new(),
            trees: TreeManager::new(),
            open_files,
            flush,
            shares,
            stores,
            verifier,
        }
    }

    /// Composes the full `cleanup_session(S)` cascade from spec.md §4.6, in
    /// the required order: files -> trees -> pending-auth -> session.
    /// Log-and-continue: a failure releasing one resource must not skip the
    /// rest (spec.md §7).
    pub async fn cleanup_session(&self, session_id: u64) {
        trace!("cleanup_session: starting for {session_id:#018x}");
        let closed_files = self
            .open_files
            .close_all_for_session(self.stores.as_ref(), &self.flush, session_id)
            .await;
        let removed_trees = self.trees.delete_all_trees_for_session(session_id);
        self.sessions.pending_auth.remove(&session_id);
        let had_session = self.sessions.sessions.remove(&session_id).is_some();
        debug!(
            "cleanup_session: {session_id:#018x} done (files={closed_files}, trees={}, session_existed={had_session})",
            removed_trees.len()
        );
    }

    /// Spawns the PendingAuth sweep task (spec.md §9 Open Question #1). The
    /// returned handle is owned by the connection-accept loop / process
    /// supervisor (out of scope here); dropping it does not stop the task,
    /// consistent with `tokio::spawn`'s usual detached semantics.
    pub fn spawn_pending_auth_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(handler.config.pending_auth_sweep_interval);
            loop {
                interval.tick().await;
                trace!("pending_auth sweep: running");
                let evicted = handler.sessions.sweep_pending_auth(handler.config.pending_auth_ttl);
                if evicted > 0 {
                    debug!("pending_auth sweep: evicted {evicted} stale entries");
                }
            }
        })
    }
}
