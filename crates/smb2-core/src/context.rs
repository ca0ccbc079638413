//! Per-request and per-connection state (spec.md §4.1, §4.8).
//!
//! [`RequestContext`] is threaded through a single request's handling, the
//! way a client-side connection struct carries negotiated/session state
//! alongside each outgoing message. [`ConnectionGuard`] is the
//! connection-scoped counterpart: its `Drop` impl is the one place the core
//! tears down every session a connection ever opened, so a client that
//! vanishes without LOGOFF still gets cleaned up (spec.md §4.8).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::handler::Handler;

/// Carries the state one request needs as it moves through the dispatcher
/// and into a command handler. `session_id`/`tree_id` start `None` and are
/// filled in once NEGOTIATE/SESSION_SETUP/TREE_CONNECT establish them.
pub struct RequestContext {
    pub cancellation: CancellationToken,
    pub client_addr: SocketAddr,
    pub connection_id: u64,
    pub message_id: u64,
    pub session_id: Option<u64>,
    pub tree_id: Option<u32>,
    pub share_name: Option<String>,
    pub is_guest: bool,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub previous_session_id: Option<u64>,
}

impl RequestContext {
    pub fn new(connection_id: u64, client_addr: SocketAddr, message_id: u64) -> Self {
        RequestContext {
            cancellation: CancellationToken::new(),
            client_addr,
            connection_id,
            message_id,
            session_id: None,
            tree_id: None,
            share_name: None,
            is_guest: false,
            username: None,
            domain: None,
            previous_session_id: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Owns the set of session ids a single connection has established, and
/// ensures every one of them is torn down -- cascading to their trees and
/// open files -- once the connection goes away, whether that's a clean
/// LOGOFF or the socket simply dropping.
pub struct ConnectionGuard {
    handler: Arc<Handler>,
    connection_id: u64,
    sessions: Mutex<Vec<u64>>,
    /// Whether NEGOTIATE has completed on this connection, gating the
    /// dispatcher's pre-SESSION_SETUP phase (spec.md §4.8).
    negotiated: AtomicBool,
}

impl ConnectionGuard {
    pub fn new(handler: Arc<Handler>, connection_id: u64) -> Self {
        ConnectionGuard {
            handler,
            connection_id,
            sessions: Mutex::new(Vec::new()),
            negotiated: AtomicBool::new(false),
        }
    }

    pub fn is_negotiated(&self) -> bool {
        self.negotiated.load(Ordering::Acquire)
    }

    pub fn mark_negotiated(&self) {
        self.negotiated.store(true, Ordering::Release);
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Records that `session_id` was established on this connection, so it
    /// is included in the cleanup sweep when the connection ends.
    pub fn register_session(&self, session_id: u64) {
        self.sessions.lock().unwrap().push(session_id);
    }

    /// Removes a session from the tracked set, e.g. after an explicit
    /// LOGOFF has already cleaned it up -- avoids a redundant cleanup pass
    /// in `Drop`.
    pub fn forget_session(&self, session_id: u64) {
        self.sessions.lock().unwrap().retain(|id| *id != session_id);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let handler = self.handler.clone();
        let sessions = std::mem::take(&mut *self.sessions.lock().unwrap());
        if sessions.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for session_id in sessions {
                handler.cleanup_session(session_id).await;
            }
        });
    }
}
