//! Session state machine: NEGOTIATE dialect selection and the SESSION_SETUP
//! transition table (spec.md §4.5).

use log::{debug, trace};
use std::time::Instant;

use smb2_dtyp::{FileTime, Guid};
use smb2_msg::{
    NegotiateRequest, NegotiateResponse, LogoffRequest, LogoffResponse, SessionSetupRequest,
    SessionSetupResponse, Status, DIALECT_SMB_0202, SESSION_FLAG_IS_GUEST,
};

use crate::auth::{CredentialVerifier, VerifiedIdentity};
use crate::config::HandlerConfig;
use crate::ids::IdAllocator;
use crate::ntlm::{self, NtlmMessageType};
use crate::registry::Registry;
use crate::spnego;

/// An in-progress NTLM handshake, keyed by the session id handed to the
/// client in the Type 2 response (spec.md §3).
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub session_id: u64,
    pub client_addr: std::net::SocketAddr,
    pub created_at: Instant,
    pub server_challenge: [u8; 8],
}

/// An established session, authenticated or guest (spec.md §3).
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u64,
    pub client_addr: std::net::SocketAddr,
    pub is_guest: bool,
    pub is_null: bool,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub created_at: Instant,
}

/// Outcome of a SESSION_SETUP call: the status/body to send, plus whatever
/// the dispatcher needs to update on the connection's `RequestContext` and
/// `ConnectionGuard`.
pub struct SessionSetupOutcome {
    pub status: Status,
    pub response: SessionSetupResponse,
    pub session_id: u64,
    pub is_guest: bool,
    pub is_complete: bool,
}

pub struct SessionManager {
    pub sessions: Registry<u64, Session>,
    pub pending_auth: Registry<u64, PendingAuth>,
}

impl Default for SessionManager {
    fn default() -> Self {
        SessionManager {
            sessions: Registry::new(),
            pending_auth: Registry::new(),
        }
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// NEGOTIATE (spec.md §4.5): selects the highest supported dialect the
    /// client offered. This core supports exactly one, 0x0202; the wildcard
    /// 0x02FF is treated as an offer of it.
    pub fn handle_negotiate(
        &self,
        request: &NegotiateRequest,
        config: &HandlerConfig,
        server_guid: Guid,
        server_start_time: FileTime,
    ) -> Result<NegotiateResponse, Status> {
        let dialect = smb2_msg::select_dialect(&request.dialects).ok_or(Status::NotSupported)?;
        debug_assert_eq!(dialect, DIALECT_SMB_0202);
        Ok(NegotiateResponse {
            dialect_revision: dialect,
            server_guid,
            max_transact_size: config.max_transact_size,
            max_read_size: config.max_read_size,
            max_write_size: config.max_write_size,
            system_time: FileTime::now(),
            server_start_time,
        })
    }

    /// SESSION_SETUP (spec.md §4.5's transition table). `context_session_id`
    /// is whatever the request header carried (0 before a session exists).
    pub async fn handle_session_setup(
        &self,
        ids: &IdAllocator,
        verifier: &dyn CredentialVerifier,
        client_addr: std::net::SocketAddr,
        context_session_id: u64,
        request: &SessionSetupRequest,
    ) -> SessionSetupOutcome {
        let ntlm_buf = spnego::unwrap_security_buffer(&request.security_buffer);
        let ntlm_type = ntlm_buf.as_deref().and_then(ntlm::classify);

        if context_session_id == 0 {
            if ntlm_type == Some(NtlmMessageType::Negotiate) {
                return self.begin_handshake(ids, client_addr);
            }
            return self
                .create_guest_session(ids, client_addr, None)
                .await;
        }

        if let Some(pending) = self.pending_auth.load(&context_session_id) {
            if ntlm_type == Some(NtlmMessageType::Authenticate) {
                let ntlm_buf = ntlm_buf.expect("classify returned Some only when buf present");
                return self
                    .complete_handshake(verifier, client_addr, pending, &ntlm_buf)
                    .await;
            }
            // A non-Type-3 token against a live PendingAuth is one of the
            // tie-break cases spec.md §4.5 collapses to guest rather than
            // an authentication failure; the PendingAuth is left for the
            // sweep task to reclaim.
            return self.create_guest_session(ids, client_addr, None).await;
        }

        // context_session_id != 0 but no PendingAuth: either scenario (e)
        // (AUTHENTICATE with no prior NEGOTIATE) or a stale/foreign id. Both
        // fall to the "unrecognized" guest branch per the transition table's
        // row 4.
        self.create_guest_session(ids, client_addr, None).await
    }

    fn begin_handshake(&self, ids: &IdAllocator, client_addr: std::net::SocketAddr) -> SessionSetupOutcome {
        let session_id = ids.alloc_session_id();
        let server_challenge = ntlm::random_challenge();
        self.pending_auth.store(
            session_id,
            PendingAuth {
                session_id,
                client_addr,
                created_at: Instant::now(),
                server_challenge,
            },
        );
        trace!("session_setup: issued challenge for pending session {session_id:#018x}");
        let challenge = ntlm::build_challenge(server_challenge);
        SessionSetupOutcome {
            status: Status::MoreProcessingRequired,
            response: SessionSetupResponse {
                session_flags: 0,
                security_buffer: challenge,
            },
            session_id,
            is_guest: false,
            is_complete: false,
        }
    }

    async fn complete_handshake(
        &self,
        verifier: &dyn CredentialVerifier,
        client_addr: std::net::SocketAddr,
        pending: PendingAuth,
        authenticate_buf: &[u8],
    ) -> SessionSetupOutcome {
        let identity = match verifier
            .verify(authenticate_buf, pending.server_challenge)
            .await
        {
            Ok(identity) => identity,
            Err(_) => VerifiedIdentity::guest(),
        };
        self.pending_auth.remove(&pending.session_id);
        self.finish_session(pending.session_id, client_addr, identity)
    }

    async fn create_guest_session(
        &self,
        ids: &IdAllocator,
        client_addr: std::net::SocketAddr,
        identity: Option<VerifiedIdentity>,
    ) -> SessionSetupOutcome {
        let session_id = ids.alloc_session_id();
        self.finish_session(
            session_id,
            client_addr,
            identity.unwrap_or_else(VerifiedIdentity::guest),
        )
    }

    fn finish_session(
        &self,
        session_id: u64,
        client_addr: std::net::SocketAddr,
        identity: VerifiedIdentity,
    ) -> SessionSetupOutcome {
        let session = Session {
            session_id,
            client_addr,
            is_guest: identity.is_guest,
            is_null: false,
            username: identity.username,
            domain: identity.domain,
            created_at: Instant::now(),
        };
        self.sessions.store(session_id, session);
        debug!("session_setup: established session {session_id:#018x} (guest={})", identity.is_guest);
        let session_flags = if identity.is_guest { SESSION_FLAG_IS_GUEST } else { 0 };
        SessionSetupOutcome {
            status: Status::Success,
            response: SessionSetupResponse {
                session_flags,
                security_buffer: Vec::new(),
            },
            session_id,
            is_guest: identity.is_guest,
            is_complete: true,
        }
    }

    /// LOGOFF (spec.md §4.5): requires a live session, otherwise
    /// `USER_SESSION_DELETED`.
    pub fn handle_logoff(
        &self,
        session_id: u64,
        _request: &LogoffRequest,
    ) -> Result<LogoffResponse, Status> {
        if self.sessions.remove(&session_id).is_none() {
            return Err(Status::UserSessionDeleted);
        }
        Ok(LogoffResponse)
    }

    /// Evicts `PendingAuth` entries older than `ttl`, per spec.md §9's Open
    /// Question #1. Returns the number evicted, for logging by the caller.
    pub fn sweep_pending_auth(&self, ttl: std::time::Duration) -> usize {
        let removed = self
            .pending_auth
            .remove_matching(|_, pending| pending.created_at.elapsed() >= ttl);
        removed.len()
    }
}
