//! The per-connection request dispatcher (spec.md §4.8): routes a decoded
//! command to its handler, enforcing the phase and stale-handle rules that
//! bound the interlocking state machines in [`crate::session`],
//! [`crate::tree`], and [`crate::open`].

use std::sync::Arc;

use binrw::BinWrite;
use log::warn;
use smb2_msg::{
    Command, EchoRequest, EchoResponse, FlushRequest, Header, LogoffRequest, NegotiateRequest,
    SessionSetupRequest, Status, TreeConnectRequest, TreeDisconnectRequest,
};

use crate::context::{ConnectionGuard, RequestContext};
use crate::handler::Handler;

/// The `(status, body)` result a command handler produces, before the
/// dispatcher wraps it in a response header (spec.md §2's `HandlerResult`).
pub struct HandlerResult {
    pub status: Status,
    pub body: Vec<u8>,
    /// Overrides the response header's `session_id`, used only for the
    /// SESSION_SETUP step-1 MORE_PROCESSING_REQUIRED reply: the header's own
    /// `session_id` would otherwise still be the request's (0 on a brand new
    /// session), leaving the client with no way to learn the id it must echo
    /// back on Type 3 (spec.md §4.8 scenarios (b)/(c)).
    pub session_id: Option<u64>,
}

impl HandlerResult {
    fn ok(body: Vec<u8>) -> Self {
        HandlerResult {
            status: Status::Success,
            body,
            session_id: None,
        }
    }

    fn err(status: Status) -> Self {
        HandlerResult {
            status,
            body: Vec::new(),
            session_id: None,
        }
    }
}

/// Dispatches one decoded request. `header` carries the command, session
/// id, and tree id the client sent; `body` is the bytes following the fixed
/// 64-byte SMB2 header. `ctx` is updated in place with whatever this call
/// establishes (session id, tree id, guest/identity flags).
pub async fn dispatch(
    handler: &Arc<Handler>,
    guard: &ConnectionGuard,
    ctx: &mut RequestContext,
    header: &Header,
    body: &[u8],
) -> HandlerResult {
    let command = header.command;

    if !guard.is_negotiated() {
        return match command {
            Command::Negotiate => dispatch_negotiate(handler, guard, body),
            Command::Echo => dispatch_echo(body),
            _ => HandlerResult::err(Status::InvalidParameter),
        };
    }

    match command {
        Command::Negotiate => HandlerResult::err(Status::InvalidParameter),
        Command::Echo => dispatch_echo(body),
        Command::SessionSetup => dispatch_session_setup(handler, guard, ctx, header, body).await,
        Command::Logoff => dispatch_logoff(handler, guard, header, body).await,
        _ => dispatch_requiring_session(handler, ctx, header, body).await,
    }
}

fn dispatch_negotiate(handler: &Arc<Handler>, guard: &ConnectionGuard, body: &[u8]) -> HandlerResult {
    let request = match NegotiateRequest::decode(body) {
        Ok(request) => request,
        Err(_) => return HandlerResult::err(Status::InvalidParameter),
    };
    match handler.sessions.handle_negotiate(
        &request,
        &handler.config,
        handler.server_guid,
        handler.start_time,
    ) {
        Ok(response) => {
            guard.mark_negotiated();
            HandlerResult::ok(response.encode())
        }
        Err(status) => HandlerResult::err(status),
    }
}

fn dispatch_echo(body: &[u8]) -> HandlerResult {
    match EchoRequest::decode(body) {
        Ok(_) => HandlerResult::ok(EchoResponse.encode()),
        Err(_) => HandlerResult::err(Status::InvalidParameter),
    }
}

async fn dispatch_session_setup(
    handler: &Arc<Handler>,
    guard: &ConnectionGuard,
    ctx: &mut RequestContext,
    header: &Header,
    body: &[u8],
) -> HandlerResult {
    let request = match SessionSetupRequest::decode(body) {
        Ok(request) => request,
        Err(_) => return HandlerResult::err(Status::InvalidParameter),
    };
    let outcome = handler
        .sessions
        .handle_session_setup(
            &handler.ids,
            handler.verifier.as_ref(),
            ctx.client_addr,
            header.session_id,
            &request,
        )
        .await;

    ctx.session_id = Some(outcome.session_id);
    ctx.is_guest = outcome.is_guest;
    if outcome.is_complete {
        guard.register_session(outcome.session_id);
    }
    HandlerResult {
        status: outcome.status,
        body: outcome.response.encode(),
        session_id: Some(outcome.session_id),
    }
}

async fn dispatch_logoff(
    handler: &Arc<Handler>,
    guard: &ConnectionGuard,
    header: &Header,
    body: &[u8],
) -> HandlerResult {
    if LogoffRequest::decode(body).is_err() {
        return HandlerResult::err(Status::InvalidParameter);
    }
    if !handler.sessions.sessions.contains(&header.session_id) {
        return HandlerResult::err(Status::UserSessionDeleted);
    }
    handler.cleanup_session(header.session_id).await;
    guard.forget_session(header.session_id);
    HandlerResult::ok(smb2_msg::LogoffResponse.encode())
}

/// Handles every command that needs a live session, and branches further
/// for the ones that additionally need a live tree (spec.md §4.8).
async fn dispatch_requiring_session(
    handler: &Arc<Handler>,
    ctx: &mut RequestContext,
    header: &Header,
    body: &[u8],
) -> HandlerResult {
    if !handler.sessions.sessions.contains(&header.session_id) {
        return HandlerResult::err(Status::UserSessionDeleted);
    }

    if header.command == Command::TreeConnect {
        return dispatch_tree_connect(handler, ctx, header, body).await;
    }

    let tree_valid = handler
        .trees
        .trees
        .load(&header.tree_id)
        .map(|tree| tree.session_id == header.session_id)
        .unwrap_or(false);
    if !tree_valid {
        return HandlerResult::err(Status::NetworkNameDeleted);
    }

    match header.command {
        Command::TreeDisconnect => dispatch_tree_disconnect(handler, header, body),
        Command::Flush => dispatch_flush(handler, body).await,
        other => {
            warn!("dispatch: {other} is outside this server core's implemented payload logic");
            HandlerResult::err(Status::NotSupported)
        }
    }
}

async fn dispatch_tree_connect(
    handler: &Arc<Handler>,
    ctx: &mut RequestContext,
    header: &Header,
    body: &[u8],
) -> HandlerResult {
    let request = match TreeConnectRequest::decode(body) {
        Ok(request) => request,
        Err(_) => return HandlerResult::err(Status::InvalidParameter),
    };
    match handler
        .trees
        .handle_tree_connect(&handler.ids, handler.shares.as_ref(), header.session_id, &request)
        .await
    {
        Ok((response, tree_id)) => {
            ctx.tree_id = Some(tree_id);
            ctx.share_name = Some(request.path);
            HandlerResult::ok(response.encode())
        }
        Err(status) => HandlerResult::err(status),
    }
}

fn dispatch_tree_disconnect(handler: &Arc<Handler>, header: &Header, body: &[u8]) -> HandlerResult {
    if TreeDisconnectRequest::decode(body).is_err() {
        return HandlerResult::err(Status::InvalidParameter);
    }
    match handler.trees.handle_tree_disconnect(header.session_id, header.tree_id) {
        Ok(response) => HandlerResult::ok(response.encode()),
        Err(status) => HandlerResult::err(status),
    }
}

async fn dispatch_flush(handler: &Arc<Handler>, body: &[u8]) -> HandlerResult {
    let request = match FlushRequest::decode(body) {
        Ok(request) => request,
        Err(_) => return HandlerResult::err(Status::InvalidParameter),
    };
    match handler.flush.flush(request.file_id).await {
        Ok(()) => HandlerResult::ok(smb2_msg::FlushResponse.encode()),
        Err(status) => HandlerResult::err(status),
    }
}

/// Wraps a handler's `(status, body)` result in a full response header, per
/// spec.md §4.8's "dispatcher attaches header fields" contract.
pub fn encode_response(request_header: &Header, result: &HandlerResult) -> Vec<u8> {
    let mut response_header = Header::response_for(request_header, result.status);
    if let Some(session_id) = response_session_id(request_header, result) {
        response_header.session_id = session_id;
    }
    let mut buf = Vec::with_capacity(Header::STRUCT_SIZE + result.body.len());
    response_header
        .write_le(&mut std::io::Cursor::new(&mut buf))
        .expect("writing a fixed-size header into a Vec cannot fail");
    buf.extend_from_slice(&result.body);
    buf
}

fn response_session_id(request_header: &Header, result: &HandlerResult) -> Option<u64> {
    if result.status == Status::MoreProcessingRequired {
        Some(result.session_id.unwrap_or(request_header.session_id))
    } else {
        None
    }
}
