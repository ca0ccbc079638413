//! End-to-end scenarios (spec.md §8) spanning NEGOTIATE -> SESSION_SETUP ->
//! TREE_CONNECT -> FLUSH -> LOGOFF across the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use binrw::prelude::*;
use smb2_core::context::{ConnectionGuard, RequestContext};
use smb2_core::dispatcher::dispatch;
use smb2_core::handler::Handler;
use smb2_core::stores::{Cache, ContentStore, MetadataStore, Share, ShareRegistry, StoreError, StoreRegistry};
use smb2_core::HandlerConfig;
use smb2_dtyp::Guid;
use smb2_msg::{Command, FileId, Header, HeaderFlags, Status};

struct PublicShare;
impl Share for PublicShare {
    fn name(&self) -> &str {
        "public"
    }
    fn read_only(&self) -> bool {
        false
    }
}

struct TestBackend;

#[async_trait]
impl ShareRegistry for TestBackend {
    async fn resolve(&self, share_name: &str) -> Option<Arc<dyn Share>> {
        if share_name.eq_ignore_ascii_case("public") {
            Some(Arc::new(PublicShare))
        } else {
            None
        }
    }
}

struct TestMetadataStore;
#[async_trait]
impl MetadataStore for TestMetadataStore {
    async fn get_file(&self, _share: &str, _file_id: FileId) -> Result<(), StoreError> {
        Ok(())
    }
    async fn delete(&self, _share: &str, _path: &str) -> Result<(), StoreError> {
        Ok(())
    }
    async fn unlock_all_for_session(
        &self,
        _share: &str,
        _file_id: FileId,
        _session_id: u64,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

struct TestContentStore;
#[async_trait]
impl ContentStore for TestContentStore {
    async fn sync(&self, _share: &str, _file_id: FileId) -> Result<(), StoreError> {
        Ok(())
    }
}

struct TestCache;
#[async_trait]
impl Cache for TestCache {
    async fn size(&self, _content_id: &str) -> Result<u64, StoreError> {
        Ok(0)
    }
    async fn drain(&self, _share: &str, _file_id: FileId) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl StoreRegistry for TestBackend {
    async fn metadata_store_for_share(&self, _share_name: &str) -> Option<Arc<dyn MetadataStore>> {
        Some(Arc::new(TestMetadataStore))
    }
    async fn content_store_for_share(&self, _share_name: &str) -> Option<Arc<dyn ContentStore>> {
        Some(Arc::new(TestContentStore))
    }
    async fn cache_for_share(&self, _share_name: &str) -> Option<Arc<dyn Cache>> {
        Some(Arc::new(TestCache))
    }
}

fn test_handler() -> Arc<Handler> {
    let backend = Arc::new(TestBackend);
    Arc::new(Handler::with_backends(
        HandlerConfig::default(),
        backend.clone(),
        backend,
        Arc::new(smb2_core::auth::GuestVerifier),
    ))
}

fn fresh_ctx() -> RequestContext {
    RequestContext::new(1, "127.0.0.1:55000".parse().unwrap(), 0)
}

fn header(command: Command, session_id: u64, tree_id: u32) -> Header {
    Header {
        credit_charge: 0,
        status: 0,
        command,
        credit_request: 1,
        flags: HeaderFlags::new(),
        next_command: 0,
        message_id: 1,
        reserved: 0,
        tree_id,
        session_id,
        signature: 0,
    }
}

fn negotiate_body(dialects: &[u16]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    36u16.write_le(&mut cursor).unwrap();
    (dialects.len() as u16).write_le(&mut cursor).unwrap();
    0u16.write_le(&mut cursor).unwrap();
    0u16.write_le(&mut cursor).unwrap();
    0u32.write_le(&mut cursor).unwrap();
    Guid::generate().write_le(&mut cursor).unwrap();
    0u32.write_le(&mut cursor).unwrap();
    0u16.write_le(&mut cursor).unwrap();
    0u16.write_le(&mut cursor).unwrap();
    for d in dialects {
        d.write_le(&mut cursor).unwrap();
    }
    buf
}

fn session_setup_body(security_buffer: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    25u16.write_le(&mut cursor).unwrap();
    0u8.write_le(&mut cursor).unwrap();
    0u8.write_le(&mut cursor).unwrap();
    0u32.write_le(&mut cursor).unwrap();
    0u32.write_le(&mut cursor).unwrap();
    ((64 + 24) as u16).write_le(&mut cursor).unwrap();
    (security_buffer.len() as u16).write_le(&mut cursor).unwrap();
    0u64.write_le(&mut cursor).unwrap();
    drop(cursor);
    buf.extend_from_slice(security_buffer);
    buf
}

fn tree_connect_body(path: &str) -> Vec<u8> {
    let units: Vec<u16> = path.encode_utf16().collect();
    let mut raw = Vec::with_capacity(units.len() * 2);
    for u in &units {
        raw.extend_from_slice(&u.to_le_bytes());
    }
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    9u16.write_le(&mut cursor).unwrap();
    0u16.write_le(&mut cursor).unwrap();
    ((64 + 8) as u16).write_le(&mut cursor).unwrap();
    (raw.len() as u16).write_le(&mut cursor).unwrap();
    drop(cursor);
    buf.extend_from_slice(&raw);
    buf
}

fn flush_body(file_id: FileId) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    24u16.write_le(&mut cursor).unwrap();
    0u16.write_le(&mut cursor).unwrap();
    0u32.write_le(&mut cursor).unwrap();
    drop(cursor);
    buf.extend_from_slice(&file_id);
    buf
}

fn type1_buffer() -> Vec<u8> {
    let mut buf = b"NTLMSSP\0".to_vec();
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&[0u8; 20]);
    buf
}

fn type3_buffer() -> Vec<u8> {
    let mut buf = b"NTLMSSP\0".to_vec();
    buf.extend_from_slice(&3u32.to_le_bytes());
    buf.extend_from_slice(&[0u8; 56]);
    buf
}

/// (a) NEGOTIATE with a single dialect.
#[tokio::test]
async fn negotiate_single_dialect() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    let mut ctx = fresh_ctx();
    let result = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::Negotiate, 0, 0),
        &negotiate_body(&[0x0202]),
    )
    .await;
    assert_eq!(result.status, Status::Success);
    assert_eq!(result.body.len(), 65);
    assert_eq!(u16::from_le_bytes([result.body[4], result.body[5]]), 0x0202);
}

/// (b) Full NTLM handshake to guest, across two SESSION_SETUP rounds.
#[tokio::test]
async fn full_ntlm_handshake_to_guest() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    let mut ctx = fresh_ctx();
    dispatch(&handler, &guard, &mut ctx, &header(Command::Negotiate, 0, 0), &negotiate_body(&[0x0202])).await;

    let step1 = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, 0, 0),
        &session_setup_body(&type1_buffer()),
    )
    .await;
    assert_eq!(step1.status, Status::MoreProcessingRequired);
    let session_id = ctx.session_id.expect("session id set after step 1");
    assert!(session_id >= 2);
    assert!(handler.sessions.pending_auth.contains(&session_id));

    let encoded = smb2_core::dispatcher::encode_response(&header(Command::SessionSetup, 0, 0), &step1);
    let header_on_wire = Header::read_le(&mut std::io::Cursor::new(&encoded)).unwrap();
    assert_eq!(header_on_wire.session_id, session_id);

    let step2 = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, session_id, 0),
        &session_setup_body(&type3_buffer()),
    )
    .await;
    assert_eq!(step2.status, Status::Success);
    assert_eq!(u16::from_le_bytes([step2.body[2], step2.body[3]]), 0x0001);
    assert!(handler.sessions.sessions.contains(&session_id));
    assert!(!handler.sessions.pending_auth.contains(&session_id));
}

/// (c) SPNEGO-wrapped NTLM behaves identically to the bare-NTLM handshake.
#[tokio::test]
async fn spnego_wrapped_ntlm_handshake() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    let mut ctx = fresh_ctx();
    dispatch(&handler, &guard, &mut ctx, &header(Command::Negotiate, 0, 0), &negotiate_body(&[0x0202])).await;

    const NTLMSSP_OID: [u8; 10] = [0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];
    let type1 = type1_buffer();
    let mut wrapped = vec![0x60, (2 + NTLMSSP_OID.len() + type1.len()) as u8];
    wrapped.extend_from_slice(&NTLMSSP_OID);
    wrapped.extend_from_slice(&type1);

    let step1 = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, 0, 0),
        &session_setup_body(&wrapped),
    )
    .await;
    assert_eq!(step1.status, Status::MoreProcessingRequired);
    let session_id = ctx.session_id.unwrap();

    let encoded = smb2_core::dispatcher::encode_response(&header(Command::SessionSetup, 0, 0), &step1);
    let header_on_wire = Header::read_le(&mut std::io::Cursor::new(&encoded)).unwrap();
    assert_eq!(header_on_wire.session_id, session_id);

    let step2 = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, session_id, 0),
        &session_setup_body(&type3_buffer()),
    )
    .await;
    assert_eq!(step2.status, Status::Success);
}

/// (d) Unknown token maps to a guest session.
#[tokio::test]
async fn unknown_token_creates_guest_session() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    let mut ctx = fresh_ctx();
    dispatch(&handler, &guard, &mut ctx, &header(Command::Negotiate, 0, 0), &negotiate_body(&[0x0202])).await;

    let result = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, 0, 0),
        &session_setup_body(&[0xDE, 0xAD, 0xBE, 0xEF, 1, 2, 3, 4]),
    )
    .await;
    assert_eq!(result.status, Status::Success);
    assert!(ctx.is_guest);
    assert!(handler.sessions.sessions.contains(&ctx.session_id.unwrap()));
}

/// (e) AUTHENTICATE without a prior NEGOTIATE/Type-1 round.
#[tokio::test]
async fn authenticate_without_prior_negotiate() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    guard.mark_negotiated();
    let mut ctx = fresh_ctx();

    let result = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, 12345, 0),
        &session_setup_body(&type3_buffer()),
    )
    .await;
    assert_eq!(result.status, Status::Success);
    assert!(ctx.is_guest);
    assert_ne!(ctx.session_id.unwrap(), 12345);
    assert!(!handler.sessions.pending_auth.contains(&12345));
}

/// (f) FLUSH on an unknown file id, and on a file with nothing to flush.
#[tokio::test]
async fn flush_unknown_and_empty_cache() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    guard.mark_negotiated();
    handler.sessions.sessions.store(
        7,
        smb2_core::session::Session {
            session_id: 7,
            client_addr: "127.0.0.1:1".parse().unwrap(),
            is_guest: true,
            is_null: false,
            username: None,
            domain: None,
            created_at: std::time::Instant::now(),
        },
    );
    handler.trees.trees.store(
        3,
        smb2_core::tree::TreeConnection {
            tree_id: 3,
            session_id: 7,
            share_name: "public".to_string(),
            share_type: smb2_msg::ShareType::Disk,
            read_only: false,
            created_at: std::time::Instant::now(),
        },
    );
    let mut ctx = fresh_ctx();

    let missing = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::Flush, 7, 3),
        &flush_body(smb2_msg::FILE_ID_ZERO),
    )
    .await;
    assert_eq!(missing.status, Status::InvalidHandle);

    handler.open_files.files.store(
        [9u8; 16],
        smb2_core::open::OpenFile {
            file_id: [9u8; 16],
            tree_id: 3,
            session_id: 7,
            share_name: "public".to_string(),
            path: "empty.txt".to_string(),
            open_time: std::time::Instant::now(),
            is_directory: false,
            is_pipe: false,
            content_id: Some("blob-9".to_string()),
            delete_pending: false,
            oplock_level: Arc::new(smb2_core::open::OplockCell::new(smb2_core::open::OplockLevel::None)),
        },
    );
    let empty = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::Flush, 7, 3),
        &flush_body([9u8; 16]),
    )
    .await;
    assert_eq!(empty.status, Status::Success);
}

/// (g) LOGOFF cascade: a session with open files and trees is fully torn
/// down, and a subsequent FLUSH on one of those files fails.
#[tokio::test]
async fn logoff_cascades_through_trees_and_files() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    guard.mark_negotiated();
    let mut ctx = fresh_ctx();

    let step1 = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, 0, 0),
        &session_setup_body(&[0xDE, 0xAD]),
    )
    .await;
    assert_eq!(step1.status, Status::Success);
    let session_id = ctx.session_id.unwrap();
    assert!(guard.is_negotiated());

    let (_, tree1) = handler
        .trees
        .handle_tree_connect(&handler.ids, handler.shares.as_ref(), session_id, &smb2_msg::TreeConnectRequest {
            flags: 0,
            path: r"\\server\public".to_string(),
        })
        .await
        .unwrap();
    let (_, tree2) = handler
        .trees
        .handle_tree_connect(&handler.ids, handler.shares.as_ref(), session_id, &smb2_msg::TreeConnectRequest {
            flags: 0,
            path: r"\\server\public".to_string(),
        })
        .await
        .unwrap();

    let file_ids = [[1u8; 16], [2u8; 16], [3u8; 16]];
    for (i, file_id) in file_ids.iter().enumerate() {
        handler.open_files.files.store(
            *file_id,
            smb2_core::open::OpenFile {
                file_id: *file_id,
                tree_id: if i < 2 { tree1 } else { tree2 },
                session_id,
                share_name: "public".to_string(),
                path: format!("file{i}.txt"),
                open_time: std::time::Instant::now(),
                is_directory: false,
                is_pipe: false,
                content_id: None,
                delete_pending: false,
                oplock_level: Arc::new(smb2_core::open::OplockCell::new(smb2_core::open::OplockLevel::None)),
            },
        );
    }

    let logoff = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::Logoff, session_id, 0),
        &[0u8; 4],
    )
    .await;
    assert_eq!(logoff.status, Status::Success);

    assert!(!handler.sessions.sessions.contains(&session_id));
    assert!(!handler.trees.trees.contains(&tree1));
    assert!(!handler.trees.trees.contains(&tree2));
    for file_id in file_ids {
        assert!(!handler.open_files.files.contains(&file_id));
    }

    let flush_after = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::Flush, session_id, tree1),
        &flush_body(file_ids[0]),
    )
    .await;
    assert_eq!(flush_after.status, Status::InvalidHandle);
}

/// (h) A 3-byte SESSION_SETUP body is rejected without allocating anything.
#[tokio::test]
async fn short_session_setup_body_is_rejected() {
    let handler = test_handler();
    let guard = ConnectionGuard::new(handler.clone(), 1);
    guard.mark_negotiated();
    let mut ctx = fresh_ctx();
    let before = handler.sessions.sessions.len();
    let before_pending = handler.sessions.pending_auth.len();

    let result = dispatch(
        &handler,
        &guard,
        &mut ctx,
        &header(Command::SessionSetup, 0, 0),
        &[0u8; 3],
    )
    .await;
    assert_eq!(result.status, Status::InvalidParameter);
    assert_eq!(handler.sessions.sessions.len(), before);
    assert_eq!(handler.sessions.pending_auth.len(), before_pending);
}
