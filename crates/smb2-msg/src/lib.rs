//! Wire codec for the SMB2 dialect subset this server core implements.
//!
//! Fixed-layout headers and command bodies, little-endian. Variable-length
//! fields (security buffers, share paths) are decoded by hand against an
//! explicit minimum-size check, per the MS-SMB2 framing rules; there is no
//! general-purpose negotiate-context or extended-attribute machinery here,
//! since the server core only ever negotiates a single dialect.

pub mod echo;
pub mod error;
pub mod file;
pub mod header;
pub mod negotiate;
pub mod session_setup;
pub mod tree_connect;

pub use echo::{EchoRequest, EchoResponse};
pub use error::{Result, SmbMsgError};
pub use file::{FILE_ID_ZERO, FileId, FlushRequest, FlushResponse};
pub use header::{Command, Header, HeaderFlags, Status};
pub use negotiate::{
    DIALECT_SMB_0202, DIALECT_WILDCARD, NegotiateRequest, NegotiateResponse, select_dialect,
};
pub use session_setup::{
    LogoffRequest, LogoffResponse, SESSION_FLAG_IS_GUEST, SESSION_FLAG_IS_NULL,
    SessionSetupRequest, SessionSetupResponse,
};
pub use tree_connect::{
    ShareType, TreeConnectRequest, TreeConnectResponse, TreeDisconnectRequest,
    TreeDisconnectResponse,
};
