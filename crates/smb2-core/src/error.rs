//! Internal error type for conditions the core encounters before they have
//! been mapped to a wire [`Status`](smb2_msg::Status).
//!
//! Every handler-facing entry point ultimately converts one of these into a
//! `(Status, Vec<u8>)` pair at the dispatcher boundary (spec'd in §7:
//! "never throws/unwinds across the dispatcher boundary"); this type exists
//! so that conversion is a single match, not scattered ad hoc mappings.

use thiserror::Error;

use crate::stores::StoreError;
use smb2_msg::{SmbMsgError, Status};

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed request: {0}")]
    Malformed(#[from] SmbMsgError),
    #[error("no session with id {0:#018x}")]
    UnknownSession(u64),
    #[error("no tree connection with id {0:#010x}")]
    UnknownTree(u32),
    #[error("no open file with the given file id")]
    UnknownFile,
    #[error("unknown share: {0}")]
    UnknownShare(String),
    #[error("access denied")]
    AccessDenied,
    #[error("unsupported dialect")]
    UnsupportedDialect,
    #[error("backend store error: {0}")]
    Store(#[from] StoreError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Maps this error to the NT status the wire response should carry, per
    /// the taxonomy in spec.md §7.
    pub fn to_status(&self) -> Status {
        match self {
            Error::Malformed(_) => Status::InvalidParameter,
            Error::UnknownSession(_) => Status::UserSessionDeleted,
            Error::UnknownTree(_) => Status::NetworkNameDeleted,
            Error::UnknownFile => Status::InvalidHandle,
            Error::UnknownShare(_) => Status::BadNetworkName,
            Error::AccessDenied => Status::AccessDenied,
            Error::UnsupportedDialect => Status::NotSupported,
            Error::Store(store_err) => store_err.to_status(),
            Error::Cancelled => Status::Cancelled,
            Error::Internal(_) => Status::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
