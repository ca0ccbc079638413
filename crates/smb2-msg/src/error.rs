//! Wire-codec error type.

use thiserror::Error;

/// Errors produced while decoding or encoding SMB2 wire structures.
#[derive(Error, Debug)]
pub enum SmbMsgError {
    #[error("request body too short: need at least {min} bytes, got {actual}")]
    BodyTooShort { min: usize, actual: usize },
    #[error("security buffer offset/length out of bounds")]
    SecurityBufferOutOfBounds,
    #[error("unknown NT status code: {0:#010x}")]
    UnknownStatus(u32),
    #[error("binrw codec error: {0}")]
    Binrw(#[from] binrw::Error),
}

pub type Result<T> = std::result::Result<T, SmbMsgError>;
