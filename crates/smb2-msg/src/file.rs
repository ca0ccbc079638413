//! FLUSH request/response bodies (MS-SMB2 2.2.17/2.2.18).
//!
//! READ/WRITE/CREATE/CLOSE payload shapes are out of scope for this server
//! core; only the fixed 16-byte file-id shape they all embed is shared here.

use binrw::prelude::*;

use crate::{Result, SmbMsgError};

/// The 16-byte composite file identifier embedded in most per-file SMB2
/// command bodies (MS-SMB2 2.2.14.1 `SMB2_FILEID`).
pub type FileId = [u8; 16];

pub const FILE_ID_ZERO: FileId = [0u8; 16];

/// FLUSH request: fixed 24 bytes.
///
/// Reference: MS-SMB2 2.2.17.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushRequest {
    pub file_id: FileId,
}

impl FlushRequest {
    pub const SIZE: usize = 24;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::SIZE,
                actual: body.len(),
            });
        }
        // structure_size(2) + reserved1(2) + reserved2(4) + file_id(16) = 24
        let mut file_id = [0u8; 16];
        file_id.copy_from_slice(&body[8..24]);
        Ok(FlushRequest { file_id })
    }
}

/// FLUSH response: fixed 4 bytes.
///
/// Reference: MS-SMB2 2.2.18.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushResponse;

impl FlushResponse {
    pub fn encode(&self) -> Vec<u8> {
        vec![4, 0, 0, 0]
    }
}
