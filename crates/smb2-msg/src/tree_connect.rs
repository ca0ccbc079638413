//! TREE_CONNECT/TREE_DISCONNECT request/response bodies (MS-SMB2 2.2.9-2.2.12).
//!
//! The DFS/extended tree-connect-context variant (MS-SMB2 2.2.9.1) is out of
//! scope; only the base request shape is decoded.

use binrw::prelude::*;

use crate::{Result, SmbMsgError};

/// TREE_CONNECT request: 8 fixed bytes (structure_size reported as 9, per
/// convention, to account for the minimum 1-byte buffer placeholder) plus a
/// UTF-16LE share path buffer.
///
/// Reference: MS-SMB2 2.2.9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConnectRequest {
    pub flags: u16,
    pub path: String,
}

impl TreeConnectRequest {
    pub const MIN_SIZE: usize = 9;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::MIN_SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::MIN_SIZE,
                actual: body.len(),
            });
        }
        let mut cursor = std::io::Cursor::new(body);
        let _structure_size = u16::read_le(&mut cursor)?;
        let flags = u16::read_le(&mut cursor)?;
        let path_offset = u16::read_le(&mut cursor)?;
        let path_length = u16::read_le(&mut cursor)?;

        const HEADER_SIZE: usize = 64;
        let body_relative_start = (path_offset as usize)
            .checked_sub(HEADER_SIZE)
            .unwrap_or(8);
        let end = body_relative_start
            .checked_add(path_length as usize)
            .ok_or(SmbMsgError::SecurityBufferOutOfBounds)?;
        let raw = body
            .get(body_relative_start..end)
            .ok_or(SmbMsgError::SecurityBufferOutOfBounds)?;

        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let path = String::from_utf16_lossy(&units);

        Ok(TreeConnectRequest { flags, path })
    }
}

/// Type of share a TREE_CONNECT binds to (MS-SMB2 2.2.10 ShareType).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareType {
    Disk,
    Pipe,
    Print,
}

impl ShareType {
    fn wire_value(self) -> u8 {
        match self {
            ShareType::Disk => 0x1,
            ShareType::Pipe => 0x2,
            ShareType::Print => 0x3,
        }
    }
}

/// TREE_CONNECT response. Fixed 16 bytes.
///
/// Reference: MS-SMB2 2.2.10.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConnectResponse {
    pub share_type: ShareType,
    pub share_flags: u32,
    pub capabilities: u32,
    pub maximal_access: u32,
}

impl TreeConnectResponse {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        let mut cursor = std::io::Cursor::new(&mut buf);
        16u16.write_le(&mut cursor).unwrap();
        self.share_type.wire_value().write_le(&mut cursor).unwrap();
        0u8.write_le(&mut cursor).unwrap(); // reserved
        self.share_flags.write_le(&mut cursor).unwrap();
        self.capabilities.write_le(&mut cursor).unwrap();
        self.maximal_access.write_le(&mut cursor).unwrap();
        buf
    }
}

/// TREE_DISCONNECT request/response: symmetric 4-byte minimal structures,
/// same shape as LOGOFF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeDisconnectRequest;

impl TreeDisconnectRequest {
    pub const SIZE: usize = 4;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::SIZE,
                actual: body.len(),
            });
        }
        Ok(TreeDisconnectRequest)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeDisconnectResponse;

impl TreeDisconnectResponse {
    pub fn encode(&self) -> Vec<u8> {
        vec![4, 0, 0, 0]
    }
}
