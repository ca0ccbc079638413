//! NEGOTIATE request/response (MS-SMB2 2.2.3/2.2.4).
//!
//! This core supports exactly one dialect, SMB 2.0.2 (0x0202); dialect
//! negotiation has no capability bits, security buffer, or negotiate
//! contexts to produce (those are SMB 3.x-family features, out of scope).

use binrw::io::{Seek, SeekFrom};
use binrw::prelude::*;
use smb2_dtyp::{FileTime, Guid};

use crate::{Result, SmbMsgError};

/// The dialect this server negotiates. SMB 2.0.2 is the only supported
/// member of the set (MS-SMB2 2.2.3); the 0x02FF "wildcard" a client may
/// offer to probe for dialect negotiation is treated as equivalent to it.
pub const DIALECT_SMB_0202: u16 = 0x0202;
pub const DIALECT_WILDCARD: u16 = 0x02FF;

/// NEGOTIATE request. Variable-length (dialect list); minimum 36 bytes.
///
/// Reference: MS-SMB2 2.2.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiateRequest {
    pub security_mode: u16,
    pub capabilities: u32,
    pub client_guid: Guid,
    pub dialects: Vec<u16>,
}

impl NegotiateRequest {
    pub const MIN_SIZE: usize = 36;

    /// Decodes a NEGOTIATE request body (the bytes following the SMB2
    /// header). Bodies shorter than [`Self::MIN_SIZE`] are rejected per the
    /// wire codec's short-body rule.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::MIN_SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::MIN_SIZE,
                actual: body.len(),
            });
        }
        let mut cursor = std::io::Cursor::new(body);
        let _structure_size = u16::read_le(&mut cursor)?;
        let dialect_count = u16::read_le(&mut cursor)?;
        let security_mode = u16::read_le(&mut cursor)?;
        let _reserved = u16::read_le(&mut cursor)?;
        let capabilities = u32::read_le(&mut cursor)?;
        let client_guid = Guid::read_le(&mut cursor)?;
        let _negotiate_context_offset = u32::read_le(&mut cursor)?;
        let _negotiate_context_count = u16::read_le(&mut cursor)?;
        let _reserved2 = u16::read_le(&mut cursor)?;

        let mut dialects = Vec::with_capacity(dialect_count as usize);
        for _ in 0..dialect_count {
            dialects.push(u16::read_le(&mut cursor)?);
        }

        Ok(NegotiateRequest {
            security_mode,
            capabilities,
            client_guid,
            dialects,
        })
    }
}

/// NEGOTIATE response. Fixed 65 bytes (64 fixed fields + one buffer-start
/// padding byte, since `security_buffer_length` is always 0 here).
///
/// Reference: MS-SMB2 2.2.4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiateResponse {
    pub dialect_revision: u16,
    pub server_guid: Guid,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub system_time: FileTime,
    pub server_start_time: FileTime,
}

impl NegotiateResponse {
    pub const SIZE: usize = 65;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        let mut cursor = std::io::Cursor::new(&mut buf);
        65u16.write_le(&mut cursor).unwrap();
        0u16.write_le(&mut cursor).unwrap(); // security_mode
        self.dialect_revision.write_le(&mut cursor).unwrap();
        0u16.write_le(&mut cursor).unwrap(); // negotiate_context_count/reserved
        self.server_guid.write_le(&mut cursor).unwrap();
        0u32.write_le(&mut cursor).unwrap(); // capabilities
        self.max_transact_size.write_le(&mut cursor).unwrap();
        self.max_read_size.write_le(&mut cursor).unwrap();
        self.max_write_size.write_le(&mut cursor).unwrap();
        self.system_time.write_le(&mut cursor).unwrap();
        self.server_start_time.write_le(&mut cursor).unwrap();
        0u16.write_le(&mut cursor).unwrap(); // security_buffer_offset
        0u16.write_le(&mut cursor).unwrap(); // security_buffer_length
        0u32.write_le(&mut cursor).unwrap(); // negotiate_context_offset/reserved2
        0u8.write_le(&mut cursor).unwrap(); // buffer placeholder byte
        debug_assert_eq!(cursor.stream_position().unwrap() as usize, Self::SIZE);
        buf
    }
}

/// Selects the highest dialect common to the client's offer and this
/// server's supported set (`{0x0202}`), treating the wildcard as 0x0202.
/// Returns `None` if there is no match.
pub fn select_dialect(offered: &[u16]) -> Option<u16> {
    if offered
        .iter()
        .any(|&d| d == DIALECT_SMB_0202 || d == DIALECT_WILDCARD)
    {
        Some(DIALECT_SMB_0202)
    } else {
        None
    }
}
