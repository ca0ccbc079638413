//! SESSION_SETUP and LOGOFF request/response bodies (MS-SMB2 2.2.5-2.2.8).

use binrw::prelude::*;

use crate::{Result, SmbMsgError};

/// SESSION_SETUP request flag: client is re-establishing a connection for an
/// existing session (`previous_session_id` identifies it). Parsed but not
/// acted on; see the open question in the design notes.
pub const SESSION_FLAG_BINDING: u8 = 0x01;

/// `SessionFlags` bit set in the SESSION_SETUP response.
pub const SESSION_FLAG_IS_GUEST: u16 = 0x0001;
pub const SESSION_FLAG_IS_NULL: u16 = 0x0002;

/// SESSION_SETUP request: 25 bytes fixed + a variable security buffer.
///
/// Reference: MS-SMB2 2.2.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetupRequest {
    pub flags: u8,
    pub security_mode: u8,
    pub capabilities: u32,
    pub channel: u32,
    pub previous_session_id: u64,
    pub security_buffer: Vec<u8>,
}

impl SessionSetupRequest {
    pub const MIN_SIZE: usize = 25;

    /// Decodes a SESSION_SETUP request body. `security_buffer_offset` is
    /// relative to the start of the SMB2 header (64 bytes before the body);
    /// when the buffer is absent the offset is clamped up to the fixed
    /// 24-byte mark so the computed body-relative start never underflows.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::MIN_SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::MIN_SIZE,
                actual: body.len(),
            });
        }
        let mut cursor = std::io::Cursor::new(body);
        let _structure_size = u16::read_le(&mut cursor)?;
        let flags = u8::read_le(&mut cursor)?;
        let security_mode = u8::read_le(&mut cursor)?;
        let capabilities = u32::read_le(&mut cursor)?;
        let channel = u32::read_le(&mut cursor)?;
        let security_buffer_offset = u16::read_le(&mut cursor)?;
        let security_buffer_length = u16::read_le(&mut cursor)?;
        let previous_session_id = u64::read_le(&mut cursor)?;

        let security_buffer = if security_buffer_length == 0 {
            Vec::new()
        } else {
            const HEADER_SIZE: usize = 64;
            let body_relative_start = (security_buffer_offset as usize)
                .checked_sub(HEADER_SIZE)
                .unwrap_or(24);
            let end = body_relative_start
                .checked_add(security_buffer_length as usize)
                .ok_or(SmbMsgError::SecurityBufferOutOfBounds)?;
            body.get(body_relative_start..end)
                .ok_or(SmbMsgError::SecurityBufferOutOfBounds)?
                .to_vec()
        };

        Ok(SessionSetupRequest {
            flags,
            security_mode,
            capabilities,
            channel,
            previous_session_id,
            security_buffer,
        })
    }
}

/// SESSION_SETUP response: 8 bytes fixed + a variable security buffer.
///
/// Reference: MS-SMB2 2.2.6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetupResponse {
    pub session_flags: u16,
    pub security_buffer: Vec<u8>,
}

impl SessionSetupResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        9u16.write_le(&mut cursor).unwrap();
        self.session_flags.write_le(&mut cursor).unwrap();
        let offset: u16 = if self.security_buffer.is_empty() {
            0
        } else {
            64 + 8
        };
        offset.write_le(&mut cursor).unwrap();
        (self.security_buffer.len() as u16)
            .write_le(&mut cursor)
            .unwrap();
        drop(cursor);
        buf.extend_from_slice(&self.security_buffer);
        buf
    }
}

/// LOGOFF request/response: symmetric 4-byte minimal structures.
///
/// Reference: MS-SMB2 2.2.7/2.2.8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogoffRequest;

impl LogoffRequest {
    pub const SIZE: usize = 4;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::SIZE,
                actual: body.len(),
            });
        }
        Ok(LogoffRequest)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogoffResponse;

impl LogoffResponse {
    pub fn encode(&self) -> Vec<u8> {
        vec![4, 0, 0, 0]
    }
}
