//! ECHO request/response: symmetric 4-byte minimal structures (MS-SMB2
//! 2.2.28/2.2.29), accepted in any connection state as a liveness check.

use crate::{Result, SmbMsgError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoRequest;

impl EchoRequest {
    pub const SIZE: usize = 4;

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::SIZE {
            return Err(SmbMsgError::BodyTooShort {
                min: Self::SIZE,
                actual: body.len(),
            });
        }
        Ok(EchoRequest)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoResponse;

impl EchoResponse {
    pub fn encode(&self) -> Vec<u8> {
        vec![4, 0, 0, 0]
    }
}
