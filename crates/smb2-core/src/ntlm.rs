//! NTLM message parsing and challenge construction (spec.md §4.4).
//!
//! Hand-written byte-level parsing rather than a derive-based codec: NTLM's
//! messages are self-describing via offset/length pairs into a shared
//! payload area, a shape that doesn't fit `binrw`'s fixed-position model any
//! better than it fits a struct derive, so this follows the established
//! precedent elsewhere in this codebase of writing `BinRead`/`BinWrite`
//! impls by hand for awkward shapes -- just without even the trait, since
//! nothing downstream needs `binrw::Read`/`Write` for these.

use rand::RngCore;

pub const NTLM_SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NtlmMessageType {
    Negotiate = 1,
    Challenge = 2,
    Authenticate = 3,
}

/// Classifies a candidate NTLM buffer's header, per spec.md §4.4: the first
/// 8 bytes must be the literal `NTLMSSP\0` signature, and bytes [8..12) LE
/// are the message type.
pub fn classify(buf: &[u8]) -> Option<NtlmMessageType> {
    if buf.len() < 12 || &buf[0..8] != NTLM_SIGNATURE {
        return None;
    }
    match u32::from_le_bytes(buf[8..12].try_into().unwrap()) {
        1 => Some(NtlmMessageType::Negotiate),
        2 => Some(NtlmMessageType::Challenge),
        3 => Some(NtlmMessageType::Authenticate),
        _ => None,
    }
}

/// A reasonable set of NTLM negotiate flags for a guest-capable server:
/// unicode, OEM, request target, NTLM, always sign, target-type server.
const DEFAULT_SERVER_FLAGS: u32 = 0x0000_8201 | 0x0000_0010 | 0x0000_0002;

/// Builds a minimal, valid NTLM Type 2 (CHALLENGE) message carrying the
/// given 8-byte server challenge. Target name and target info are left
/// empty, which is valid for guest-only operation per spec.md §4.4.
pub fn build_challenge(server_challenge: [u8; 8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(48);
    msg.extend_from_slice(NTLM_SIGNATURE);
    msg.extend_from_slice(&2u32.to_le_bytes());
    // target name fields: len=0, maxlen=0, offset=48 (end of fixed header)
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&48u32.to_le_bytes());
    msg.extend_from_slice(&DEFAULT_SERVER_FLAGS.to_le_bytes());
    msg.extend_from_slice(&server_challenge);
    msg.extend_from_slice(&[0u8; 8]); // reserved
    // target info fields: len=0, maxlen=0, offset=48
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&48u32.to_le_bytes());
    debug_assert_eq!(msg.len(), 48);
    msg
}

/// Generates a fresh random 8-byte server challenge.
pub fn random_challenge() -> [u8; 8] {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Best-effort extraction of domain/username from an Authenticate (Type 3)
/// message, for display/logging purposes only -- the default
/// [`crate::auth::GuestVerifier`] does not depend on these being present or
/// correct. Returns `None` for either field if the offsets are out of
/// bounds or the buffer is too short to contain the fixed header.
pub fn parse_authenticate_identity(buf: &[u8]) -> (Option<String>, Option<String>) {
    const FIXED_HEADER_LEN: usize = 64;
    if buf.len() < FIXED_HEADER_LEN {
        return (None, None);
    }
    let domain = read_payload_field(buf, 28);
    let user = read_payload_field(buf, 36);
    (domain, user)
}

/// Reads a (len@+0, maxlen@+2, offset@+4) field triple starting at
/// `field_offset` within `buf`, and decodes the referenced payload bytes as
/// UTF-16LE.
fn read_payload_field(buf: &[u8], field_offset: usize) -> Option<String> {
    let len = u16::from_le_bytes(buf.get(field_offset..field_offset + 2)?.try_into().ok()?);
    let offset = u32::from_le_bytes(
        buf.get(field_offset + 4..field_offset + 8)?
            .try_into()
            .ok()?,
    ) as usize;
    if len == 0 {
        return Some(String::new());
    }
    let end = offset.checked_add(len as usize)?;
    let raw = buf.get(offset..end)?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Some(String::from_utf16_lossy(&units))
}
