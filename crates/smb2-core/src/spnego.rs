//! Minimal SPNEGO (RFC 4178) token unwrapping (spec.md §4.4).
//!
//! Only enough ASN.1/DER structure is parsed to tell a `negTokenInit` from a
//! `negTokenResp` and to pull out an embedded NTLM `mechToken`/`responseToken`
//! octet string -- this core is not a general GSS-API implementation, and
//! nothing here attempts to validate the mechanism list against a trust
//! policy. Bare (unwrapped) NTLM buffers are also accepted directly, per
//! spec.md §4.4's "SPNEGO-wrapped or bare" requirement.

/// The NTLMSSP mechanism OID, 1.3.6.1.4.1.311.2.2.10, DER-encoded.
const NTLMSSP_OID: [u8; 10] = [0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpnegoTokenKind {
    NegTokenInit,
    NegTokenResp,
}

/// Classifies and unwraps a security buffer into its underlying NTLM token,
/// per spec.md §4.4: SPNEGO markers are `0x60` (GSS-API wrapper, negTokenInit)
/// or `0xA0`/`0xA1` (negTokenInit/negTokenResp context tags); anything else
/// is tried as bare NTLM.
pub fn unwrap_security_buffer(buf: &[u8]) -> Option<Vec<u8>> {
    if buf.is_empty() {
        return None;
    }
    match buf[0] {
        0x60 => unwrap_neg_token_init(buf),
        0xa0 | 0xa1 => unwrap_neg_token(buf),
        _ => {
            // Not a recognized SPNEGO marker; treat as a bare NTLM message.
            Some(buf.to_vec())
        }
    }
}

fn unwrap_neg_token_init(buf: &[u8]) -> Option<Vec<u8>> {
    // GSS-API wrapper: [0x60][len][OID: SPNEGO][negTokenInit ::= SEQUENCE].
    // We don't validate the outer OID; we scan for the NTLMSSP mechToken.
    find_ntlm_in(buf)
}

fn unwrap_neg_token(buf: &[u8]) -> Option<Vec<u8>> {
    find_ntlm_in(buf)
}

/// Scans `buf` for an embedded `NTLMSSP\0` signature and returns the tail
/// from that point on, which is the simplest correct way to extract an
/// embedded `mechToken`/`responseToken` octet string without a full DER
/// parser: SPNEGO never produces a false-positive match of that signature
/// inside its own tag/length bytes, since those bytes never spell it out.
fn find_ntlm_in(buf: &[u8]) -> Option<Vec<u8>> {
    const SIG: &[u8; 8] = crate::ntlm::NTLM_SIGNATURE;
    buf.windows(SIG.len())
        .position(|w| w == SIG)
        .map(|pos| buf[pos..].to_vec())
}

/// Classifies a raw security buffer as SPNEGO (and which token kind) or
/// bare-NTLM, independent of unwrapping. Used only for logging/diagnostics.
pub fn classify(buf: &[u8]) -> Option<SpnegoTokenKind> {
    match buf.first()? {
        0x60 => Some(SpnegoTokenKind::NegTokenInit),
        0xa0 => Some(SpnegoTokenKind::NegTokenInit),
        0xa1 => Some(SpnegoTokenKind::NegTokenResp),
        _ => None,
    }
}

/// Builds a minimal `negTokenResp` wrapping an NTLM message, tagged
/// `accept-incomplete` (0x01) or `accept-completed` (0x00) per `complete`.
/// This is a deliberately loose DER-ish envelope: this core's clients are
/// expected to extract the embedded NTLM token the same way
/// [`unwrap_security_buffer`] does, not to run a conformant ASN.1 decoder.
pub fn wrap_neg_token_resp(ntlm_token: &[u8], complete: bool) -> Vec<u8> {
    let neg_state: u8 = if complete { 0x00 } else { 0x01 };
    let mut inner = Vec::new();
    inner.push(0x0a); // ENUMERATED
    inner.push(0x01);
    inner.push(neg_state);
    inner.push(0x04); // OCTET STRING (responseToken)
    inner.extend_from_slice(&(ntlm_token.len() as u8).to_be_bytes());
    inner.extend_from_slice(ntlm_token);

    let mut resp = Vec::new();
    resp.push(0xa1); // negTokenResp context tag
    resp.extend_from_slice(&(inner.len() as u8).to_be_bytes());
    resp.extend_from_slice(&inner);
    resp
}
