//! Base64 helpers for JWK members and certificate entries.

use base64ct::{Base64, Base64UrlUnpadded, Encoding};

use crate::error::JwkError;

/// Encodes raw bytes the way JWK binary members are written (unpadded base64url).
pub fn encode(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

/// Decodes a base64url JWK member, naming the member on failure.
///
/// Trailing padding is tolerated.
pub(crate) fn decode(member: &'static str, value: &str) -> Result<Vec<u8>, JwkError> {
    Base64UrlUnpadded::decode_vec(value.trim_end_matches('=')).map_err(|_| {
        tracing::debug!(member, "member is not valid base64url");
        JwkError::InvalidParameter(member)
    })
}

/// Decodes a standard (padded) base64 DER entry, as used by `x5c`.
pub(crate) fn decode_der(value: &str) -> Result<Vec<u8>, base64ct::Error> {
    Base64::decode_vec(value)
}
