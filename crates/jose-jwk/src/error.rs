use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

use crate::prm::KeyType;

/// Errors raised while constructing a [`Jwk`](crate::Jwk).
///
/// Construction is fail-fast: the first violated rule is reported and no
/// further checks run. Every message names the offending member or rule.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum JwkError {
    /// The parameters are not a JSON object.
    #[error("Invalid parameter \"params\".")]
    InvalidParams,

    /// The `kty` member does not match the requested key variant.
    #[error("Invalid jwk parameter \"kty\". Expected \"{expected}\", got \"{found}\".")]
    UnexpectedKeyType { expected: KeyType, found: String },

    /// A single member has the wrong type, a disallowed value or an invalid encoding.
    #[error("Invalid jwk parameter \"{0}\".")]
    InvalidParameter(&'static str),

    #[error("The jwk parameter \"key_ops\" cannot have repeated operations.")]
    RepeatedKeyOperations,

    #[error("Invalid combination of \"use\" and \"key_ops\".")]
    IncompatibleUseAndKeyOps,

    #[error("Cannot have a certificate thumbprint without a certificate chain.")]
    ThumbprintWithoutCertificateChain,

    #[error("Cannot have both \"x5u\" and \"x5c\" jwk parameters.")]
    ConflictingCertificateSources,

    /// The validated members do not form usable key material.
    #[error("Invalid key material for jwk parameter \"{parameter}\": {reason}")]
    KeyMaterial { parameter: &'static str, reason: String },

    /// The required members could not be serialized to canonical JSON.
    #[error("Cannot canonicalize the jwk members: {0}")]
    Canonicalization(#[source] serde_json::Error),

    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

impl JwkError {
    pub(crate) fn key_material(parameter: &'static str, reason: impl ToString) -> Self {
        JwkError::KeyMaterial {
            parameter,
            reason: reason.to_string(),
        }
    }
}

/// Failures of the X.509 certificate chain bound to a JWK.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CertificateError {
    /// At least one chain entry could not be decoded. Individual failures are not enumerated.
    #[error("One or more certificates are invalid.")]
    Malformed,

    #[error("One or more certificates are not yet valid.")]
    NotYetValid,

    #[error("One or more certificates are expired.")]
    Expired,

    #[error("The provided certificate does not match the jwk.")]
    KeyMismatch,

    #[error("Invalid certificate chain.")]
    InvalidChain,

    #[error("Mismatching certificate sha-1 thumbprint.")]
    Sha1ThumbprintMismatch,

    #[error("Mismatching certificate sha-256 thumbprint.")]
    Sha256ThumbprintMismatch,

    /// The `x5u` resource did not contain any PEM certificate, or its scheme cannot be fetched.
    #[error("Invalid X.509 URL.")]
    InvalidUrl,

    #[error("Error reading the certificate chain from the url.")]
    Fetch(#[source] FetchError),
}

/// Transport level failures of the `x5u` retrieval.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),
    #[error("HTTP client error: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),
    #[error("Error reading response body: {0}")]
    Body(#[from] hyper::Error),
    #[error("Non-success server response: {0}")]
    NonSuccessResponse(StatusCode),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid encoding: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Unable to start the fetch runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("The fetch worker terminated unexpectedly")]
    WorkerPanicked,
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by [`JwkSet`](crate::JwkSet) construction and lookup.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum JwksError {
    /// The key sequence is empty or not an array of JWK objects.
    #[error("Invalid parameter \"keys\".")]
    InvalidKeys,

    #[error("The use of duplicate key identifiers is forbidden.")]
    DuplicateKeyIdentifier(String),

    #[error("No JWK matches the criteria at the JWK Set.")]
    NotFound,

    #[error(transparent)]
    Jwk(#[from] JwkError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_name_the_offending_member() {
        assert_eq!(
            JwkError::InvalidParameter("kid").to_string(),
            r#"Invalid jwk parameter "kid"."#
        );
        assert_eq!(
            JwkError::UnexpectedKeyType {
                expected: KeyType::Oct,
                found: "RSA".to_string()
            }
            .to_string(),
            r#"Invalid jwk parameter "kty". Expected "oct", got "RSA"."#
        );
    }

    #[test]
    fn default_messages() {
        assert_eq!(JwksError::InvalidKeys.to_string(), r#"Invalid parameter "keys"."#);
        assert_eq!(JwksError::NotFound.to_string(), "No JWK matches the criteria at the JWK Set.");
        assert_eq!(
            JwksError::DuplicateKeyIdentifier("a".to_string()).to_string(),
            "The use of duplicate key identifiers is forbidden."
        );
    }

    #[test]
    fn fetch_failure_keeps_its_cause() {
        let err: JwkError =
            CertificateError::Fetch(FetchError::NonSuccessResponse(StatusCode::NOT_FOUND)).into();

        assert_eq!(err.to_string(), "Error reading the certificate chain from the url.");
        let cause = err.source().map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("Non-success server response: 404 Not Found"));
    }
}
