//! JSON Web Keys (RFC 7517) and JWK Sets, validated on construction.
//!
//! A [`Jwk`] is built from raw JSON parameters and either satisfies every
//! rule of its key type or is rejected with the first violated one. Keys can
//! be identified by their RFC 7638 thumbprint and bound to an X.509
//! certificate chain given inline (`x5c`) or by reference (`x5u`).
//!
//! ## Submodules
//!
//! - [`error`]: error types for keys, key sets and certificate chains.
//! - [`prm`]:   parameters shared by every key type.
//! - [`key`]:   key variants and the derived key handles.
//! - [`jwk`]:   the validated key, its thumbprint and serialization.
//! - [`jwks`]:  key sets with unique key identifiers.
//! - [`x509`]:  certificate chain checks and `x5u` retrieval.

pub mod bytes;
pub mod ec;
pub mod error;
pub mod jwk;
pub mod jwks;
pub mod key;
pub mod oct;
pub mod okp;
pub mod prm;
pub mod rsa;
pub mod secret;
pub mod x509;

pub use ec::{Ec, EcCurve};
pub use error::{CertificateError, FetchError, JwkError, JwksError};
pub use jwk::{DigestAlgorithm, Jwk, ValidationOptions};
pub use jwks::JwkSet;
pub use key::{JwkKind, KeyHandle, KeyParams, KeyVisibility};
pub use oct::Oct;
pub use okp::{Okp, OkpCurve};
pub use prm::{JwkParams, KeyOperation, KeyType, KeyUse};
pub use crate::rsa::{Rsa, RsaPrivate};
pub use secret::Secret;
pub use x509::{
    fetch::{CertificateFetcher, HttpCertificateFetcher},
    CertificateChain,
};
