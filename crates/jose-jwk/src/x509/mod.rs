//! X.509 certificate chains bound to a JWK through `x5c` or `x5u`.
//!
//! Only the checks needed to accept the binding are performed: decoding,
//! validity windows, leaf key equality and direct pairwise issuance. This is
//! not RFC 5280 path validation (no policies, name constraints or revocation).

pub mod fetch;

use std::time::Duration;

use chrono::{DateTime, Utc};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::{
    pkcs1::{DecodeRsaPublicKey, RsaPssParams},
    Pkcs1v15Sign, Pss, RsaPublicKey,
};
use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::{
    der::{asn1::ObjectIdentifier, Decode, Encode},
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
    Certificate,
};

use crate::{
    bytes,
    ec::EcCurve,
    error::CertificateError,
    jwk::{DigestAlgorithm, ValidationOptions},
    okp::OkpCurve,
    prm::JwkParams,
};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const MGF1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.8");

const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

const PSS_DIGESTS: [(ObjectIdentifier, DigestAlgorithm); 4] = [
    (ObjectIdentifier::new_unwrap("1.3.14.3.2.26"), DigestAlgorithm::Sha1),
    (ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"), DigestAlgorithm::Sha256),
    (ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"), DigestAlgorithm::Sha384),
    (ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"), DigestAlgorithm::Sha512),
];

const NAMED_CURVES: [(ObjectIdentifier, EcCurve); 3] = [
    (ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7"), EcCurve::P256),
    (ObjectIdentifier::new_unwrap("1.3.132.0.34"), EcCurve::P384),
    (ObjectIdentifier::new_unwrap("1.3.132.0.35"), EcCurve::P521),
];

const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const CFRG_CURVES: [(ObjectIdentifier, OkpCurve); 4] = [
    (ObjectIdentifier::new_unwrap("1.3.101.110"), OkpCurve::X25519),
    (ObjectIdentifier::new_unwrap("1.3.101.111"), OkpCurve::X448),
    (ED25519, OkpCurve::Ed25519),
    (ObjectIdentifier::new_unwrap("1.3.101.113"), OkpCurve::Ed448),
];

#[derive(Clone, Copy, Debug)]
enum SignatureAlgorithm {
    RsaPkcs1(DigestAlgorithm),
    /// Digest and salt length are carried by the algorithm parameters.
    RsaPss,
    Ecdsa(DigestAlgorithm),
    Ed25519,
}

impl SignatureAlgorithm {
    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            (SHA256_WITH_RSA, SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256)),
            (SHA384_WITH_RSA, SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha384)),
            (SHA512_WITH_RSA, SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha512)),
            (RSASSA_PSS, SignatureAlgorithm::RsaPss),
            (ECDSA_WITH_SHA256, SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256)),
            (ECDSA_WITH_SHA384, SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha384)),
            (ECDSA_WITH_SHA512, SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha512)),
            (ED25519, SignatureAlgorithm::Ed25519),
        ]
        .into_iter()
        .find(|(known, _)| known == oid)
        .map(|(_, algorithm)| algorithm)
    }
}

/// A decoded certificate chain, leaf first.
#[derive(Clone, Debug)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
    ders: Vec<Vec<u8>>,
}

impl CertificateChain {
    /// Decodes standard base64 DER entries, as carried by `x5c`.
    ///
    /// Any undecodable entry fails the whole chain.
    pub fn from_base64<S: AsRef<str>>(entries: &[S]) -> Result<Self, CertificateError> {
        if entries.is_empty() {
            return Err(CertificateError::Malformed);
        }

        let mut certificates = Vec::with_capacity(entries.len());
        let mut ders = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let certificate = bytes::decode_der(entry.as_ref()).ok().and_then(|der| {
                let certificate = Certificate::from_der(&der).ok()?;
                Some((certificate, der))
            });

            let Some((certificate, der)) = certificate else {
                tracing::debug!(index, "undecodable certificate in chain");
                return Err(CertificateError::Malformed);
            };

            certificates.push(certificate);
            ders.push(der);
        }

        Ok(Self { certificates, ders })
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    fn leaf_der(&self) -> &[u8] {
        self.ders.first().map(Vec::as_slice).unwrap_or_default()
    }

    /// Runs the validity window, key binding and issuance checks, in that order.
    pub fn validate(
        &self,
        jwk: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<(), CertificateError> {
        self.check_validity(now)?;
        self.check_binding(jwk)?;
        self.check_issuance()
    }

    /// Fails when `now` lies outside the validity window of any certificate.
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<(), CertificateError> {
        let seconds = u64::try_from(now.timestamp()).unwrap_or_default();
        let now = Duration::new(seconds, now.timestamp_subsec_nanos());

        let windows: Vec<_> = self
            .certificates
            .iter()
            .map(|certificate| {
                let validity = &certificate.tbs_certificate.validity;
                (validity.not_before.to_unix_duration(), validity.not_after.to_unix_duration())
            })
            .collect();

        if windows.iter().any(|(not_before, _)| now < *not_before) {
            return Err(CertificateError::NotYetValid);
        }

        if windows.iter().any(|(_, not_after)| now >= *not_after) {
            return Err(CertificateError::Expired);
        }

        Ok(())
    }

    /// Compares the leaf public key, in JWK form, member by member with `jwk`.
    pub fn check_binding(&self, jwk: &Map<String, Value>) -> Result<(), CertificateError> {
        let leaf = self
            .certificates
            .first()
            .and_then(|leaf| public_key_to_jwk(&leaf.tbs_certificate.subject_public_key_info));

        match leaf {
            Some(leaf) if leaf.iter().all(|(name, value)| jwk.get(name) == Some(value)) => Ok(()),
            _ => Err(CertificateError::KeyMismatch),
        }
    }

    /// Verifies that every certificate is signed by the key of the next one.
    pub fn check_issuance(&self) -> Result<(), CertificateError> {
        for (index, pair) in self.certificates.windows(2).enumerate() {
            if let [subject, issuer] = pair {
                if !is_issued_by(subject, issuer) {
                    tracing::debug!(index, "certificate is not signed by the next one");
                    return Err(CertificateError::InvalidChain);
                }
            }
        }

        Ok(())
    }

    /// Compares `x5t` and `x5t#S256` with the digests of the leaf certificate.
    pub fn check_thumbprints(
        &self,
        x5t: Option<&str>,
        x5t_s256: Option<&str>,
    ) -> Result<(), CertificateError> {
        if x5t.is_some_and(|x5t| x5t != self.thumbprint(DigestAlgorithm::Sha1)) {
            return Err(CertificateError::Sha1ThumbprintMismatch);
        }

        if x5t_s256.is_some_and(|x5t_s256| x5t_s256 != self.thumbprint(DigestAlgorithm::Sha256)) {
            return Err(CertificateError::Sha256ThumbprintMismatch);
        }

        Ok(())
    }

    /// Base64url digest of the leaf certificate DER, the format of `x5t` and `x5t#S256`.
    pub fn thumbprint(&self, algorithm: DigestAlgorithm) -> String {
        bytes::encode(&algorithm.digest(self.leaf_der()))
    }
}

/// Produces the certificate chain referenced by the JWK, if any.
///
/// An `x5u` chain is fully retrieved before this returns.
pub(crate) fn resolve(
    params: &JwkParams,
    options: &ValidationOptions,
) -> Result<Option<CertificateChain>, CertificateError> {
    if let Some(x5c) = &params.x5c {
        return CertificateChain::from_base64(x5c).map(Some);
    }

    if let Some(x5u) = &params.x5u {
        let entries = fetch::fetch_chain(options.fetcher(), x5u)?;
        return CertificateChain::from_base64(&entries).map(Some);
    }

    Ok(None)
}

/// Converts a subject public key to its JWK members, `kty` included.
pub fn public_key_to_jwk(spki: &SubjectPublicKeyInfoOwned) -> Option<Map<String, Value>> {
    let key = spki.subject_public_key.as_bytes()?;
    let mut jwk = Map::new();

    if spki.algorithm.oid == RSA_ENCRYPTION || spki.algorithm.oid == RSASSA_PSS {
        let key = rsa::pkcs1::RsaPublicKey::from_der(key).ok()?;

        jwk.insert("kty".into(), "RSA".into());
        jwk.insert("n".into(), bytes::encode(key.modulus.as_bytes()).into());
        jwk.insert("e".into(), bytes::encode(key.public_exponent.as_bytes()).into());
    } else if spki.algorithm.oid == EC_PUBLIC_KEY {
        let crv = named_curve(spki)?;
        let size = crv.field_size();

        let (&tag, point) = key.split_first()?;
        if tag != 0x04 || point.len() != 2 * size {
            return None;
        }
        let (x, y) = point.split_at(size);

        jwk.insert("kty".into(), "EC".into());
        jwk.insert("crv".into(), crv.as_str().into());
        jwk.insert("x".into(), bytes::encode(x).into());
        jwk.insert("y".into(), bytes::encode(y).into());
    } else {
        let (_, crv) = CFRG_CURVES.into_iter().find(|(oid, _)| *oid == spki.algorithm.oid)?;

        jwk.insert("kty".into(), "OKP".into());
        jwk.insert("crv".into(), crv.as_str().into());
        jwk.insert("x".into(), bytes::encode(key).into());
    }

    Some(jwk)
}

fn named_curve(spki: &SubjectPublicKeyInfoOwned) -> Option<EcCurve> {
    let parameters = spki.algorithm.parameters.as_ref()?.to_der().ok()?;
    let oid = ObjectIdentifier::from_der(&parameters).ok()?;

    NAMED_CURVES.into_iter().find(|(known, _)| *known == oid).map(|(_, crv)| crv)
}

fn is_issued_by(subject: &Certificate, issuer: &Certificate) -> bool {
    let Ok(message) = subject.tbs_certificate.to_der() else {
        return false;
    };

    let Some(signature) = subject.signature.as_bytes() else {
        return false;
    };

    let spki = &issuer.tbs_certificate.subject_public_key_info;

    match SignatureAlgorithm::from_oid(&subject.signature_algorithm.oid) {
        Some(SignatureAlgorithm::RsaPkcs1(digest)) => {
            verify_rsa_pkcs1(spki, digest, &message, signature)
        }
        Some(SignatureAlgorithm::RsaPss) => {
            verify_rsa_pss(spki, &subject.signature_algorithm, &message, signature)
        }
        Some(SignatureAlgorithm::Ecdsa(digest)) => verify_ecdsa(spki, digest, &message, signature),
        Some(SignatureAlgorithm::Ed25519) => verify_ed25519(spki, &message, signature),
        None => {
            tracing::debug!(
                oid = %subject.signature_algorithm.oid,
                "unsupported certificate signature algorithm"
            );
            false
        }
    }
}

fn rsa_public_key(spki: &SubjectPublicKeyInfoOwned) -> Option<RsaPublicKey> {
    let key = spki.subject_public_key.as_bytes()?;
    RsaPublicKey::from_pkcs1_der(key).ok()
}

fn verify_rsa_pkcs1(
    spki: &SubjectPublicKeyInfoOwned,
    digest: DigestAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> bool {
    if spki.algorithm.oid != RSA_ENCRYPTION {
        return false;
    }

    let Some(key) = rsa_public_key(spki) else {
        return false;
    };

    let scheme = match digest {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        DigestAlgorithm::Sha1 => return false,
    };

    key.verify(scheme, &digest.digest(message), signature).is_ok()
}

fn verify_rsa_pss(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: &AlgorithmIdentifierOwned,
    message: &[u8],
    signature: &[u8],
) -> bool {
    if spki.algorithm.oid != RSA_ENCRYPTION && spki.algorithm.oid != RSASSA_PSS {
        return false;
    }

    let (Some(key), Some((digest, scheme))) = (rsa_public_key(spki), pss_scheme(algorithm)) else {
        return false;
    };

    key.verify(scheme, &digest.digest(message), signature).is_ok()
}

/// Reads the RSASSA-PSS parameters. The mask generation must be MGF1 over the message digest.
fn pss_scheme(algorithm: &AlgorithmIdentifierOwned) -> Option<(DigestAlgorithm, Pss)> {
    let parameters = algorithm.parameters.as_ref()?.to_der().ok()?;
    let parameters = RsaPssParams::from_der(&parameters).ok()?;

    let (_, digest) = PSS_DIGESTS
        .into_iter()
        .find(|(oid, _)| *oid == parameters.hash.oid)?;

    let mask_digest = parameters.mask_gen.parameters.map(|mask_digest| mask_digest.oid);
    if parameters.mask_gen.oid != MGF1 || mask_digest != Some(parameters.hash.oid) {
        return None;
    }

    let salt_len = usize::from(parameters.salt_len);
    let scheme = match digest {
        DigestAlgorithm::Sha1 => Pss::new_with_salt::<Sha1>(salt_len),
        DigestAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_len),
        DigestAlgorithm::Sha384 => Pss::new_with_salt::<Sha384>(salt_len),
        DigestAlgorithm::Sha512 => Pss::new_with_salt::<Sha512>(salt_len),
    };

    Some((digest, scheme))
}

fn verify_ecdsa(
    spki: &SubjectPublicKeyInfoOwned,
    digest: DigestAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> bool {
    let Some(key) = spki.subject_public_key.as_bytes() else {
        return false;
    };

    if spki.algorithm.oid != EC_PUBLIC_KEY {
        return false;
    }

    let prehash = digest.digest(message);

    match named_curve(spki) {
        Some(EcCurve::P256) => p256::ecdsa::VerifyingKey::from_sec1_bytes(key)
            .ok()
            .zip(p256::ecdsa::Signature::from_der(signature).ok())
            .is_some_and(|(key, signature)| key.verify_prehash(&prehash, &signature).is_ok()),
        Some(EcCurve::P384) => p384::ecdsa::VerifyingKey::from_sec1_bytes(key)
            .ok()
            .zip(p384::ecdsa::Signature::from_der(signature).ok())
            .is_some_and(|(key, signature)| key.verify_prehash(&prehash, &signature).is_ok()),
        Some(EcCurve::P521) => p521::ecdsa::VerifyingKey::from_sec1_bytes(key)
            .ok()
            .zip(p521::ecdsa::Signature::from_der(signature).ok())
            .is_some_and(|(key, signature)| key.verify_prehash(&prehash, &signature).is_ok()),
        None => false,
    }
}

fn verify_ed25519(spki: &SubjectPublicKeyInfoOwned, message: &[u8], signature: &[u8]) -> bool {
    if spki.algorithm.oid != ED25519 {
        return false;
    }

    let key = spki
        .subject_public_key
        .as_bytes()
        .and_then(|key| <[u8; 32]>::try_from(key).ok())
        .and_then(|key| ed25519_dalek::VerifyingKey::from_bytes(&key).ok());

    let signature = ed25519_dalek::Signature::from_slice(signature).ok();

    key.zip(signature)
        .is_some_and(|(key, signature)| key.verify_strict(message, &signature).is_ok())
}
