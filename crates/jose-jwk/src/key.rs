use core::fmt;

use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::{
    ec::{Ec, EcCurve},
    error::JwkError,
    oct::Oct,
    okp::{Okp, OkpCurve},
    prm::{invalid, KeyType, Members},
    rsa::Rsa,
};

/// The seven JWK forms, keyed by `kty` and by the presence of private material.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JwkKind {
    EcPublic,
    EcPrivate,
    RsaPublic,
    RsaPrivate,
    OkpPublic,
    OkpPrivate,
    /// A symmetric key.
    Oct,
}

impl JwkKind {
    pub const ALL: [JwkKind; 7] = [
        JwkKind::EcPublic,
        JwkKind::EcPrivate,
        JwkKind::RsaPublic,
        JwkKind::RsaPrivate,
        JwkKind::OkpPublic,
        JwkKind::OkpPrivate,
        JwkKind::Oct,
    ];

    pub const fn key_type(self) -> KeyType {
        match self {
            JwkKind::EcPublic | JwkKind::EcPrivate => KeyType::Ec,
            JwkKind::RsaPublic | JwkKind::RsaPrivate => KeyType::Rsa,
            JwkKind::OkpPublic | JwkKind::OkpPrivate => KeyType::Okp,
            JwkKind::Oct => KeyType::Oct,
        }
    }

    /// Whether the form carries the private half of an asymmetric key pair.
    pub const fn is_private(self) -> bool {
        matches!(self, JwkKind::EcPrivate | JwkKind::RsaPrivate | JwkKind::OkpPrivate)
    }

    /// Curve names accepted in `crv`, empty for key types without one.
    pub const fn supported_curves(self) -> &'static [&'static str] {
        match self.key_type() {
            KeyType::Ec => &EcCurve::NAMES,
            KeyType::Okp => &OkpCurve::NAMES,
            KeyType::Rsa | KeyType::Oct => &[],
        }
    }

    /// Members owned by the variant, on top of the shared ones.
    pub(crate) const fn members(self) -> &'static [&'static str] {
        match self {
            JwkKind::EcPublic => &["crv", "x", "y"],
            JwkKind::EcPrivate => &["crv", "x", "y", "d"],
            JwkKind::RsaPublic => &["n", "e"],
            JwkKind::RsaPrivate => &["n", "e", "d", "p", "q", "dp", "dq", "qi"],
            JwkKind::OkpPublic => &["crv", "x"],
            JwkKind::OkpPrivate => &["crv", "x", "d"],
            JwkKind::Oct => &["k"],
        }
    }

    /// Picks the form from `kty`, treating a `d` member as a private key.
    pub(crate) fn infer(members: &Members<'_>) -> Result<Self, JwkError> {
        let kty = members
            .get("kty")
            .and_then(Value::as_str)
            .and_then(KeyType::from_name)
            .ok_or_else(|| invalid("kty"))?;

        let private = members.contains("d");

        Ok(match (kty, private) {
            (KeyType::Ec, false) => JwkKind::EcPublic,
            (KeyType::Ec, true) => JwkKind::EcPrivate,
            (KeyType::Rsa, false) => JwkKind::RsaPublic,
            (KeyType::Rsa, true) => JwkKind::RsaPrivate,
            (KeyType::Okp, false) => JwkKind::OkpPublic,
            (KeyType::Okp, true) => JwkKind::OkpPrivate,
            (KeyType::Oct, _) => JwkKind::Oct,
        })
    }
}

/// Key-type specific members of a validated JWK.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyParams {
    Ec(Ec),
    Rsa(Rsa),
    Okp(Okp),
    Oct(Oct),
}

impl From<Ec> for KeyParams {
    #[inline(always)]
    fn from(key: Ec) -> Self {
        Self::Ec(key)
    }
}

impl From<Rsa> for KeyParams {
    #[inline(always)]
    fn from(key: Rsa) -> Self {
        Self::Rsa(key)
    }
}

impl From<Okp> for KeyParams {
    #[inline(always)]
    fn from(key: Okp) -> Self {
        Self::Okp(key)
    }
}

impl From<Oct> for KeyParams {
    #[inline(always)]
    fn from(key: Oct) -> Self {
        Self::Oct(key)
    }
}

impl KeyParams {
    /// Runs the variant rules: private members, then `kty`, then public members.
    pub(crate) fn parse(kind: JwkKind, members: &Members<'_>) -> Result<Self, JwkError> {
        Ok(match kind {
            JwkKind::EcPublic => Ec::parse(members, false)?.into(),
            JwkKind::EcPrivate => Ec::parse(members, true)?.into(),
            JwkKind::RsaPublic => Rsa::parse(members, false)?.into(),
            JwkKind::RsaPrivate => Rsa::parse(members, true)?.into(),
            JwkKind::OkpPublic => Okp::parse(members, false)?.into(),
            JwkKind::OkpPrivate => Okp::parse(members, true)?.into(),
            JwkKind::Oct => Oct::parse(members)?.into(),
        })
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyParams::Ec(_) => KeyType::Ec,
            KeyParams::Rsa(_) => KeyType::Rsa,
            KeyParams::Okp(_) => KeyType::Okp,
            KeyParams::Oct(_) => KeyType::Oct,
        }
    }

    /// The RFC 7638 required members, in lexicographic order.
    pub fn thumbprint_members(&self) -> Vec<(&'static str, &str)> {
        match self {
            KeyParams::Ec(key) => key.thumbprint_members(),
            KeyParams::Rsa(key) => key.thumbprint_members(),
            KeyParams::Okp(key) => key.thumbprint_members(),
            KeyParams::Oct(key) => key.thumbprint_members(),
        }
    }

    /// The public members as a JSON object, `kty` included.
    pub(crate) fn public_jwk(&self) -> Map<String, Value> {
        self.thumbprint_members()
            .into_iter()
            .map(|(name, value)| (name.to_owned(), Value::from(value)))
            .collect()
    }

    pub(crate) fn write_members(&self, map: &mut Map<String, Value>) {
        match self {
            KeyParams::Ec(key) => key.write_members(map),
            KeyParams::Rsa(key) => key.write_members(map),
            KeyParams::Okp(key) => key.write_members(map),
            KeyParams::Oct(key) => key.write_members(map),
        }
    }

    pub(crate) fn key_handle(&self) -> Result<KeyHandle, JwkError> {
        match self {
            KeyParams::Ec(key) => key.key_handle(),
            KeyParams::Rsa(key) => key.key_handle(),
            KeyParams::Okp(key) => key.key_handle(),
            KeyParams::Oct(key) => key.key_handle(),
        }
    }
}

/// Whether a key handle is the public or private half of a key pair, or a shared secret.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyVisibility {
    Public,
    Private,
    Secret,
}

/// Cryptographic key material derived from a validated JWK.
///
/// The handle is built once, when the JWK is constructed, and is never
/// inspected by this crate afterwards.
pub enum KeyHandle {
    P256Public(p256::PublicKey),
    P256Private(p256::SecretKey),
    P384Public(p384::PublicKey),
    P384Private(p384::SecretKey),
    P521Public(p521::PublicKey),
    P521Private(p521::SecretKey),
    RsaPublic(rsa::RsaPublicKey),
    RsaPrivate(rsa::RsaPrivateKey),
    Ed25519Public(ed25519_dalek::VerifyingKey),
    Ed25519Private(ed25519_dalek::SigningKey),
    X25519Public(x25519_dalek::PublicKey),
    X25519Private(x25519_dalek::StaticSecret),
    /// Ed448 and X448 keys, kept as their validated encoding.
    OkpPublic { crv: OkpCurve, x: Vec<u8> },
    OkpPrivate {
        crv: OkpCurve,
        x: Vec<u8>,
        d: Zeroizing<Vec<u8>>,
    },
    /// Symmetric key octets.
    Secret(Zeroizing<Vec<u8>>),
}

impl KeyHandle {
    pub fn key_type(&self) -> KeyType {
        use KeyHandle::*;

        match self {
            P256Public(_)
            | P256Private(_)
            | P384Public(_)
            | P384Private(_)
            | P521Public(_)
            | P521Private(_) => KeyType::Ec,
            RsaPublic(_) | RsaPrivate(_) => KeyType::Rsa,
            Ed25519Public(_)
            | Ed25519Private(_)
            | X25519Public(_)
            | X25519Private(_)
            | OkpPublic { .. }
            | OkpPrivate { .. } => KeyType::Okp,
            Secret(_) => KeyType::Oct,
        }
    }

    pub fn visibility(&self) -> KeyVisibility {
        use KeyHandle::*;

        match self {
            P256Public(_)
            | P384Public(_)
            | P521Public(_)
            | RsaPublic(_)
            | Ed25519Public(_)
            | X25519Public(_)
            | OkpPublic { .. } => KeyVisibility::Public,
            P256Private(_)
            | P384Private(_)
            | P521Private(_)
            | RsaPrivate(_)
            | Ed25519Private(_)
            | X25519Private(_)
            | OkpPrivate { .. } => KeyVisibility::Private,
            Secret(_) => KeyVisibility::Secret,
        }
    }

    /// The named curve of an EC or OKP key.
    pub fn curve(&self) -> Option<&'static str> {
        use KeyHandle::*;

        match self {
            P256Public(_) | P256Private(_) => Some(EcCurve::P256.as_str()),
            P384Public(_) | P384Private(_) => Some(EcCurve::P384.as_str()),
            P521Public(_) | P521Private(_) => Some(EcCurve::P521.as_str()),
            Ed25519Public(_) | Ed25519Private(_) => Some(OkpCurve::Ed25519.as_str()),
            X25519Public(_) | X25519Private(_) => Some(OkpCurve::X25519.as_str()),
            OkpPublic { crv, .. } | OkpPrivate { crv, .. } => Some(crv.as_str()),
            RsaPublic(_) | RsaPrivate(_) | Secret(_) => None,
        }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("KeyHandle");
        debug.field("kty", &self.key_type()).field("visibility", &self.visibility());

        if let Some(crv) = self.curve() {
            debug.field("crv", &crv);
        }

        debug.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn infer(value: Value) -> Result<JwkKind, JwkError> {
        let object = value.as_object().cloned().unwrap_or_default();
        JwkKind::infer(&Members::new(&object))
    }

    #[test]
    fn infers_kind_from_kty_and_private_members() {
        assert_eq!(infer(json!({ "kty": "EC" })).unwrap(), JwkKind::EcPublic);
        assert_eq!(infer(json!({ "kty": "EC", "d": "x" })).unwrap(), JwkKind::EcPrivate);
        assert_eq!(infer(json!({ "kty": "RSA", "d": "x" })).unwrap(), JwkKind::RsaPrivate);
        assert_eq!(infer(json!({ "kty": "OKP" })).unwrap(), JwkKind::OkpPublic);
        assert_eq!(infer(json!({ "kty": "oct", "d": "x" })).unwrap(), JwkKind::Oct);
    }

    #[test]
    fn rejects_unknown_kty() {
        for value in [json!({}), json!({ "kty": "ec" }), json!({ "kty": 1 })] {
            let err = infer(value).unwrap_err();
            assert_eq!(err.to_string(), r#"Invalid jwk parameter "kty"."#);
        }
    }

    #[test]
    fn kinds_describe_their_family() {
        assert_eq!(JwkKind::EcPrivate.supported_curves(), ["P-256", "P-384", "P-521"]);
        assert_eq!(JwkKind::OkpPublic.supported_curves(), ["Ed25519", "Ed448", "X25519", "X448"]);
        assert!(JwkKind::RsaPublic.supported_curves().is_empty());

        let private = JwkKind::ALL.iter().filter(|kind| kind.is_private()).count();
        assert_eq!(private, 3);
        assert_eq!(JwkKind::Oct.key_type(), KeyType::Oct);
    }
}
