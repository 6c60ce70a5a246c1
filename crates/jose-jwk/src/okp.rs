use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::{
    bytes,
    error::JwkError,
    key::KeyHandle,
    prm::{invalid, KeyType, Members},
    secret::Secret,
};

/// A CFRG-curve key (i.e. an octet key pair).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Okp {
    /// The CFRG curve.
    pub crv: OkpCurve,

    /// The public key.
    pub x: String,

    /// The private key.
    pub d: Option<Secret>,
}

/// The CFRG Curve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OkpCurve {
    Ed25519,
    Ed448,
    X25519,
    X448,
}

impl OkpCurve {
    pub const SUPPORTED: [OkpCurve; 4] =
        [OkpCurve::Ed25519, OkpCurve::Ed448, OkpCurve::X25519, OkpCurve::X448];
    pub const NAMES: [&'static str; 4] = ["Ed25519", "Ed448", "X25519", "X448"];

    pub const fn as_str(self) -> &'static str {
        match self {
            OkpCurve::Ed25519 => "Ed25519",
            OkpCurve::Ed448 => "Ed448",
            OkpCurve::X25519 => "X25519",
            OkpCurve::X448 => "X448",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::SUPPORTED.into_iter().find(|crv| crv.as_str() == name)
    }

    /// Length in bytes of both the public and the private key.
    pub const fn key_size(self) -> usize {
        match self {
            OkpCurve::Ed25519 | OkpCurve::X25519 => 32,
            OkpCurve::Ed448 => 57,
            OkpCurve::X448 => 56,
        }
    }
}

impl fmt::Display for OkpCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Okp {
    pub(crate) fn parse(members: &Members<'_>, private: bool) -> Result<Self, JwkError> {
        let d = if private {
            Some(Secret::new(members.required_encoded("d")?))
        } else {
            None
        };

        members.expect_kty(KeyType::Okp)?;

        let crv = members
            .get("crv")
            .and_then(Value::as_str)
            .and_then(OkpCurve::from_name)
            .ok_or_else(|| invalid("crv"))?;

        let x = members.required_encoded("x")?.to_owned();

        Ok(Self { crv, x, d })
    }

    pub(crate) fn thumbprint_members(&self) -> Vec<(&'static str, &str)> {
        vec![("crv", self.crv.as_str()), ("kty", "OKP"), ("x", &self.x)]
    }

    pub(crate) fn write_members(&self, map: &mut Map<String, Value>) {
        map.insert("crv".into(), self.crv.as_str().into());
        map.insert("x".into(), self.x.as_str().into());

        if let Some(d) = &self.d {
            map.insert("d".into(), d.expose().into());
        }
    }

    pub(crate) fn key_handle(&self) -> Result<KeyHandle, JwkError> {
        let x = sized(self.crv, "x", &self.x)?;
        let d = match &self.d {
            Some(d) => Some(Zeroizing::new(sized(self.crv, "d", d.expose())?)),
            None => None,
        };

        let handle = match (self.crv, d) {
            (OkpCurve::Ed25519, None) => {
                let x = array(x)?;
                ed25519_dalek::VerifyingKey::from_bytes(&x)
                    .map(KeyHandle::Ed25519Public)
                    .map_err(|_| JwkError::key_material("x", "not a valid Ed25519 public key"))?
            }
            (OkpCurve::Ed25519, Some(d)) => {
                let secret = ed25519_dalek::SigningKey::from_bytes(&array(d.to_vec())?);
                check_public(secret.verifying_key().as_bytes(), &x)?;
                KeyHandle::Ed25519Private(secret)
            }
            (OkpCurve::X25519, None) => {
                KeyHandle::X25519Public(x25519_dalek::PublicKey::from(array(x)?))
            }
            (OkpCurve::X25519, Some(d)) => {
                let secret = x25519_dalek::StaticSecret::from(array(d.to_vec())?);
                check_public(x25519_dalek::PublicKey::from(&secret).as_bytes(), &x)?;
                KeyHandle::X25519Private(secret)
            }
            (crv, None) => KeyHandle::OkpPublic { crv, x },
            (crv, Some(d)) => KeyHandle::OkpPrivate { crv, x, d },
        };

        Ok(handle)
    }
}

fn sized(crv: OkpCurve, member: &'static str, value: &str) -> Result<Vec<u8>, JwkError> {
    let bytes = bytes::decode(member, value)?;
    let size = crv.key_size();

    if bytes.len() != size {
        return Err(JwkError::key_material(member, format!("expected {size} bytes for {crv}")));
    }

    Ok(bytes)
}

fn array(bytes: Vec<u8>) -> Result<[u8; 32], JwkError> {
    let bytes = Zeroizing::new(bytes);
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| JwkError::key_material("x", "expected 32 bytes"))
}

fn check_public(derived: &[u8], x: &[u8]) -> Result<(), JwkError> {
    if derived != x {
        return Err(JwkError::key_material("d", "does not match the public key"));
    }

    Ok(())
}
