use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::{bytes, error::JwkError};

/// Key type (i.e. `kty` in the RFC)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Elliptic curve
    #[serde(rename = "EC")]
    Ec,

    #[serde(rename = "RSA")]
    Rsa,

    /// Octet key pair
    #[serde(rename = "OKP")]
    Okp,

    /// Octet sequence
    #[serde(rename = "oct")]
    Oct,
}

impl KeyType {
    /// The registered `kty` value.
    pub const fn as_str(self) -> &'static str {
        match self {
            KeyType::Ec => "EC",
            KeyType::Rsa => "RSA",
            KeyType::Okp => "OKP",
            KeyType::Oct => "oct",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [KeyType::Ec, KeyType::Rsa, KeyType::Okp, KeyType::Oct]
            .into_iter()
            .find(|kty| kty.as_str() == name)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key Class (i.e. `use` in the RFC)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUse {
    #[serde(rename = "enc")]
    Encryption,

    #[serde(rename = "sig")]
    Signing,
}

impl KeyUse {
    pub const ALL: [KeyUse; 2] = [KeyUse::Encryption, KeyUse::Signing];

    pub const fn as_str(self) -> &'static str {
        match self {
            KeyUse::Encryption => "enc",
            KeyUse::Signing => "sig",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key_use| key_use.as_str() == name)
    }

    /// The key operations a key declared with this use may also list in `key_ops`.
    pub const fn operations(self) -> &'static [KeyOperation] {
        use KeyOperation::*;

        match self {
            KeyUse::Encryption => &[Decrypt, DeriveBits, DeriveKey, Encrypt, UnwrapKey, WrapKey],
            KeyUse::Signing => &[Sign, Verify],
        }
    }

    pub fn permits(self, operation: KeyOperation) -> bool {
        self.operations().contains(&operation)
    }
}

impl fmt::Display for KeyUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key operations (i.e. `key_ops` in the RFC)
// NOTE: Keep in lexicographical order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum KeyOperation {
    Decrypt,
    DeriveBits,
    DeriveKey,
    Encrypt,
    Sign,
    UnwrapKey,
    Verify,
    WrapKey,
}

impl KeyOperation {
    pub const ALL: [KeyOperation; 8] = [
        KeyOperation::Decrypt,
        KeyOperation::DeriveBits,
        KeyOperation::DeriveKey,
        KeyOperation::Encrypt,
        KeyOperation::Sign,
        KeyOperation::UnwrapKey,
        KeyOperation::Verify,
        KeyOperation::WrapKey,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            KeyOperation::Decrypt => "decrypt",
            KeyOperation::DeriveBits => "deriveBits",
            KeyOperation::DeriveKey => "deriveKey",
            KeyOperation::Encrypt => "encrypt",
            KeyOperation::Sign => "sign",
            KeyOperation::UnwrapKey => "unwrapKey",
            KeyOperation::Verify => "verify",
            KeyOperation::WrapKey => "wrapKey",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operation| operation.as_str() == name)
    }
}

impl fmt::Display for KeyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWK parameters unrelated to the key implementation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JwkParams {
    /// The key type.
    pub kty: KeyType,

    /// The key class (called `use` in the RFC).
    #[serde(skip_serializing_if = "Option::is_none", rename = "use")]
    pub key_use: Option<KeyUse>,

    /// The key operations, in declaration order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<KeyOperation>>,

    /// The algorithm intended for use with this key. Not checked against any registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// The key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// The URL of the X.509 certificate chain associated with this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,

    /// The X.509 certificate chain associated with this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>, // base64, not base64url

    /// The X.509 thumbprint (SHA-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,

    /// The X.509 thumbprint (SHA-2 256).
    #[serde(skip_serializing_if = "Option::is_none", rename = "x5t#S256")]
    pub x5t_s256: Option<String>,
}

impl JwkParams {
    /// Names of the members shared by every key type.
    pub const MEMBERS: [&'static str; 9] =
        ["kty", "use", "key_ops", "alg", "kid", "x5u", "x5c", "x5t", "x5t#S256"];

    /// Runs the shared rules, in order, up to the certificate chain resolution.
    pub(crate) fn parse(kty: KeyType, members: &Members<'_>) -> Result<Self, JwkError> {
        let key_use = members
            .get("use")
            .map(|value| value.as_str().and_then(KeyUse::from_name).ok_or_else(|| invalid("use")))
            .transpose()?;

        let key_ops = members.get("key_ops").map(parse_key_ops).transpose()?;

        if let (Some(key_use), Some(key_ops)) = (key_use, &key_ops) {
            if key_ops.iter().any(|operation| !key_use.permits(*operation)) {
                tracing::debug!(%key_use, "key operations do not fit the declared use");
                return Err(JwkError::IncompatibleUseAndKeyOps);
            }
        }

        let alg = members.optional_str("alg")?.map(str::to_owned);
        let kid = members.optional_str("kid")?.map(str::to_owned);

        let has_chain = members.contains("x5u") || members.contains("x5c");

        if (members.contains("x5t") || members.contains("x5t#S256")) && !has_chain {
            return Err(JwkError::ThumbprintWithoutCertificateChain);
        }

        if members.contains("x5u") && members.contains("x5c") {
            return Err(JwkError::ConflictingCertificateSources);
        }

        let x5u = members.get("x5u").map(parse_x5u).transpose()?;
        let x5c = members.get("x5c").map(parse_x5c).transpose()?;
        let x5t = members.optional_str("x5t")?.map(str::to_owned);
        let x5t_s256 = members.optional_str("x5t#S256")?.map(str::to_owned);

        Ok(Self {
            kty,
            key_use,
            key_ops,
            alg,
            kid,
            x5u,
            x5c,
            x5t,
            x5t_s256,
        })
    }
}

fn parse_key_ops(value: &Value) -> Result<Vec<KeyOperation>, JwkError> {
    let operations = value
        .as_array()
        .filter(|entries| !entries.is_empty())
        .and_then(|entries| {
            entries
                .iter()
                .map(|entry| entry.as_str().and_then(KeyOperation::from_name))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| invalid("key_ops"))?;

    let mut seen = operations.clone();
    seen.sort_unstable();
    seen.dedup();

    if seen.len() != operations.len() {
        return Err(JwkError::RepeatedKeyOperations);
    }

    Ok(operations)
}

fn parse_x5u(value: &Value) -> Result<String, JwkError> {
    match value.as_str() {
        Some(url) if Url::parse(url).is_ok() => Ok(url.to_owned()),
        _ => Err(invalid("x5u")),
    }
}

fn parse_x5c(value: &Value) -> Result<Vec<String>, JwkError> {
    value
        .as_array()
        .filter(|entries| !entries.is_empty())
        .and_then(|entries| {
            entries
                .iter()
                .map(|entry| entry.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| invalid("x5c"))
}

pub(crate) fn invalid(member: &'static str) -> JwkError {
    tracing::debug!(member, "rejected jwk parameter");
    JwkError::InvalidParameter(member)
}

/// Read access to the raw members of a JWK object.
///
/// A member explicitly set to `null` counts as present, and fails every type check.
#[derive(Clone, Copy)]
pub(crate) struct Members<'a> {
    object: &'a Map<String, Value>,
}

impl<'a> Members<'a> {
    pub fn new(object: &'a Map<String, Value>) -> Self {
        Self { object }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.object.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.object.contains_key(name)
    }

    pub fn required_str(&self, name: &'static str) -> Result<&'a str, JwkError> {
        self.get(name).and_then(Value::as_str).ok_or_else(|| invalid(name))
    }

    /// A required member holding base64url encoded bytes.
    pub fn required_encoded(&self, name: &'static str) -> Result<&'a str, JwkError> {
        let value = self.required_str(name)?;
        bytes::decode(name, value)?;
        Ok(value)
    }

    pub fn optional_str(&self, name: &'static str) -> Result<Option<&'a str>, JwkError> {
        self.get(name)
            .map(|value| value.as_str().ok_or_else(|| invalid(name)))
            .transpose()
    }

    /// Checks the `kty` member against the variant being built.
    pub fn expect_kty(&self, expected: KeyType) -> Result<(), JwkError> {
        match self.get("kty") {
            Some(Value::String(kty)) if kty == expected.as_str() => Ok(()),
            found => {
                let found = match found {
                    Some(Value::String(kty)) => kty.clone(),
                    Some(other) => other.to_string(),
                    None => "null".to_owned(),
                };
                tracing::debug!(%expected, %found, "unexpected key type");
                Err(JwkError::UnexpectedKeyType { expected, found })
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.object.iter()
    }
}
