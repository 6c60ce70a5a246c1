use core::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::Digest;

use crate::{
    bytes,
    error::JwkError,
    key::{JwkKind, KeyHandle, KeyParams},
    prm::{JwkParams, KeyType, Members},
    x509::{
        self,
        fetch::{CertificateFetcher, HttpCertificateFetcher},
    },
};

/// Environment in which a JWK is validated.
#[derive(Clone)]
pub struct ValidationOptions {
    now: Option<DateTime<Utc>>,
    fetcher: Arc<dyn CertificateFetcher>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            now: None,
            fetcher: Arc::new(HttpCertificateFetcher::default()),
        }
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions").field("now", &self.now).finish_non_exhaustive()
    }
}

impl ValidationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the instant certificate validity windows are checked against.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Replaces the fetcher used to resolve `x5u`.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn CertificateFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn fetcher(&self) -> &dyn CertificateFetcher {
        self.fetcher.as_ref()
    }
}

/// Digest algorithms for key and certificate thumbprints.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

/// A validated JSON Web Key.
///
/// Construction runs every rule in a fixed order and stops at the first
/// violation: the variant members (private ones first), then the shared
/// members, then the certificate chain, if any. The key handle is derived
/// last, once all of these have passed.
#[derive(Debug)]
pub struct Jwk {
    kind: JwkKind,
    params: JwkParams,
    key: KeyParams,
    extra: Map<String, Value>,
    handle: KeyHandle,
    thumbprint_input: String,
}

impl Jwk {
    /// Validates `params` as the given variant.
    pub fn new(kind: JwkKind, params: Value) -> Result<Self, JwkError> {
        Self::with_options(kind, params, &ValidationOptions::default())
    }

    pub fn with_options(
        kind: JwkKind,
        params: Value,
        options: &ValidationOptions,
    ) -> Result<Self, JwkError> {
        Self::build(kind, as_object(&params)?, options)
    }

    /// Validates `params`, picking the variant from `kty` and the presence of `d`.
    pub fn from_value(params: Value) -> Result<Self, JwkError> {
        Self::from_value_with_options(params, &ValidationOptions::default())
    }

    pub fn from_value_with_options(
        params: Value,
        options: &ValidationOptions,
    ) -> Result<Self, JwkError> {
        let object = as_object(&params)?;
        let kind = JwkKind::infer(&Members::new(object))?;

        Self::build(kind, object, options)
    }

    fn build(
        kind: JwkKind,
        object: &Map<String, Value>,
        options: &ValidationOptions,
    ) -> Result<Self, JwkError> {
        let members = Members::new(object);

        let key = KeyParams::parse(kind, &members)?;
        let params = JwkParams::parse(kind.key_type(), &members)?;

        if let Some(chain) = x509::resolve(&params, options)? {
            tracing::debug!(certificates = chain.len(), "validating certificate chain");
            chain.validate(&key.public_jwk(), options.now())?;
            chain.check_thumbprints(params.x5t.as_deref(), params.x5t_s256.as_deref())?;
        }

        let handle = key.key_handle()?;
        let thumbprint_input =
            json_canon::to_string(&key.public_jwk()).map_err(JwkError::Canonicalization)?;

        let extra = members
            .iter()
            .filter(|(name, value)| {
                !value.is_null()
                    && !JwkParams::MEMBERS.contains(&name.as_str())
                    && !kind.members().contains(&name.as_str())
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        tracing::debug!(?kind, kid = params.kid.as_deref(), "jwk validated");

        Ok(Self {
            kind,
            params,
            key,
            extra,
            handle,
            thumbprint_input,
        })
    }

    pub fn kind(&self) -> JwkKind {
        self.kind
    }

    pub fn key_type(&self) -> KeyType {
        self.params.kty
    }

    /// The members shared by every key type.
    pub fn params(&self) -> &JwkParams {
        &self.params
    }

    /// The key type specific members.
    pub fn key(&self) -> &KeyParams {
        &self.key
    }

    /// Members outside the registered vocabulary, kept as given.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn key_handle(&self) -> &KeyHandle {
        &self.handle
    }

    pub fn kid(&self) -> Option<&str> {
        self.params.kid.as_deref()
    }

    pub(crate) fn set_kid(&mut self, kid: String) {
        self.params.kid = Some(kid);
    }

    /// Curve names accepted by `kind`.
    pub fn supported_curves(kind: JwkKind) -> &'static [&'static str] {
        kind.supported_curves()
    }

    /// The RFC 7638 required members, in the order they are hashed.
    pub fn thumbprint_members(&self) -> Vec<(&'static str, &str)> {
        self.key.thumbprint_members()
    }

    /// RFC 7638 SHA-256 thumbprint.
    pub fn thumbprint(&self) -> Vec<u8> {
        self.thumbprint_with(DigestAlgorithm::Sha256)
    }

    pub fn thumbprint_with(&self, algorithm: DigestAlgorithm) -> Vec<u8> {
        algorithm.digest(self.thumbprint_input.as_bytes())
    }

    /// The canonical JSON of the required members, as hashed by [`Jwk::thumbprint_with`].
    pub fn thumbprint_input(&self) -> &str {
        &self.thumbprint_input
    }

    /// The SHA-256 thumbprint, base64url encoded.
    pub fn encoded_thumbprint(&self) -> String {
        bytes::encode(&self.thumbprint())
    }

    /// All members with a value, the key handle excluded.
    pub fn to_json(&self) -> Value {
        let mut map = match serde_json::to_value(&self.params) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        self.key.write_members(&mut map);

        for (name, value) in &self.extra {
            map.entry(name.clone()).or_insert_with(|| value.clone());
        }

        Value::Object(map)
    }
}

fn as_object(params: &Value) -> Result<&Map<String, Value>, JwkError> {
    params.as_object().ok_or_else(|| {
        tracing::debug!("jwk parameters are not a JSON object");
        JwkError::InvalidParams
    })
}

impl PartialEq for Jwk {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.to_json() == other.to_json()
    }
}

impl TryFrom<Value> for Jwk {
    type Error = JwkError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Jwk::from_value(value)
    }
}

impl Serialize for Jwk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Jwk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Jwk::from_value(value).map_err(de::Error::custom)
    }
}
