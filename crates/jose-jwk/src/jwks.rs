use std::{collections::HashSet, sync::Arc};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::{
    error::JwksError,
    jwk::{Jwk, ValidationOptions},
};

/// A JWK Set, with unique key identifiers.
///
/// Members are shared and read-only once the set is built.
#[derive(Debug, Clone, PartialEq)]
pub struct JwkSet {
    keys: Vec<Arc<Jwk>>,
}

impl JwkSet {
    /// Builds a set from validated keys.
    ///
    /// Keys without a `kid` get their base64url SHA-256 thumbprint as one.
    pub fn new(keys: Vec<Jwk>) -> Result<Self, JwksError> {
        if keys.is_empty() {
            return Err(JwksError::InvalidKeys);
        }

        let keys: Vec<Jwk> = keys
            .into_iter()
            .map(|mut jwk| {
                if jwk.kid().is_none() {
                    let kid = jwk.encoded_thumbprint();
                    tracing::debug!(%kid, "assigning thumbprint key identifier");
                    jwk.set_kid(kid);
                }
                jwk
            })
            .collect();

        let mut seen = HashSet::with_capacity(keys.len());
        for kid in keys.iter().filter_map(Jwk::kid) {
            if !seen.insert(kid) {
                tracing::debug!(kid, "duplicate key identifier");
                return Err(JwksError::DuplicateKeyIdentifier(kid.to_owned()));
            }
        }

        Ok(Self {
            keys: keys.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parses `{ "keys": [...] }`, validating every member.
    pub fn from_value(value: Value) -> Result<Self, JwksError> {
        Self::from_value_with_options(value, &ValidationOptions::default())
    }

    pub fn from_value_with_options(
        value: Value,
        options: &ValidationOptions,
    ) -> Result<Self, JwksError> {
        let Some(Value::Array(entries)) = value.get("keys") else {
            return Err(JwksError::InvalidKeys);
        };

        if entries.is_empty() || !entries.iter().all(Value::is_object) {
            return Err(JwksError::InvalidKeys);
        }

        let keys = entries
            .iter()
            .map(|entry| Jwk::from_value_with_options(entry.clone(), options))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(keys)
    }

    pub fn keys(&self) -> &[Arc<Jwk>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Jwk> {
        self.keys.iter().map(Arc::as_ref)
    }

    /// The first member matching `predicate`.
    pub fn find<P>(&self, mut predicate: P) -> Option<&Arc<Jwk>>
    where
        P: FnMut(&Jwk) -> bool,
    {
        self.keys.iter().find(|jwk| predicate(jwk))
    }

    /// Like [`find`](Self::find), but a missing match is an error.
    pub fn get<P>(&self, predicate: P) -> Result<&Arc<Jwk>, JwksError>
    where
        P: FnMut(&Jwk) -> bool,
    {
        self.find(predicate).ok_or(JwksError::NotFound)
    }

    pub fn to_json(&self) -> Value {
        json!({ "keys": self.iter().map(Jwk::to_json).collect::<Vec<_>>() })
    }
}

impl<'a> IntoIterator for &'a JwkSet {
    type Item = &'a Arc<Jwk>;
    type IntoIter = std::slice::Iter<'a, Arc<Jwk>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl Serialize for JwkSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JwkSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        JwkSet::from_value(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{key::JwkKind, prm::KeyType};

    fn oct(k: &str) -> Jwk {
        Jwk::new(JwkKind::Oct, json!({ "kty": "oct", "k": k })).unwrap()
    }

    fn okp() -> Jwk {
        let params = json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "aNoALKSUE1UsotuZvHUj1HEGqhpzLtsSTLmkBITDMAk",
        });

        Jwk::new(JwkKind::OkpPublic, params).unwrap()
    }

    #[test]
    fn assigns_thumbprint_kids() {
        let jwks =
            JwkSet::new(vec![oct("qDM80igvja4Tg_tNsEuWDhl2bMM6_NgJEldFhIEuwqQ"), okp()]).unwrap();

        let kids: Vec<_> = jwks.iter().filter_map(Jwk::kid).collect();
        assert_eq!(
            kids,
            [
                "vM7XT8f5s2ATReLbN47BWpPOuo7CTV1uv-zR8R9aOuk",
                "FMCIgXO9kw0AgfBekvZMOJNulldoS-m3iRokV_t4r8g"
            ]
        );
    }

    #[test]
    fn keeps_declared_kids() {
        let jwk =
            Jwk::new(JwkKind::Oct, json!({ "kty": "oct", "k": "AQID", "kid": "mine" })).unwrap();
        let jwks = JwkSet::new(vec![jwk]).unwrap();

        assert_eq!(jwks.keys()[0].kid(), Some("mine"));
    }

    #[test]
    fn rejects_duplicate_kids() {
        let err = JwkSet::new(vec![oct("AQID"), okp(), oct("AQID")]).unwrap_err();
        assert!(matches!(err, JwksError::DuplicateKeyIdentifier(_)));

        let declared =
            Jwk::new(JwkKind::Oct, json!({ "kty": "oct", "k": "BAUG", "kid": "a" })).unwrap();
        let same = Jwk::new(JwkKind::OkpPublic, json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "aNoALKSUE1UsotuZvHUj1HEGqhpzLtsSTLmkBITDMAk",
            "kid": "a",
        }))
        .unwrap();
        let err = JwkSet::new(vec![declared, same]).unwrap_err();
        assert_eq!(err.to_string(), "The use of duplicate key identifiers is forbidden.");
    }

    #[test]
    fn rejects_empty_sets() {
        assert!(matches!(JwkSet::new(vec![]), Err(JwksError::InvalidKeys)));

        let values = [
            json!({}),
            json!({ "keys": [] }),
            json!({ "keys": {} }),
            json!({ "keys": [1] }),
        ];

        for value in values {
            assert!(matches!(JwkSet::from_value(value), Err(JwksError::InvalidKeys)));
        }
    }

    #[test]
    fn find_and_get() {
        let jwks = JwkSet::new(vec![oct("AQID"), okp()]).unwrap();

        let found = jwks.find(|jwk| jwk.key_type() == KeyType::Okp).unwrap();
        assert_eq!(found.kind(), JwkKind::OkpPublic);
        assert!(jwks.find(|jwk| jwk.key_type() == KeyType::Rsa).is_none());

        let found = jwks.get(|jwk| jwk.key_type() == KeyType::Oct).unwrap();
        assert_eq!(found.kind(), JwkKind::Oct);

        let err = jwks.get(|jwk| jwk.kid() == Some("unknown")).unwrap_err();
        assert_eq!(err.to_string(), "No JWK matches the criteria at the JWK Set.");
    }

    #[test]
    fn parses_and_serializes() {
        let value = json!({
            "keys": [
                { "kty": "oct", "k": "AQID", "kid": "one" },
                {
                    "kty": "OKP",
                    "crv": "Ed25519",
                    "x": "aNoALKSUE1UsotuZvHUj1HEGqhpzLtsSTLmkBITDMAk",
                    "kid": "two",
                },
            ]
        });

        let jwks: JwkSet = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(jwks.len(), 2);
        assert_eq!(serde_json::to_value(&jwks).unwrap(), value);

        let err = JwkSet::from_value(json!({ "keys": [{ "kty": "oct", "k": "" }] })).unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid jwk parameter "k"."#);
    }
}
