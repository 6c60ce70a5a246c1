use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::{
    bytes,
    error::JwkError,
    key::KeyHandle,
    prm::{invalid, KeyType, Members},
    secret::Secret,
};

/// A symmetric octet key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Oct {
    /// The symmetric key.
    pub k: Secret,
}

impl Oct {
    pub(crate) fn parse(members: &Members<'_>) -> Result<Self, JwkError> {
        members.expect_kty(KeyType::Oct)?;

        let k = members.required_str("k")?;
        if bytes::decode("k", k)?.is_empty() {
            return Err(invalid("k"));
        }

        Ok(Self { k: Secret::new(k) })
    }

    pub(crate) fn thumbprint_members(&self) -> Vec<(&'static str, &str)> {
        vec![("k", self.k.expose()), ("kty", "oct")]
    }

    pub(crate) fn write_members(&self, map: &mut Map<String, Value>) {
        map.insert("k".into(), self.k.expose().into());
    }

    pub(crate) fn key_handle(&self) -> Result<KeyHandle, JwkError> {
        let octets = bytes::decode("k", self.k.expose())?;
        Ok(KeyHandle::Secret(Zeroizing::new(octets)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        key::{JwkKind, KeyVisibility},
        Jwk,
    };
    use serde_json::json;

    #[test]
    fn builds_secret_key() {
        let params = json!({ "kty": "oct", "k": "qDM80igvja4Tg_tNsEuWDhl2bMM6_NgJEldFhIEuwqQ" });
        let jwk = Jwk::new(JwkKind::Oct, params.clone()).unwrap();

        assert!(matches!(jwk.key_handle(), KeyHandle::Secret(octets) if octets.len() == 32));
        assert_eq!(jwk.key_handle().visibility(), KeyVisibility::Secret);
        assert_eq!(jwk.to_json(), params);
        assert!(!format!("{jwk:?}").contains("qDM80igvja4Tg"));
    }

    #[test]
    fn rejects_empty_key() {
        for value in [json!(""), json!(null), json!(["k"]), json!("*")] {
            let err = Jwk::new(JwkKind::Oct, json!({ "kty": "oct", "k": value })).unwrap_err();
            assert_eq!(err.to_string(), r#"Invalid jwk parameter "k"."#);
        }
    }

    #[test]
    fn rejects_other_key_types() {
        let err = Jwk::new(JwkKind::Oct, json!({ "kty": "OKP", "k": "AA" })).unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid jwk parameter "kty". Expected "oct", got "OKP"."#);
    }
}
