use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde_json::{Map, Value};

use crate::{
    bytes,
    error::JwkError,
    key::KeyHandle,
    prm::{invalid, KeyType, Members},
    secret::Secret,
};

/// Smallest accepted modulus, in bytes (2048 bits).
const MIN_MODULUS_BYTES: usize = 256;

/// Largest accepted modulus, in bits.
const MAX_MODULUS_BITS: usize = 16384;

/// An RSA key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rsa {
    /// The public modulus.
    pub n: String,

    /// The public exponent.
    pub e: String,

    /// The private key material.
    pub prv: Option<RsaPrivate>,
}

/// The private members of an RSA key, including the CRT values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaPrivate {
    /// The private exponent.
    pub d: Secret,

    /// The first prime factor.
    pub p: Secret,

    /// The second prime factor.
    pub q: Secret,

    /// The first factor CRT exponent.
    pub dp: Secret,

    /// The second factor CRT exponent.
    pub dq: Secret,

    /// The first CRT coefficient.
    pub qi: Secret,
}

impl RsaPrivate {
    fn parse(members: &Members<'_>) -> Result<Self, JwkError> {
        let member = |name| members.required_encoded(name).map(Secret::new);

        Ok(Self {
            d: member("d")?,
            p: member("p")?,
            q: member("q")?,
            dp: member("dp")?,
            dq: member("dq")?,
            qi: member("qi")?,
        })
    }

    fn members(&self) -> [(&'static str, &Secret); 6] {
        [
            ("d", &self.d),
            ("p", &self.p),
            ("q", &self.q),
            ("dp", &self.dp),
            ("dq", &self.dq),
            ("qi", &self.qi),
        ]
    }
}

impl Rsa {
    pub(crate) fn parse(members: &Members<'_>, private: bool) -> Result<Self, JwkError> {
        let prv = if private { Some(RsaPrivate::parse(members)?) } else { None };

        members.expect_kty(KeyType::Rsa)?;

        let n = members.required_str("n")?;
        if bytes::decode("n", n)?.len() < MIN_MODULUS_BYTES {
            return Err(invalid("n"));
        }

        let e = members.required_encoded("e")?;

        Ok(Self {
            n: n.to_owned(),
            e: e.to_owned(),
            prv,
        })
    }

    pub(crate) fn thumbprint_members(&self) -> Vec<(&'static str, &str)> {
        vec![("e", &self.e), ("kty", "RSA"), ("n", &self.n)]
    }

    pub(crate) fn write_members(&self, map: &mut Map<String, Value>) {
        map.insert("n".into(), self.n.as_str().into());
        map.insert("e".into(), self.e.as_str().into());

        for (name, value) in self.prv.iter().flat_map(RsaPrivate::members) {
            map.insert(name.into(), value.expose().into());
        }
    }

    pub(crate) fn key_handle(&self) -> Result<KeyHandle, JwkError> {
        let n = integer("n", &self.n)?;
        let e = integer("e", &self.e)?;

        let Some(prv) = &self.prv else {
            return RsaPublicKey::new_with_max_size(n, e, MAX_MODULUS_BITS)
                .map(KeyHandle::RsaPublic)
                .map_err(|err| JwkError::key_material("n", err));
        };

        let d = integer("d", prv.d.expose())?;
        let p = integer("p", prv.p.expose())?;
        let q = integer("q", prv.q.expose())?;

        let key = RsaPrivateKey::from_components(n, e, d.clone(), vec![p.clone(), q.clone()])
            .map_err(|err| JwkError::key_material("d", err))?;
        key.validate().map_err(|err| JwkError::key_material("d", err))?;

        // The primes are validated above, so `p - 1` and `q - 1` cannot underflow.
        let one = BigUint::from(1u8);

        if &d % (&p - &one) != integer("dp", prv.dp.expose())? {
            return Err(JwkError::key_material("dp", "does not equal d mod (p - 1)"));
        }

        if &d % (&q - &one) != integer("dq", prv.dq.expose())? {
            return Err(JwkError::key_material("dq", "does not equal d mod (q - 1)"));
        }

        if (integer("qi", prv.qi.expose())? * &q) % &p != one {
            return Err(JwkError::key_material("qi", "is not the inverse of q mod p"));
        }

        Ok(KeyHandle::RsaPrivate(key))
    }
}

fn integer(member: &'static str, value: &str) -> Result<BigUint, JwkError> {
    bytes::decode(member, value).map(|bytes| BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{key::JwkKind, Jwk};
    use serde_json::json;

    const PRIVATE_KEY: &str = include_str!("../tests/data/rsa-private.json");

    fn private_params() -> Value {
        serde_json::from_str(PRIVATE_KEY).unwrap()
    }

    fn public_params() -> Value {
        let params = private_params();
        json!({ "kty": "RSA", "n": params["n"], "e": params["e"] })
    }

    #[test]
    fn builds_public_key() {
        let jwk = Jwk::new(JwkKind::RsaPublic, public_params()).unwrap();

        assert!(matches!(jwk.key_handle(), KeyHandle::RsaPublic(_)));
        assert_eq!(jwk.to_json(), public_params());
    }

    #[test]
    fn builds_private_key() {
        let jwk = Jwk::new(JwkKind::RsaPrivate, private_params()).unwrap();

        assert!(matches!(jwk.key_handle(), KeyHandle::RsaPrivate(_)));
        assert_eq!(jwk.to_json(), private_params());
    }

    #[test]
    fn private_members_are_checked_in_order() {
        for member in ["d", "p", "q", "dp", "dq", "qi"] {
            let mut params = private_params();
            params[member] = json!(65537);
            params["kty"] = json!("EC");

            let err = Jwk::new(JwkKind::RsaPrivate, params).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid jwk parameter \"{member}\"."));
        }
    }

    #[test]
    fn rejects_short_modulus() {
        let mut params = public_params();
        params["n"] = json!(bytes::encode(&[0xa5; 255]));

        let err = Jwk::new(JwkKind::RsaPublic, params).unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid jwk parameter "n"."#);
    }

    #[test]
    fn rejects_invalid_exponent() {
        let mut params = public_params();
        params["e"] = json!(["AQAB"]);

        let err = Jwk::new(JwkKind::RsaPublic, params).unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid jwk parameter "e"."#);
    }

    #[test]
    fn rejects_inconsistent_crt_values() {
        let mut params = private_params();
        let dq = params["dq"].clone();
        params["dq"] = params["dp"].clone();
        params["dp"] = dq;

        let err = Jwk::new(JwkKind::RsaPrivate, params).unwrap_err();
        assert!(matches!(err, JwkError::KeyMaterial { parameter: "dp", .. }));

        let mut params = private_params();
        params["q"] = params["p"].clone();

        let err = Jwk::new(JwkKind::RsaPrivate, params).unwrap_err();
        assert!(matches!(err, JwkError::KeyMaterial { parameter: "d", .. }));
    }
}
