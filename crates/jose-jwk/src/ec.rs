use core::fmt;

use p256::elliptic_curve::{
    sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey, SecretKey,
};
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

/// An elliptic-curve key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ec {
    /// The elliptic curve identifier.
    pub crv: EcCurve,

    /// The public x coordinate.
    pub x: String,

    /// The public y coordinate.
    pub y: String,

    /// The private key.
    pub d: Option<Secret>,
}

/// The elliptic curve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    /// P-256
    #[serde(rename = "P-256")]
    P256,

    /// P-384
    #[serde(rename = "P-384")]
    P384,

    /// P-521
    #[serde(rename = "P-521")]
    P521,
}

impl EcCurve {
    pub const SUPPORTED: [EcCurve; 3] = [EcCurve::P256, EcCurve::P384, EcCurve::P521];
    pub const NAMES: [&'static str; 3] = ["P-256", "P-384", "P-521"];

    pub const fn as_str(self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
            EcCurve::P521 => "P-521",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::SUPPORTED.into_iter().find(|crv| crv.as_str() == name)
    }

    /// Length in bytes of a coordinate or private scalar.
    pub const fn field_size(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Ec {
    pub(crate) fn parse(members: &Members<'_>, private: bool) -> Result<Self, JwkError> {
        let d = if private {
            Some(Secret::new(members.required_encoded("d")?))
        } else {
            None
        };

        members.expect_kty(KeyType::Ec)?;

        let crv = members
            .get("crv")
            .and_then(Value::as_str)
            .and_then(EcCurve::from_name)
            .ok_or_else(|| invalid("crv"))?;

        let x = members.required_encoded("x")?.to_owned();
        let y = members.required_encoded("y")?.to_owned();

        Ok(Self { crv, x, y, d })
    }

    pub(crate) fn thumbprint_members(&self) -> Vec<(&'static str, &str)> {
        vec![("crv", self.crv.as_str()), ("kty", "EC"), ("x", &self.x), ("y", &self.y)]
    }

    pub(crate) fn write_members(&self, map: &mut Map<String, Value>) {
        map.insert("crv".into(), self.crv.as_str().into());
        map.insert("x".into(), self.x.as_str().into());
        map.insert("y".into(), self.y.as_str().into());

        if let Some(d) = &self.d {
            map.insert("d".into(), d.expose().into());
        }
    }

    pub(crate) fn key_handle(&self) -> Result<KeyHandle, JwkError> {
        let size = self.crv.field_size();
        let x = bytes::decode("x", &self.x)?;
        let y = bytes::decode("y", &self.y)?;
        let d = match &self.d {
            Some(d) => Some(Zeroizing::new(bytes::decode("d", d.expose())?)),
            None => None,
        };

        let coordinates = [("x", x.len()), ("y", y.len())];
        let scalar = d.as_ref().map(|d| ("d", d.len()));

        for (member, len) in coordinates.into_iter().chain(scalar) {
            if len != size {
                let reason = format!("expected {size} bytes for {}", self.crv);
                return Err(JwkError::key_material(member, reason));
            }
        }

        let mut point = Vec::with_capacity(1 + 2 * size);
        point.push(0x04);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);

        let d = d.as_ref().map(|d| d.as_slice());

        Ok(match self.crv {
            EcCurve::P256 => match curve_keys::<p256::NistP256>(&point, d)? {
                (public, None) => KeyHandle::P256Public(public),
                (_, Some(secret)) => KeyHandle::P256Private(secret),
            },
            EcCurve::P384 => match curve_keys::<p384::NistP384>(&point, d)? {
                (public, None) => KeyHandle::P384Public(public),
                (_, Some(secret)) => KeyHandle::P384Private(secret),
            },
            EcCurve::P521 => match curve_keys::<p521::NistP521>(&point, d)? {
                (public, None) => KeyHandle::P521Public(public),
                (_, Some(secret)) => KeyHandle::P521Private(secret),
            },
        })
    }
}

/// Builds the curve keys from an uncompressed SEC1 point and an optional private scalar.
fn curve_keys<C>(
    point: &[u8],
    d: Option<&[u8]>,
) -> Result<(PublicKey<C>, Option<SecretKey<C>>), JwkError>
where
    C: CurveArithmetic,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let public = PublicKey::<C>::from_sec1_bytes(point)
        .map_err(|_| JwkError::key_material("x", "not a point on the curve"))?;

    let Some(d) = d else {
        return Ok((public, None));
    };

    let secret = SecretKey::<C>::from_slice(d)
        .map_err(|_| JwkError::key_material("d", "not a valid private scalar"))?;

    if secret.public_key().to_encoded_point(false).as_bytes() != point {
        return Err(JwkError::key_material("d", "does not match the public key"));
    }

    Ok((public, Some(secret)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        key::{JwkKind, KeyVisibility},
        Jwk,
    };
    use serde_json::json;

    fn public_params() -> Value {
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "4c_cS6IT6jaVQeobt_6BDCTmzBaBOTmmiSCpjd5a6Og",
            "y": "mnrPnCFTDkGdEwilabaqM7DzwlAFgetZTmP9ycHPxF8",
        })
    }

    fn private_params() -> Value {
        let mut params = public_params();
        params["d"] = json!("bwVX6Vx-TOfGKYOPAcu2xhaj3JUzs-McsC-suaHnFBo");
        params
    }

    #[test]
    fn supported_curves() {
        assert_eq!(EcCurve::NAMES, EcCurve::SUPPORTED.map(EcCurve::as_str));
        assert_eq!(EcCurve::from_name("P-384"), Some(EcCurve::P384));
        assert_eq!(EcCurve::from_name("secp256k1"), None);
    }

    #[test]
    fn builds_public_key() {
        let jwk = Jwk::new(JwkKind::EcPublic, public_params()).unwrap();

        assert!(matches!(jwk.key_handle(), KeyHandle::P256Public(_)));
        assert_eq!(jwk.key_handle().visibility(), KeyVisibility::Public);
        assert_eq!(jwk.to_json(), public_params());
    }

    #[test]
    fn builds_private_key() {
        let jwk = Jwk::new(JwkKind::EcPrivate, private_params()).unwrap();

        assert!(matches!(jwk.key_handle(), KeyHandle::P256Private(_)));
        assert_eq!(jwk.to_json(), private_params());
    }

    #[test]
    fn private_members_are_checked_first() {
        let mut params = public_params();
        params["kty"] = json!("RSA");

        let err = Jwk::new(JwkKind::EcPrivate, params.clone()).unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid jwk parameter "d"."#);

        let err = Jwk::new(JwkKind::EcPublic, params).unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid jwk parameter "kty". Expected "EC", got "RSA"."#);
    }

    #[test]
    fn rejects_invalid_members() {
        for (member, value) in [
            ("crv", json!("P-192")),
            ("crv", json!(256)),
            ("x", json!(1)),
            ("x", json!("not+base64url")),
            ("y", Value::Null),
        ] {
            let mut params = public_params();
            params[member] = value;

            let err = Jwk::new(JwkKind::EcPublic, params).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid jwk parameter \"{member}\"."));
        }
    }

    #[test]
    fn rejects_inconsistent_key_material() {
        let mut params = private_params();
        params["d"] = json!("ayWmoNq3XP-VUgjbyS3rc-k3WidFeRIHlAn8T68bsPw");
        let err = Jwk::new(JwkKind::EcPrivate, params).unwrap_err();
        assert!(matches!(err, JwkError::KeyMaterial { parameter: "d", .. }));

        let mut params = public_params();
        params["crv"] = json!("P-384");
        let err = Jwk::new(JwkKind::EcPublic, params).unwrap_err();
        assert!(matches!(err, JwkError::KeyMaterial { parameter: "x", .. }));

        let mut params = public_params();
        params["y"] = json!("ICKNKT6_qEyGOiHVLFEgrIxHvawFZLk-_ZKJhy373SE");
        let err = Jwk::new(JwkKind::EcPublic, params).unwrap_err();
        assert!(matches!(err, JwkError::KeyMaterial { parameter: "x", .. }));
    }

    #[test]
    fn thumbprint_members_are_ordered() {
        let jwk = Jwk::new(JwkKind::EcPublic, public_params()).unwrap();
        let names: Vec<_> = jwk.thumbprint_members().into_iter().map(|(name, _)| name).collect();

        assert_eq!(names, ["crv", "kty", "x", "y"]);
    }
}
