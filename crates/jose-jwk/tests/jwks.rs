use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use chrono::{TimeZone, Utc};
use jose_jwk::{
    bytes, CertificateError, CertificateFetcher, FetchError, Jwk, JwkError, JwkKind, JwkSet,
    JwksError, KeyType, KeyVisibility, ValidationOptions,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

const RSA_CHAIN: &str = include_str!("data/rsa-chain.pem");
const EC_CHAIN: &str = include_str!("data/ec-chain.pem");
const RSA_PRIVATE_KEY: &str = include_str!("data/rsa-private.json");

const REVENSKY_N: &str = "oZ9ANo0w0XDqLw29D7ZM_Qd8fR-6B_3l-MZ0CLikkfz71ivN28vm8hR4FIQJZAzRMdJXNDPVW3RG7ygCMVRgPl7IDAaU-ZIsowPoV63WePYZGd_x5MVdn9ZXzzSohw8uoJHYFwIn_RAHWNjS8e9_PpT2I3LhBbzm4k5rGJS8j2N1OC0DyGVLAc5Bif2klH7x-WPzFxqpCBLVfy9vQ1rtCo2Nwt9zlC1SLoiky7JxPwk3-4RuqRvUBhAZ_xyjbo68k9rfkPW1JqV-27ZbXHOH4rf6zAlEFjWOnKJsWYIKJDBHN2et6EpVgH66rZb-_fqfKqx1xeZT-YlfVK0MtakHKw";

fn options() -> ValidationOptions {
    ValidationOptions::new().at(Utc.with_ymd_and_hms(2026, 8, 12, 0, 0, 0).unwrap())
}

fn ec_private_key() -> Value {
    json!({
        "kty": "EC",
        "crv": "P-256",
        "x": "ICKNKT6_qEyGOiHVLFEgrIxHvawFZLk-_ZKJhy373SE",
        "y": "zHwhXREO0bwOg157G8Jdu7gS8whcriSf19kgc2GwzfQ",
        "d": "ayWmoNq3XP-VUgjbyS3rc-k3WidFeRIHlAn8T68bsPw",
        "use": "sig",
        "x5c": jose_jwk::x509::fetch::extract_pem_certificates(EC_CHAIN),
        "x5t": "vDr0r_1FbmgsYQD_diwKfBXG8Ww",
        "x5t#S256": "3RaVkkhQe8Q8Iyn6X2cqYZm_us8ERsw7kTJB9RisZYM",
    })
}

async fn create_mock_server() -> SocketAddr {
    let app = Router::new().route("/revensky.pem", get(|| async { RSA_CHAIN }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

#[test]
fn builds_a_set_from_mixed_keys() {
    let value = json!({
        "keys": [
            ec_private_key(),
            serde_json::from_str::<Value>(RSA_PRIVATE_KEY).unwrap(),
            { "kty": "oct", "k": "qDM80igvja4Tg_tNsEuWDhl2bMM6_NgJEldFhIEuwqQ", "alg": "HS256" },
        ]
    });

    let jwks = JwkSet::from_value_with_options(value, &options()).unwrap();
    assert_eq!(jwks.len(), 3);

    let kinds: Vec<_> = jwks.iter().map(Jwk::kind).collect();
    assert_eq!(kinds, [JwkKind::EcPrivate, JwkKind::RsaPrivate, JwkKind::Oct]);

    let rsa = jwks.get(|jwk| jwk.key_type() == KeyType::Rsa).unwrap();
    assert_eq!(rsa.kid(), Some("OLDDm37M8_sU1nFYsM4WKaWkLQbgHUMnw3qM2askkGU"));
    assert_eq!(rsa.key_handle().visibility(), KeyVisibility::Private);

    let secret = jwks.get(|jwk| jwk.params().alg.as_deref() == Some("HS256")).unwrap();
    assert_eq!(secret.kid(), Some("vM7XT8f5s2ATReLbN47BWpPOuo7CTV1uv-zR8R9aOuk"));

    let serialized = jwks.to_json();
    assert_eq!(serialized["keys"][2]["kid"], "vM7XT8f5s2ATReLbN47BWpPOuo7CTV1uv-zR8R9aOuk");
    assert!(serialized["keys"][0].get("x5c").is_some());
}

#[test]
fn set_members_keep_their_json_shape() {
    let mut value = ec_private_key();
    value["kid"] = json!("ec-1");

    let jwk = Jwk::from_value_with_options(value.clone(), &options()).unwrap();
    let jwks = JwkSet::new(vec![jwk]).unwrap();

    assert_eq!(jwks.to_json(), json!({ "keys": [value] }));
    assert!(matches!(jwks.get(|jwk| jwk.kid() == Some("ec-2")), Err(JwksError::NotFound)));
}

#[test]
fn private_ec_key_must_match_its_certificate() {
    let mut value = ec_private_key();
    value["y"] = json!(bytes::encode(&[7; 32]));

    let err = Jwk::from_value_with_options(value, &options()).unwrap_err();
    assert!(matches!(err, JwkError::Certificate(CertificateError::KeyMismatch)));
}

#[test]
fn custom_fetchers_resolve_x5u() {
    struct Unreachable;

    impl CertificateFetcher for Unreachable {
        fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            Err(FetchError::Other(format!("{url} is unreachable").into()))
        }
    }

    let value = json!({
        "kty": "RSA",
        "n": REVENSKY_N,
        "e": "AQAB",
        "x5u": "https://pki.example.com/chain.pem",
    });
    let options = options().with_fetcher(Arc::new(Unreachable));

    let err = Jwk::from_value_with_options(value, &options).unwrap_err();
    assert_eq!(err.to_string(), "Error reading the certificate chain from the url.");
    assert!(matches!(err, JwkError::Certificate(CertificateError::Fetch(FetchError::Other(_)))));
}

#[tokio::test(flavor = "multi_thread")]
async fn resolves_x5u_over_http() {
    let addr = create_mock_server().await;

    let value = json!({
        "kty": "RSA",
        "n": REVENSKY_N,
        "e": "AQAB",
        "x5u": format!("http://{addr}/revensky.pem"),
        "x5t#S256": "hRYOcUfJLh-Md6KzaOTdk9lv8Q8lhvZh6ucIqd3GaG0",
    });

    let jwk = tokio::task::spawn_blocking(move || Jwk::from_value_with_options(value, &options()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(jwk.kind(), JwkKind::RsaPublic);
    assert_eq!(jwk.encoded_thumbprint(), "IfJoPyLzPZQ16IKlILyP2M6S9v9JfLTcE0EGUWzk2gQ");
}
