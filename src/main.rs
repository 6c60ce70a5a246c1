use std::{env, fs, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dotenv_flow::dotenv_flow;
use eyre::{eyre, Result, WrapErr};
use jose_jwk::{HttpCertificateFetcher, Jwk, JwkSet, ValidationOptions};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load dotenv-flow variables
    dotenv_flow().ok();

    // Enable logging
    config_tracing();

    let path = env::args().nth(1).ok_or_else(|| eyre!("usage: jwk-inspect <jwk-or-jwks.json>"))?;
    let document = fs::read_to_string(&path).wrap_err_with(|| format!("cannot read {path}"))?;
    let value: Value = serde_json::from_str(&document).wrap_err("input is not a JSON document")?;

    let options = validation_options()?;

    let output = if value.get("keys").is_some() {
        let jwks = JwkSet::from_value_with_options(value, &options)?;
        info!("validated a set of {} keys", jwks.len());
        jwks.iter().for_each(report);
        jwks.to_json()
    } else {
        let jwk = Jwk::from_value_with_options(value, &options)?;
        report(&jwk);
        jwk.to_json()
    };

    println!("{}", json_canon::to_string(&output)?);

    Ok(())
}

fn validation_options() -> Result<ValidationOptions> {
    let mut options = ValidationOptions::new();

    if let Ok(secs) = env::var("JWK_X5U_TIMEOUT_SECS") {
        let secs: u64 = secs.parse().wrap_err("JWK_X5U_TIMEOUT_SECS must be a number of seconds")?;
        let fetcher = HttpCertificateFetcher::new(Duration::from_secs(secs));
        options = options.with_fetcher(Arc::new(fetcher));
    }

    if let Ok(at) = env::var("JWK_INSPECT_AT") {
        let at = DateTime::parse_from_rfc3339(&at)
            .wrap_err("JWK_INSPECT_AT must be an RFC 3339 timestamp")?;
        options = options.at(at.with_timezone(&Utc));
    }

    Ok(options)
}

fn report(jwk: &Jwk) {
    info!(
        kind = ?jwk.kind(),
        kid = jwk.kid().unwrap_or("-"),
        thumbprint = %jwk.encoded_thumbprint(),
        "valid key"
    );
}

fn config_tracing() {
    let tracing_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let filter = filter::Targets::new()
        .with_target("hyper::proto", tracing::Level::INFO)
        .with_target("hyper_util", tracing::Level::INFO)
        .with_default(tracing::Level::DEBUG);

    tracing_subscriber::registry()
        .with(tracing_layer)
        .with(filter)
        .init();
}
