//! Retrieval of `x5u` certificate chains.

use std::{future::Future, thread, time::Duration};

use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{CertificateError, FetchError};

static PEM_CERTIFICATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-----BEGIN CERTIFICATE-----([\s\S]*?)-----END CERTIFICATE-----").unwrap()
});

/// Source of the documents referenced by `x5u`.
pub trait CertificateFetcher: Send + Sync {
    /// Retrieves the resource at `url`.
    ///
    /// The call returns only once the body is fully available.
    fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Fetches `x5u` documents with a plain HTTP or HTTPS GET.
#[derive(Clone, Debug)]
pub struct HttpCertificateFetcher {
    timeout: Duration,
}

impl Default for HttpCertificateFetcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl HttpCertificateFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get(&self, uri: Uri) -> Result<String, FetchError> {
        let client = Client::builder(TokioExecutor::new())
            .build::<_, Full<Bytes>>(HttpsConnector::<HttpConnector>::new());

        let res = client.get(uri).await?;
        tracing::debug!(status = %res.status(), "x5u response");

        if !res.status().is_success() {
            return Err(FetchError::NonSuccessResponse(res.status()));
        }

        let body = BodyExt::collect(res.into_body()).await?.to_bytes();
        Ok(String::from_utf8(body.to_vec())?)
    }
}

impl CertificateFetcher for HttpCertificateFetcher {
    fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_owned()));
        }

        let uri: Uri = url.as_str().parse()?;
        let timeout = self.timeout;

        // Runs on its own thread so that callers already inside a tokio runtime can block on it.
        thread::scope(|scope| {
            let worker = scope.spawn(move || block_on_with_timeout(timeout, self.get(uri)));
            worker.join().map_err(|_| FetchError::WorkerPanicked)?
        })
    }
}

/// Drives `future` on a private runtime for at most `timeout`.
///
/// Blocking tasks still running at that point, such as DNS lookups, are
/// abandoned rather than awaited.
fn block_on_with_timeout<T, F>(timeout: Duration, future: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let result = runtime.block_on(async {
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    });

    runtime.shutdown_background();
    result
}

/// Extracts the base64 DER payload of every PEM certificate in `document`, in order.
pub fn extract_pem_certificates(document: &str) -> Vec<String> {
    PEM_CERTIFICATE
        .captures_iter(document)
        .filter_map(|captures| captures.get(1))
        .map(|body| body.as_str().split_whitespace().collect())
        .collect()
}

/// Fetches the chain referenced by `x5u` and returns its `x5c` style entries.
///
/// Never returns an empty chain.
pub(crate) fn fetch_chain(
    fetcher: &dyn CertificateFetcher,
    x5u: &str,
) -> Result<Vec<String>, CertificateError> {
    let url = Url::parse(x5u).map_err(|_| CertificateError::InvalidUrl)?;

    if !matches!(url.scheme(), "http" | "https") {
        tracing::debug!(%url, "x5u scheme cannot be fetched");
        return Err(CertificateError::InvalidUrl);
    }

    let document = fetcher.fetch(&url).map_err(|err| {
        tracing::warn!(%url, "failed to fetch x5u certificate chain: {err}");
        CertificateError::Fetch(err)
    })?;

    let entries = extract_pem_certificates(&document);
    tracing::debug!(%url, certificates = entries.len(), "fetched x5u certificate chain");

    if entries.is_empty() {
        return Err(CertificateError::InvalidUrl);
    }

    Ok(entries)
}
