//! Metrics client: fetches and parses one exposition endpoint.
//!
//! Transport failures never escape [`MetricsClient::scrape`]: they are
//! logged and an empty snapshot is returned. Callers that must tell a
//! dead node from an empty body use [`MetricsClient::try_scrape`].

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use thiserror::Error;
use tracing::{debug, warn};

use crate::exposition::{ExpositionParser, MetricSnapshot};

/// Result type alias for scrape operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Why a scrape produced no data.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("invalid metrics url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("scrape timed out after {0:?}")]
    Timeout(Duration),
}

/// Boxed future returned by [`MetricsTransport::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = ScrapeResult<String>> + Send + 'a>>;

/// Fetches the raw exposition body behind a URL.
///
/// Injected so the scheduler can run against in-memory exporters.
pub trait MetricsTransport: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a>;
}

/// Plain HTTP/1.1 transport over a fresh TCP connection per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl MetricsTransport for HttpTransport {
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a> {
        Box::pin(http_get(url, timeout))
    }
}

/// GET `url` and return the body if the status is 2xx.
pub async fn http_get(url: &str, timeout: Duration) -> ScrapeResult<String> {
    let invalid = |reason: &str| ScrapeError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    if let Some(scheme) = uri.scheme_str() {
        if scheme != "http" {
            return Err(invalid("only http is supported"));
        }
    }
    let authority = uri.authority().ok_or_else(|| invalid("missing host"))?.clone();
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
    let path = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());

    let result = tokio::time::timeout(timeout, async {
        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(|e| ScrapeError::Connect {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(path.as_str())
            .header("host", authority.as_str())
            .header("user-agent", "wadas-scheduler/0.1")
            .header("accept", "text/plain")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ScrapeError::Http(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status(status.as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?
            .to_bytes();

        Ok::<_, ScrapeError>(String::from_utf8_lossy(&body).into_owned())
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(ScrapeError::Timeout(timeout)),
    }
}

/// Scrapes exposition endpoints into [`MetricSnapshot`]s.
#[derive(Clone)]
pub struct MetricsClient {
    transport: Arc<dyn MetricsTransport>,
    parser: Arc<ExpositionParser>,
}

impl MetricsClient {
    /// Client backed by [`HttpTransport`].
    pub fn http() -> anyhow::Result<Self> {
        Self::with_transport(Arc::new(HttpTransport))
    }

    pub fn with_transport(transport: Arc<dyn MetricsTransport>) -> anyhow::Result<Self> {
        Ok(Self {
            transport,
            parser: Arc::new(ExpositionParser::new()?),
        })
    }

    /// Scrape `url`, surfacing transport failures to the caller.
    pub async fn try_scrape(
        &self,
        url: &str,
        targets: &HashSet<String>,
        timeout: Duration,
    ) -> ScrapeResult<MetricSnapshot> {
        let body = self.transport.fetch(url, timeout).await?;
        let snapshot = self.parser.parse(&body, targets);
        debug!(%url, metrics = snapshot.len(), "scraped metrics endpoint");
        Ok(snapshot)
    }

    /// Scrape `url`; on any failure log a warning and return an empty snapshot.
    pub async fn scrape(
        &self,
        url: &str,
        targets: &HashSet<String>,
        timeout: Duration,
    ) -> MetricSnapshot {
        match self.try_scrape(url, targets, timeout).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%url, error = %e, "metrics scrape failed");
                MetricSnapshot::new()
            }
        }
    }

    /// Scrape `url` keeping every metric in the body.
    pub async fn scrape_all(&self, url: &str, timeout: Duration) -> ScrapeResult<MetricSnapshot> {
        let body = self.transport.fetch(url, timeout).await?;
        Ok(self.parser.parse_all(&body))
    }
}

impl std::fmt::Debug for MetricsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Serves canned bodies keyed by URL; unknown URLs fail to connect.
    struct FixedTransport {
        bodies: HashMap<String, ScrapeResult<String>>,
    }

    impl MetricsTransport for FixedTransport {
        fn fetch<'a>(&'a self, url: &'a str, _timeout: Duration) -> FetchFuture<'a> {
            let result = self.bodies.get(url).cloned().unwrap_or_else(|| {
                Err(ScrapeError::Connect {
                    address: url.to_string(),
                    reason: "refused".to_string(),
                })
            });
            Box::pin(async move { result })
        }
    }

    fn client(bodies: Vec<(&str, ScrapeResult<String>)>) -> MetricsClient {
        let transport = FixedTransport {
            bodies: bodies
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        MetricsClient::with_transport(Arc::new(transport)).unwrap()
    }

    fn targets(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn scrape_parses_body() {
        let c = client(vec![(
            "http://10.0.0.1:8002/",
            Ok("gpu_utilization{empty=\"\"} 40\n".to_string()),
        )]);
        let snap = c
            .scrape("http://10.0.0.1:8002/", &targets(&["gpu_utilization"]), Duration::from_secs(1))
            .await;
        assert_eq!(snap.get("gpu_utilization"), Some(40.0));
    }

    #[tokio::test]
    async fn scrape_failure_yields_empty_snapshot() {
        let c = client(vec![]);
        let snap = c
            .scrape("http://10.0.0.9:8000/", &targets(&["npu_utilization"]), Duration::from_secs(1))
            .await;
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn try_scrape_surfaces_status() {
        let c = client(vec![("http://10.0.0.1:1/metrics", Err(ScrapeError::Status(503)))]);
        let err = c
            .try_scrape("http://10.0.0.1:1/metrics", &targets(&["x"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status(503)));
    }

    #[tokio::test]
    async fn http_get_rejects_https() {
        let err = http_get("https://10.0.0.1/metrics", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn http_get_rejects_missing_host() {
        let err = http_get("/metrics", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidUrl { .. }));
    }
}
