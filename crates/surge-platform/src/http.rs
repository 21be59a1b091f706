//! HTTP client for a remote orchestration control plane.
//!
//! Speaks plain http1 with a fresh connection per call, the same way the
//! health-probe side of the daemon talks to instances. Wire shape:
//!
//! - `GET  /services/{cluster}/{service}` → `{desiredCount, runningCount}`
//! - `PUT  /services/{cluster}/{service}/desired-count` with
//!   `{"desiredCount": n}`
//!
//! A 404 maps to [`PlatformError::ServiceNotFound`]; timeouts, transport
//! errors and unexpected statuses map to [`PlatformError::Unavailable`].

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tracing::debug;

use crate::client::{PlatformClient, PlatformFuture, ServiceCounts};
use crate::error::{PlatformError, PlatformResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    desired_count: u32,
}

/// [`PlatformClient`] over a remote control plane at `authority`
/// (`host:port`).
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    authority: String,
    timeout: Duration,
}

impl HttpPlatform {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Budget for one full request/response exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn describe_uri(&self, cluster_ref: &str, service_ref: &str) -> String {
        format!(
            "http://{}/services/{cluster_ref}/{service_ref}",
            self.authority
        )
    }

    fn update_uri(&self, cluster_ref: &str, service_ref: &str) -> String {
        format!(
            "http://{}/services/{cluster_ref}/{service_ref}/desired-count",
            self.authority
        )
    }

    /// One http1 exchange: connect, handshake, send, collect the body.
    async fn exchange(
        &self,
        method: &str,
        uri: &str,
        body: Bytes,
    ) -> PlatformResult<(http::StatusCode, Bytes)> {
        let attempt = async {
            let stream = tokio::net::TcpStream::connect(&self.authority)
                .await
                .map_err(|e| PlatformError::Unavailable(format!("connect failed: {e}")))?;
            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| PlatformError::Unavailable(format!("handshake failed: {e}")))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method(method)
                .uri(uri)
                .header("host", self.authority.as_str())
                .header("content-type", "application/json")
                .header("user-agent", "surge-platform/0.1")
                .body(Full::new(body))
                .map_err(|e| PlatformError::Unavailable(format!("invalid request: {e}")))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| PlatformError::Unavailable(format!("request failed: {e}")))?;
            let status = resp.status();
            let raw = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| PlatformError::Unavailable(format!("body read failed: {e}")))?
                .to_bytes();
            Ok((status, raw))
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%uri, "platform request timed out");
                Err(PlatformError::Unavailable("request timed out".into()))
            }
        }
    }

    fn status_error(
        status: http::StatusCode,
        cluster_ref: &str,
        service_ref: &str,
    ) -> PlatformError {
        if status == http::StatusCode::NOT_FOUND {
            PlatformError::ServiceNotFound {
                cluster_ref: cluster_ref.to_string(),
                service_ref: service_ref.to_string(),
            }
        } else {
            PlatformError::Unavailable(format!("unexpected status {status}"))
        }
    }
}

impl PlatformClient for HttpPlatform {
    fn describe_service<'a>(
        &'a self,
        cluster_ref: &'a str,
        service_ref: &'a str,
    ) -> PlatformFuture<'a, ServiceCounts> {
        Box::pin(async move {
            let uri = self.describe_uri(cluster_ref, service_ref);
            let (status, raw) = self.exchange("GET", &uri, Bytes::new()).await?;
            if !status.is_success() {
                return Err(Self::status_error(status, cluster_ref, service_ref));
            }
            serde_json::from_slice(&raw)
                .map_err(|e| PlatformError::Unavailable(format!("malformed describe body: {e}")))
        })
    }

    fn update_service<'a>(
        &'a self,
        cluster_ref: &'a str,
        service_ref: &'a str,
        desired_count: u32,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let uri = self.update_uri(cluster_ref, service_ref);
            let body = serde_json::to_vec(&UpdateBody { desired_count })
                .map_err(|e| PlatformError::Unavailable(format!("encode failed: {e}")))?;
            let (status, _) = self.exchange("PUT", &uri, Bytes::from(body)).await?;
            if !status.is_success() {
                return Err(Self::status_error(status, cluster_ref, service_ref));
            }
            debug!(%cluster_ref, %service_ref, desired_count, "remote desired count set");
            Ok(())
        })
    }
}
