//! Production channel: APNs over HTTP/2 via `reqwest`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Notification, Response};
use crate::error::{Error, Result};
use crate::port::{ApnsChannel, ChannelFactory};

/// APNs production host.
pub const PRODUCTION_ENDPOINT: &str = "https://api.push.apple.com";
/// APNs sandbox host.
pub const SANDBOX_ENDPOINT: &str = "https://api.sandbox.push.apple.com";

/// APNs advertises 500 concurrent streams per connection once established.
const MAX_CONCURRENT_STREAMS: u32 = 500;

#[derive(Debug, Clone)]
pub struct Http2ChannelConfig {
    /// Service base URL.
    pub endpoint: String,
    /// Default `apns-topic` applied when a notification carries none.
    pub topic: Option<String>,
    /// PEM-encoded client certificate + key for certificate-based
    /// provider authentication.
    pub identity_pem: Option<Vec<u8>>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for Http2ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: PRODUCTION_ENDPOINT.to_string(),
            topic: None,
            identity_pem: None,
            request_timeout_ms: 20_000,
        }
    }
}

/// Error body APNs returns on non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    reason: Option<String>,
    timestamp: Option<u64>,
}

/// One HTTP/2 connection to APNs.
///
/// The TLS client and connection pool live inside `reqwest`; this type
/// adds APNs request construction, response classification, and in-flight
/// stream accounting for the scaling metrics.
pub struct Http2Channel {
    cfg: Http2ChannelConfig,
    client: Option<reqwest::Client>,
    in_flight: Arc<AtomicU32>,
}

impl Http2Channel {
    pub fn new(cfg: Http2ChannelConfig) -> Self {
        Self {
            cfg,
            client: None,
            in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Factory producing fresh channels for the governor's launches.
    pub fn factory(cfg: Http2ChannelConfig) -> ChannelFactory {
        Arc::new(move || Box::new(Self::new(cfg.clone())))
    }

    fn build_client(cfg: &Http2ChannelConfig) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .http2_prior_knowledge()
            .timeout(Duration::from_millis(cfg.request_timeout_ms));
        if let Some(pem) = &cfg.identity_pem {
            let identity =
                reqwest::Identity::from_pem(pem).map_err(|e| Error::Connect(e.to_string()))?;
            builder = builder.identity(identity);
        }
        builder.build().map_err(|e| Error::Connect(e.to_string()))
    }

    fn device_url(&self, notification: &Notification) -> String {
        format!(
            "{}/3/device/{}",
            self.cfg.endpoint.trim_end_matches('/'),
            notification.device_token()
        )
    }
}

#[async_trait]
impl ApnsChannel for Http2Channel {
    /// Build the TLS client and verify the endpoint answers over HTTP/2.
    ///
    /// The preflight posts an empty request the service will reject; any
    /// HTTP-level answer proves the handshake, while a transport failure
    /// fails the launch.
    async fn connect(&mut self) -> Result<()> {
        let client = Self::build_client(&self.cfg)?;
        let probe = client
            .post(format!(
                "{}/3/device/",
                self.cfg.endpoint.trim_end_matches('/')
            ))
            .body(Vec::new())
            .send()
            .await;
        match probe {
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "handshake preflight answered");
                self.client = Some(client);
                Ok(())
            }
            Err(e) => Err(Error::Connect(e.to_string())),
        }
    }

    async fn exchange(&self, notification: &Notification) -> Result<Response> {
        let Some(client) = &self.client else {
            return Err(Error::Connect("channel not connected".to_string()));
        };

        let body = serde_json::to_vec(notification.payload())?;
        let mut request = client
            .post(self.device_url(notification))
            .header("content-type", "application/json")
            .body(body);
        if let Some(topic) = notification.topic().or(self.cfg.topic.as_deref()) {
            request = request.header("apns-topic", topic);
        }
        if let Some(priority) = notification.priority() {
            request = request.header("apns-priority", priority.header_value());
        }
        if let Some(collapse_id) = notification.collapse_id() {
            request = request.header("apns-collapse-id", collapse_id);
        }
        if let Some(expiration) = notification.expiration() {
            request = request.header("apns-expiration", expiration.to_string());
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let sent = request.send().await;
        self.in_flight.fetch_sub(1, Ordering::AcqRel);

        // A request that never produced an HTTP answer is a connection
        // problem; the worker will quit and be replaced.
        let resp = sent.map_err(|e| Error::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let apns_id = resp
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if (200..300).contains(&status) {
            return Ok(Response::accepted(apns_id));
        }
        let body: ErrorBody = resp.json().await.unwrap_or_default();
        Ok(Response {
            status,
            reason: body.reason,
            apns_id,
            timestamp: body.timestamp,
        })
    }

    fn stream_budget(&self) -> u32 {
        MAX_CONCURRENT_STREAMS.saturating_sub(self.in_flight.load(Ordering::Acquire))
    }

    fn name(&self) -> &'static str {
        "apns-http2"
    }
}
