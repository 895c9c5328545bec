//! Reqwest-backed tracking provider adapter.
//!
//! This adapter owns transport details only: request construction, timeout
//! and HTTP error mapping, and JSON decoding into domain snapshots. It makes
//! exactly one request per lookup and never retries.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use super::dto::ShipmentResponseDto;
use crate::domain::ShipmentSnapshot;
use crate::domain::ports::{TrackingProvider, TrackingProviderError, TrackingRequest};

/// Default per-call timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
const API_KEY_HEADER: &str = "API_KEY";

/// Provider adapter issuing `GET {base}/shipment` lookups.
pub struct HttpTrackingProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpTrackingProvider {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    /// ```rust,ignore
    /// let provider = HttpTrackingProvider::new(base_url, api_key, timeout)?;
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: shipment_endpoint(base_url),
            api_key: api_key.into(),
        })
    }
}

fn shipment_endpoint(mut base_url: Url) -> Url {
    let path = format!("{}/shipment", base_url.path().trim_end_matches('/'));
    base_url.set_path(&path);
    base_url
}

fn query_pairs(request: &TrackingRequest) -> Vec<(&'static str, &str)> {
    let mut pairs = vec![("shipmentNumber", request.shipment_number.as_str())];
    if !request.shipment_type.is_empty() {
        pairs.push(("shipmentType", request.shipment_type.as_str()));
    }
    if !request.sealine.is_empty() {
        pairs.push(("sealine", request.sealine.as_str()));
    }
    pairs
}

#[async_trait]
impl TrackingProvider for HttpTrackingProvider {
    async fn fetch_shipment(
        &self,
        request: &TrackingRequest,
    ) -> Result<ShipmentSnapshot, TrackingProviderError> {
        let started = Instant::now();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&query_pairs(request))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(
            shipment_number = %request.shipment_number,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tracking provider responded"
        );
        if !status.is_success() {
            warn!(
                shipment_number = %request.shipment_number,
                status = status.as_u16(),
                body = %body_preview(body.as_ref()),
                "tracking provider rejected lookup"
            );
            return Err(map_status_error(status, body.as_ref()));
        }

        parse_snapshot(body.as_ref())
    }
}

fn parse_snapshot(body: &[u8]) -> Result<ShipmentSnapshot, TrackingProviderError> {
    let decoded: ShipmentResponseDto = serde_json::from_slice(body).map_err(|error| {
        TrackingProviderError::decode(format!("invalid shipment JSON payload: {error}"))
    })?;
    Ok(decoded.into_domain())
}

fn map_transport_error(error: reqwest::Error) -> TrackingProviderError {
    if error.is_timeout() {
        TrackingProviderError::timeout(error.to_string())
    } else {
        TrackingProviderError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> TrackingProviderError {
    TrackingProviderError::provider(status.as_u16(), String::from_utf8_lossy(body))
}

/// Single-line, bounded rendering of a response body for logs.
fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
