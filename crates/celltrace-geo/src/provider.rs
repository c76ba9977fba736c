//! Remote geolocation provider
//!
//! [`CellLocator`] is the seam to the external geolocation service. The
//! shipped implementation speaks the provider's single-cell JSON protocol:
//! one POST per unresolved cell, bounded timeouts, and every failure mode
//! absorbed into `None` at this boundary.

use async_trait::async_trait;
use celltrace_common::{CellKey, Coordinate, Error, RadioType, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Resolver of a single cell identity to a coordinate
#[async_trait]
pub trait CellLocator: Send + Sync {
    /// Resolve one cell. `None` covers every failure: unknown cell,
    /// network error, malformed response. Never panics, never propagates.
    async fn locate(&self, radio: RadioType, key: &CellKey) -> Option<Coordinate>;
}

#[derive(Debug, Serialize)]
struct LocateRequest<'a> {
    token: &'a str,
    radio: &'static str,
    mcc: u32,
    mnc: u32,
    cells: Vec<CellQuery>,
}

#[derive(Debug, Serialize)]
struct CellQuery {
    lac: u32,
    cid: u64,
}

#[derive(Debug, Deserialize)]
struct LocateResponse {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// HTTP client for the Unwired-style geolocation API
pub struct UnwiredClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl UnwiredClient {
    /// Build the client with bounded connect and overall request timeouts
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::configuration(e.to_string()))?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl CellLocator for UnwiredClient {
    async fn locate(&self, radio: RadioType, key: &CellKey) -> Option<Coordinate> {
        let Some((mcc, mnc, lac, cid)) = numeric_identity(key) else {
            debug!(key = %key, "cell identity not numeric, remote lookup skipped");
            return None;
        };

        let request = LocateRequest {
            token: &self.token,
            radio: radio.provider_code(),
            mcc,
            mnc,
            cells: vec![CellQuery { lac, cid }],
        };

        let response = match self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %key, error = %e, "geolocation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(key = %key, status = %response.status(), "geolocation provider error");
            return None;
        }

        let body: LocateResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(key = %key, error = %e, "geolocation response unreadable");
                return None;
            }
        };

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => {
                debug!(key = %key, "cell unknown to geolocation provider");
                None
            }
        }
    }
}

fn numeric_identity(key: &CellKey) -> Option<(u32, u32, u32, u64)> {
    Some((
        key.mcc().parse().ok()?,
        key.mnc().parse().ok()?,
        key.area().parse().ok()?,
        key.cell().parse().ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = LocateRequest {
            token: "secret",
            radio: RadioType::Wcdma.provider_code(),
            mcc: 732,
            mnc: 1,
            cells: vec![CellQuery { lac: 100, cid: 500 }],
        };
        let body = serde_json::to_string(&request).unwrap();
        assert_eq!(
            body,
            r#"{"token":"secret","radio":"umts","mcc":732,"mnc":1,"cells":[{"lac":100,"cid":500}]}"#
        );
    }

    #[test]
    fn test_numeric_identity_keeps_leading_zero_mnc_value() {
        let key = CellKey::new("732", "01", "100", "500").unwrap();
        assert_eq!(numeric_identity(&key), Some((732, 1, 100, 500)));
    }

    #[test]
    fn test_non_numeric_identity_is_rejected() {
        let key = CellKey::new("732", "01", "100", "not-a-cell").unwrap();
        assert_eq!(numeric_identity(&key), None);
    }

    #[test]
    fn test_response_without_coordinates_is_unresolved() {
        let body: LocateResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert!(body.lat.is_none() && body.lon.is_none());

        let body: LocateResponse = serde_json::from_str(r#"{"lat":4.6,"lon":-74.1}"#).unwrap();
        assert_eq!((body.lat, body.lon), (Some(4.6), Some(-74.1)));
    }
}
