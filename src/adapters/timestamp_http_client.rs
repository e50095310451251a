//! Timestamp HTTP client adapter.
//! HTTP client adapter for RFC3161 timestamp authority requests.
//! Provides retry and failover over a list of timestamp servers.

use std::time::Duration;

use crate::domain::crypto::HashAlgorithm;
use crate::domain::types::TimestampUrl;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::timestamp_applier::TimestampAuthority;
use crate::services::timestamp_parser::TimestampParserService;
use crate::services::timestamp_request_builder::TimestampRequestBuilder;

/// Configuration for timestamp HTTP operations.
#[derive(Debug, Clone)]
pub struct TimestampHttpConfig {
    pub primary: TimestampUrl,
    pub fallbacks: Vec<TimestampUrl>,
    pub timeout: Duration,
    pub retries_per_server: usize,
    pub retry_delay: Duration,
}

impl TimestampHttpConfig {
    #[must_use]
    pub fn new(primary: TimestampUrl) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            timeout: Duration::from_secs(30),
            retries_per_server: 3,
            retry_delay: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn servers(&self) -> Vec<&TimestampUrl> {
        std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .collect()
    }
}

/// HTTP adapter performing RFC3161 POST exchanges.
pub struct TimestampHttpClient {
    cfg: TimestampHttpConfig,
    requests: TimestampRequestBuilder,
    http: reqwest::Client,
}

impl TimestampHttpClient {
    pub fn new(cfg: TimestampHttpConfig) -> SigningResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("script-signer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            cfg,
            requests: TimestampRequestBuilder::new(),
            http,
        })
    }

    #[must_use]
    pub fn with_request_builder(mut self, requests: TimestampRequestBuilder) -> Self {
        self.requests = requests;
        self
    }

    pub fn config(&self) -> &TimestampHttpConfig {
        &self.cfg
    }

    /// Attempt to obtain a timestamp response body for the given request DER.
    pub async fn post_request(&self, ts_request_der: &[u8]) -> SigningResult<Vec<u8>> {
        let mut last_err: Option<SigningError> = None;
        for (idx, server) in self.cfg.servers().iter().enumerate() {
            log::info!("timestamp server attempt {}: {}", idx + 1, server.as_str());
            match self.post_with_retries(server, ts_request_der).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    log::warn!("server {} failed: {}", server.as_str(), e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SigningError::TimestampError("All servers failed".into())))
    }

    async fn post_with_retries(
        &self,
        server: &TimestampUrl,
        body: &[u8],
    ) -> SigningResult<Vec<u8>> {
        let attempts = self.cfg.retries_per_server.max(1);
        let mut last_err: Option<SigningError> = None;
        for attempt in 1..=attempts {
            log::debug!(
                "timestamp http attempt {} of {} -> {}",
                attempt,
                attempts,
                server.as_str()
            );
            match self.single_post(server, body).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.cfg.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            SigningError::TimestampError(format!("no attempt made against {server}"))
        }))
    }

    async fn single_post(&self, server: &TimestampUrl, body: &[u8]) -> SigningResult<Vec<u8>> {
        let resp = self
            .http
            .post(server.as_str())
            .header("Content-Type", "application/timestamp-query")
            .header("Accept", "application/timestamp-reply")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| SigningError::NetworkError(format!("HTTP error: {e}")))?;
        if !resp.status().is_success() {
            return Err(SigningError::TimestampError(format!(
                "HTTP {} from {}",
                resp.status(),
                server.as_str()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SigningError::NetworkError(format!("Read body failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl TimestampAuthority for TimestampHttpClient {
    async fn request_token(&self, data: &[u8], hash: HashAlgorithm) -> SigningResult<Vec<u8>> {
        let (request, nonce) = self.requests.build_request(data, hash)?;
        let response = self.post_request(&request).await?;
        let token = TimestampParserService::parse_response(&response, nonce.as_ref())?;
        Ok(token.as_der().to_vec())
    }
}
