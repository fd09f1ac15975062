use std::time::{Duration, Instant};

use bytes::BytesMut;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Dual-timeout discipline, per §6: a connect-phase timeout plus two
/// separate request-timeout budgets depending on which HTTP version the
/// server negotiates (§2 C2: "dual-timeout discipline").
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub http_request_timeout: Duration,
    pub http2_request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            http_request_timeout: Duration::from_secs(30),
            http2_request_timeout: Duration::from_secs(45),
        }
    }
}

/// A single request to issue, per §4.4 step 1: "Transport via C2, preferring
/// proxy-free direct requests."
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub accept: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: None,
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// Outcome of a successful fetch: the full body plus the TTFB/throughput
/// metrics §4.7's histograms are built from.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: u16,
    pub http_version: &'static str,
    pub ttfb_ms: u64,
    pub latency_ms: u64,
    pub throughput_bps: f64,
    pub body: Vec<u8>,
}

/// Proxy-free streaming HTTP client (C2), per §4.4 and §9's "decorator-style
/// HTTP logging" note: every fetch emits one structured `tracing` event at
/// the call site with `{url, http_version, status}`.
pub struct ProbeHttpClient {
    client: reqwest::Client,
    config: TransportConfig,
}

impl ProbeHttpClient {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|source| TransportError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, config })
    }

    /// Issue one GET, measuring TTFB (time to the first response body
    /// chunk) and total throughput. Cooperative: `token` is checked before
    /// the request starts and at every body-chunk suspension point, per §5
    /// ("every suspension checks the token before proceeding").
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        token: &CancellationToken,
    ) -> Result<FetchOutcome, TransportError> {
        if token.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        let start = Instant::now();
        let mut builder = self.client.get(&request.url);
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept.clone());
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(TransportError::Aborted),
            result = builder.timeout(self.config.http_request_timeout).send() => {
                result.map_err(|source| TransportError::Request { url: request.url.clone(), source })?
            }
        };

        let status = response.status();
        let http_version = version_label(response.version());
        let body_budget = if http_version == "HTTP/2" {
            self.config.http2_request_timeout
        } else {
            self.config.http_request_timeout
        };

        if !status.is_success() {
            let preview = response_preview(response).await;
            warn!(url = %request.url, http_version, status = status.as_u16(), "non-2xx response");
            return Err(TransportError::BadStatus {
                url: request.url.clone(),
                status: status.as_u16(),
                preview,
            });
        }

        let deadline = start + body_budget;
        let mut stream = response.bytes_stream();
        let mut body = BytesMut::new();
        let mut ttfb_ms = None;

        loop {
            if token.is_cancelled() {
                return Err(TransportError::Aborted);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(TransportError::Aborted),
                chunk = tokio::time::timeout(remaining, stream.next()) => chunk,
            };

            let Ok(chunk) = next else {
                return Err(TransportError::Timeout {
                    url: request.url.clone(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            };

            match chunk {
                None => break,
                Some(Ok(bytes)) => {
                    if ttfb_ms.is_none() {
                        ttfb_ms = Some(start.elapsed().as_millis() as u64);
                    }
                    body.extend_from_slice(&bytes);
                }
                Some(Err(source)) => {
                    return Err(TransportError::Request {
                        url: request.url.clone(),
                        source,
                    })
                }
            }
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        let ttfb_ms = ttfb_ms.unwrap_or(latency_ms);
        let throughput_bps = if latency_ms > 0 {
            (body.len() as f64) / (latency_ms as f64 / 1000.0)
        } else {
            body.len() as f64
        };

        debug!(
            url = %request.url,
            http_version,
            status = status.as_u16(),
            latency_ms,
            ttfb_ms,
            bytes = body.len(),
            "fetch complete"
        );

        Ok(FetchOutcome {
            status: status.as_u16(),
            http_version,
            ttfb_ms,
            latency_ms,
            throughput_bps,
            body: body.to_vec(),
        })
    }
}

fn version_label(version: reqwest::Version) -> &'static str {
    match version {
        reqwest::Version::HTTP_2 => "HTTP/2",
        reqwest::Version::HTTP_3 => "HTTP/3",
        reqwest::Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    }
}

/// Capture a short, sanitised response body preview for diagnostics, per
/// §4.4 step 1: "capture a short response preview (sanitised, <= 200 chars)".
async fn response_preview(response: reqwest::Response) -> String {
    const MAX_PREVIEW: usize = 200;
    match response.text().await {
        Ok(text) => {
            let sanitised: String = text.chars().filter(|c| !c.is_control()).collect();
            sanitised.chars().take(MAX_PREVIEW).collect()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_labels_map_known_protocols() {
        assert_eq!(version_label(reqwest::Version::HTTP_11), "HTTP/1.1");
        assert_eq!(version_label(reqwest::Version::HTTP_2), "HTTP/2");
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_request_starts() {
        let client = ProbeHttpClient::new(TransportConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let request = FetchRequest::new("http://127.0.0.1:0/unreachable");
        let err = client.fetch(&request, &token).await.unwrap_err();
        assert!(matches!(err, TransportError::Aborted));
    }
}
