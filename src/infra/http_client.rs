use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::error::Result;
use crate::metrics::sources;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::{Duration, Instant};

pub const DEFAULT_USER_AGENT: &str = concat!("hazard_feed/", env!("CARGO_PKG_VERSION"));

/// `HttpClientPort` backed by a shared reqwest client with a hard request timeout.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        // reqwest handles gzip/deflate decompression with those features enabled
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult> {
        tracing::debug!("HTTP GET request to: {}", crate::apis::redact_query(url));
        let fetch_t0 = Instant::now();
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                sources::request_error();
                return Err(e.into());
            }
        };
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let bytes = match resp.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                sources::request_error();
                return Err(e.into());
            }
        };

        let dur = fetch_t0.elapsed().as_secs_f64();
        if (200..=299).contains(&status) {
            sources::request_success();
            sources::request_duration(dur);
            sources::payload_bytes(bytes.len());
        } else {
            sources::request_error();
        }
        tracing::debug!("HTTP response: status={}, size={} bytes", status, bytes.len());

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let content_length: u64 = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(bytes.len() as u64);
        Ok(HttpGetResult { status, bytes, content_type, content_length })
    }
}
