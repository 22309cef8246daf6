// src/core/scanner/fetcher.rs

use crate::config::ScanConfig;
use crate::core::models::FetchResult;
use crate::error::{FetchFailure, Result, ScanError};
use reqwest::header::SET_COOKIE;
use reqwest::{Client, Response, redirect::Policy};
use std::collections::BTreeMap;
use std::error::Error as _;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Builds an HTTP client shared by one analyzer.
pub(crate) fn build_client(user_agent: &str, timeout: Duration, max_redirects: usize) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(max_redirects))
        .build()
        .map_err(|e| ScanError::Config(format!("failed to build HTTP client: {e}")))
}

/// Issues the one primary GET a scan is built around.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, config.fetch_timeout(), config.max_redirects)?,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Fetches `url`, following redirects. Any HTTP status is a successful
    /// fetch; only transport failures become `ScanError::Fetch`.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        info!(url, "Starting primary fetch.");
        let started = Instant::now();

        let mut response = self.client.get(url).send().await.map_err(|e| {
            let reason = classify_error(&e);
            warn!(url, %reason, error = %e, "Primary fetch failed.");
            ScanError::Fetch { reason, detail: e.to_string() }
        })?;

        let fetched_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let headers = collect_headers(&response);
        let set_cookies = collect_set_cookies(&response);

        let (body, truncated) = read_capped(&mut response, self.max_body_bytes)
            .await
            .map_err(|e| {
                let reason = classify_error(&e);
                warn!(url, %reason, error = %e, "Failed to read response body.");
                ScanError::Fetch { reason, detail: e.to_string() }
            })?;

        if truncated {
            debug!(url, cap = self.max_body_bytes, "Response body truncated.");
        }
        info!(url, fetched_url = %fetched_url, status = status_code, bytes = body.len(), "Primary fetch finished.");

        Ok(FetchResult {
            requested_url: url.to_string(),
            fetched_url,
            status_code,
            headers,
            set_cookies,
            body,
            truncated,
            elapsed: started.elapsed(),
        })
    }
}

/// Lower-cased header map; repeated headers keep their last value.
pub(crate) fn collect_headers(response: &Response) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        headers.insert(
            name.as_str().to_ascii_lowercase(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    headers
}

pub(crate) fn collect_set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect()
}

/// Reads at most `cap` bytes of the body. Returns whether anything was cut off.
pub(crate) async fn read_capped(response: &mut Response, cap: usize) -> reqwest::Result<(Vec<u8>, bool)> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = cap.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Maps a transport error onto a stable reason code by walking its source chain.
pub fn classify_error(err: &reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        return FetchFailure::Timeout;
    }
    if err.is_redirect() {
        return FetchFailure::TooManyRedirects;
    }

    let mut cause: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(current) = cause {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return FetchFailure::ConnectionRefused,
                std::io::ErrorKind::TimedOut => return FetchFailure::Timeout,
                _ => {}
            }
        }
        let text = current.to_string().to_ascii_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
            || text.contains("nodename nor servname")
        {
            return FetchFailure::Dns;
        }
        if text.contains("connection refused") {
            return FetchFailure::ConnectionRefused;
        }
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return FetchFailure::TlsError;
        }
        cause = current.source();
    }
    FetchFailure::Connection
}
