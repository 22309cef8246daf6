// src/core/scanner/mod.rs

// Analyzer modules, each owning one slice of a scan.
pub mod exposure_scanner;
pub mod fetcher;
pub mod fingerprint_scanner;
pub mod headers_scanner;
pub mod ssl_scanner;

use crate::config::ScanConfig;
use crate::core::cache::ResultCache;
use crate::core::clock::{Clock, SystemClock};
use crate::core::knowledge_base::HEADER_POLICY;
use crate::core::models::{FetchResult, ScanResult};
use crate::core::rate_limit::RateLimiter;
use crate::core::report::ReportRenderer;
use crate::core::risk::aggregate;
use crate::core::target::Target;
use crate::error::{Result, ScanError};
use self::exposure_scanner::ExposureSweeper;
use self::fetcher::Fetcher;
use self::fingerprint_scanner::TechnologyDetector;
use self::headers_scanner::audit_headers;
use self::ssl_scanner::{TlsInspector, CertificateSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Informational headers echoed into `ScanResult.response_headers` next to
/// the policy-tracked ones.
const ECHOED_HEADERS: &[&str] = &["server", "content-type", "x-powered-by", "via"];

/// Runs scans: cache lookup, admission, the analyzer fan-out and aggregation.
///
/// One `Scanner` is meant to be shared by every caller in the process so that
/// they see the same cache, rate limit and worker bound.
pub struct Scanner {
    config: ScanConfig,
    fetcher: Fetcher,
    detector: TechnologyDetector,
    sweeper: ExposureSweeper,
    tls: Arc<dyn CertificateSource>,
    cache: Arc<ResultCache>,
    limiter: Arc<RateLimiter>,
    workers: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ScanConfig) -> ScannerBuilder {
        ScannerBuilder {
            config,
            clock: None,
            cache: None,
            limiter: None,
            tls: None,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Scans one target.
    ///
    /// A fresh cached result is returned as-is and does not count against the
    /// rate limit. Otherwise the scan must be admitted, waits for a worker
    /// slot and runs under the overall deadline. Only successful results are
    /// cached.
    pub async fn scan(&self, raw: &str) -> Result<ScanResult> {
        let target = Target::parse(raw)?;

        if let Some(cached) = self.cache.get(target.as_str()) {
            info!(target = %target, "Serving scan from cache.");
            return Ok(cached);
        }

        self.limiter.try_acquire()?;

        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| ScanError::Config("scan worker pool is closed".to_string()))?;

        let deadline = self.config.scan_deadline();
        info!(target = %target, deadline_secs = deadline.as_secs(), "Scan started.");

        let result = match tokio::time::timeout(deadline, self.run_pipeline(&target)).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(target = %target, "Scan deadline exceeded.");
                return Err(ScanError::Timeout { seconds: deadline.as_secs() });
            }
        };

        self.cache.insert(target.as_str(), result.clone());
        info!(target = %target, level = %result.risk.level, reasons = %result.risk.reasons.len(), "Scan finished.");
        Ok(result)
    }

    /// Scans (sharing cache and limiter with `scan`) and renders the result.
    pub async fn report(&self, raw: &str, renderer: &dyn ReportRenderer) -> Result<String> {
        let result = self.scan(raw).await?;
        renderer.render(&result)
    }

    /// The analyzer graph. The fetch feeds the header audit and signature
    /// matching; TLS, favicon and the sweep run beside it.
    async fn run_pipeline(&self, target: &Target) -> Result<ScanResult> {
        let fetch_and_audit = async {
            let fetch = self.fetcher.fetch(target.as_str()).await?;
            let headers = audit_headers(&fetch.headers);
            Ok::<_, ScanError>((fetch, headers))
        };
        let tls = async { Ok::<_, ScanError>(self.tls.inspect(target.host()).await) };
        let favicon = async { Ok::<_, ScanError>(self.detector.favicon_matches(target).await) };
        let exposures = self.sweeper.sweep(target);

        let ((fetch, security_headers), tls, favicon, exposures) =
            tokio::try_join!(fetch_and_audit, tls, favicon, exposures)?;

        let tech_stack = self.detector.detect(&fetch, favicon);
        let risk = aggregate(&security_headers, tls.as_ref(), &exposures);
        debug!(
            tech = %tech_stack.len(),
            exposures = %exposures.len(),
            tls = tls.is_some(),
            "Analyzers joined."
        );

        Ok(ScanResult {
            target: target.as_str().to_string(),
            fetched_url: fetch.fetched_url.clone(),
            status_code: fetch.status_code,
            response_headers: echoed_headers(&fetch),
            risk,
            tech_stack,
            security_headers,
            tls,
            exposures,
            scanned_at: self.clock.now(),
        })
    }
}

/// The subset of response headers carried into the result.
fn echoed_headers(fetch: &FetchResult) -> BTreeMap<String, String> {
    ECHOED_HEADERS
        .iter()
        .copied()
        .chain(HEADER_POLICY.iter().map(|p| p.name))
        .filter_map(|name| {
            let key = name.to_ascii_lowercase();
            fetch.headers.get(&key).map(|value| (key, value.clone()))
        })
        .collect()
}

/// Wires a [`Scanner`], optionally with injected collaborators.
pub struct ScannerBuilder {
    config: ScanConfig,
    clock: Option<Arc<dyn Clock>>,
    cache: Option<Arc<ResultCache>>,
    limiter: Option<Arc<RateLimiter>>,
    tls: Option<Arc<dyn CertificateSource>>,
}

impl ScannerBuilder {
    /// Clock used for timestamps, and for the default cache and limiter.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn certificate_source(mut self, source: Arc<dyn CertificateSource>) -> Self {
        self.tls = Some(source);
        self
    }

    pub fn build(self) -> Result<Scanner> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResultCache::with_clock(config.cache_ttl(), clock.clone())));
        let limiter = self.limiter.unwrap_or_else(|| {
            Arc::new(RateLimiter::with_clock(
                config.rate_limit_per_minute,
                Duration::from_secs(60),
                clock.clone(),
            ))
        });
        let tls = self
            .tls
            .unwrap_or_else(|| Arc::new(TlsInspector::new(config.tls_port, config.tls_timeout())));

        Ok(Scanner {
            fetcher: Fetcher::new(&config)?,
            detector: TechnologyDetector::new(&config)?,
            sweeper: ExposureSweeper::new(&config)?,
            workers: Arc::new(Semaphore::new(config.max_concurrent_scans)),
            tls,
            cache,
            limiter,
            clock,
            config,
        })
    }
}
