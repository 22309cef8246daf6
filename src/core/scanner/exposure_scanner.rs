// src/core/scanner/exposure_scanner.rs

use crate::config::ScanConfig;
use crate::core::knowledge_base::{BodyCheck, DIRECTORY_LISTING_MARKERS, EXPOSURE_CATALOGUE, ExposureCheck};
use crate::core::models::{ExposureFinding, Risk};
use crate::core::scanner::fetcher::{build_client, classify_error, read_capped};
use crate::core::target::Target;
use crate::error::{Result, ScanError};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Body bytes kept per path. Enough for every body heuristic in the catalogue.
const PATH_BODY_CAP: usize = 64 * 1024;

/// Status and (capped) body of one path request.
struct PathResponse {
    status: u16,
    body: Vec<u8>,
}

/// The site's answer to a path that cannot exist.
struct Baseline {
    status: u16,
    path: String,
    body: Vec<u8>,
}

impl Baseline {
    /// A response that looks exactly like the generic not-found page is noise.
    ///
    /// Both bodies lose every copy of both paths before comparing, so a
    /// catch-all page that echoes the URL or links to the path still matches.
    fn is_soft_404(&self, path: &str, response: &PathResponse) -> bool {
        if !(200..300).contains(&self.status) || response.status != self.status {
            return false;
        }
        let paths = [self.path.as_str(), path];
        strip_paths(&response.body, &paths) == strip_paths(&self.body, &paths)
    }
}

/// Requests every catalogue path against the target's origin and keeps the
/// ones that look like real exposures.
#[derive(Clone)]
pub struct ExposureSweeper {
    client: Client,
    concurrency: usize,
    catalogue: &'static [ExposureCheck],
}

impl ExposureSweeper {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, config.exposure_timeout(), config.max_redirects)?,
            concurrency: config.exposure_concurrency.max(1),
            catalogue: EXPOSURE_CATALOGUE,
        })
    }

    /// Replaces the built-in path catalogue.
    pub fn with_catalogue(mut self, catalogue: &'static [ExposureCheck]) -> Self {
        self.catalogue = catalogue;
        self
    }

    /// Runs the sweep. Findings come back in catalogue order.
    ///
    /// Single path failures, the baseline included, are dropped. The sweep
    /// only errors when nothing got an answer and the origin root is
    /// unreachable as well.
    pub async fn sweep(&self, target: &Target) -> Result<Vec<ExposureFinding>> {
        info!(target = %target, paths = self.catalogue.len(), "Starting exposure sweep.");

        let baseline = self.baseline(target).await;
        let baseline = baseline.as_ref();

        let outcomes: Vec<reqwest::Result<(usize, Option<ExposureFinding>)>> =
            stream::iter(self.catalogue.iter().enumerate())
                .map(|(index, check)| async move {
                    let url = target.join_origin(check.path);
                    let response = self.get(&url).await?;
                    Ok::<_, reqwest::Error>((index, classify(check, &response, baseline)))
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let answered = outcomes.iter().filter(|o| o.is_ok()).count();
        if baseline.is_none() && answered == 0 {
            self.confirm_reachable(target).await?;
        }
        debug!(answered, failed = outcomes.len() - answered, "Catalogue requests settled.");

        let mut hits: Vec<(usize, ExposureFinding)> = outcomes
            .into_iter()
            .flatten()
            .filter_map(|(index, finding)| finding.map(|f| (index, f)))
            .collect();

        // Arrival order depends on the network; reporting order must not.
        hits.sort_by_key(|(index, _)| *index);
        let findings: Vec<ExposureFinding> = hits.into_iter().map(|(_, f)| f).collect();

        info!(target = %target, findings = %findings.len(), "Exposure sweep finished.");
        Ok(findings)
    }

    async fn baseline(&self, target: &Target) -> Option<Baseline> {
        let path = nonexistent_path();
        let url = target.join_origin(&path);
        debug!(url = %url, "Fetching soft-404 baseline.");

        match self.get(&url).await {
            Ok(response) => {
                debug!(status = response.status, bytes = response.body.len(), "Baseline captured.");
                Some(Baseline { status: response.status, path, body: response.body })
            }
            Err(e) => {
                warn!(url = %url, reason = %classify_error(&e), error = %e, "No soft-404 baseline, open-ended paths will be skipped.");
                None
            }
        }
    }

    /// Last resort when every request failed: is the origin there at all?
    async fn confirm_reachable(&self, target: &Target) -> Result<()> {
        let url = target.join_origin("/");
        match self.get(&url).await {
            Ok(response) => {
                debug!(url = %url, status = response.status, "Origin answers, only catalogue paths failed.");
                Ok(())
            }
            Err(e) => {
                let reason = classify_error(&e);
                warn!(url = %url, %reason, error = %e, "Origin unreachable, aborting sweep.");
                Err(ScanError::Fetch { reason, detail: e.to_string() })
            }
        }
    }

    async fn get(&self, url: &str) -> reqwest::Result<PathResponse> {
        let mut response = self.client.get(url).send().await.inspect_err(|e| {
            debug!(url, reason = %classify_error(e), "Path request failed.");
        })?;
        let status = response.status().as_u16();
        let (body, _) = read_capped(&mut response, PATH_BODY_CAP).await.inspect_err(|e| {
            debug!(url, error = %e, "Failed to read path body.");
        })?;
        Ok(PathResponse { status, body })
    }
}

/// Decides whether one path response is a finding, and at what risk.
fn classify(check: &ExposureCheck, response: &PathResponse, baseline: Option<&Baseline>) -> Option<ExposureFinding> {
    if !check.accept.contains(&response.status) {
        return None;
    }

    let finding = |risk: Risk, detail: &str| ExposureFinding {
        path: check.path.to_string(),
        status_code: response.status,
        risk,
        detail: detail.to_string(),
    };

    if matches!(response.status, 401 | 403) {
        debug!(path = check.path, status = response.status, "Protected path found.");
        return Some(finding(Risk::Low, "Path protected but accessible"));
    }

    if baseline.is_some_and(|b| b.is_soft_404(check.path, response)) {
        debug!(path = check.path, "Suppressed soft-404 response.");
        return None;
    }

    let text = String::from_utf8_lossy(&response.body);
    if DIRECTORY_LISTING_MARKERS.iter().any(|m| text.contains(m)) {
        debug!(path = check.path, "Directory listing detected.");
        return Some(finding(Risk::High, "Directory listing enabled"));
    }

    // Without a baseline any 200 could be a catch-all page.
    if baseline.is_none() && matches!(check.body, BodyCheck::Any) {
        debug!(path = check.path, "Skipped open-ended path without a baseline.");
        return None;
    }

    if !check.body.matches(&response.body) {
        debug!(path = check.path, "Body heuristic did not match.");
        return None;
    }

    debug!(path = check.path, risk = %check.risk, "Exposure found.");
    Some(finding(check.risk, check.detail))
}

/// Removes every occurrence of each path, with and without its leading slash.
fn strip_paths(body: &[u8], paths: &[&str]) -> String {
    let mut text = String::from_utf8_lossy(body).into_owned();
    for path in paths {
        text = text.replace(path, "");
        let bare = path.trim_start_matches('/');
        if !bare.is_empty() {
            text = text.replace(bare, "");
        }
    }
    text
}

/// A path no real site serves. Unique per call.
fn nonexistent_path() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("/vulnvision-baseline-{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::knowledge_base::{FOUND, FOUND_OR_PROTECTED};

    const GIT: ExposureCheck = ExposureCheck {
        path: "/.git/config",
        detail: "Git repository config exposed",
        risk: Risk::High,
        accept: FOUND,
        body: BodyCheck::Contains(&["[core]"]),
    };

    const ADMIN: ExposureCheck = ExposureCheck {
        path: "/admin",
        detail: "Admin panel directory",
        risk: Risk::Medium,
        accept: FOUND_OR_PROTECTED,
        body: BodyCheck::Any,
    };

    const LOGIN: ExposureCheck = ExposureCheck {
        path: "/login",
        detail: "Login panel",
        risk: Risk::Low,
        accept: FOUND,
        body: BodyCheck::Any,
    };

    fn not_found() -> Baseline {
        Baseline { status: 404, path: "/vulnvision-baseline-1".into(), body: b"Not Found".to_vec() }
    }

    fn catch_all(body: &str) -> Baseline {
        Baseline { status: 200, path: "/vulnvision-baseline-1".into(), body: body.as_bytes().to_vec() }
    }

    fn response(status: u16, body: &str) -> PathResponse {
        PathResponse { status, body: body.as_bytes().to_vec() }
    }

    #[test]
    fn status_outside_accept_set_is_ignored() {
        let baseline = not_found();
        assert!(classify(&GIT, &response(404, "[core]"), Some(&baseline)).is_none());
        assert!(classify(&GIT, &response(403, ""), Some(&baseline)).is_none());
        assert!(classify(&GIT, &response(500, "[core]"), Some(&baseline)).is_none());
    }

    #[test]
    fn body_heuristic_gates_the_finding() {
        let baseline = not_found();
        let hit = classify(&GIT, &response(200, "[core]\n\tbare = false"), Some(&baseline)).unwrap();
        assert_eq!(hit.risk, Risk::High);
        assert_eq!(hit.status_code, 200);
        assert_eq!(hit.detail, "Git repository config exposed");
        assert!(classify(&GIT, &response(200, "<html>hello</html>"), Some(&baseline)).is_none());
    }

    #[test]
    fn auth_challenge_is_a_low_finding() {
        let hit = classify(&ADMIN, &response(401, ""), Some(&not_found())).unwrap();
        assert_eq!(hit.risk, Risk::Low);
        assert_eq!(hit.detail, "Path protected but accessible");
    }

    #[test]
    fn soft_404_is_suppressed_even_when_the_path_is_echoed() {
        let baseline = catch_all("<p>No page at /vulnvision-baseline-1</p>");
        assert!(classify(&ADMIN, &response(200, "<p>No page at /admin</p>"), Some(&baseline)).is_none());
        assert!(classify(&ADMIN, &response(200, "<h1>Dashboard</h1>"), Some(&baseline)).is_some());
    }

    #[test]
    fn catch_all_page_linking_to_the_requested_paths_is_suppressed() {
        let page = r#"<a href="/login">Sign in</a> <a href="/admin">admin</a>"#;
        let baseline = catch_all(page);
        assert!(classify(&ADMIN, &response(200, page), Some(&baseline)).is_none());
        assert!(classify(&LOGIN, &response(200, page), Some(&baseline)).is_none());
    }

    #[test]
    fn without_a_baseline_only_open_ended_paths_are_skipped() {
        assert!(classify(&ADMIN, &response(200, "<h1>Dashboard</h1>"), None).is_none());
        assert_eq!(classify(&ADMIN, &response(403, ""), None).unwrap().risk, Risk::Low);
        assert_eq!(classify(&GIT, &response(200, "[core]"), None).unwrap().risk, Risk::High);

        let listing = classify(&ADMIN, &response(200, "<title>Index of /admin</title>"), None).unwrap();
        assert_eq!(listing.detail, "Directory listing enabled");
    }

    #[test]
    fn directory_listing_upgrades_to_high() {
        let hit = classify(&ADMIN, &response(200, "<title>Index of /admin</title>"), Some(&not_found())).unwrap();
        assert_eq!(hit.risk, Risk::High);
        assert_eq!(hit.detail, "Directory listing enabled");
    }

    #[test]
    fn baseline_path_is_absolute_and_strippable() {
        let a = nonexistent_path();
        assert!(a.starts_with("/vulnvision-baseline-"));
        assert!(strip_paths(a.as_bytes(), &[a.as_str()]).is_empty());
        assert_eq!(strip_paths(b"go to /admin or admin/", &["/login", "/admin"]), "go to  or /");
    }
}
