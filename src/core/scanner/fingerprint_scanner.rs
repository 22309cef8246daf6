// src/core/scanner/fingerprint_scanner.rs

use crate::config::ScanConfig;
use crate::core::knowledge_base::favicon_technology;
use crate::core::models::{Confidence, FetchResult, TechMatch};
use crate::core::scanner::fetcher::{build_client, classify_error, read_capped};
use crate::core::target::Target;
use crate::error::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use murmur3::murmur3_32;
use scraper::{Html, Selector};
use std::io::{self, Cursor};
use tracing::{debug, info};

/// Defines the different types of checks that can be performed to identify a technology.
enum Check<'a> {
    /// Check for a pattern in a specific HTTP header.
    Header(&'a str, &'a Lazy<Regex>),
    /// Check for a pattern in the content of a specific meta tag.
    MetaTag(&'a str, &'a Lazy<Regex>),
    /// Check for a pattern in the HTML body.
    Body(&'a Lazy<Regex>),
    /// Check for a pattern in the `src` attribute of `<script>` tags.
    ScriptSrc(&'a Lazy<Regex>),
    /// Check for a pattern in the `href` attribute of `<link>` tags.
    LinkHref(&'a Lazy<Regex>),
    /// Check for a pattern in any `set-cookie` header.
    Cookie(&'a Lazy<Regex>),
}

/// A rule that defines how to detect a specific technology.
struct FingerprintRule<'a> {
    tech_name: &'a str,
    check: Check<'a>,
}

// Version-bearing patterns capture the version in group 1.
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^nginx(?:/([\d\.]+))?").unwrap());
static RE_NGINX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr><center>nginx</center>").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^apache(?:/([\d\.]+))?").unwrap());
static RE_APACHE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache Server at").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^microsoft-iis(?:/([\d\.]+))?").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^cloudflare").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^litespeed").unwrap());
static RE_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r".+").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ?([\d\.]+)?").unwrap());
static RE_WP_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_WP_COOKIE: Lazy<Regex> = Lazy::new(|| Regex::new(r"wordpress_|wp-settings-").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Drupal ?([\d\.]+)?").unwrap());
static RE_DRUPAL_COOKIE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SESS[0-9a-f]{32}").unwrap());
static RE_MAGENTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)magento").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/?([\d\.]+)?").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ASP\.NET").unwrap());
static RE_ASPNET_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d\.]+)").unwrap());
static RE_EXPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^express").unwrap());
static RE_LARAVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"laravel_session").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_RUBY_RAILS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_rails_session|_session_id").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ?([\d\.]+)?").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_NUXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d\.]+)""#).unwrap());
static RE_SVELTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"class=["'][^"']*svelte-"#).unwrap());
static RE_GATSBY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id=["']___gatsby["']"#).unwrap());
static RE_GATSBY_META: Lazy<Regex> = Lazy::new(|| Regex::new(r"Gatsby ?([\d\.]+)?").unwrap());
static RE_ASTRO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Astro v([\d\.]+)").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery(?:[-.]([\d\.]+?))?(?:\.min|\.slim)?\.js").unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.development").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap(?:\.min)?\.css").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> = Lazy::new(|| Regex::new(r"google-analytics\.com/|googletagmanager\.com/").unwrap());

/// The master list of all fingerprinting rules.
static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", check: Check::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Nginx", check: Check::Body(&RE_NGINX_ERROR) },
    FingerprintRule { tech_name: "Apache HTTP Server", check: Check::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "Apache HTTP Server", check: Check::Body(&RE_APACHE_ERROR) },
    FingerprintRule { tech_name: "Microsoft IIS", check: Check::Header("server", &RE_IIS) },
    FingerprintRule { tech_name: "Cloudflare", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "Cloudflare", check: Check::Header("cf-ray", &RE_ANY) },
    FingerprintRule { tech_name: "LiteSpeed", check: Check::Header("server", &RE_LITESPEED) },
    FingerprintRule { tech_name: "WordPress", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", check: Check::ScriptSrc(&RE_WP_EMBED) },
    FingerprintRule { tech_name: "WordPress", check: Check::Body(&RE_WP_EMBED) },
    FingerprintRule { tech_name: "WordPress", check: Check::Cookie(&RE_WP_COOKIE) },
    FingerprintRule { tech_name: "Joomla!", check: Check::MetaTag("generator", &RE_JOOMLA) },
    FingerprintRule { tech_name: "Drupal", check: Check::MetaTag("generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Drupal", check: Check::Header("x-generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Drupal", check: Check::Cookie(&RE_DRUPAL_COOKIE) },
    FingerprintRule { tech_name: "Shopify", check: Check::Header("x-shopid", &RE_ANY) },
    FingerprintRule { tech_name: "Magento", check: Check::Cookie(&RE_MAGENTO) },
    FingerprintRule { tech_name: "PHP", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", check: Check::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "ASP.NET", check: Check::Header("x-powered-by", &RE_ASPNET) },
    FingerprintRule { tech_name: "ASP.NET", check: Check::Header("x-aspnet-version", &RE_ASPNET_VERSION) },
    FingerprintRule { tech_name: "Express.js", check: Check::Header("x-powered-by", &RE_EXPRESS) },
    FingerprintRule { tech_name: "Laravel", check: Check::Cookie(&RE_LARAVEL) },
    FingerprintRule { tech_name: "Java", check: Check::Cookie(&RE_JSESSIONID) },
    FingerprintRule { tech_name: "Django", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Ruby on Rails", check: Check::Cookie(&RE_RUBY_RAILS) },
    FingerprintRule { tech_name: "Next.js", check: Check::Header("x-powered-by", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", check: Check::MetaTag("generator", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", check: Check::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    FingerprintRule { tech_name: "Nuxt.js", check: Check::Body(&RE_NUXTJS) },
    FingerprintRule { tech_name: "Angular", check: Check::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "Svelte", check: Check::Body(&RE_SVELTE) },
    FingerprintRule { tech_name: "Gatsby", check: Check::Body(&RE_GATSBY) },
    FingerprintRule { tech_name: "Gatsby", check: Check::MetaTag("generator", &RE_GATSBY_META) },
    FingerprintRule { tech_name: "Astro", check: Check::MetaTag("generator", &RE_ASTRO) },
    FingerprintRule { tech_name: "React", check: Check::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Vue.js", check: Check::Body(&RE_VUE) },
    FingerprintRule { tech_name: "jQuery", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "Bootstrap", check: Check::LinkHref(&RE_BOOTSTRAP) },
    FingerprintRule { tech_name: "Google Analytics", check: Check::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
];

/// A rule hit: what was seen, and the captured version if any.
struct Hit {
    evidence: String,
    version: Option<String>,
}

/// Matches response headers, the HTML body and the favicon against the
/// signature tables.
#[derive(Clone)]
pub struct TechnologyDetector {
    client: Client,
    favicon_max_bytes: usize,
}

impl TechnologyDetector {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, config.exposure_timeout(), config.max_redirects)?,
            favicon_max_bytes: config.favicon_max_bytes,
        })
    }

    /// Fetches `/favicon.ico` from the target's origin and looks its hash up.
    /// Any failure yields no candidates.
    pub async fn favicon_matches(&self, target: &Target) -> Vec<TechMatch> {
        let Some(hash) = self.remote_favicon_hash(target).await else {
            return Vec::new();
        };
        match favicon_technology(hash) {
            Some(name) => {
                debug!(hash, tech = name, "Favicon hash matched.");
                vec![TechMatch {
                    name: name.to_string(),
                    confidence: Confidence::High,
                    evidence: format!("favicon hash {hash}"),
                    version: None,
                }]
            }
            None => {
                debug!(hash, "Favicon hash not in reference table.");
                Vec::new()
            }
        }
    }

    /// Hash of the target's `/favicon.ico`, if it serves a non-empty one.
    pub async fn remote_favicon_hash(&self, target: &Target) -> Option<i32> {
        let url = target.join_origin("/favicon.ico");
        let url = url.as_str();
        let mut response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url, reason = %classify_error(&e), "Favicon fetch failed.");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "No favicon.");
            return None;
        }
        match read_capped(&mut response, self.favicon_max_bytes).await {
            Ok((bytes, _)) if !bytes.is_empty() => favicon_hash(&bytes)
                .inspect_err(|e| debug!(url, error = %e, "Failed to hash favicon."))
                .ok(),
            Ok(_) => None,
            Err(e) => {
                debug!(url, error = %e, "Failed to read favicon body.");
                None
            }
        }
    }

    /// Runs every rule against the primary response and merges in the
    /// favicon candidates. One entry per technology name, in discovery order,
    /// carrying the highest confidence observed.
    pub fn detect(&self, fetch: &FetchResult, favicon: Vec<TechMatch>) -> Vec<TechMatch> {
        let body = fetch.body_text();
        let document = Html::parse_document(&body);
        let cookies = fetch.set_cookies.join("\n");

        let mut found: Vec<TechMatch> = Vec::new();

        debug!(total_rules = %RULES.len(), "Applying fingerprinting rules.");
        for rule in RULES {
            let hit = match &rule.check {
                Check::Header(name, re) => check_with_regex(fetch.header(name), re)
                    .map(|version| Hit { evidence: format!("{name}: {}", fetch.header(name).unwrap_or_default()), version }),
                Check::Cookie(re) => check_with_regex(Some(cookies.as_str()), re)
                    .map(|version| Hit { evidence: format!("set-cookie matches {}", re.as_str()), version }),
                Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
                Check::Body(re) => check_with_regex(Some(&*body), re)
                    .map(|version| Hit { evidence: format!("body matches {}", re.as_str()), version }),
                Check::ScriptSrc(re) => check_attr(&document, "script[src]", "src", re),
                Check::LinkHref(re) => check_attr(&document, "link[href]", "href", re),
            };

            if let Some(hit) = hit {
                debug!(tech = %rule.tech_name, version = ?hit.version, "Rule matched.");
                merge(&mut found, TechMatch {
                    name: rule.tech_name.to_string(),
                    confidence: Confidence::Medium,
                    evidence: hit.evidence,
                    version: hit.version,
                });
            }
        }

        for candidate in favicon {
            merge(&mut found, candidate);
        }

        info!(count = %found.len(), "Fingerprint detection finished.");
        found
    }
}

/// Folds `candidate` into `found`, deduplicating by name.
fn merge(found: &mut Vec<TechMatch>, candidate: TechMatch) {
    match found.iter_mut().find(|t| t.name == candidate.name) {
        Some(existing) => {
            if candidate.confidence > existing.confidence {
                existing.confidence = candidate.confidence;
                existing.evidence = candidate.evidence;
            }
            if existing.version.is_none() {
                existing.version = candidate.version;
            }
        }
        None => found.push(candidate),
    }
}

/// Applies a regex to optional text.
///
/// `Some(version)` if the pattern matched, where `version` is the first
/// capture group when present; `None` if it did not match at all.
fn check_with_regex(text_option: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text_option.and_then(|text| {
        re.captures(text).map(|caps| {
            caps.get(1)
                .map(|m| m.as_str().trim_end_matches('.').to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Hit> {
    let selector = Selector::parse(&format!("meta[name='{name}']")).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| {
            check_with_regex(Some(content), re).map(|version| Hit {
                evidence: format!("meta {name}: {content}"),
                version,
            })
        })
}

/// First element matching `selector` whose `attr` matches the regex.
fn check_attr(doc: &Html, selector: &str, attr: &str, re: &Regex) -> Option<Hit> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .find_map(|value| {
            check_with_regex(Some(value), re).map(|version| Hit {
                evidence: format!("{attr}={value}"),
                version,
            })
        })
}

/// Shodan-compatible favicon hash: MurmurHash3 (x86, 32-bit, seed 0) of the
/// MIME-style base64 encoding, read as a signed integer.
pub fn favicon_hash(bytes: &[u8]) -> io::Result<i32> {
    let encoded = STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / 76 + 1);
    for line in encoded.as_bytes().chunks(76) {
        // base64 output is ASCII, so every chunk is valid UTF-8.
        wrapped.push_str(&String::from_utf8_lossy(line));
        wrapped.push('\n');
    }
    let hash = murmur3_32(&mut Cursor::new(wrapped.as_bytes()), 0)?;
    Ok(hash as i32)
}
