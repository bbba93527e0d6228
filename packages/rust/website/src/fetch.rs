//! Home-page fetching with failure classification and SSRF protection.

use std::error::Error as _;
use std::net::IpAddr;

use async_trait::async_trait;
use leadenrich_shared::{LeadEnrichError, Result, WebsiteConfig};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// User-Agent string for website requests.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; LeadEnrich/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Characters of the underlying error kept in a [`FetchFailure::Request`] reason.
const REASON_CHARS: usize = 50;

/// Why a page could not be fetched. `Display` is the reason embedded in the
/// "Could not fetch: ..." brief.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("Timeout")]
    Timeout,
    #[error("SSL Error")]
    Tls,
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Blocked: {0}")]
    Blocked(String),
}

impl FetchFailure {
    fn request(message: impl AsRef<str>) -> Self {
        Self::Request(message.as_ref().chars().take(REASON_CHARS).collect())
    }
}

/// Anything that can return the HTML of a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchFailure>;
}

/// HTTP implementation of [`PageSource`].
pub struct SiteFetcher {
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl SiteFetcher {
    /// Create a fetcher with the configured timeout.
    pub fn new(config: &WebsiteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| LeadEnrichError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }
}

#[async_trait]
impl PageSource for SiteFetcher {
    async fn fetch(&self, raw: &str) -> std::result::Result<String, FetchFailure> {
        let url = normalize_url(raw)?;
        if !self.allow_localhost && is_ssrf_target(&url) {
            let host = url.host_str().unwrap_or_default();
            return Err(FetchFailure::Blocked(format!("{host} is not a public host")));
        }

        debug!(%url, "fetching website");

        let response = self.client.get(url.as_str()).send().await.map_err(classify)?;
        let response = response.error_for_status().map_err(classify)?;
        response.text().await.map_err(classify)
    }
}

/// Prefix `https://` when the value has no scheme, then parse.
pub fn normalize_url(raw: &str) -> std::result::Result<Url, FetchFailure> {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    Url::parse(&with_scheme).map_err(|e| FetchFailure::request(format!("invalid URL: {e}")))
}

fn classify(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        return FetchFailure::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return FetchFailure::Tls;
        }
        source = cause.source();
    }

    FetchFailure::request(err.to_string())
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a non-public resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout: Duration) -> SiteFetcher {
        SiteFetcher::new(&WebsiteConfig {
            timeout,
            delay: Duration::ZERO,
        })
        .unwrap()
        .allow_localhost()
    }

    #[test]
    fn bare_domains_get_https() {
        assert_eq!(normalize_url("alphadental.com").unwrap().as_str(), "https://alphadental.com/");
        assert_eq!(normalize_url("http://alphadental.com").unwrap().as_str(), "http://alphadental.com/");
    }

    #[test]
    fn private_hosts_are_blocked() {
        for raw in [
            "http://localhost:8080",
            "http://127.0.0.1/admin",
            "http://10.0.0.5",
            "http://192.168.1.1",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]/",
            "http://printer.local",
        ] {
            assert!(is_ssrf_target(&Url::parse(raw).unwrap()), "{raw}");
        }
        assert!(!is_ssrf_target(&Url::parse("https://alphadental.com").unwrap()));
    }

    #[test]
    fn request_reason_is_truncated() {
        let failure = FetchFailure::request("x".repeat(200));
        assert_eq!(failure.to_string(), format!("Request failed: {}", "x".repeat(50)));
    }

    #[tokio::test]
    async fn default_fetcher_refuses_loopback() {
        let fetcher = SiteFetcher::new(&WebsiteConfig {
            timeout: Duration::from_secs(1),
            delay: Duration::ZERO,
        })
        .unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchFailure::Blocked(_)));
    }

    #[tokio::test]
    async fn fetches_page_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Alpha</title>"))
            .mount(&server)
            .await;

        let html = fetcher(Duration::from_secs(5)).fetch(&server.uri()).await.unwrap();
        assert_eq!(html, "<title>Alpha</title>");
    }

    #[tokio::test]
    async fn slow_server_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_millis(200)).fetch(&server.uri()).await.unwrap_err();
        assert_eq!(err, FetchFailure::Timeout);
        assert_eq!(err.to_string(), "Timeout");
    }

    #[tokio::test]
    async fn error_status_is_a_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher(Duration::from_secs(5)).fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().starts_with("Request failed: "), "{err}");
    }
}
