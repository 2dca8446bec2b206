//! Upstream HTTP access.
//!
//! The `HttpTransport` trait abstracts the two request shapes the pipeline
//! needs: a full GET and an existence probe (HEAD). `ReqwestTransport` is the
//! real implementation; [`crate::memory::MemoryTransport`] serves tests.
//!
//! Every request carries an explicit timeout. A request that produces no
//! response at all is an error; a response with any status is returned as-is
//! and the caller decides what the status means.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::redirect::Policy;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{MirrorError, Result};

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Final status after redirects.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstract upstream transport.
pub trait HttpTransport: Send + Sync {
    /// GET `url`, following redirects.
    fn get(&self, url: &str) -> Result<HttpResponse>;

    /// HEAD `url`, following redirects, returning the final status.
    fn head(&self, url: &str) -> Result<u16>;
}

/// Blocking `reqwest` transport.
pub struct ReqwestTransport {
    client: Client,
    /// Release API base; only requests under it get API headers.
    api_base: Option<Url>,
    /// Bearer token for the release API.
    api_token: Option<String>,
}

impl ReqwestTransport {
    /// Build a transport from the `[http]` configuration.
    ///
    /// The bearer token, if configured, is read from the environment here
    /// and only ever sent to the release API.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| MirrorError::Transport {
                url: String::new(),
                detail: format!("building HTTP client: {e}"),
            })?;

        let api_base = match Url::parse(&config.release_api) {
            Ok(base) => Some(base),
            Err(e) => {
                log::warn!("release API base {:?} is not a URL: {e}", config.release_api);
                None
            }
        };
        let api_token = config
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|token| !token.is_empty());

        Ok(ReqwestTransport {
            client,
            api_base,
            api_token,
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        let mut req = self.client.request(method, url);
        if self.api_base.as_ref().is_some_and(|base| is_under(base, url)) {
            req = req.header(ACCEPT, "application/vnd.github+json");
            if let Some(token) = &self.api_token {
                req = req.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }
        req
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        log::debug!("GET {url}");
        let resp = self
            .request(reqwest::Method::GET, url)
            .send()
            .map_err(|e| classify(url, e))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| classify(url, e))?.to_vec();
        log::debug!("GET {url} -> {status} ({} bytes)", body.len());
        Ok(HttpResponse { status, body })
    }

    fn head(&self, url: &str) -> Result<u16> {
        log::debug!("HEAD {url}");
        let resp = self
            .request(reqwest::Method::HEAD, url)
            .send()
            .map_err(|e| classify(url, e))?;
        let status = resp.status().as_u16();
        log::debug!("HEAD {url} -> {status}");
        Ok(status)
    }
}

/// Whether `url` has the same origin as `base` and a path at or below it.
fn is_under(base: &Url, url: &str) -> bool {
    let Ok(url) = Url::parse(url) else {
        return false;
    };
    if url.scheme() != base.scheme()
        || url.host_str() != base.host_str()
        || url.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }
    let base_path = base.path().trim_end_matches('/');
    let path = url.path();
    path == base_path || path.starts_with(&format!("{base_path}/"))
}

/// Map a `reqwest` failure to a transport error.
fn classify(url: &str, err: reqwest::Error) -> MirrorError {
    if err.is_timeout() {
        MirrorError::Timeout {
            url: url.to_string(),
        }
    } else {
        MirrorError::Transport {
            url: url.to_string(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let ok = HttpResponse {
            status: 204,
            body: Vec::new(),
        };
        let missing = HttpResponse {
            status: 404,
            body: Vec::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }

    #[test]
    fn builds_from_default_config() {
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        assert_eq!(
            transport.api_base.as_ref().map(Url::as_str),
            Some("https://api.github.com/")
        );
        assert!(transport.api_token.is_none());
    }

    #[test]
    fn api_base_matches_origin_and_path() {
        let base = Url::parse("https://api.github.com").unwrap();
        assert!(is_under(&base, "https://api.github.com/repos/a/b/releases/latest"));
        assert!(is_under(&base, "https://API.github.com:443/repos/a/b"));
        assert!(!is_under(&base, "https://api.github.com.evil.example/x-1.0.deb"));
        assert!(!is_under(&base, "https://api.github.com@evil.example/x.deb"));
        assert!(!is_under(&base, "http://api.github.com/repos/a/b"));
        assert!(!is_under(&base, "https://api.github.com:8443/repos/a/b"));
        assert!(!is_under(&base, "not a url"));

        let enterprise = Url::parse("https://ghe.example.com/api/v3/").unwrap();
        assert!(is_under(&enterprise, "https://ghe.example.com/api/v3/repos/a/b"));
        assert!(!is_under(&enterprise, "https://ghe.example.com/api/v30/repos"));
        assert!(!is_under(&enterprise, "https://ghe.example.com/downloads/x.deb"));
    }

    #[test]
    fn token_only_sent_to_release_api() {
        let mut transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        transport.api_token = Some("secret".to_string());
        let auth = |url: &str| {
            transport
                .request(reqwest::Method::GET, url)
                .build()
                .unwrap()
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_string())
        };

        assert_eq!(
            auth("https://api.github.com/repos/a/b/releases/latest").as_deref(),
            Some("Bearer secret")
        );
        assert_eq!(auth("https://api.github.com.evil.example/x-1.0.deb"), None);
        assert_eq!(auth("https://dl.example.org/x-1.0.deb"), None);
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let config = HttpConfig {
            timeout_secs: 2,
            ..HttpConfig::default()
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        // Port 9 on loopback is the discard port; nothing listens there.
        let err = transport.head("http://127.0.0.1:9/x.deb").unwrap_err();
        assert!(matches!(
            err,
            MirrorError::Transport { .. } | MirrorError::Timeout { .. }
        ));
    }
}
