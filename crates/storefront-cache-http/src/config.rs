use http::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN};
use std::time::Duration;
use url::Url;

use storefront_cache_core::{CacheError, Result};

/// Process-wide HTTP settings for the backend connection
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL every request path is resolved against
    pub base_url: Url,
    /// Headers sent with every request (e.g. `origin`)
    pub default_headers: HeaderMap,
    /// User-Agent header
    pub user_agent: String,
    /// TCP connect timeout
    pub connect_timeout: Option<Duration>,
}

impl HttpConfig {
    /// Create config for the given base URL
    ///
    /// The base is normalized to end in `/` so relative paths append to it
    /// instead of replacing its last segment.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| CacheError::Configuration(format!("invalid base url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CacheError::Configuration(format!(
                "base url {base_url} cannot be a base"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            default_headers: HeaderMap::new(),
            user_agent: Self::default_user_agent().to_string(),
            connect_timeout: Some(Duration::from_secs(10)),
        })
    }

    pub fn default_user_agent() -> &'static str {
        concat!("storefront-cache/", env!("CARGO_PKG_VERSION"))
    }

    /// Add a default header
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CacheError::Configuration(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| CacheError::Configuration(format!("invalid header value {value:?}: {e}")))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Set the `origin` header the backend uses to pick the storefront
    pub fn origin(self, origin: &str) -> Result<Self> {
        self.header(ORIGIN.as_str(), origin)
    }

    /// Override the User-Agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the connect timeout
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve a request path and query against the base URL
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CacheError::InvalidInput(format!("invalid request path {path:?}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}
