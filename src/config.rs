use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
const DEFAULT_TOKEN_KEY: &str = "access_token";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// RFP backend client configuration.
///
/// The backend base URL is a constructor parameter; everything else has a
/// default and can be overridden by chaining:
///
/// ```rust,ignore
/// use rfp_client::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:8000".parse()?)
///     .with_login_path("/signin")
///     .with_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) login_path: String,
    pub(crate) refresh_path: String,
    pub(crate) token_key: String,
    pub(crate) timeout: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            login_path: DEFAULT_LOGIN_PATH.into(),
            refresh_path: DEFAULT_REFRESH_PATH.into(),
            token_key: DEFAULT_TOKEN_KEY.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `RFP_API_URL`: backend base URL
    ///
    /// # Optional env vars
    /// - `RFP_LOGIN_PATH`: login view path (default `/login`)
    /// - `RFP_REFRESH_PATH`: token refresh endpoint (default `/auth/refresh`)
    /// - `RFP_TOKEN_KEY`: durable storage key for the access token
    /// - `RFP_TIMEOUT_SECS`: per-request timeout in seconds (default 30)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `RFP_API_URL` is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let url_str =
            lookup("RFP_API_URL").ok_or_else(|| Error::Config("RFP_API_URL is required".into()))?;
        let base_url: Url = url_str
            .parse()
            .map_err(|e| Error::Config(format!("RFP_API_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Some(path) = lookup("RFP_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Some(path) = lookup("RFP_REFRESH_PATH") {
            config = config.with_refresh_path(path);
        }
        if let Some(key) = lookup("RFP_TOKEN_KEY") {
            if key.trim().is_empty() {
                return Err(Error::Config("RFP_TOKEN_KEY must not be empty".into()));
            }
            config = config.with_token_key(key);
        }
        if let Some(secs) = lookup("RFP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("RFP_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the login view path. Refresh failures navigate here.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Override the token refresh endpoint.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override the durable storage key of the access token.
    #[must_use]
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    #[must_use]
    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves an API path against the base URL, keeping any path prefix
    /// the base URL carries (`http://host/api` + `/rfps` → `http://host/api/rfps`).
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
            .parse()
            .map_err(|e| Error::Config(format!("invalid endpoint '{path}': {e}")))
    }

    /// Whether `path` addresses the refresh endpoint (query string ignored).
    pub(crate) fn is_refresh_path(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        normalize(path) == normalize(&self.refresh_path)
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}
