//! Client configuration.
//!
//! Everything that used to be ambient in a browser build (the API base URL
//! baked in at deploy time, request limits) lives in one [`ClientConfig`]
//! value. It is built once at process start and handed to the transport and
//! the controllers explicitly; nothing reads the base URL from a global.
//!
//! # Design choice: builder over constructor
//! Callers set the base URL and rely on documented defaults for the rest.
//! `build()` is the single place where invariants are checked.

use crate::error::DocflowError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "DOCFLOW_API_BASE_URL";

/// Environment variable holding an optional request timeout in seconds.
pub const TIMEOUT_ENV: &str = "DOCFLOW_REQUEST_TIMEOUT";

/// Largest `top_k` the search endpoint accepts.
pub const MAX_TOP_K: usize = 20;

const MIB: u64 = 1024 * 1024;

/// Configuration shared by the transport and all three workflows.
///
/// # Example
/// ```rust
/// use edgequake_docflow::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8000")
///     .default_top_k(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_top_k, 8);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to, e.g. `http://localhost:8000`.
    /// Stored without a trailing slash.
    pub base_url: String,

    /// Whole-request timeout in seconds. Default: `None`.
    ///
    /// With no timeout a hung request leaves its workflow in `Submitting`
    /// until the connection drops.
    pub request_timeout_secs: Option<u64>,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// `top_k` used by `search` when the caller does not pass one. Range: 1–20. Default: 5.
    pub default_top_k: usize,

    /// Per-file size limit for Research-Index uploads. Default: 10 MiB.
    pub max_index_file_bytes: u64,

    /// Size limit for the file sent to the conversion endpoint. Default: 20 MiB.
    pub max_convert_file_bytes: u64,

    /// Receives request lifecycle and percentage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: None,
            user_agent: concat!("edgequake-docflow/", env!("CARGO_PKG_VERSION")).to_string(),
            default_top_k: 5,
            max_index_file_bytes: 10 * MIB,
            max_convert_file_bytes: 20 * MIB,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("default_top_k", &self.default_top_k)
            .field("max_index_file_bytes", &self.max_index_file_bytes)
            .field("max_convert_file_bytes", &self.max_convert_file_bytes)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn UploadProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config from `DOCFLOW_API_BASE_URL` and `DOCFLOW_REQUEST_TIMEOUT`.
    pub fn from_env() -> Result<Self, DocflowError> {
        let base_url = std::env::var(BASE_URL_ENV).map_err(|_| {
            DocflowError::InvalidConfig(format!("{BASE_URL_ENV} is not set"))
        })?;

        let mut builder = Self::builder().base_url(base_url);
        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                DocflowError::InvalidConfig(format!("{TIMEOUT_ENV} must be whole seconds, got '{raw}'"))
            })?;
            builder = builder.request_timeout_secs(secs);
        }
        builder.build()
    }

    /// Absolute URL for an endpoint path such as `/api/ai/index-files`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k.clamp(1, MAX_TOP_K);
        self
    }

    pub fn max_index_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_index_file_bytes = bytes;
        self
    }

    pub fn max_convert_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_convert_file_bytes = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, DocflowError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            DocflowError::InvalidConfig(format!("base URL '{}' is not valid: {}", c.base_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DocflowError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(DocflowError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_index_file_bytes == 0 || c.max_convert_file_bytes == 0 {
            return Err(DocflowError::InvalidConfig(
                "Upload size limits must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_limits() {
        let c = ClientConfig::default();
        assert_eq!(c.default_top_k, 5);
        assert_eq!(c.max_index_file_bytes, 10 * 1024 * 1024);
        assert_eq!(c.max_convert_file_bytes, 20 * 1024 * 1024);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = ClientConfig::builder()
            .base_url("https://docs.example.com/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "https://docs.example.com");
        assert_eq!(
            c.endpoint_url("/api/convert/convert"),
            "https://docs.example.com/api/convert/convert"
        );
        assert_eq!(c.endpoint_url("ocr"), "https://docs.example.com/ocr");
    }

    #[test]
    fn top_k_is_clamped() {
        let c = ClientConfig::builder().default_top_k(0).build().unwrap();
        assert_eq!(c.default_top_k, 1);
        let c = ClientConfig::builder().default_top_k(99).build().unwrap();
        assert_eq!(c.default_top_k, MAX_TOP_K);
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::builder()
            .base_url("ftp://files.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, DocflowError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(ClientConfig::builder().base_url("not a url").build().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(ClientConfig::builder().request_timeout_secs(0).build().is_err());
    }
}
