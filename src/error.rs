//! Error types for request construction, dispatch and response decoding.
//!
//! Every failure class a caller may want to branch on gets its own variant,
//! with helper constructors that attach the originating context (URL, path).

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by sessions, requests and responses.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Two different body variants were supplied for one request.
    #[error("request body cannot coexist with another body variant")]
    BodyConflict,

    /// A proxy URL failed to parse; no network I/O was attempted.
    #[error("invalid proxy URL {url}: {source}")]
    ProxyUrl {
        /// The proxy URL that failed to parse.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The redirect chain exceeded the configured limit.
    #[error("exceeded the maximum number of redirects: {limit}")]
    Redirect {
        /// The limit that was exceeded.
        limit: i32,
    },

    /// The resolved deadline expired before the exchange finished.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// A cookie operation was attempted while the jar is detached.
    #[error("cookie jar is disabled")]
    CookieJarDisabled,

    /// The request URL is malformed.
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        /// The URL that failed to parse.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The request method is not a valid HTTP method token.
    #[error("invalid HTTP method: {method}")]
    InvalidMethod {
        /// The rejected method string.
        method: String,
    },

    /// A file referenced by a multipart form could not be read.
    #[error("multipart file {path} could not be read: {source}")]
    Multipart {
        /// The file that failed to open or read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any transport-level failure that is not a timeout (DNS, connect,
    /// TLS, protocol errors).
    #[error("network error requesting {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be configured (proxy application, TLS
    /// backend initialization).
    #[error("failed to configure HTTP client: {source}")]
    ClientBuild {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body is not valid JSON, or a JSON body failed to
    /// serialize.
    #[error("JSON codec failed: {source}")]
    Json {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A caller-supplied extraction pattern failed to compile.
    #[error("invalid extraction pattern: {source}")]
    Pattern {
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },
}

impl HttpError {
    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a transport error from a reqwest error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates a proxy URL error.
    pub fn proxy_url(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::ProxyUrl {
            url: url.into(),
            source,
        }
    }

    /// Creates a redirect-limit error carrying the exceeded limit.
    pub fn redirect(limit: i32) -> Self {
        Self::Redirect { limit }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid method error.
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Creates a multipart file error.
    pub fn multipart(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Multipart {
            path: path.into(),
            source,
        }
    }

    /// Creates a JSON codec error.
    pub fn json(source: serde_json::Error) -> Self {
        Self::Json { source }
    }

    /// Creates a pattern error.
    pub fn pattern(source: regex::Error) -> Self {
        Self::Pattern { source }
    }

    /// True when the failure is fundamentally a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True when the failure is a redirect-limit violation.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// True when the failure is a body-variant conflict.
    #[must_use]
    pub fn is_body_conflict(&self) -> bool {
        matches!(self, Self::BodyConflict)
    }
}

// Note on From trait implementations:
// There is deliberately no `From<reqwest::Error>` or `From<std::io::Error>`.
// The variants need context (url, path) that the source errors don't carry,
// so the helper constructors are the supported construction path.
