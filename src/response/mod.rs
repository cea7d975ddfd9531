//! Response object: raw bytes plus lazy, cached views over them.
//!
//! The decoded text is computed at most once per charset selection, and the
//! DOM for selector queries is built at most once per charset selection;
//! both caches are lock-guarded so a response can be shared across tasks.

mod select;

pub use select::{Node, NodeList};

use std::sync::{Mutex, MutexGuard, PoisonError};

use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use scraper::Html;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::datatype::Cookie;
use crate::error::HttpError;

struct TextCache {
    /// Active charset, normalized to lowercase.
    charset: String,
    decoded: Option<String>,
}

struct DomCache {
    /// Charset the cached document was parsed under.
    charset: String,
    dom: Option<Html>,
}

/// The reply to one dispatched request.
///
/// Everything except the two lazy caches is immutable once constructed, so a
/// response is safe to share by reference across tasks.
pub struct Response {
    url: String,
    status: StatusCode,
    version: reqwest::Version,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    content: Vec<u8>,
    text_cache: Mutex<TextCache>,
    dom_cache: Mutex<DomCache>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("content_len", &self.content.len())
            .finish_non_exhaustive()
    }
}

impl Response {
    pub(crate) fn new(
        url: String,
        status: StatusCode,
        version: reqwest::Version,
        headers: HeaderMap,
        cookies: Vec<Cookie>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            url,
            status,
            version,
            headers,
            cookies,
            content,
            text_cache: Mutex::new(TextCache {
                charset: "utf-8".to_string(),
                decoded: None,
            }),
            dom_cache: Mutex::new(DomCache {
                charset: String::new(),
                dom: None,
            }),
        }
    }

    /// Final URL of the exchange, after any followed redirects.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Status code of the terminal reply.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status code as a plain number.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Protocol of the reply, like `HTTP/1.1`.
    #[must_use]
    pub fn proto(&self) -> String {
        format!("{:?}", self.version)
    }

    /// Reply headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Snapshot of the cookies the reply set.
    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Raw reply bytes. Fully buffered at construction; no further I/O.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Decodes the content under the active charset (default UTF-8),
    /// reusing the cached text when already decoded.
    #[must_use]
    pub fn text(&self) -> String {
        self.decoded_text().1
    }

    /// Makes `charset` the active charset and decodes the content under it,
    /// discarding any previously cached text.
    ///
    /// Supported charsets: UTF-8, GBK, GB18030 and Latin-1. An unsupported
    /// name yields an empty string.
    #[must_use]
    pub fn text_with_charset(&self, charset: &str) -> String {
        let normalized = charset.to_ascii_lowercase();
        let mut cache = lock(&self.text_cache);
        if cache.decoded.is_none() || cache.charset != normalized {
            cache.decoded = Some(decode_content(&self.content, &normalized));
            cache.charset = normalized;
        }
        cache.decoded.clone().unwrap_or_default()
    }

    /// Returns the active charset and the decoded text, populating the cache
    /// if needed.
    pub(crate) fn decoded_text(&self) -> (String, String) {
        let mut cache = lock(&self.text_cache);
        if cache.decoded.is_none() {
            let decoded = decode_content(&self.content, &cache.charset);
            cache.decoded = Some(decoded);
        }
        (
            cache.charset.clone(),
            cache.decoded.clone().unwrap_or_default(),
        )
    }

    /// Returns every non-overlapping match of the pattern against the
    /// decoded text, in left-to-right order.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Pattern`] when the pattern does not compile.
    pub fn re(&self, pattern: &str) -> Result<Vec<String>, HttpError> {
        let regex = Regex::new(pattern).map_err(HttpError::pattern)?;
        let text = self.text();
        Ok(regex
            .find_iter(&text)
            .map(|found| found.as_str().to_string())
            .collect())
    }

    /// Like [`re`](Self::re), but returns only the capture groups of each
    /// match; the full match span is dropped. A pattern with no capture
    /// groups yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Pattern`] when the pattern does not compile.
    pub fn re_submatch(&self, pattern: &str) -> Result<Vec<Vec<String>>, HttpError> {
        let regex = Regex::new(pattern).map_err(HttpError::pattern)?;
        if regex.captures_len() <= 1 {
            return Ok(Vec::new());
        }
        let text = self.text();
        Ok(regex
            .captures_iter(&text)
            .map(|caps| {
                (1..caps.len())
                    .map(|i| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect()
            })
            .collect())
    }

    /// Decodes the content as JSON into a caller-supplied structure.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Json`] when the content is not valid JSON for
    /// the target type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.content).map_err(HttpError::json)
    }

    /// Extracts a single value from the JSON content by a dot-separated
    /// path: object keys and array indices, like `"items.0.name"`. An empty
    /// path yields the whole document. Returns `None` when the content is
    /// not JSON or the path does not resolve.
    #[must_use]
    pub fn json_get(&self, path: &str) -> Option<Value> {
        let root: Value = serde_json::from_slice(&self.content).ok()?;
        if path.is_empty() {
            return Some(root);
        }
        let mut current = &root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

/// Decodes bytes under a (lowercased) charset name. Unsupported names yield
/// an empty string; the leniency is deliberate and logged.
fn decode_content(content: &[u8], charset: &str) -> String {
    let encoding = match charset {
        "utf-8" | "utf8" => encoding_rs::UTF_8,
        "gbk" => encoding_rs::GBK,
        "gb18030" => encoding_rs::GB18030,
        // WHATWG maps the latin1 label onto windows-1252.
        "latin1" | "latin-1" | "iso-8859-1" => encoding_rs::WINDOWS_1252,
        _ => {
            warn!(charset, "unsupported charset, yielding empty text");
            return String::new();
        }
    };
    let (decoded, _, _) = encoding.decode(content);
    decoded.into_owned()
}

/// Locks a cache mutex, recovering the guard from a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
