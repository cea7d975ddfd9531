//! The dispatcher: merges session defaults with per-request overrides,
//! drives the redirect chain, classifies transport failures and builds the
//! [`Response`].
//!
//! The resolved deadline bounds the entire chain, not each hop.

use std::time::Duration;

use reqwest::cookie::CookieStore;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{DEFAULT_REDIRECT_LIMIT, DEFAULT_TIMEOUT_SECS, Session};
use crate::datatype::{Cookie, Cookies, Headers};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;

/// Resolved redirect policy for one dispatch.
#[derive(Debug, Clone, Copy)]
struct RedirectLimit {
    /// The configured value, reported back in [`HttpError::Redirect`].
    configured: i32,
    /// Hops actually allowed: 0 when redirects are banned.
    allowed: i32,
}

impl Session {
    /// Dispatches a built request and returns the terminal response.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Timeout`] when the resolved deadline expires,
    /// [`HttpError::Redirect`] when the chain exceeds the resolved limit,
    /// [`HttpError::ProxyUrl`] for a malformed proxy before any I/O, and
    /// [`HttpError::Transport`] for any other transport failure.
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(method = %request.method(), url = %request.url())
    )]
    pub async fn send(&self, request: Request) -> Result<Response, HttpError> {
        let client = self.client_for(request.proxy())?;
        let limit = resolve_redirect_limit(request.redirect_num(), self.redirect_num);
        let headers = merge_headers(&self.headers, request.headers());

        match resolve_timeout(request.timeout(), self.timeout) {
            Some(deadline) => {
                tokio::time::timeout(deadline, self.dispatch(&client, &request, headers, limit))
                    .await
                    .map_err(|_| HttpError::timeout(request.url()))?
            }
            None => self.dispatch(&client, &request, headers, limit).await,
        }
    }

    /// Runs the redirect loop: each hop re-assembles the wire request for the
    /// current URL until a non-redirect reply or a limit violation.
    async fn dispatch(
        &self,
        client: &Client,
        request: &Request,
        headers: HeaderMap,
        limit: RedirectLimit,
    ) -> Result<Response, HttpError> {
        let mut url =
            Url::parse(request.url()).map_err(|e| HttpError::invalid_url(request.url(), e))?;
        let mut method = Method::from_bytes(request.method().as_bytes())
            .map_err(|_| HttpError::invalid_method(request.method()))?;
        let mut body = request.encode_body();
        let mut hops: i32 = 0;

        loop {
            let mut hop_headers = headers.clone();
            if let Some(encoded) = &body
                && let Some(content_type) = &encoded.content_type
                && !hop_headers.contains_key(CONTENT_TYPE)
                && let Ok(value) = HeaderValue::from_str(content_type)
            {
                hop_headers.insert(CONTENT_TYPE, value);
            }
            if let Some(value) = self.cookie_header_value(request.cookies(), &url) {
                hop_headers.insert(COOKIE, value);
            }

            let mut wire = client.request(method.clone(), url.clone()).headers(hop_headers);
            if let Some(encoded) = &body {
                wire = wire.body(encoded.bytes.clone());
            }

            debug!(hop = hops, "sending wire request");
            let reply = wire
                .send()
                .await
                .map_err(|e| classify_transport_error(url.as_str(), e))?;

            let status = reply.status();
            if status.is_redirection()
                && let Some(location) = reply.headers().get(LOCATION)
            {
                if limit.allowed == 0 {
                    debug!(%status, "redirects disabled, returning redirect reply as-is");
                    return build_response(reply, url.as_str()).await;
                }
                if hops >= limit.allowed {
                    return Err(HttpError::redirect(limit.configured));
                }
                let Ok(location) = location.to_str() else {
                    warn!("redirect Location is not valid text, returning reply as-is");
                    return build_response(reply, url.as_str()).await;
                };
                let next = url
                    .join(location)
                    .map_err(|e| HttpError::invalid_url(location, e))?;

                // 303 always downgrades to GET; so do 301/302 after POST.
                if status == StatusCode::SEE_OTHER
                    || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
                        && method == Method::POST)
                {
                    method = Method::GET;
                    body = None;
                }

                debug!(%status, to = %next, hop = hops, "following redirect");
                url = next;
                hops += 1;
                continue;
            }

            return build_response(reply, url.as_str()).await;
        }
    }

    /// Assembles the `Cookie` header for one hop: descriptor cookies first,
    /// then the jar's cookies for the hop URL. Returns `None` when the
    /// request carries no cookies of its own, leaving attachment to the
    /// transport's cookie store.
    fn cookie_header_value(&self, cookies: &Cookies, url: &Url) -> Option<HeaderValue> {
        if cookies.is_empty() {
            return None;
        }
        let mut parts: Vec<String> = cookies
            .pairs()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        if let Some(jar) = &self.jar
            && let Some(stored) = jar.cookies(url)
            && let Ok(stored) = stored.to_str()
            && !stored.is_empty()
        {
            parts.push(stored.to_string());
        }
        match HeaderValue::from_str(&parts.join("; ")) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("request cookies contain invalid header characters, skipping");
                None
            }
        }
    }
}

/// Resolves the dispatch deadline: request setting (if non-zero) over session
/// setting (if non-zero) over the 30-second default. A negative value at the
/// most specific non-zero level means "no deadline".
fn resolve_timeout(request: i64, session: i64) -> Option<Duration> {
    let setting = if request != 0 {
        request
    } else if session != 0 {
        session
    } else {
        DEFAULT_TIMEOUT_SECS
    };
    u64::try_from(setting).ok().map(Duration::from_secs)
}

/// Resolves the redirect limit with the same precedence as the timeout.
/// Negative bans redirect following entirely.
fn resolve_redirect_limit(request: i32, session: i32) -> RedirectLimit {
    let configured = if request != 0 {
        request
    } else if session != 0 {
        session
    } else {
        DEFAULT_REDIRECT_LIMIT
    };
    RedirectLimit {
        configured,
        allowed: configured.max(0),
    }
}

/// Builds the wire headers: session defaults first, request headers win
/// key-by-key rather than as a wholesale replacement.
fn merge_headers(session: &Headers, request: &Headers) -> HeaderMap {
    let mut merged = HeaderMap::new();
    apply_headers(&mut merged, session);
    apply_headers(&mut merged, request);
    merged
}

/// Applies one header collection over the map. Every key present in the
/// collection replaces that key's values; other keys are untouched. Invalid
/// names or values are skipped with a warning.
fn apply_headers(map: &mut HeaderMap, headers: &Headers) {
    let mut replaced: Option<HeaderName> = None;
    for (key, value) in headers.pairs() {
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            warn!(header = key, "skipping invalid header name");
            continue;
        };
        let Ok(parsed) = HeaderValue::from_str(value) else {
            warn!(header = key, "skipping invalid header value");
            continue;
        };
        if replaced.as_ref() != Some(&name) {
            map.remove(&name);
            replaced = Some(name.clone());
        }
        map.append(name, parsed);
    }
}

/// Classifies a transport failure: deadline-style failures become
/// [`HttpError::Timeout`], everything else is a generic transport error.
fn classify_transport_error(url: &str, error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::timeout(url)
    } else {
        HttpError::transport(url, error)
    }
}

/// Reads the full reply body and assembles the [`Response`].
///
/// A body that ends early after some bytes have arrived is treated as a
/// complete read: some servers close connections without a clean terminator.
async fn build_response(reply: reqwest::Response, url: &str) -> Result<Response, HttpError> {
    let status = reply.status();
    let version = reply.version();
    let headers = reply.headers().clone();
    let cookies: Vec<Cookie> = reply
        .cookies()
        .map(|reply_cookie| {
            let mut cookie = Cookie::new(reply_cookie.name(), reply_cookie.value());
            cookie.domain = reply_cookie.domain().map(str::to_string);
            cookie.path = reply_cookie.path().map(str::to_string);
            cookie
        })
        .collect();
    let final_url = reply.url().to_string();

    let mut reply = reply;
    let mut content: Vec<u8> = Vec::new();
    loop {
        match reply.chunk().await {
            Ok(Some(chunk)) => content.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) if e.is_timeout() => return Err(HttpError::timeout(url)),
            Err(e) if e.is_body() || e.is_decode() => {
                warn!(url, error = %e, "response body ended early, keeping partial content");
                break;
            }
            Err(e) => return Err(HttpError::transport(url, e)),
        }
    }

    debug!(status = status.as_u16(), bytes = content.len(), "response complete");
    Ok(Response::new(
        final_url, status, version, headers, cookies, content,
    ))
}
