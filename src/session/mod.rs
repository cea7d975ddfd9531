//! Persistent HTTP session: transport handle, cookie store and cross-request
//! defaults.
//!
//! A [`Session`] is created once and reused; it owns the pooled transport and
//! (unless disabled) a public-suffix-aware cookie jar shared by every request
//! it dispatches. Redirect following is disabled at the transport layer; the
//! dispatcher owns the redirect walk so per-request limits and error
//! classification work.

mod send;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, ClientBuilder, redirect};
use tracing::debug;
use url::Url;

use crate::datatype::{Cookie, Headers, Proxy};
use crate::error::HttpError;
use crate::request::{Request, RequestOption};
use crate::response::Response;

/// Default timeout applied when neither the request nor the session sets one.
pub(crate) const DEFAULT_TIMEOUT_SECS: i64 = 30;

/// Default redirect limit when neither the request nor the session sets one.
pub(crate) const DEFAULT_REDIRECT_LIMIT: i32 = 5;

/// User-Agent sent unless the caller overrides it.
const DEFAULT_USER_AGENT: &str = concat!("husky/", env!("CARGO_PKG_VERSION"));

/// Transport configuration for a session. All fields are defaulted.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// TCP keep-alive interval.
    pub keep_alive: Duration,
    /// Max idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept around.
    pub pool_idle_timeout: Duration,
    /// Start without a cookie store; requests send no stored cookies and
    /// store none from replies.
    pub disable_cookie_jar: bool,
    /// Disable connection reuse entirely.
    pub disable_keep_alive: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(30),
            pool_max_idle_per_host: 2,
            pool_idle_timeout: Duration::from_secs(90),
            disable_cookie_jar: false,
            disable_keep_alive: false,
        }
    }
}

/// A persistent HTTP session.
///
/// The policy fields (`headers`, `proxy`, `timeout`, `redirect_num`) are
/// session-wide defaults; a request option of the same kind overrides them
/// for one dispatch. Concurrent callers may share one session by reference.
#[derive(Debug)]
pub struct Session {
    client: Client,
    jar: Option<Arc<Jar>>,
    config: SessionConfig,
    /// Default headers merged under every request's own headers.
    pub headers: Headers,
    /// Default per-scheme proxy pair.
    pub proxy: Option<Proxy>,
    /// Default timeout in seconds: 0 = built-in default, negative = unlimited.
    pub timeout: i64,
    /// Default redirect limit: 0 = built-in default of 5, negative = ban.
    pub redirect_num: i32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Creates a session with an explicit configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_config(config: SessionConfig) -> Self {
        let jar = (!config.disable_cookie_jar).then(|| Arc::new(Jar::default()));
        let client = base_client_builder(&config, jar.clone())
            .build()
            .expect("failed to build HTTP client with session configuration");

        let mut headers = Headers::new();
        headers.add("User-Agent", DEFAULT_USER_AGENT);

        Self {
            client,
            jar,
            config,
            headers,
            proxy: None,
            timeout: 0,
            redirect_num: 0,
        }
    }

    /// Constructs and sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures; see
    /// [`Session::send`].
    pub async fn get(
        &self,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        self.request("GET", url, options).await
    }

    /// Constructs and sends a POST request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures.
    pub async fn post(
        &self,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        self.request("POST", url, options).await
    }

    /// Constructs and sends a PUT request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures.
    pub async fn put(
        &self,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        self.request("PUT", url, options).await
    }

    /// Constructs and sends a PATCH request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures.
    pub async fn patch(
        &self,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        self.request("PATCH", url, options).await
    }

    /// Constructs and sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures.
    pub async fn delete(
        &self,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        self.request("DELETE", url, options).await
    }

    /// Constructs and sends a HEAD request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures.
    pub async fn head(
        &self,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        self.request("HEAD", url, options).await
    }

    /// Constructs and sends a request with an arbitrary method.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] for construction or dispatch failures.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response, HttpError> {
        let request = Request::build(method, url, options)?;
        self.send(request).await
    }

    /// Returns the cookies the store holds for the URL's registrable domain.
    ///
    /// Returns an empty snapshot when the jar is disabled or the URL does not
    /// parse.
    #[must_use]
    pub fn cookies(&self, url: &str) -> Vec<Cookie> {
        let Some(jar) = &self.jar else {
            return Vec::new();
        };
        let Ok(parsed) = Url::parse(url) else {
            return Vec::new();
        };
        let Some(header) = jar.cookies(&parsed) else {
            return Vec::new();
        };
        header
            .to_str()
            .unwrap_or_default()
            .split("; ")
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                Some(Cookie::new(name, value))
            })
            .collect()
    }

    /// Writes cookies into the store, scoped to the URL.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::CookieJarDisabled`] when the store is detached
    /// and [`HttpError::InvalidUrl`] when the URL does not parse.
    pub fn set_cookies(&self, url: &str, cookies: &[Cookie]) -> Result<(), HttpError> {
        let Some(jar) = &self.jar else {
            return Err(HttpError::CookieJarDisabled);
        };
        let parsed = Url::parse(url).map_err(|e| HttpError::invalid_url(url, e))?;
        for cookie in cookies {
            let mut entry = format!("{}={}", cookie.name, cookie.value);
            if let Some(domain) = &cookie.domain {
                entry.push_str("; Domain=");
                entry.push_str(domain);
            }
            if let Some(path) = &cookie.path {
                entry.push_str("; Path=");
                entry.push_str(path);
            }
            jar.add_cookie_str(&entry, &parsed);
        }
        Ok(())
    }

    /// Detaches the cookie store. Subsequent requests send no stored cookies
    /// and store none from replies. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be rebuilt without the cookie
    /// provider, which should never happen with a configuration that already
    /// built once.
    #[allow(clippy::expect_used)]
    pub fn disable_cookie_jar(&mut self) {
        if self.jar.is_none() {
            return;
        }
        debug!("detaching cookie jar from session");
        self.jar = None;
        self.client = base_client_builder(&self.config, None)
            .build()
            .expect("failed to rebuild HTTP client without cookie jar");
    }

    /// True when the session still has a cookie store attached.
    #[must_use]
    pub fn cookie_jar_enabled(&self) -> bool {
        self.jar.is_some()
    }

    /// Picks the transport for one dispatch: the pooled session client, or a
    /// dedicated client when an explicit proxy is resolved for this request.
    fn client_for(&self, request_proxy: Option<&Proxy>) -> Result<Client, HttpError> {
        let proxy = request_proxy
            .filter(|p| !p.is_empty())
            .or(self.proxy.as_ref().filter(|p| !p.is_empty()));
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };

        let mut builder = base_client_builder(&self.config, self.jar.clone());
        if !proxy.http.is_empty() {
            let resolved = reqwest::Proxy::http(&proxy.http)
                .map_err(|e| HttpError::proxy_url(&proxy.http, e))?;
            builder = builder.proxy(resolved);
        }
        if !proxy.https.is_empty() {
            let resolved = reqwest::Proxy::https(&proxy.https)
                .map_err(|e| HttpError::proxy_url(&proxy.https, e))?;
            builder = builder.proxy(resolved);
        }
        builder
            .build()
            .map_err(|e| HttpError::ClientBuild { source: e })
    }
}

/// Shared builder base so the pooled client, the cookie-jar rebuild and
/// per-dispatch proxy clients agree on transport settings.
fn base_client_builder(config: &SessionConfig, jar: Option<Arc<Jar>>) -> ClientBuilder {
    let pool_max_idle = if config.disable_keep_alive {
        0
    } else {
        config.pool_max_idle_per_host
    };
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .tcp_keepalive(config.keep_alive)
        .pool_max_idle_per_host(pool_max_idle)
        .pool_idle_timeout(config.pool_idle_timeout)
        .redirect(redirect::Policy::none())
        .gzip(true);
    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }
    builder
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_default_user_agent() {
        let session = Session::new();
        assert!(session.headers.get("user-agent").starts_with("husky/"));
        assert!(session.cookie_jar_enabled());
    }

    #[test]
    fn test_config_can_disable_cookie_jar_up_front() {
        let session = Session::with_config(SessionConfig {
            disable_cookie_jar: true,
            ..SessionConfig::default()
        });
        assert!(!session.cookie_jar_enabled());
        assert!(session.cookies("http://example.com").is_empty());
    }

    #[test]
    fn test_set_cookies_roundtrip_through_store() {
        let session = Session::new();
        session
            .set_cookies("http://example.com", &[Cookie::new("name", "husky")])
            .unwrap();

        let cookies = session.cookies("http://example.com");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "name");
        assert_eq!(cookies[0].value, "husky");
    }

    #[test]
    fn test_set_cookies_fails_when_jar_disabled() {
        let mut session = Session::new();
        session.disable_cookie_jar();
        session.disable_cookie_jar(); // idempotent

        let result = session.set_cookies("http://example.com", &[Cookie::new("a", "b")]);
        assert!(matches!(result, Err(HttpError::CookieJarDisabled)));
        assert!(session.cookies("http://example.com").is_empty());
    }

    #[test]
    fn test_cookies_with_unparseable_url_is_empty() {
        let session = Session::new();
        assert!(session.cookies("not a url").is_empty());
    }

    #[test]
    fn test_dispatch_from_blocking_context() {
        let response = tokio_test::block_on(async {
            let server = wiremock::MockServer::start().await;
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("passed"))
                .mount(&server)
                .await;
            Session::new().get(&server.uri(), []).await
        });
        assert_eq!(response.unwrap().text(), "passed");
    }

    #[test]
    fn test_client_for_rejects_malformed_proxy() {
        let session = Session::new();
        let proxy = Proxy::new("http://[::invalid", "");
        let result = session.client_for(Some(&proxy));
        assert!(matches!(result, Err(HttpError::ProxyUrl { .. })));
    }

    #[test]
    fn test_client_for_without_proxy_reuses_pooled_client() {
        let session = Session::new();
        assert!(session.client_for(None).is_ok());
        assert!(session.client_for(Some(&Proxy::default())).is_ok());
    }
}
