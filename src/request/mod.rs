//! Request descriptor and the closed set of request modifiers.
//!
//! A [`Request`] is assembled once from a method, a URL and an ordered list
//! of [`RequestOption`] values, then handed to the session dispatcher. Each
//! option knows how to apply itself onto the descriptor; later options win
//! per field, except that two different body variants conflict.

mod multipart;

pub use multipart::MultipartForm;

use serde::Serialize;

use crate::datatype::{Cookies, Headers, Params, PostForm, Proxy};
use crate::error::HttpError;

/// The body attached to a request, at most one variant per request.
#[derive(Debug, Clone)]
pub(crate) enum Body {
    Raw(Vec<u8>),
    Form(PostForm),
    Json(Vec<u8>),
    Multipart(MultipartForm),
}

/// A request body already serialized for the wire, with the content type it
/// implies (raw bodies imply none).
#[derive(Debug, Clone)]
pub(crate) struct EncodedBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// One member of the closed set of request modifiers.
///
/// Options are consumed positionally by [`Request::build`] and the session
/// verb methods. Converting the value types with `.into()` keeps call sites
/// short:
///
/// ```no_run
/// use husky::{Params, Session};
///
/// # async fn example() -> Result<(), husky::HttpError> {
/// let session = Session::new();
/// let resp = session
///     .get(
///         "http://httpbin.org/get",
///         [Params::from_pairs(&[("key", "value")]).into()],
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub enum RequestOption {
    /// Headers to send; replaces headers set by an earlier option.
    Headers(Headers),
    /// Query parameters appended to the URL.
    Params(Params),
    /// Cookies attached to this request only.
    Cookies(Cookies),
    /// Raw request body bytes.
    Body(Vec<u8>),
    /// URL-encoded form body.
    PostForm(PostForm),
    /// Pre-serialized JSON body; see [`RequestOption::json`].
    JsonBody(Vec<u8>),
    /// Multipart form body.
    MultipartForm(MultipartForm),
    /// Per-scheme proxy override for this request.
    Proxy(Proxy),
    /// Timeout in seconds: 0 falls through to the session, negative means
    /// unlimited.
    Timeout(i64),
    /// Redirect limit: 0 falls through to the session (default 5), negative
    /// bans redirects, positive N allows at most N hops.
    RedirectNum(i32),
}

impl RequestOption {
    /// Serializes `value` as a JSON body option.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Json`] when serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HttpError> {
        let bytes = serde_json::to_vec(value).map_err(HttpError::json)?;
        Ok(Self::JsonBody(bytes))
    }

    /// Creates a raw body option from anything byte-like.
    pub fn body(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Body(bytes.into())
    }

    /// Applies this option onto the descriptor.
    fn apply(self, request: &mut Request) -> Result<(), HttpError> {
        match self {
            Self::Headers(headers) => request.headers = headers,
            Self::Params(params) => request.url = append_query(&request.url, &params),
            Self::Cookies(cookies) => request.cookies = cookies,
            Self::Body(bytes) => request.set_body(Body::Raw(bytes))?,
            Self::PostForm(form) => request.set_body(Body::Form(form))?,
            Self::JsonBody(bytes) => request.set_body(Body::Json(bytes))?,
            Self::MultipartForm(form) => request.set_body(Body::Multipart(form))?,
            Self::Proxy(proxy) => request.proxy = Some(proxy),
            Self::Timeout(seconds) => request.timeout = seconds,
            Self::RedirectNum(count) => request.redirect_num = count,
        }
        Ok(())
    }
}

impl From<Headers> for RequestOption {
    fn from(headers: Headers) -> Self {
        Self::Headers(headers)
    }
}

impl From<Params> for RequestOption {
    fn from(params: Params) -> Self {
        Self::Params(params)
    }
}

impl From<Cookies> for RequestOption {
    fn from(cookies: Cookies) -> Self {
        Self::Cookies(cookies)
    }
}

impl From<PostForm> for RequestOption {
    fn from(form: PostForm) -> Self {
        Self::PostForm(form)
    }
}

impl From<MultipartForm> for RequestOption {
    fn from(form: MultipartForm) -> Self {
        Self::MultipartForm(form)
    }
}

impl From<Proxy> for RequestOption {
    fn from(proxy: Proxy) -> Self {
        Self::Proxy(proxy)
    }
}

/// Immutable descriptor of one request, prior to wire serialization.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: String,
    headers: Headers,
    body: Option<Body>,
    cookies: Cookies,
    proxy: Option<Proxy>,
    timeout: i64,
    redirect_num: i32,
}

impl Request {
    /// Assembles a request descriptor from a method, a URL and an ordered
    /// list of options.
    ///
    /// The method is normalized to upper case. Options apply in order; the
    /// later option wins for headers, cookies, proxy, timeout and redirect
    /// limit, while a second, different body variant is a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::BodyConflict`] for conflicting body variants and
    /// [`HttpError::Json`] when a JSON body option failed to serialize.
    pub fn build(
        method: &str,
        url: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Self, HttpError> {
        let mut request = Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers: Headers::new(),
            body: None,
            cookies: Cookies::new(),
            proxy: None,
            timeout: 0,
            redirect_num: 0,
        };
        for option in options {
            option.apply(&mut request)?;
        }
        Ok(request)
    }

    /// Records a body variant, rejecting a second different variant.
    /// Supplying the same variant again lets the later one win.
    fn set_body(&mut self, body: Body) -> Result<(), HttpError> {
        if let Some(existing) = &self.body
            && std::mem::discriminant(existing) != std::mem::discriminant(&body)
        {
            return Err(HttpError::BodyConflict);
        }
        self.body = Some(body);
        Ok(())
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn timeout(&self) -> i64 {
        self.timeout
    }

    #[must_use]
    pub fn redirect_num(&self) -> i32 {
        self.redirect_num
    }

    /// Serializes the body variant for the wire, together with the content
    /// type it implies.
    pub(crate) fn encode_body(&self) -> Option<EncodedBody> {
        match &self.body {
            None => None,
            Some(Body::Raw(bytes)) => Some(EncodedBody {
                content_type: None,
                bytes: bytes.clone(),
            }),
            Some(Body::Form(form)) => Some(EncodedBody {
                content_type: Some("application/x-www-form-urlencoded".to_string()),
                bytes: form.url_encode().into_bytes(),
            }),
            Some(Body::Json(bytes)) => Some(EncodedBody {
                content_type: Some("application/json".to_string()),
                bytes: bytes.clone(),
            }),
            Some(Body::Multipart(form)) => {
                let (content_type, bytes) = form.encode();
                Some(EncodedBody {
                    content_type: Some(content_type),
                    bytes,
                })
            }
        }
    }
}

/// Appends the encoded parameters to the URL, choosing `?` or `&` based on
/// whether a query component already exists. Path, scheme and host are left
/// untouched.
fn append_query(url: &str, params: &Params) -> String {
    let encoded = params.url_encode();
    if encoded.is_empty() {
        return url.to_string();
    }
    if let Some(stripped) = url.strip_suffix('?') {
        format!("{stripped}?{encoded}")
    } else if url.contains('?') {
        format!("{url}&{encoded}")
    } else {
        format!("{url}?{encoded}")
    }
}
