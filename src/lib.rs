//! Husky
//!
//! A convenient, session-based HTTP client. A [`Session`] issues
//! GET/POST/PUT/PATCH/DELETE/HEAD requests, manages cookies across calls and
//! applies configurable timeout/proxy/redirect policy; the returned
//! [`Response`] offers lazy, encoding-aware text decoding plus regex and CSS
//! selector extraction.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`datatype`] - Multi-value maps and the request/response value types
//! - [`request`] - Request descriptor and the closed set of request options
//! - [`session`] - Persistent session, transport handle and dispatcher
//! - [`response`] - Lazy decoding, regex/CSS/JSON extraction
//! - [`error`] - The error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use husky::{Params, Session};
//!
//! # async fn example() -> Result<(), husky::HttpError> {
//! let session = Session::new();
//! let resp = session
//!     .get(
//!         "http://httpbin.org/get",
//!         [Params::from_pairs(&[("key", "value")]).into()],
//!     )
//!     .await?;
//! println!("{}", resp.text());
//! for link in &resp.css("a") {
//!     println!("{}", link.attr_or("href", ""));
//! }
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod datatype;
pub mod error;
pub mod request;
pub mod response;
pub mod session;

// Re-export commonly used types
pub use datatype::{Cookie, Cookies, Headers, MultiValueMap, Params, PostForm, Proxy};
pub use error::HttpError;
pub use request::{MultipartForm, Request, RequestOption};
pub use response::{Node, NodeList, Response};
pub use session::{Session, SessionConfig};
