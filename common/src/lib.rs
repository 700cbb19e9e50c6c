use std::error::Error as StdError;

use http::{Extensions, Method, StatusCode, Uri};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use tokio_util::sync::CancellationToken;

pub mod binary;
pub mod event;
pub mod headers;

pub use headers::Headers;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Response body handed back by the application, drained exactly once.
pub type ResponseBody = BoxBody<Bytes, BoxError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    Binary(Bytes),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Text(text) => Bytes::from(text),
            Self::Binary(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenericRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: Headers,
    /// Never cancelled by the gateway adapter, handlers must not wait on it.
    pub signal: CancellationToken,
    pub body: RequestBody,
    pub extensions: Extensions,
}

#[derive(Debug)]
pub struct GenericResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Option<ResponseBody>,
}

impl GenericResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_body(status: StatusCode, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: Some(full(body)),
        }
    }
}

/// Wraps an in-memory payload into a [`ResponseBody`].
pub fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed()
}
