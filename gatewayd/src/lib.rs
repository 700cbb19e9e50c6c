use std::borrow::Cow;

use common::BoxError;

pub mod handler;
pub mod request;
pub mod response;
pub mod webserver;

pub use handler::Adapter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),
    #[error("application handler failed: {0}")]
    Handler(BoxError),
    #[error("failed to read response body: {0}")]
    Body(BoxError),
    #[error(transparent)]
    Http(#[from] http::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
