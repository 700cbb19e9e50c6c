use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use common::{full, GenericRequest, GenericResponse, Headers, RequestBody};
use http::{
    header::{ACCEPT_ENCODING, CONTENT_LENGTH, HOST},
    HeaderName, Uri,
};
use tracing::debug;

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers that describe a single connection and never travel past it.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Forwards adapter requests to a web application listening on `target_url`.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base: String,
}

impl Upstream {
    pub fn new(target_url: Uri, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, target_url)
    }

    pub fn with_client(client: reqwest::Client, target_url: Uri) -> Result<Self, Error> {
        let (Some(scheme), Some(authority)) = (target_url.scheme_str(), target_url.authority())
        else {
            return Err(Error::InvalidTarget(target_url.to_string()));
        };
        let base = format!(
            "{scheme}://{authority}{}",
            target_url.path().trim_end_matches('/')
        );

        Ok(Self { client, base })
    }

    fn url(&self, uri: &Uri) -> String {
        match uri.path_and_query() {
            Some(path_and_query) => format!("{}{path_and_query}", self.base),
            None => format!("{}/", self.base),
        }
    }
}

impl tower::Service<GenericRequest> for Upstream {
    type Response = GenericResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: GenericRequest) -> Self::Future {
        let url = self.url(&request.uri);
        Box::pin(dispatch(self.client.clone(), url, request))
    }
}

async fn dispatch(
    client: reqwest::Client,
    url: String,
    request: GenericRequest,
) -> Result<GenericResponse, Error> {
    let GenericRequest {
        method,
        uri,
        headers,
        signal,
        body,
        ..
    } = request;
    debug!("Dispatching {method} {url}");

    let mut builder = client.request(method, url);
    for (k, v) in headers.entries() {
        // reqwest derives host and length itself, the body must come back uncompressed
        if *k == HOST || *k == CONTENT_LENGTH || *k == ACCEPT_ENCODING || is_hop_by_hop(k) {
            continue;
        }
        builder = builder.header(k.clone(), v.clone());
    }
    if !headers.contains(X_FORWARDED_HOST.as_str()) {
        if let Some(authority) = uri.authority() {
            builder = builder.header(X_FORWARDED_HOST, authority.as_str());
        }
    }
    if !headers.contains(X_FORWARDED_PROTO.as_str()) {
        if let Some(scheme) = uri.scheme_str() {
            builder = builder.header(X_FORWARDED_PROTO, scheme);
        }
    }
    if !matches!(body, RequestBody::Empty) {
        builder = builder.body(body.into_bytes());
    }

    let response = tokio::select! {
        biased;
        _ = signal.cancelled() => return Err(Error::Cancelled),
        response = builder.send() => response?,
    };

    let status = response.status();
    // the body is re-framed by whoever answers the client
    let headers: Headers = response
        .headers()
        .iter()
        .filter(|(k, _)| **k != CONTENT_LENGTH && !is_hop_by_hop(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let body = response.bytes().await?;
    debug!("Upstream answered {status} with {} bytes", body.len());

    Ok(GenericResponse {
        status,
        headers,
        body: (!body.is_empty()).then(|| full(body)),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid upstream url {0:?}")]
    InvalidTarget(String),
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
