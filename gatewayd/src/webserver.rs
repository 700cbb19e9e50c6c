use std::{collections::BTreeMap, future::Future, net::SocketAddr, pin::Pin};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use common::{
    event::{HttpDescription, InboundEvent, OutboundResult, RequestContext},
    BoxError, GenericRequest, GenericResponse,
};
use http::{
    header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
    request::Parts,
    Request, Response, StatusCode,
};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::{Adapter, Error};

/// Serves plain HTTP locally, replaying every request through the same
/// event translation the deployed function goes through.
pub async fn run<S>(addr: SocketAddr, adapter: Adapter<S>) -> anyhow::Result<()>
where
    S: tower::Service<GenericRequest, Response = GenericResponse> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    let listener = TcpListener::bind(&addr).await?;
    debug!("Webserver listening on http://{}", addr);

    let service = Service::new(adapter);
    loop {
        let (stream, remote) = listener.accept().await?;

        tokio::spawn({
            let service = service.clone().with_remote(remote);
            async move {
                if let Err(err) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    error!("Failed to serve connection: {err}");
                }
            }
        });
    }
}

#[derive(Debug, Clone)]
struct Service<S> {
    adapter: Adapter<S>,
    remote: Option<SocketAddr>,
}

impl<S> Service<S> {
    fn new(adapter: Adapter<S>) -> Self {
        Self {
            adapter,
            remote: None,
        }
    }

    fn with_remote(mut self, remote: SocketAddr) -> Self {
        self.remote = Some(remote);
        self
    }
}

impl<S> service::Service<Request<Incoming>> for Service<S>
where
    S: tower::Service<GenericRequest, Response = GenericResponse> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    type Response = Response<Full<Bytes>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        debug!("Received request {req:?}");

        let adapter = self.adapter.clone();
        let remote = self.remote;
        Box::pin(async move {
            let (head, body) = req.into_parts();
            let body = match body.collect().await {
                Ok(body) => body.to_bytes(),
                Err(err) => {
                    error!("Failed to read request body: {err}");
                    return Ok(Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(Full::default())?);
                }
            };

            let event = to_event(head, body, remote);
            match adapter.handle(event).await {
                Ok(result) => into_response(result),
                Err(err) => {
                    error!("Invocation failed: {err}");
                    Ok(Response::builder()
                        .status(StatusCode::BAD_GATEWAY)
                        .body(Full::default())?)
                }
            }
        })
    }
}

/// Builds the event the gateway would have delivered for this request.
fn to_event(head: Parts, body: Bytes, remote: Option<SocketAddr>) -> InboundEvent {
    let mut headers: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut cookies = Vec::new();

    for (name, value) in &head.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        if name == COOKIE {
            // the gateway lifts cookies out of the headers
            cookies.extend(value.split("; ").map(str::to_owned));
            continue;
        }
        match headers.get_mut(name.as_str()) {
            Some(Some(joined)) => {
                joined.push_str(", ");
                joined.push_str(&value);
            }
            _ => {
                headers.insert(name.as_str().to_owned(), Some(value.into_owned()));
            }
        }
    }

    let is_form_data = head
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("multipart/form-data"));
    let (body, is_base64_encoded) = if body.is_empty() {
        (None, false)
    } else {
        match std::str::from_utf8(&body) {
            Ok(text) if !is_form_data => (Some(text.to_owned()), false),
            _ => (Some(BASE64.encode(&body)), true),
        }
    };

    let path = head.uri.path().to_owned();
    InboundEvent {
        version: "2.0".to_owned(),
        route_key: "$default".to_owned(),
        raw_path: path.clone(),
        raw_query_string: head.uri.query().unwrap_or_default().to_owned(),
        cookies: (!cookies.is_empty()).then_some(cookies),
        request_context: RequestContext {
            route_key: "$default".to_owned(),
            stage: "$default".to_owned(),
            http: HttpDescription {
                method: head.method.as_str().to_owned(),
                path,
                protocol: format!("{:?}", head.version),
                source_ip: remote.map(|addr| addr.ip().to_string()).unwrap_or_default(),
                user_agent: headers
                    .get("user-agent")
                    .cloned()
                    .flatten()
                    .unwrap_or_default(),
            },
            ..Default::default()
        },
        headers,
        body,
        is_base64_encoded,
    }
}

/// Renders the gateway result the way the gateway itself would answer the client.
fn into_response(result: OutboundResult) -> Result<Response<Full<Bytes>>, Error> {
    let OutboundResult {
        status_code,
        headers,
        cookies,
        body,
        is_base64_encoded,
    } = result;

    let mut builder = Response::builder().status(status_code);
    for (k, v) in headers {
        builder = builder.header(k, v);
    }
    for cookie in cookies {
        builder = builder.header(SET_COOKIE, cookie);
    }

    let body = match body {
        Some(body) if is_base64_encoded => Bytes::from(
            BASE64
                .decode(body.as_bytes())
                .map_err(|err| Error::Body(Box::new(err)))?,
        ),
        Some(body) => Bytes::from(body),
        None => Bytes::new(),
    };
    Ok(builder.body(Full::from(body))?)
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    fn head(method: Method, uri: &str, headers: &[(&'static str, &'static str)]) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).expect("valid request").into_parts().0
    }

    #[test]
    fn request_becomes_gateway_event() {
        let head = head(
            Method::POST,
            "/form?a=1&b=2",
            &[
                ("host", "localhost:3000"),
                ("accept", "text/html"),
                ("accept", "application/json"),
                ("cookie", "a=1; b=2"),
                ("content-type", "application/x-www-form-urlencoded"),
            ],
        );

        let event = to_event(head, Bytes::from_static(b"x=1"), None);

        assert_eq!(event.method(), "POST");
        assert_eq!(event.raw_path, "/form");
        assert_eq!(event.raw_query_string, "a=1&b=2");
        assert_eq!(event.host(), Some("localhost:3000"));
        assert_eq!(event.header("accept"), Some("text/html, application/json"));
        assert_eq!(event.header("cookie"), None);
        assert_eq!(event.cookies, Some(vec!["a=1".to_owned(), "b=2".to_owned()]));
        assert_eq!(event.body.as_deref(), Some("x=1"));
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn binary_request_body_is_encoded() {
        let head = head(Method::PUT, "/upload", &[("host", "h")]);

        let event = to_event(head, Bytes::from_static(&[0xff, 0xfe]), None);

        assert!(event.is_base64_encoded);
        assert_eq!(event.body.as_deref(), Some("//4="));
    }

    #[test]
    fn multipart_body_is_always_encoded() {
        let head = head(
            Method::POST,
            "/upload",
            &[("host", "h"), ("content-type", "multipart/form-data; boundary=x")],
        );

        let event = to_event(head, Bytes::from_static(b"--x--"), None);

        assert!(event.is_base64_encoded);
        assert_eq!(event.body.as_deref(), Some("LS14LS0="));
    }

    #[test]
    fn remote_address_becomes_source_ip() {
        let head = head(Method::GET, "/", &[("host", "h")]);
        let remote = SocketAddr::from(([127, 0, 0, 1], 4567));

        let event = to_event(head, Bytes::new(), Some(remote));

        assert_eq!(event.request_context.http.source_ip, "127.0.0.1");
        assert!(event.body.is_none());
    }

    #[tokio::test]
    async fn result_becomes_http_response() {
        let result = OutboundResult {
            status_code: 201,
            headers: BTreeMap::from([("content-type".to_owned(), "image/png".to_owned())]),
            cookies: vec!["a=1".to_owned(), "b=2".to_owned()],
            body: Some("iVBORw==".to_owned()),
            is_base64_encoded: true,
        };

        let response = into_response(result).expect("response should build");

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("infallible body")
            .to_bytes();
        assert_eq!(&body[..], &[0x89, 0x50, 0x4e, 0x47]);
    }
}
