use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use common::{
    event::{InboundEvent, CONTENT_TYPE},
    GenericRequest, Headers, RequestBody,
};
use http::{header::COOKIE, Extensions, HeaderName, HeaderValue, Method, Uri};
use hyper::body::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Error;

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Turns a gateway event into the request handed to the application.
pub fn build(event: InboundEvent) -> Result<GenericRequest, Error> {
    let uri = build_uri(&event)?;
    let method = Method::from_bytes(event.method().as_bytes())
        .map_err(|_| Error::invalid(format!("invalid method {:?}", event.method())))?;
    let is_form_data = event
        .header(CONTENT_TYPE)
        .is_some_and(|value| value.contains(MULTIPART_FORM_DATA));

    let InboundEvent {
        cookies,
        headers,
        request_context,
        body,
        is_base64_encoded,
        ..
    } = event;

    let headers = build_headers(headers, cookies.as_deref())?;
    let body = decode_body(body, is_base64_encoded, is_form_data)?;

    // the gateway has no way to abort an invocation, the token only satisfies handlers that expect one
    let signal = CancellationToken::new();

    let mut extensions = Extensions::new();
    extensions.insert(request_context);

    debug!("Built {method} {uri} with {} headers", headers.len());

    Ok(GenericRequest {
        method,
        uri,
        headers,
        signal,
        body,
        extensions,
    })
}

fn build_uri(event: &InboundEvent) -> Result<Uri, Error> {
    let host = event
        .host()
        .ok_or_else(|| Error::invalid("missing host header"))?;
    let search = if event.raw_query_string.is_empty() {
        String::new()
    } else {
        format!("?{}", event.raw_query_string)
    };

    // TLS always ends at the gateway
    let url = format!("https://{host}{}{search}", event.raw_path);
    Uri::from_str(&url).map_err(|err| Error::invalid(format!("invalid url {url:?}: {err}")))
}

/// Copies every present header, appending rather than replacing, then the
/// gateway's separate cookie list as one more `cookie` value.
pub fn build_headers<I>(headers: I, cookies: Option<&[String]>) -> Result<Headers, Error>
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let mut out = Headers::new();

    for (name, value) in headers {
        let Some(value) = value.filter(|value| !value.is_empty()) else {
            continue;
        };
        let name = HeaderName::from_str(&name)
            .map_err(|_| Error::invalid(format!("invalid header name {name:?}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|_| Error::invalid(format!("invalid value for header {name}")))?;
        out.append(name, value);
    }

    if let Some(cookies) = cookies.filter(|cookies| !cookies.is_empty()) {
        let value = HeaderValue::from_str(&cookies.join("; "))
            .map_err(|_| Error::invalid("invalid cookie value"))?;
        out.append(COOKIE, value);
    }

    Ok(out)
}

fn decode_body(
    body: Option<String>,
    is_base64_encoded: bool,
    is_form_data: bool,
) -> Result<RequestBody, Error> {
    let body = match body {
        None => RequestBody::Empty,
        Some(body) if is_base64_encoded && !body.is_empty() => {
            let bytes = BASE64
                .decode(body.as_bytes())
                .map_err(|err| Error::invalid(format!("invalid base64 body: {err}")))?;
            if is_form_data {
                RequestBody::Binary(Bytes::from(bytes))
            } else {
                RequestBody::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
        Some(body) => RequestBody::Text(body),
    };
    Ok(body)
}
