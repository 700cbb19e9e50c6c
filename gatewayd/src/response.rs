use std::collections::{btree_map::Entry, BTreeMap};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use common::{
    binary::is_binary_type,
    event::{OutboundResult, CONTENT_TYPE},
    GenericResponse, Headers,
};
use http::header::SET_COOKIE;
use http_body_util::BodyExt;
use tracing::debug;

use crate::Error;

/// Drains the application response into the gateway's structured result.
pub async fn serialize(response: GenericResponse) -> Result<OutboundResult, Error> {
    let GenericResponse {
        status,
        mut headers,
        body,
    } = response;

    let cookies = take_cookies(&mut headers);
    let is_base64_encoded = is_binary_type(headers.get(CONTENT_TYPE).as_deref());

    let body = match body {
        Some(body) => {
            let bytes = body.collect().await.map_err(Error::Body)?.to_bytes();
            Some(if is_base64_encoded {
                BASE64.encode(&bytes)
            } else {
                String::from_utf8_lossy(&bytes).into_owned()
            })
        }
        None => None,
    };

    debug!(
        "Serialized {status} with {} cookies, base64 body: {is_base64_encoded}",
        cookies.len()
    );

    Ok(OutboundResult {
        status_code: status.as_u16(),
        headers: flatten(headers),
        cookies,
        body,
        is_base64_encoded,
    })
}

/// Moves every `set-cookie` value out of the headers, in order.
fn take_cookies(headers: &mut Headers) -> Vec<String> {
    let cookies: Vec<String> = headers
        .get_all(SET_COOKIE.as_str())
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect();
    if !cookies.is_empty() {
        headers.remove(SET_COOKIE.as_str());
    }
    cookies
}

/// One value per name; repeated names are joined as a list.
fn flatten(headers: Headers) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match out.entry(name.as_str().to_owned()) {
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
            Entry::Occupied(mut entry) => {
                let joined: &mut String = entry.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io;

    use common::{full, BoxError, ResponseBody};
    use http::{
        header::{CONTENT_TYPE, VARY},
        HeaderValue, StatusCode,
    };
    use http_body_util::StreamBody;
    use hyper::body::{Bytes, Frame};

    use super::*;

    fn headers(entries: &[(&'static str, &'static str)]) -> Headers {
        entries
            .iter()
            .map(|(k, v)| {
                (
                    http::HeaderName::from_static(k),
                    HeaderValue::from_static(v),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_response_round_trips() {
        let result = serialize(GenericResponse::new(StatusCode::OK))
            .await
            .expect("serialize should succeed");

        assert_eq!(
            result,
            OutboundResult {
                status_code: 200,
                headers: BTreeMap::new(),
                cookies: vec![],
                body: None,
                is_base64_encoded: false,
            }
        );
    }

    #[tokio::test]
    async fn set_cookies_move_out_of_headers() {
        let mut response = GenericResponse::new(StatusCode::FOUND);
        response.headers = headers(&[
            ("set-cookie", "a=1"),
            ("location", "/home"),
            ("set-cookie", "b=2"),
        ]);

        let result = serialize(response).await.expect("serialize should succeed");

        assert_eq!(result.cookies, vec!["a=1", "b=2"]);
        assert!(!result.headers.contains_key("set-cookie"));
        assert_eq!(result.headers.get("location").map(String::as_str), Some("/home"));
        assert_eq!(result.status_code, 302);
    }

    #[tokio::test]
    async fn binary_body_is_base64() {
        let response = GenericResponse::with_body(
            StatusCode::OK,
            headers(&[("content-type", "image/png")]),
            vec![0x89, 0x50, 0x4e, 0x47],
        );

        let result = serialize(response).await.expect("serialize should succeed");

        assert!(result.is_base64_encoded);
        assert_eq!(result.body.as_deref(), Some("iVBORw=="));
    }

    #[tokio::test]
    async fn text_body_is_passed_as_text() {
        let response = GenericResponse::with_body(
            StatusCode::OK,
            headers(&[("content-type", "text/html; charset=utf-8")]),
            "<h1>hi</h1>",
        );

        let result = serialize(response).await.expect("serialize should succeed");

        assert!(!result.is_base64_encoded);
        assert_eq!(result.body.as_deref(), Some("<h1>hi</h1>"));
        assert_eq!(
            result.headers.get(CONTENT_TYPE.as_str()).map(String::as_str),
            Some("text/html; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn missing_content_type_is_text() {
        let response = GenericResponse::with_body(StatusCode::OK, Headers::new(), "plain");

        let result = serialize(response).await.expect("serialize should succeed");

        assert!(!result.is_base64_encoded);
        assert_eq!(result.body.as_deref(), Some("plain"));
    }

    #[tokio::test]
    async fn repeated_headers_are_joined() {
        let mut response = GenericResponse::new(StatusCode::OK);
        response.headers = headers(&[("vary", "accept"), ("x-one", "1"), ("vary", "cookie")]);

        let result = serialize(response).await.expect("serialize should succeed");

        assert_eq!(
            result.headers.get(VARY.as_str()).map(String::as_str),
            Some("accept, cookie")
        );
        assert_eq!(result.headers.len(), 2);
    }

    #[tokio::test]
    async fn streamed_body_is_drained_once() {
        let chunks = vec![
            Ok::<_, BoxError>(Frame::data(Bytes::from_static(b"hello "))),
            Ok(Frame::data(Bytes::from_static(b"world"))),
        ];
        let body: ResponseBody = StreamBody::new(futures_stream(chunks)).boxed();
        let mut response = GenericResponse::new(StatusCode::OK);
        response.body = Some(body);

        let result = serialize(response).await.expect("serialize should succeed");
        assert_eq!(result.body.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn body_read_failure_propagates() {
        let chunks = vec![Err::<Frame<Bytes>, BoxError>(Box::new(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        )))];
        let mut response = GenericResponse::new(StatusCode::OK);
        response.body = Some(StreamBody::new(futures_stream(chunks)).boxed());

        let err = serialize(response).await.expect_err("read error should propagate");
        assert!(matches!(err, Error::Body(_)));
    }

    #[tokio::test]
    async fn helper_body_is_accepted() {
        let mut response = GenericResponse::new(StatusCode::CREATED);
        response.body = Some(full("done"));

        let result = serialize(response).await.expect("serialize should succeed");
        assert_eq!(result.status_code, 201);
        assert_eq!(result.body.as_deref(), Some("done"));
    }

    fn futures_stream<T: Send + Sync + 'static>(
        items: Vec<T>,
    ) -> impl tokio_stream::Stream<Item = T> + Send + Sync + 'static {
        tokio_stream::iter(items)
    }
}
