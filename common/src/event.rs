//! JSON payloads exchanged with an HTTP API gateway (payload format 2.0).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const FORWARDED_HOST: &str = "x-forwarded-host";
pub const HOST: &str = "host";
pub const CONTENT_TYPE: &str = "content-type";

/// One HTTP invocation as delivered by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub route_key: String,
    pub raw_path: String,
    #[serde(default)]
    pub raw_query_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
    /// Lowercase names. The gateway may send `null` values.
    ///
    /// Iterates sorted by name, not in the order the gateway sent them.
    #[serde(default)]
    pub headers: BTreeMap<String, Option<String>>,
    pub request_context: RequestContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl InboundEvent {
    /// Header value, with `null` and empty strings treated as missing.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(Option::as_deref)
            .filter(|value| !value.is_empty())
    }

    /// Forwarded host first, so deployments behind a reverse proxy keep the public name.
    pub fn host(&self) -> Option<&str> {
        self.header(FORWARDED_HOST).or_else(|| self.header(HOST))
    }

    pub fn method(&self) -> &str {
        &self.request_context.http.method
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub api_id: String,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub route_key: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub time_epoch: i64,
    pub http: HttpDescription,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub source_ip: String,
    #[serde(default)]
    pub user_agent: String,
}

/// Structured result returned to the gateway.
///
/// Cookies travel in their own list; the gateway rejects `set-cookie` inside `headers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundResult {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}
