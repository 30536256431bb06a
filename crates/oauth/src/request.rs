//! Request wrapper: default-option overlay, provider error detection and
//! transport error relabelling shared by every provider call.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::debug,
};

use crate::{
    error::{OAuthError, Result},
    transport::HttpTransport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

/// How the response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Json,
}

/// Options for one outbound call. Every field is optional so that per-call
/// options can be laid over a default set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub timeout: Option<Duration>,
    pub headers: Option<BTreeMap<String, String>>,
    /// Query parameters for GET, form fields for POST.
    pub data: Option<Vec<(String, String)>>,
    pub data_type: Option<DataType>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn data<K, V>(mut self, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.data = Some(
            data.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Lay `overrides` over `self`. Header maps merge key by key (the override
    /// wins on conflicts); every other field set in `overrides` replaces ours.
    pub fn merged(&self, overrides: &RequestOptions) -> RequestOptions {
        let mut out = self.clone();
        if let Some(method) = overrides.method {
            out.method = Some(method);
        }
        if let Some(timeout) = overrides.timeout {
            out.timeout = Some(timeout);
        }
        if let Some(headers) = &overrides.headers {
            out.headers
                .get_or_insert_with(BTreeMap::new)
                .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(data) = &overrides.data {
            out.data = Some(data.clone());
        }
        if let Some(data_type) = overrides.data_type {
            out.data_type = Some(data_type);
        }
        out
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Text(String),
    Json(Value),
}

impl ResponseData {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Json(v) => v.to_string(),
        }
    }

    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Json(v) => Ok(v),
            Self::Text(s) => serde_json::from_str(&s)
                .map_err(|e| OAuthError::Parse(format!("expected JSON body: {e}"))),
        }
    }
}

/// Provider-facing HTTP client with a default option set.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    defaults: RequestOptions,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            defaults: RequestOptions::default(),
        }
    }

    /// Replace the default options applied to every call.
    pub fn set_defaults(&mut self, defaults: RequestOptions) {
        self.defaults = defaults;
    }

    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Send one request. Transport failures come back as
    /// [`OAuthError::Transport`]; bodies carrying a nonzero provider error
    /// code come back as [`OAuthError::Provider`].
    pub async fn request(&self, url: &str, options: &RequestOptions) -> Result<ResponseData> {
        let options = self.defaults.merged(options);
        debug!(
            url,
            method = ?options.method.unwrap_or_default(),
            "sending QQ API request"
        );

        let body = self
            .transport
            .send(url, &options)
            .await
            .map_err(OAuthError::Transport)?;

        if let Some(err) = provider_error(&body) {
            debug!(url, error = %err, "QQ API returned an error");
            return Err(err);
        }

        match options.data_type.unwrap_or_default() {
            DataType::Text => Ok(ResponseData::Text(body)),
            DataType::Json => serde_json::from_str(&body)
                .map(ResponseData::Json)
                .map_err(|e| OAuthError::Parse(format!("invalid JSON from {url}: {e}"))),
        }
    }
}

/// Error code/message field pairs the provider uses across its endpoints.
const ERROR_FIELDS: &[(&str, &str)] = &[
    ("errcode", "errmsg"),
    ("ret", "msg"),
    ("error", "error_description"),
];

/// Detect a provider-level error in a raw body, bare JSON or JSONP-wrapped.
pub(crate) fn provider_error(body: &str) -> Option<OAuthError> {
    let value = json_object(body)?;
    let obj = value.as_object()?;
    for (code_key, msg_key) in ERROR_FIELDS {
        let Some(code) = obj.get(*code_key).and_then(as_code) else {
            continue;
        };
        if code != 0 {
            let message = obj
                .get(*msg_key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Some(OAuthError::Provider { code, message });
        }
    }
    None
}

/// The JSON object in `body`, unwrapping a `callback( ... );` envelope.
pub(crate) fn json_object(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).ok();
    }
    if trimmed.starts_with("callback") {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end > start {
            return serde_json::from_str(&trimmed[start..=end]).ok();
        }
    }
    None
}

fn as_code(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
