/// Config schema types (application credentials, endpoints, request defaults, store).
use std::{collections::BTreeMap, path::PathBuf};

use {secrecy::Secret, serde::Deserialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QqConnectConfig {
    pub app: AppConfig,
    pub endpoints: EndpointsConfig,
    pub request: RequestConfig,
    pub store: StoreConfig,
}

/// Application credentials registered with QQ Connect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application identifier (`client_id`).
    pub app_id: String,

    /// Application secret (`client_secret`).
    pub app_secret: Option<Secret<String>>,

    /// Redirect URI registered for the application.
    pub redirect_uri: Option<String>,
}

/// Endpoint overrides. Unset entries use the provider's production URLs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Root for every endpoint, keeping the provider's paths.
    pub base_url: Option<String>,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub profile_url: Option<String>,
    pub openid_url: Option<String>,
}

/// Defaults merged into every outbound request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub timeout_ms: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

/// Where the token record is persisted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Token file path. Defaults to `~/.config/qqconnect/oauth_token.json`.
    pub path: Option<PathBuf>,
}
