use std::time::Duration;

use {
    anyhow::{Context, Result, bail},
    qqconnect_config::QqConnectConfig,
    secrecy::Secret,
};

use crate::{
    request::RequestOptions,
    types::{Endpoints, OAuthConfig},
};

pub const AUTHORIZE_URL: &str = "https://graph.qq.com/oauth2.0/authorize";
pub const TOKEN_URL: &str = "https://graph.qq.com/oauth2.0/token";
pub const PROFILE_URL: &str = "https://graph.qq.com/user/get_user_info";
pub const OPENID_URL: &str = "https://graph.qq.com/oauth2.0/me";

/// Redirect URI sent with the code exchange when none is configured.
pub const DEFAULT_REDIRECT_URI: &str = "/";

/// Build an [`OAuthConfig`] from the parsed config file.
pub fn oauth_config_from(config: &QqConnectConfig) -> Result<OAuthConfig> {
    if config.app.app_id.trim().is_empty() {
        bail!("app.app_id is not configured (set QQCONNECT_APP_ID or qqconnect.toml)");
    }
    let app_secret: Secret<String> = config
        .app
        .app_secret
        .clone()
        .context("app.app_secret is not configured (set QQCONNECT_APP_SECRET or qqconnect.toml)")?;

    let mut endpoints = config
        .endpoints
        .base_url
        .as_deref()
        .map(Endpoints::with_base)
        .unwrap_or_default();
    if let Some(v) = &config.endpoints.authorize_url {
        endpoints.authorize_url = v.clone();
    }
    if let Some(v) = &config.endpoints.token_url {
        endpoints.token_url = v.clone();
    }
    if let Some(v) = &config.endpoints.profile_url {
        endpoints.profile_url = v.clone();
    }
    if let Some(v) = &config.endpoints.openid_url {
        endpoints.openid_url = v.clone();
    }

    Ok(OAuthConfig {
        app_id: config.app.app_id.clone(),
        app_secret,
        redirect_uri: config.app.redirect_uri.clone(),
        endpoints,
    })
}

/// Default request options from the `[request]` config section.
pub fn request_defaults(config: &QqConnectConfig) -> RequestOptions {
    let mut opts = RequestOptions::new();
    if let Some(ms) = config.request.timeout_ms {
        opts = opts.timeout(Duration::from_millis(ms));
    }
    for (name, value) in &config.request.headers {
        opts = opts.header(name.clone(), value.clone());
    }
    opts
}
