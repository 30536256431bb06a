use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

use crate::defaults::{AUTHORIZE_URL, OPENID_URL, PROFILE_URL, TOKEN_URL};

/// Application credentials and endpoints for the QQ Connect provider.
#[derive(Clone)]
pub struct OAuthConfig {
    pub app_id: String,
    pub app_secret: Secret<String>,
    /// Redirect URI registered with the provider. Sent with the code exchange.
    pub redirect_uri: Option<String>,
    pub endpoints: Endpoints,
}

impl OAuthConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: Secret::new(app_secret.into()),
            redirect_uri: None,
            endpoints: Endpoints::default(),
        }
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Provider endpoint URLs. Overridable for tests and proxies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub openid_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.into(),
            token_url: TOKEN_URL.into(),
            profile_url: PROFILE_URL.into(),
            openid_url: OPENID_URL.into(),
        }
    }
}

impl Endpoints {
    /// All endpoints rooted at `base`, keeping the provider's paths.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/oauth2.0/authorize"),
            token_url: format!("{base}/oauth2.0/token"),
            profile_url: format!("{base}/user/get_user_info"),
            openid_url: format!("{base}/oauth2.0/me"),
        }
    }
}

/// The persisted access/refresh token pair.
///
/// `acquired_at` is stamped by [`crate::OAuthManager`] when the record is
/// accepted; it is never taken from the provider response.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub refresh_token: Secret<String>,
    /// Lifetime in seconds as declared by the provider.
    pub expires_in: u64,
    /// Unix epoch milliseconds.
    pub acquired_at: u64,
}

impl TokenRecord {
    /// Unix epoch milliseconds after which the access token is expired.
    pub fn expires_at(&self) -> u64 {
        self.acquired_at
            .saturating_add(self.expires_in.saturating_mul(1000))
    }

    /// Whether the access token is usable right now.
    pub fn is_valid(&self) -> bool {
        is_valid_at(self, crate::clock::unix_millis())
    }
}

/// A record is valid iff it carries an access token and `now_ms` is strictly
/// before `acquired_at + expires_in * 1000`.
pub fn is_valid_at(record: &TokenRecord, now_ms: u64) -> bool {
    !record.access_token.expose_secret().is_empty() && now_ms < record.expires_at()
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(access: &str, expires_in: u64, acquired_at: u64) -> TokenRecord {
        TokenRecord {
            access_token: Secret::new(access.into()),
            refresh_token: Secret::new("R1".into()),
            expires_in,
            acquired_at,
        }
    }

    #[test]
    fn valid_before_expiry() {
        let r = record("A1", 7200, 1_000_000);
        assert!(is_valid_at(&r, 1_000_000));
        assert!(is_valid_at(&r, 1_000_000 + 7_199_999));
    }

    #[test]
    fn expired_at_exact_boundary() {
        let r = record("A1", 7200, 1_000_000);
        assert!(!is_valid_at(&r, 1_000_000 + 7_200_000));
        assert!(!is_valid_at(&r, 1_000_000 + 7_200_001));
    }

    #[test]
    fn empty_access_token_is_never_valid() {
        let r = record("", 7200, 1_000_000);
        assert!(!is_valid_at(&r, 1_000_000));
    }

    #[test]
    fn zero_lifetime_is_expired_immediately() {
        let r = record("A1", 0, 1_000_000);
        assert!(!is_valid_at(&r, 1_000_000));
    }

    #[test]
    fn fresh_record_is_valid_against_system_clock() {
        let r = record("A1", 60, crate::clock::unix_millis());
        assert!(r.is_valid());
    }

    #[test]
    fn serializes_secrets_as_plain_strings() {
        let r = record("A1", 7200, 42);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["access_token"], "A1");
        assert_eq!(json["refresh_token"], "R1");
        assert_eq!(json["expires_in"], 7200);
        assert_eq!(json["acquired_at"], 42);

        let back: TokenRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.access_token.expose_secret(), "A1");
        assert_eq!(back.acquired_at, 42);
    }

    #[test]
    fn debug_redacts_tokens() {
        let out = format!("{:?}", record("super-secret-access", 1, 1));
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("super-secret-access"));

        let cfg = OAuthConfig::new("app", "super-secret-key");
        let out = format!("{cfg:?}");
        assert!(!out.contains("super-secret-key"));
    }

    #[test]
    fn endpoints_with_base_keep_provider_paths() {
        let e = Endpoints::with_base("http://127.0.0.1:9000/");
        assert_eq!(e.token_url, "http://127.0.0.1:9000/oauth2.0/token");
        assert_eq!(e.profile_url, "http://127.0.0.1:9000/user/get_user_info");
        assert_eq!(e.openid_url, "http://127.0.0.1:9000/oauth2.0/me");
        assert_eq!(e.authorize_url, "http://127.0.0.1:9000/oauth2.0/authorize");
    }
}
