//! Token lifecycle: code exchange, refresh, and resolution of a usable access
//! token from the store.
//!
//! States are No-Token, Valid and Expired. The only transition the manager
//! makes on its own is Expired -> Valid through a single refresh call inside
//! [`OAuthManager::valid_access_token`]; a failed refresh is returned to the
//! caller and leaves the stored record untouched.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    secrecy::ExposeSecret,
    tracing::{info, warn},
};

use crate::{
    authorize::{build_authorize_url, generate_state},
    clock::{Clock, SystemClock},
    defaults::DEFAULT_REDIRECT_URI,
    error::{OAuthError, Result},
    grant::{TokenGrant, parse_token_response},
    request::{ApiClient, DataType, Method, RequestOptions},
    storage::{MemoryTokenStore, TokenStore},
    transport::{HttpTransport, ReqwestTransport},
    types::{OAuthConfig, TokenRecord, is_valid_at},
};

/// Owns the rules for token validity and renewal for one application.
#[derive(Clone)]
pub struct OAuthManager {
    pub(crate) config: OAuthConfig,
    pub(crate) api: ApiClient,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    /// True until a caller supplies its own store.
    default_store: bool,
    store_warned: Arc<AtomicBool>,
}

impl std::fmt::Debug for OAuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthManager")
            .field("config", &self.config)
            .field("defaults", self.api.defaults())
            .finish_non_exhaustive()
    }
}

impl OAuthManager {
    /// Manager with the in-memory store and the reqwest transport.
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            api: ApiClient::new(Arc::new(ReqwestTransport::new())),
            store: Arc::new(MemoryTokenStore::new()),
            clock: Arc::new(SystemClock),
            default_store: true,
            store_warned: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self.default_store = false;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        let defaults = self.api.defaults().clone();
        self.api = ApiClient::new(transport);
        self.api.set_defaults(defaults);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the default options merged into every provider call,
    /// e.g. a request timeout.
    pub fn set_default_options(&mut self, defaults: RequestOptions) {
        self.api.set_defaults(defaults);
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// URL of the provider's consent page. A random state is generated when
    /// `state` is `None`.
    pub fn authorize_url(&self, state: Option<&str>) -> String {
        let state = state.map_or_else(generate_state, str::to_string);
        build_authorize_url(
            &self.config.endpoints.authorize_url,
            &self.config.app_id,
            self.redirect_uri(),
            &state,
        )
    }

    /// Exchange an authorization code for the initial token pair and persist it.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
        let grant = self
            .token_request([
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri()),
            ])
            .await?;
        let record = self.accept(grant, None).await?;
        info!(expires_in = record.expires_in, "exchanged authorization code for token");
        Ok(record)
    }

    /// Obtain a new token pair with `refresh_token` and persist it.
    ///
    /// Not safe to retry blindly: the provider may invalidate a refresh token
    /// after one use.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRecord> {
        let grant = self
            .token_request([
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        let record = self.accept(grant, Some(refresh_token)).await?;
        info!(expires_in = record.expires_in, "refreshed access token");
        Ok(record)
    }

    /// The stored record, without validity checks.
    pub async fn current_token(&self) -> Result<Option<TokenRecord>> {
        self.warn_on_ephemeral_store();
        self.store.get().await.map_err(OAuthError::Store)
    }

    /// Whether the stored record is valid right now by the manager's clock.
    pub fn is_valid(&self, record: &TokenRecord) -> bool {
        is_valid_at(record, self.clock.now_ms())
    }

    /// Return a usable access token, refreshing the stored record once if it
    /// has expired.
    pub async fn valid_access_token(&self) -> Result<String> {
        self.resolve_access_token(None).await
    }

    pub(crate) async fn resolve_access_token(&self, openid: Option<&str>) -> Result<String> {
        let record = self
            .current_token()
            .await?
            .ok_or_else(|| OAuthError::NoCredential {
                openid: openid.map(str::to_string),
            })?;

        if self.is_valid(&record) {
            return Ok(record.access_token.expose_secret().clone());
        }

        info!(
            expired_at = record.expires_at(),
            "stored access token expired, refreshing"
        );
        let refreshed = self
            .refresh_token(record.refresh_token.expose_secret())
            .await?;
        Ok(refreshed.access_token.expose_secret().clone())
    }

    fn memory_store_in_production(&self, env: Option<&str>) -> bool {
        self.default_store && env == Some("production")
    }

    /// Warns once per manager when `QQCONNECT_ENV=production` and no store was supplied.
    fn warn_on_ephemeral_store(&self) {
        let env = std::env::var("QQCONNECT_ENV").ok();
        if self.memory_store_in_production(env.as_deref())
            && !self.store_warned.swap(true, Ordering::Relaxed)
        {
            warn!("using the in-memory token store in production; tokens will not survive restarts");
        }
    }

    fn redirect_uri(&self) -> &str {
        self.config
            .redirect_uri
            .as_deref()
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }

    async fn token_request<'a>(
        &'a self,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<TokenGrant> {
        let mut data = vec![
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_secret.expose_secret().as_str()),
        ];
        data.extend(params);

        let options = RequestOptions::new()
            .method(Method::Post)
            .data(data)
            .data_type(DataType::Text);
        let body = self
            .api
            .request(&self.config.endpoints.token_url, &options)
            .await?
            .into_text();
        parse_token_response(&body)
    }

    /// Stamp a freshly issued grant with the current time and persist it.
    async fn accept(&self, grant: TokenGrant, previous_refresh: Option<&str>) -> Result<TokenRecord> {
        let record = grant.into_record(previous_refresh, self.clock.now_ms())?;
        self.warn_on_ephemeral_store();
        self.store
            .set(record.clone())
            .await
            .map_err(OAuthError::Store)?;
        Ok(record)
    }
}
