use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    qqconnect_config::QqConnectConfig,
    qqconnect_oauth::{
        Clock, FileTokenStore, OAuthManager, SystemClock, TokenRecord, TokenStore,
        oauth_config_from, request_defaults,
    },
    secrecy::ExposeSecret,
    tracing::debug,
};

#[derive(Subcommand)]
pub enum TokenAction {
    /// Print the URL that starts the consent flow.
    AuthorizeUrl {
        /// Opaque state echoed back on the redirect (random if omitted).
        #[arg(long)]
        state: Option<String>,
    },
    /// Exchange an authorization code for a token pair and store it.
    Exchange {
        #[arg(long)]
        code: String,
    },
    /// Refresh the stored token pair now, even if it is still valid.
    Refresh,
    /// Print a valid access token, refreshing the stored one if expired.
    Token,
    /// Show the stored token and its expiry.
    Status,
    /// Fetch a user profile as JSON.
    Profile {
        /// OpenID of the user (looked up from the access token if omitted).
        #[arg(long)]
        openid: Option<String>,
        /// Language hint (zh_CN, zh_TW, en).
        #[arg(long)]
        lang: Option<String>,
    },
    /// Print the OpenID the stored access token belongs to.
    Openid,
    /// Delete the stored token.
    Logout,
}

pub async fn handle(action: TokenAction, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = Arc::new(match &config.store.path {
        Some(path) => FileTokenStore::with_path(path.clone()),
        None => FileTokenStore::new(),
    });
    debug!(path = %store.path().display(), "using token file");

    let manager = || -> Result<OAuthManager> {
        let mut manager =
            OAuthManager::new(oauth_config_from(&config)?).with_store(store.clone());
        manager.set_default_options(request_defaults(&config));
        Ok(manager)
    };

    match action {
        TokenAction::Logout => {
            store.clear().await?;
            println!("Removed {}", store.path().display());
        },
        TokenAction::AuthorizeUrl { state } => {
            println!("{}", manager()?.authorize_url(state.as_deref()));
        },
        TokenAction::Exchange { code } => {
            let record = manager()?.exchange_code(&code).await?;
            println!("Stored new token (expires in {}s)", record.expires_in);
        },
        TokenAction::Refresh => {
            let current = stored(&*store).await?;
            let record = manager()?
                .refresh_token(current.refresh_token.expose_secret())
                .await?;
            println!("Refreshed token (expires in {}s)", record.expires_in);
        },
        TokenAction::Token => {
            println!("{}", manager()?.valid_access_token().await?);
        },
        TokenAction::Status => status(&manager()?).await?,
        TokenAction::Profile { openid, lang } => {
            let manager = manager()?;
            let openid = match openid {
                Some(id) => id,
                None => {
                    let token = manager.valid_access_token().await?;
                    manager.fetch_openid(&token).await?
                },
            };
            let profile = manager.fetch_profile(&openid, lang.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        },
        TokenAction::Openid => {
            let manager = manager()?;
            let token = manager.valid_access_token().await?;
            println!("{}", manager.fetch_openid(&token).await?);
        },
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<QqConnectConfig> {
    let Some(path) = path else {
        return Ok(qqconnect_config::discover_and_load_with_env());
    };
    let mut config = qqconnect_config::load_config(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    qqconnect_config::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

async fn stored(store: &dyn TokenStore) -> Result<TokenRecord> {
    store
        .get()
        .await?
        .context("no stored token, run `qqconnect exchange --code <CODE>` first")
}

async fn status(manager: &OAuthManager) -> Result<()> {
    let Some(record) = manager.current_token().await? else {
        println!("No stored token.");
        return Ok(());
    };
    let now = SystemClock.now_ms();
    if manager.is_valid(&record) {
        let remaining = record.expires_at().saturating_sub(now) / 1000;
        let hours = remaining / 3600;
        let mins = (remaining % 3600) / 60;
        println!("valid ({hours}h {mins}m remaining)");
    } else {
        println!("expired (will refresh on next use)");
    }
    Ok(())
}
