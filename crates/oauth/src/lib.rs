//! Client-side OAuth2 credentials for QQ Connect: code exchange, a pluggable
//! token store, transparent refresh, and profile lookups.

pub mod authorize;
pub mod clock;
mod config_dir;
pub mod defaults;
pub mod error;
mod grant;
pub mod manager;
pub mod profile;
pub mod request;
pub mod storage;
pub mod transport;
pub mod types;

pub use {
    authorize::generate_state,
    clock::{Clock, SystemClock},
    defaults::{oauth_config_from, request_defaults},
    error::{OAuthError, Result},
    manager::OAuthManager,
    profile::UserProfile,
    request::{ApiClient, DataType, Method, RequestOptions, ResponseData},
    storage::{FileTokenStore, MemoryTokenStore, TokenStore},
    transport::{HttpTransport, ReqwestTransport},
    types::{Endpoints, OAuthConfig, TokenRecord, is_valid_at, serialize_secret},
};
