pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load,
        discover_and_load_with_env, find_config_file, load_config, set_config_dir,
    },
    schema::{AppConfig, EndpointsConfig, QqConnectConfig, RequestConfig, StoreConfig},
};
