use std::path::PathBuf;

/// `~/.config/qqconnect/`, or the config crate's override when one is set.
pub(crate) fn qqconnect_config_dir() -> PathBuf {
    qqconnect_config::config_dir().unwrap_or_else(|| PathBuf::from(".qqconnect"))
}
