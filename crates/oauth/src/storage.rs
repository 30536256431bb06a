use std::{
    io::Write,
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    tokio::sync::RwLock,
    tracing::debug,
};

use crate::{config_dir::qqconnect_config_dir, types::TokenRecord};

/// Persistence boundary for the current token record.
///
/// Both methods may suspend on I/O and must be safe to call repeatedly.
/// Concurrent refreshes from several processes sharing one store are
/// last-write-wins; a store that needs single-flight refresh has to provide
/// its own locking.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Result<Option<TokenRecord>>;
    async fn set(&self, record: TokenRecord) -> Result<()>;
}

/// In-process store. Not durable and not shared across processes.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: RwLock<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Result<Option<TokenRecord>> {
        Ok(self.record.read().await.clone())
    }

    async fn set(&self, record: TokenRecord) -> Result<()> {
        *self.record.write().await = Some(record);
        Ok(())
    }
}

/// File-based token storage at `~/.config/qqconnect/oauth_token.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new() -> Self {
        Self {
            path: qqconnect_config_dir().join("oauth_token.json"),
        }
    }

    /// Create a token store at a specific path (useful for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the stored record. Missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Result<Option<TokenRecord>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()));
            },
        };
        let record = serde_json::from_str(&data)
            .with_context(|| format!("invalid token file {}", self.path.display()))?;
        Ok(Some(record))
    }

    async fn set(&self, record: TokenRecord) -> Result<()> {
        let data = serde_json::to_string_pretty(&record)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_private(&path, data.as_bytes())).await??;

        debug!(path = %self.path.display(), "saved token record");
        Ok(())
    }
}

/// Replace `path` atomically with a file readable only by the owner.
///
/// The temp file is created `0600` in the target directory and renamed over
/// `path`, so readers never see a partial or world-readable record.
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
