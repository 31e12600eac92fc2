use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;

use crate::leaderboard::TieBreak;
use crate::store::{HttpStore, RecordStore, SqliteStore};

pub const APP_DIR: &str = "wc26_pool";
const DB_FILE: &str = "pool.sqlite";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite(PathBuf),
    PocketBase { url: String, token: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub backend: StoreBackend,
    pub tie_break: TieBreak,
    pub http_timeout: Duration,
}

/// `.env.local` wins over `.env`; neither is required.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

impl PoolConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match non_blank("POCKETBASE_URL") {
            Some(url) => StoreBackend::PocketBase {
                url: url.trim().to_string(),
                token: non_blank("POCKETBASE_TOKEN"),
            },
            None => {
                let path = non_blank("POOL_DB")
                    .map(PathBuf::from)
                    .or_else(default_db_path)
                    .context("unable to resolve sqlite path")?;
                StoreBackend::Sqlite(path)
            }
        };

        let tie_break = match non_blank("POOL_TIE_BREAK") {
            Some(raw) => TieBreak::parse(&raw).unwrap_or_else(|| {
                warn!("unknown POOL_TIE_BREAK {raw:?}, keeping input order");
                TieBreak::InputOrder
            }),
            None => TieBreak::InputOrder,
        };

        let timeout_secs = non_blank("POOL_HTTP_TIMEOUT_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
            .max(1);

        Ok(Self {
            backend,
            tie_break,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// A `--db` argument forces the SQLite backend.
    pub fn with_db_override(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.backend = StoreBackend::Sqlite(path);
        }
        self
    }

    pub fn open_store(&self) -> Result<Box<dyn RecordStore>> {
        match &self.backend {
            StoreBackend::Sqlite(path) => Ok(Box::new(SqliteStore::open(path)?)),
            StoreBackend::PocketBase { url, token } => Ok(Box::new(HttpStore::new(
                url,
                token.clone(),
                self.http_timeout,
            )?)),
        }
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}
