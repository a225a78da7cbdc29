pub mod file_cache;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{CacheError, SourceError};

/// Prefix of every per-user cache key.
pub const CACHE_KEY_PREFIX: &str = "user_tickets_";

/// Cache key for one user's tickets. Distinct users never share a key.
pub fn cache_key(user_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{user_id}")
}

/// The ticket service. Payloads are handed back undecoded; shape
/// handling happens during reconciliation.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_tickets(&self) -> Result<Value, SourceError>;
    /// `SourceError::NotFound` when the service has no such ticket.
    async fn fetch_ticket_by_id(&self, id: &str) -> Result<Value, SourceError>;
}

/// On-device store of tickets created locally, keyed per user.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Raw cached records. A missing or unreadable entry yields no records.
    async fn read_all(&self, user_id: &str) -> Result<Vec<Value>, CacheError>;
    async fn clear_all(&self, user_id: &str) -> Result<(), CacheError>;
    async fn append(&self, user_id: &str, record: Value) -> Result<(), CacheError>;
}


pub fn create_remote(config: &AppConfig) -> Result<Option<Box<dyn RemoteSource>>> {
    let Some(api) = &config.api else {
        return Ok(None);
    };
    let source = http::HttpTicketSource::new(&api.base_url, api.token.clone(), api.timeout())?;
    Ok(Some(Box::new(source)))
}

pub fn create_cache(config: &AppConfig) -> Box<dyn LocalCache> {
    Box::new(file_cache::FileTicketCache::new(config.cache_dir()))
}
