/// Redis cache for complete search responses.
///
/// Key schema:
/// - `wsa:v1:search:{sha256(normalized request)}` — JSON SearchResponse (TTL SEARCH_CACHE_TTL_SECS)
///
/// All reads degrade to a miss and all writes to a no-op when Redis is absent or failing.
use sha2::{Digest, Sha256};

use search_common::redis::RedisCache;

use crate::model::{SearchResponse, ValidatedSearch};

const KEY_PREFIX: &str = "wsa:v1:";

#[derive(Clone)]
pub struct SearchCache {
    redis: RedisCache,
    ttl_secs: u64,
}

impl SearchCache {
    pub fn new(redis: RedisCache, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_enabled() && self.ttl_secs > 0
    }

    /// PING Redis.
    pub async fn is_available(&self) -> bool {
        self.redis.is_available().await
    }

    pub async fn get(&self, search: &ValidatedSearch, model: Option<&str>) -> Option<SearchResponse> {
        if !self.is_enabled() {
            return None;
        }
        self.redis.get_json(&search_key(search, model)).await
    }

    pub async fn set(&self, search: &ValidatedSearch, model: Option<&str>, response: &SearchResponse) {
        if !self.is_enabled() {
            return;
        }
        self.redis
            .set_json_with_ttl(&search_key(search, model), response, self.ttl_secs)
            .await;
    }
}

/// `model` is the resolved model id, or `None` when no answer is generated.
fn search_key(search: &ValidatedSearch, model: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(search.query.to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(search.mode.as_str().as_bytes());
    hasher.update(b"|");
    for source in &search.sources {
        hasher.update(source.tag().as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"|");
    for host in &search.custom_hosts {
        hasher.update(host.as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"|");
    hasher.update(model.unwrap_or("-").as_bytes());
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}search:{:x}", hash)
}
