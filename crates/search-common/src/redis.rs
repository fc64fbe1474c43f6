/// Redis wrapper with graceful degradation.
///
/// Every operation swallows Redis failures: it logs a warning and reports a miss (`None`) or
/// `false`. Callers fall through to computing the value. The gateway is fully functional
/// without Redis; it just does not cache.
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// Build a cache for `url`. `None` or an unparseable URL yields a disabled cache.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, "failed to create redis client, cache disabled"))
                .ok()
        });
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// PING the server. `false` when disabled or unreachable.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()?;
        value
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SETEX failed"))
            .is_ok()
    }

    /// GET + JSON decode. A value that no longer decodes is treated as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    pub async fn set_json_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_with_ttl(key, &raw, ttl_secs).await,
            Err(e) => {
                warn!(error = %e, key, "cache serialization failed");
                false
            }
        }
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = self.client.as_ref()?;
        client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_degrades_to_misses() {
        let cache = RedisCache::new(None);
        assert!(!cache.is_enabled());
        assert!(!cache.is_available().await);
        assert!(cache.get("k").await.is_none());
        assert!(!cache.set_with_ttl("k", "v", 10).await);
        assert!(cache.get_json::<Vec<String>>("k").await.is_none());
    }

    #[test]
    fn invalid_url_disables_cache() {
        let cache = RedisCache::new(Some("not-a-redis-url"));
        assert!(!cache.is_enabled());
    }
}
