// db/cache.rs
use redis::{AsyncCommands, aio::ConnectionManager};
use std::sync::Arc;
use uuid::Uuid;
use serde::{Serialize, de::DeserializeOwned};

/// Profiles are re-read on every authenticated request, so keep them short-lived.
/// Also bounds how long a profile written back by a racing read can outlive
/// an invalidation.
pub const USER_CACHE_TTL: usize = 30;

pub struct CacheHelper;

impl CacheHelper {
    pub fn user_key(user_id: Uuid) -> String {
        format!("user:{}", user_id)
    }

    pub async fn get<T: DeserializeOwned>(
        redis: &Arc<ConnectionManager>,
        key: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let cached: Option<String> = conn.get(key).await?;

        match cached {
            Some(data) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    tracing::debug!("Cache HIT: {}", key);
                    Ok(Some(value))
                }
                Err(_) => {
                    tracing::warn!("Cache deserialization failed for: {}", key);
                    Ok(None)
                }
            },
            None => {
                tracing::debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(
        redis: &Arc<ConnectionManager>,
        key: &str,
        value: &T,
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        if let Ok(json) = serde_json::to_string(value) {
            let mut conn = ConnectionManager::clone(redis);
            let _: () = conn.set_ex(key, json, ttl_seconds).await?;
            tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
        }
        Ok(())
    }

    pub async fn delete(
        redis: &Arc<ConnectionManager>,
        key: &str,
    ) -> Result<(), redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let _: () = conn.del(key).await?;
        tracing::debug!("Cache DELETE: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_entries_expire_quickly() {
        assert!(USER_CACHE_TTL <= 30);
    }

    #[test]
    fn user_keys_are_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            CacheHelper::user_key(id),
            "user:00000000-0000-0000-0000-000000000000"
        );
    }
}
