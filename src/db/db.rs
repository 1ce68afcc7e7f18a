// db/db.rs
use sqlx::{Pool, Postgres};
use redis::aio::ConnectionManager;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use super::{
    cache::{CacheHelper, USER_CACHE_TTL},
    userdb::UserExt,
};
use crate::models::usermodel::User;

/// Second delete after an invalidation, for profiles a concurrent read loaded
/// before the change committed and wrote back afterwards.
const REINVALIDATE_AFTER: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
    pub redis_client: Option<Arc<ConnectionManager>>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("redis_client", &self.redis_client.is_some())
            .finish()
    }
}

impl DBClient {
    /// Create a new DBClient with PostgreSQL pool only
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient {
            pool,
            redis_client: None,
        }
    }

    /// Create a DBClient that caches profiles in Redis when it is reachable.
    pub async fn with_redis(pool: Pool<Postgres>, redis_url: &str) -> Self {
        match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("Redis connection established");
                    DBClient {
                        pool,
                        redis_client: Some(Arc::new(conn)),
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to connect to Redis: {}. Continuing without cache.", e);
                    DBClient::new(pool)
                }
            },
            Err(e) => {
                tracing::warn!("Failed to create Redis client: {}. Continuing without cache.", e);
                DBClient::new(pool)
            }
        }
    }

    pub fn cache_status(&self) -> &str {
        if self.redis_client.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    }

    /// Profile lookup used on every authenticated request: Redis first, then
    /// PostgreSQL, repopulating the cache on a miss.
    pub async fn get_cached_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let key = CacheHelper::user_key(user_id);

        if let Some(redis) = &self.redis_client {
            match CacheHelper::get::<User>(redis, &key).await {
                Ok(Some(user)) => return Ok(Some(user)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
            }
        }

        let user = self.get_user(Some(user_id), None, None).await?;

        if let (Some(redis), Some(user)) = (&self.redis_client, &user) {
            if let Err(e) = CacheHelper::set(redis, &key, user, USER_CACHE_TTL).await {
                tracing::warn!("Cache write failed for {}: {}", key, e);
            }
        }

        Ok(user)
    }

    /// Drops the cached profile so the next request sees role, status or
    /// name changes immediately.
    pub async fn invalidate_user(&self, user_id: Uuid) {
        if let Some(redis) = &self.redis_client {
            let key = CacheHelper::user_key(user_id);
            if let Err(e) = CacheHelper::delete(redis, &key).await {
                tracing::warn!("Cache invalidation failed for {}: {}", key, e);
            }

            let redis = redis.clone();
            tokio::spawn(async move {
                tokio::time::sleep(REINVALIDATE_AFTER).await;
                if let Err(e) = CacheHelper::delete(&redis, &key).await {
                    tracing::warn!("Delayed cache invalidation failed for {}: {}", key, e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::models::usermodel::UserStatus;

    #[tokio::test]
    #[ignore = "requires DATABASE_URL and REDIS_URL"]
    async fn stale_profile_written_after_invalidation_is_dropped() {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("database connection");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        let client = DBClient::with_redis(pool, &redis_url).await;
        let redis = client.redis_client.clone().expect("redis connection");

        let email = format!("{}@example.com", Uuid::new_v4());
        let user = client
            .save_user("Cache Race", email.as_str(), "not-a-real-hash")
            .await
            .unwrap();
        let stale = client.get_cached_user(user.id).await.unwrap().unwrap();
        assert_eq!(stale.status, UserStatus::Active);

        client.update_user_status(user.id, UserStatus::Suspended).await.unwrap();
        client.invalidate_user(user.id).await;

        // A read that started before the suspension lands after the delete.
        let key = CacheHelper::user_key(user.id);
        CacheHelper::set(&redis, &key, &stale, USER_CACHE_TTL).await.unwrap();

        tokio::time::sleep(REINVALIDATE_AFTER + Duration::from_millis(300)).await;
        let fresh = client.get_cached_user(user.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, UserStatus::Suspended);

        client.delete_user(user.id).await.unwrap();
        client.invalidate_user(user.id).await;
    }
}
