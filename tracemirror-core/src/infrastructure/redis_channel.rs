use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::fmt;
use tracing::{debug, info};

use crate::{domain::PublishAck, error::ChannelError, ports::WorkChannel};

/// Work channel backed by Redis pub/sub.
///
/// The connection manager reconnects on its own; a clone shares the same
/// underlying multiplexed connection, so one instance serves every pass.
#[derive(Clone)]
pub struct RedisWorkChannel {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisWorkChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisWorkChannel")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisWorkChannel {
    pub async fn connect(redis_url: &str) -> Result<Self, ChannelError> {
        info!("Connecting to Redis work channel at {}", redact(redis_url));

        let client = redis::Client::open(redis_url).map_err(|e| {
            ChannelError::Unavailable(format!(
                "Failed to create Redis client: {e}"
            ))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            ChannelError::Unavailable(format!("Failed to connect to Redis: {e}"))
        })?;

        info!("Successfully connected to Redis work channel");

        Ok(Self { conn })
    }
}

#[async_trait]
impl WorkChannel for RedisWorkChannel {
    async fn publish(
        &self,
        topic: &str,
        value: &str,
    ) -> Result<PublishAck, ChannelError> {
        let mut conn = self.conn.clone();
        let receivers: u64 = conn.publish(topic, value).await.map_err(|e| {
            ChannelError::Publish(format!("Redis PUBLISH failed: {e}"))
        })?;

        debug!(topic, receivers, "published work item");
        Ok(PublishAck { receivers })
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(redis_url: &str) -> String {
    match url::Url::parse(redis_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable redis url>".to_string(),
    }
}
