use async_trait::async_trait;

use crate::{domain::PublishAck, error::ChannelError};

/// Publish/subscribe sink for discovered work items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkChannel: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        value: &str,
    ) -> Result<PublishAck, ChannelError>;
}
