use async_trait::async_trait;
use stream_fanout_core::message::MessageAttributes;

/// Outbound topic transport. One call per message; implementations must not
/// retry on their own beyond what the underlying client is configured to do.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(
        &self,
        topic_arn: &str,
        body: &str,
        attributes: &MessageAttributes,
    ) -> Result<(), String>;
}
