use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::MessageAttributeValue;
use stream_fanout_core::message::MessageAttributes;

use crate::adapters::publish::TopicPublisher;

const STRING_DATA_TYPE: &str = "String";

/// Loads the shared AWS config with a bounded standard retry policy
/// (exponential backoff with jitter) applied to every SNS call.
pub async fn load_sdk_config(max_attempts: u32) -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(max_attempts))
        .load()
        .await
}

#[derive(Debug, Clone)]
pub struct SnsTopicPublisher {
    sns_client: aws_sdk_sns::Client,
}

impl SnsTopicPublisher {
    pub fn new(sns_client: aws_sdk_sns::Client) -> Self {
        Self { sns_client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_sns::Client::new(config))
    }
}

#[async_trait]
impl TopicPublisher for SnsTopicPublisher {
    async fn publish(
        &self,
        topic_arn: &str,
        body: &str,
        attributes: &MessageAttributes,
    ) -> Result<(), String> {
        let attribute_values = sns_attribute_values(attributes)?;

        self.sns_client
            .publish()
            .topic_arn(topic_arn)
            .message(body)
            .set_message_attributes(Some(attribute_values))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                format!(
                    "failed to publish to sns topic {topic_arn}: {}",
                    DisplayErrorContext(&error)
                )
            })
    }
}

pub fn sns_attribute_values(
    attributes: &MessageAttributes,
) -> Result<HashMap<String, MessageAttributeValue>, String> {
    attributes
        .pairs()
        .into_iter()
        .map(|(name, value)| {
            MessageAttributeValue::builder()
                .data_type(STRING_DATA_TYPE)
                .string_value(value)
                .build()
                .map(|attribute| (name.to_string(), attribute))
                .map_err(|error| format!("invalid sns message attribute {name}: {error}"))
        })
        .collect()
}
