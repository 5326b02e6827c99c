use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use stream_fanout_core::config::FanoutConfig;
use stream_fanout_lambda::adapters::sns::{load_sdk_config, SnsTopicPublisher};
use stream_fanout_lambda::handlers::stream::StreamFanout;
use stream_fanout_lambda::telemetry::init_tracing;
use tracing::{error, info};

async fn handle_request(
    event: LambdaEvent<Value>,
    fanout: Arc<StreamFanout<SnsTopicPublisher>>,
) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();

    fanout
        .handle_stream_event(payload)
        .await
        .map_err(|error| {
            error!(
                component = "stream_fanout",
                event = "invocation_failed",
                request_id = %context.request_id,
                error = %error,
                "stream batch failed, requesting redelivery"
            );
            Error::from(error.to_string())
        })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = FanoutConfig::from_env()
        .map_err(|error| Error::from(format!("invalid fan-out configuration: {error}")))?;
    info!(
        component = "stream_fanout",
        event = "cold_start",
        environment = %config.environment,
        routed_categories = config.routes.configured_count(),
        max_publish_attempts = config.max_publish_attempts,
        "stream fan-out starting"
    );

    let sdk_config = load_sdk_config(config.max_publish_attempts).await;
    let fanout = Arc::new(StreamFanout::new(
        SnsTopicPublisher::from_sdk_config(&sdk_config),
        config,
    ));

    lambda_runtime::run(service_fn(move |event| {
        let fanout = Arc::clone(&fanout);
        async move { handle_request(event, fanout).await }
    }))
    .await
}
