use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use stream_fanout_core::classify::{classify, Category};
use stream_fanout_core::config::{BatchFailureMode, FanoutConfig, TopicRoutes};
use stream_fanout_core::error::DecodeError;
use stream_fanout_core::message::{FanoutMessage, MessageAttributes};
use stream_fanout_core::record::{decode_stream_event, decode_stream_records, ChangeRecord};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::adapters::publish::TopicPublisher;

const COMPONENT: &str = "stream_fanout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Published { topic_arn: String },
    Skipped,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub index: usize,
    pub item_identifier: Option<String>,
    pub category: Category,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchSummary {
    fn into_error(self) -> FanoutError {
        FanoutError::BatchFailed {
            total: self.total,
            failed: self.failed,
            failures: self.failures,
        }
    }
}

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("invalid stream event: {0}")]
    Decode(#[from] DecodeError),
    #[error(
        "{failed} of {total} records failed to publish: {}",
        describe_failures(.failures)
    )]
    BatchFailed {
        total: usize,
        failed: usize,
        failures: Vec<RecordFailure>,
    },
}

fn describe_failures(failures: &[RecordFailure]) -> String {
    failures
        .iter()
        .map(|failure| {
            format!(
                "record {} ({}): {}",
                failure.index, failure.category, failure.message
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builds and sends the fan-out message for one classified record.
///
/// A category without a configured topic is skipped with a warning. Transport
/// errors are returned as-is; retrying is left to the transport client and to
/// batch redelivery.
pub async fn publish_record<P>(
    publisher: &P,
    routes: &TopicRoutes,
    environment: &str,
    record: &ChangeRecord,
    category: Category,
) -> RecordOutcome
where
    P: TopicPublisher + ?Sized,
{
    let Some(topic_arn) = routes.topic_for(category) else {
        warn!(
            component = COMPONENT,
            event = "record_skipped",
            category = %category,
            event_name = %record.event_name,
            "no topic configured for category, skipping record"
        );
        return RecordOutcome::Skipped;
    };

    let message = FanoutMessage::from_record(record, environment, Utc::now().to_rfc3339());
    let body = match serde_json::to_string(&message) {
        Ok(value) => value,
        Err(error) => {
            return RecordOutcome::Failed {
                message: format!("failed to serialize fan-out message: {error}"),
            }
        }
    };
    let attributes = MessageAttributes::for_record(record, category);

    match publisher.publish(topic_arn, &body, &attributes).await {
        Ok(()) => {
            debug!(
                component = COMPONENT,
                event = "record_published",
                category = %category,
                topic_arn,
                record_fingerprint = %attributes.record_fingerprint,
            );
            RecordOutcome::Published {
                topic_arn: topic_arn.to_string(),
            }
        }
        Err(message) => RecordOutcome::Failed { message },
    }
}

/// Classifies a batch of change records and republishes each one to its
/// category topic.
///
/// The publisher is injected at construction so tests can substitute the
/// transport; configuration is resolved once at cold start.
pub struct StreamFanout<P> {
    publisher: P,
    config: FanoutConfig,
}

impl<P> StreamFanout<P>
where
    P: TopicPublisher,
{
    pub fn new(publisher: P, config: FanoutConfig) -> Self {
        Self { publisher, config }
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Fans every record out concurrently and collects every outcome without
    /// short-circuiting on failures.
    pub async fn process_batch_outcomes(&self, records: &[ChangeRecord]) -> BatchSummary {
        let started_at = Instant::now();

        let outcomes = join_all(records.iter().enumerate().map(|(index, record)| async move {
            let category = classify(record);
            let outcome = publish_record(
                &self.publisher,
                &self.config.routes,
                &self.config.environment,
                record,
                category,
            )
            .await;
            (index, record, category, outcome)
        }))
        .await;

        let mut summary = BatchSummary {
            total: records.len(),
            ..BatchSummary::default()
        };
        for (index, record, category, outcome) in outcomes {
            match outcome {
                RecordOutcome::Published { .. } => summary.published += 1,
                RecordOutcome::Skipped => summary.skipped += 1,
                RecordOutcome::Failed { message } => {
                    error!(
                        component = COMPONENT,
                        event = "record_failed",
                        index,
                        category = %category,
                        item_identifier = record.item_identifier(),
                        error = %message,
                        "failed to publish record"
                    );
                    summary.failed += 1;
                    summary.failures.push(RecordFailure {
                        index,
                        item_identifier: record.item_identifier().map(str::to_string),
                        category,
                        message,
                    });
                }
            }
        }

        info!(
            component = COMPONENT,
            event = "batch_processed",
            total = summary.total,
            published = summary.published,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "processed {} records: {} succeeded, {} failed",
            summary.total,
            summary.published + summary.skipped,
            summary.failed,
        );

        summary
    }

    /// Fails the whole batch when any record failed, so the stream source
    /// redelivers it.
    pub async fn process_batch(
        &self,
        records: &[ChangeRecord],
    ) -> Result<BatchSummary, FanoutError> {
        let summary = self.process_batch_outcomes(records).await;
        if summary.failed > 0 {
            return Err(summary.into_error());
        }
        Ok(summary)
    }

    /// Lambda entry: decodes the stream event and reports failures according
    /// to the configured [`BatchFailureMode`].
    ///
    /// In item mode an undecodable record is reported by its sequence number
    /// alongside failed publishes; the rest of the batch is still fanned out.
    pub async fn handle_stream_event(&self, event: Value) -> Result<Value, FanoutError> {
        match self.config.failure_mode {
            BatchFailureMode::FailBatch => {
                let records = decode_stream_event(event)?;
                let summary = self.process_batch(&records).await?;
                Ok(json!({
                    "status": "ok",
                    "total": summary.total,
                    "published": summary.published,
                    "skipped": summary.skipped,
                    "failed": summary.failed,
                }))
            }
            BatchFailureMode::ReportItems => {
                let (records, undecoded) = decode_stream_records(event)?;

                let mut item_identifiers = Vec::with_capacity(undecoded.len());
                for record in undecoded {
                    error!(
                        component = COMPONENT,
                        event = "record_undecodable",
                        index = record.index,
                        item_identifier = record.sequence_number.as_deref(),
                        error = %record.source,
                        "failed to decode record"
                    );
                    match record.sequence_number.clone() {
                        Some(sequence_number) => item_identifiers.push(sequence_number),
                        None => return Err(DecodeError::from(record).into()),
                    }
                }

                let summary = self.process_batch_outcomes(&records).await;
                if summary
                    .failures
                    .iter()
                    .any(|failure| failure.item_identifier.is_none())
                {
                    return Err(summary.into_error());
                }

                item_identifiers.extend(
                    summary
                        .failures
                        .into_iter()
                        .filter_map(|failure| failure.item_identifier),
                );
                let batch_item_failures: Vec<Value> = item_identifiers
                    .into_iter()
                    .map(|item_identifier| json!({ "itemIdentifier": item_identifier }))
                    .collect();
                Ok(json!({ "batchItemFailures": batch_item_failures }))
            }
        }
    }
}
