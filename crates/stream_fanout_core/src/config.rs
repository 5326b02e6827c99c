//! Cold-start configuration for the fan-out function.
//!
//! Values are read once from the process environment and passed explicitly
//! into the coordinator. Tests use [`FanoutConfig::from_lookup`] with a map
//! instead of mutating the environment.

use crate::classify::Category;
use crate::error::ConfigError;

pub const PAYMENT_TOPIC_ENV: &str = "PAYMENT_EVENTS_TOPIC_ARN";
pub const CUSTOMER_TOPIC_ENV: &str = "CUSTOMER_EVENTS_TOPIC_ARN";
pub const LICENSE_TOPIC_ENV: &str = "LICENSE_EVENTS_TOPIC_ARN";
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";
pub const FAILURE_MODE_ENV: &str = "FANOUT_FAILURE_MODE";
pub const MAX_ATTEMPTS_ENV: &str = "SNS_MAX_ATTEMPTS";

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Topic ARN per category. An unset route means records of that category are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicRoutes {
    pub payment: Option<String>,
    pub customer: Option<String>,
    pub license: Option<String>,
}

impl TopicRoutes {
    pub fn topic_for(&self, category: Category) -> Option<&str> {
        match category {
            Category::Payment => self.payment.as_deref(),
            Category::Customer => self.customer.as_deref(),
            Category::License => self.license.as_deref(),
        }
    }

    pub fn configured_count(&self) -> usize {
        Category::ALL
            .iter()
            .filter(|category| self.topic_for(**category).is_some())
            .count()
    }
}

/// How publish failures are reported back to the stream source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchFailureMode {
    /// Any failure fails the invocation and the whole batch is redelivered.
    #[default]
    FailBatch,
    /// Failed records are reported as `batchItemFailures`.
    ReportItems,
}

impl BatchFailureMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "batch" => Some(Self::FailBatch),
            "items" => Some(Self::ReportItems),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutConfig {
    pub routes: TopicRoutes,
    pub environment: String,
    pub failure_mode: BatchFailureMode,
    pub max_publish_attempts: u32,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            routes: TopicRoutes::default(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            failure_mode: BatchFailureMode::default(),
            max_publish_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl FanoutConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let failure_mode = match value(FAILURE_MODE_ENV) {
            Some(raw) => {
                BatchFailureMode::parse(&raw).ok_or(ConfigError::InvalidFailureMode {
                    name: FAILURE_MODE_ENV,
                    value: raw,
                })?
            }
            None => BatchFailureMode::default(),
        };

        let max_publish_attempts = match value(MAX_ATTEMPTS_ENV) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(attempts) if attempts > 0 => attempts,
                _ => {
                    return Err(ConfigError::InvalidAttempts {
                        name: MAX_ATTEMPTS_ENV,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Ok(Self {
            routes: TopicRoutes {
                payment: value(PAYMENT_TOPIC_ENV),
                customer: value(CUSTOMER_TOPIC_ENV),
                license: value(LICENSE_TOPIC_ENV),
            },
            environment: value(ENVIRONMENT_ENV).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            failure_mode,
            max_publish_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<FanoutConfig, ConfigError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        FanoutConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = from_pairs(&[]).expect("config should load");
        assert_eq!(config, FanoutConfig::default());
        assert_eq!(config.routes.configured_count(), 0);
        assert_eq!(config.environment, "dev");
    }

    #[test]
    fn reads_topic_routes_per_category() {
        let config = from_pairs(&[
            (PAYMENT_TOPIC_ENV, "arn:aws:sns:eu-west-1:123:payment-events"),
            (LICENSE_TOPIC_ENV, "arn:aws:sns:eu-west-1:123:license-events"),
            (CUSTOMER_TOPIC_ENV, "   "),
            (ENVIRONMENT_ENV, "prod"),
        ])
        .expect("config should load");

        assert_eq!(
            config.routes.topic_for(Category::Payment),
            Some("arn:aws:sns:eu-west-1:123:payment-events")
        );
        assert_eq!(
            config.routes.topic_for(Category::License),
            Some("arn:aws:sns:eu-west-1:123:license-events")
        );
        assert_eq!(config.routes.topic_for(Category::Customer), None);
        assert_eq!(config.routes.configured_count(), 2);
        assert_eq!(config.environment, "prod");
    }

    #[test]
    fn parses_failure_mode_and_attempts() {
        let config = from_pairs(&[(FAILURE_MODE_ENV, "Items"), (MAX_ATTEMPTS_ENV, "5")])
            .expect("config should load");
        assert_eq!(config.failure_mode, BatchFailureMode::ReportItems);
        assert_eq!(config.max_publish_attempts, 5);
    }

    #[test]
    fn rejects_unknown_failure_mode() {
        let error = from_pairs(&[(FAILURE_MODE_ENV, "partial")]).expect_err("should fail");
        assert_eq!(
            error,
            ConfigError::InvalidFailureMode {
                name: FAILURE_MODE_ENV,
                value: "partial".to_string(),
            }
        );
    }

    #[test]
    fn rejects_zero_or_non_numeric_attempts() {
        for raw in ["0", "three", "-1"] {
            let error = from_pairs(&[(MAX_ATTEMPTS_ENV, raw)]).expect_err("should fail");
            assert!(error.to_string().contains("SNS_MAX_ATTEMPTS"), "{raw}");
        }
    }
}
