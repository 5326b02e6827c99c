//! Shared stream fan-out domain primitives.
//!
//! This crate owns change-record decoding, classification, the outbound
//! message contract and configuration. It intentionally excludes AWS SDK and
//! Lambda runtime concerns, which live in `stream_fanout_lambda`.

pub mod classify;
pub mod config;
pub mod error;
pub mod message;
pub mod record;
