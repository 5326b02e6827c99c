//! AWS-oriented adapters and handlers for stream fan-out.
//!
//! This crate owns runtime integration details (the Lambda handler, the SNS
//! transport adapter and tracing bootstrap). Record decoding, classification
//! and the message contract come from `stream_fanout_core`.

pub mod adapters;
pub mod handlers;
pub mod telemetry;
