//! Ergonomic Rust encoder for telemetry metric batches
//!
//! This crate turns batches of [`Count`], [`Gauge`] and [`Summary`] metrics into
//! gzip-compressed JSON request bodies for a metric ingest API, splitting batches
//! whose compressed payload would exceed the API's size limit. Sending the resulting
//! [`MetricRequest`]s is left to the caller.

mod json;

pub mod attributes;
pub mod batch;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod request;
pub mod security;

pub use attributes::{AttributeValue, Attributes, RawAttributes};
pub use batch::{CommonBlock, MetricBatch};
pub use error::{Error, Result};
pub use factory::{FactoryConfig, MetricRequestFactory};
pub use metrics::{Count, Gauge, Metric, MetricKind, Summary};
pub use request::MetricRequest;
pub use security::SecretString;
