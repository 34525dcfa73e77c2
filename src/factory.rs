//! Building compressed, size-bounded requests from metric batches
//!
//! ## Default Configuration
//!
//! | Setting | Default Value | Description |
//! |---------|--------------|-------------|
//! | `endpoint` | `https://metric-api.newrelic.com/metric/v1` | Metric ingest URL |
//! | `max_compressed_size` | 1 MB | Maximum compressed body size per request |
//! | `max_metrics_per_batch` | unlimited | Optional cap on metrics per envelope element |
//! | `gzip_level` | 6 | Gzip compression level (0-9) |
//! | `user_agent` | `telemetry-ergonomic/<version>` | Sent as `User-Agent` |
//!
//! ## Example
//!
//! ```
//! use telemetry_ergonomic::{CommonBlock, Gauge, MetricBatch, MetricRequestFactory};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = MetricRequestFactory::builder()
//!     .api_key("my-insert-key")
//!     .max_compressed_size(500_000)
//!     .build()?;
//!
//! let common = CommonBlock::builder()
//!     .attributes_json(r#"{"host":"web-1"}"#)
//!     .build();
//! let batch = MetricBatch::with_common(
//!     common,
//!     vec![Gauge::builder().name("temperature").value(21.5).build().into()],
//! );
//!
//! let requests = factory.build_requests(&[batch])?;
//! assert_eq!(requests.len(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use bon::bon;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE,
    USER_AGENT,
};
use reqwest::Method;
use serde::Deserialize;
use std::io::Write;
use std::slice;
use tracing::{debug, trace, warn};
use url::Url;

use crate::batch::{write_envelope, MetricBatch};
use crate::error::{Error, Result};
use crate::request::MetricRequest;
use crate::security::SecretString;

/// SDK version for User-Agent header
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
const SDK_NAME: &str = env!("CARGO_PKG_NAME");

/// Default metric ingest endpoint
pub const DEFAULT_ENDPOINT: &str = "https://metric-api.newrelic.com/metric/v1";

/// Maximum compressed payload size accepted by the ingest API (1 MB)
pub const DEFAULT_MAX_COMPRESSED_SIZE: usize = 1_000_000;

/// Default gzip compression level
const DEFAULT_GZIP_LEVEL: u32 = 6;

static API_KEY_HEADER: HeaderName = HeaderName::from_static("api-key");

/// Configuration for the request factory
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Metric ingest URL
    pub endpoint: String,
    /// API key sent in the `Api-Key` header; no header is sent when unset
    pub api_key: Option<SecretString>,
    /// `User-Agent` header value
    pub user_agent: Option<String>,
    /// Maximum compressed body size per request, in bytes
    pub max_compressed_size: usize,
    /// Maximum number of metrics per batch before it is split regardless of size
    pub max_metrics_per_batch: Option<usize>,
    /// Gzip compression level, 0-9
    pub gzip_level: u32,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            user_agent: None,
            max_compressed_size: DEFAULT_MAX_COMPRESSED_SIZE,
            max_metrics_per_batch: None,
            gzip_level: DEFAULT_GZIP_LEVEL,
        }
    }
}

/// Turns metric batches into ready-to-send requests
///
/// The factory is immutable once built and can be shared between threads.
#[derive(Debug, Clone)]
pub struct MetricRequestFactory {
    endpoint: Url,
    headers: HeaderMap,
    max_compressed_size: usize,
    max_metrics_per_batch: Option<usize>,
    compression: Compression,
}

#[bon]
impl MetricRequestFactory {
    /// Create a new request factory
    #[builder]
    pub fn new(
        #[builder(into)] api_key: Option<SecretString>,
        #[builder(into)] endpoint: Option<String>,
        #[builder(into)] user_agent: Option<String>,
        max_compressed_size: Option<usize>,
        max_metrics_per_batch: Option<usize>,
        gzip_level: Option<u32>,
    ) -> Result<Self> {
        Self::from_config(FactoryConfig {
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            user_agent,
            max_compressed_size: max_compressed_size.unwrap_or(DEFAULT_MAX_COMPRESSED_SIZE),
            max_metrics_per_batch,
            gzip_level: gzip_level.unwrap_or(DEFAULT_GZIP_LEVEL),
        })
    }
}

impl MetricRequestFactory {
    /// Create a factory from a configuration, validating it
    pub fn from_config(config: FactoryConfig) -> Result<Self> {
        if config.max_compressed_size == 0 {
            return Err(Error::Configuration(
                "max_compressed_size must be greater than zero".to_string(),
            ));
        }
        if config.max_metrics_per_batch == Some(0) {
            return Err(Error::Configuration(
                "max_metrics_per_batch must be greater than zero".to_string(),
            ));
        }
        if config.gzip_level > 9 {
            return Err(Error::Configuration(format!(
                "gzip_level must be between 0 and 9, got {}",
                config.gzip_level
            )));
        }

        let endpoint = Url::parse(&config.endpoint)?;

        let user_agent = config
            .user_agent
            .unwrap_or_else(|| format!("{}/{}", SDK_NAME, SDK_VERSION));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(USER_AGENT, HeaderValue::from_str(&user_agent)?);
        if let Some(api_key) = config.api_key.filter(|key| !key.is_empty()) {
            headers.insert(API_KEY_HEADER.clone(), api_key.header_value()?);
        }

        Ok(Self {
            endpoint,
            headers,
            max_compressed_size: config.max_compressed_size,
            max_metrics_per_batch: config.max_metrics_per_batch,
            compression: Compression::new(config.gzip_level),
        })
    }

    /// Create a new request factory from environment variables
    ///
    /// Reads from:
    /// - `NEW_RELIC_API_KEY`: Required API key
    /// - `NEW_RELIC_METRIC_URL`: Optional endpoint (defaults to <https://metric-api.newrelic.com/metric/v1>)
    pub fn from_env() -> Result<Self> {
        use std::env;

        let api_key = env::var("NEW_RELIC_API_KEY").map_err(|_| {
            Error::Configuration("NEW_RELIC_API_KEY environment variable not set".to_string())
        })?;

        let endpoint =
            env::var("NEW_RELIC_METRIC_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        Self::from_config(FactoryConfig {
            endpoint,
            api_key: Some(SecretString::new(api_key)),
            ..Default::default()
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn max_compressed_size(&self) -> usize {
        self.max_compressed_size
    }

    /// Encode batches into one or more requests
    ///
    /// All batches are first encoded into a single envelope. If its compressed size
    /// exceeds the payload ceiling, the list of batches is halved and each half encoded
    /// again, and a single batch that is still too large is split in half until every
    /// piece fits. Metric
    /// order across the returned requests matches the input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchSizeExceeded`] if a batch that cannot be split further (one
    /// metric, or none) still exceeds the ceiling. No requests are returned in that case.
    pub fn build_requests(&self, batches: &[MetricBatch]) -> Result<Vec<MetricRequest>> {
        let mut requests = Vec::new();
        if batches.is_empty() {
            return Ok(requests);
        }

        match self.max_metrics_per_batch {
            Some(max) if batches.iter().any(|batch| batch.len() > max) => {
                let mut bounded = Vec::with_capacity(batches.len());
                for batch in batches {
                    split_to_count(batch.clone(), max, &mut bounded);
                }
                debug!(
                    batches = batches.len(),
                    bounded = bounded.len(),
                    max_metrics_per_batch = max,
                    "Split batches exceeding metric count limit."
                );
                self.build_into(&bounded, &mut requests)?;
            }
            _ => self.build_into(batches, &mut requests)?,
        }

        Ok(requests)
    }

    fn build_into(&self, batches: &[MetricBatch], requests: &mut Vec<MetricRequest>) -> Result<()> {
        let mut uncompressed = Vec::new();
        write_envelope(&mut uncompressed, batches).map_err(Error::Encoding)?;
        let compressed = self.compress(&uncompressed)?;
        let metric_count = batches.iter().map(MetricBatch::len).sum();

        if compressed.len() <= self.max_compressed_size {
            requests.push(self.request(compressed, uncompressed.len(), metric_count));
            return Ok(());
        }

        debug!(
            batches = batches.len(),
            metrics = metric_count,
            compressed_len = compressed.len(),
            max_compressed_size = self.max_compressed_size,
            "Payload exceeds compressed size limit, splitting."
        );

        match batches {
            [batch] => match batch.split() {
                Some((first, second)) => {
                    self.build_into(slice::from_ref(&first), requests)?;
                    self.build_into(slice::from_ref(&second), requests)
                }
                None => {
                    warn!(
                        metrics = metric_count,
                        compressed_len = compressed.len(),
                        max_compressed_size = self.max_compressed_size,
                        "Batch exceeds compressed size limit and cannot be split."
                    );
                    Err(Error::BatchSizeExceeded {
                        size: compressed.len(),
                        max_size: self.max_compressed_size,
                    })
                }
            },
            _ => {
                let (first, second) = batches.split_at(batches.len() / 2);
                self.build_into(first, requests)?;
                self.build_into(second, requests)
            }
        }
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), self.compression);
        encoder.write_all(data).map_err(Error::Compression)?;
        encoder.finish().map_err(Error::Compression)
    }

    fn request(&self, body: Vec<u8>, uncompressed_len: usize, metric_count: usize) -> MetricRequest {
        let mut headers = self.headers.clone();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        trace!(
            metrics = metric_count,
            uncompressed_len,
            compressed_len = body.len(),
            "Built metric request."
        );

        MetricRequest {
            method: Method::POST,
            url: self.endpoint.clone(),
            headers,
            body: Bytes::from(body),
            uncompressed_len,
            metric_count,
        }
    }
}

/// Halve `batch` until every piece holds at most `max` metrics.
fn split_to_count(batch: MetricBatch, max: usize, out: &mut Vec<MetricBatch>) {
    if batch.len() <= max {
        out.push(batch);
        return;
    }

    match batch.split() {
        Some((first, second)) => {
            split_to_count(first, max, out);
            split_to_count(second, max, out);
        }
        None => out.push(batch),
    }
}
