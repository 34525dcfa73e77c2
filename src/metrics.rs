//! Metric data points with builder patterns
//!
//! Three kinds of metric are supported, mirroring the ingest API's types:
//!
//! - [`Count`]: the number of occurrences over an interval
//! - [`Gauge`]: a point-in-time value
//! - [`Summary`]: count, sum, min and max of observations over an interval
//!
//! ```
//! use telemetry_ergonomic::{Count, Metric};
//! use std::time::Duration;
//!
//! let count = Count::builder()
//!     .name("http.requests")
//!     .value(42.0)
//!     .interval(Duration::from_secs(10))
//!     .build();
//! let metric = Metric::from(count);
//! assert_eq!(metric.name(), "http.requests");
//! ```

use bon::Builder;
use chrono::{DateTime, Utc};
use std::io;
use std::time::Duration;

use crate::attributes::{write_attributes_field, Attributes, RawAttributes};
use crate::json::ObjectWriter;

/// The kind of a metric, as named on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Count,
    Gauge,
    Summary,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
        }
    }
}

/// A count of occurrences over an interval
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct Count {
    pub name: String,
    #[builder(default)]
    pub value: f64,
    pub attributes: Option<Attributes>,
    /// Pre-serialized attributes; takes precedence over `attributes`
    #[builder(into)]
    pub attributes_json: Option<RawAttributes>,
    pub timestamp: Option<DateTime<Utc>>,
    #[builder(default)]
    pub interval: Duration,
}

/// A single value at a point in time
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct Gauge {
    pub name: String,
    #[builder(default)]
    pub value: f64,
    pub attributes: Option<Attributes>,
    /// Pre-serialized attributes; takes precedence over `attributes`
    #[builder(into)]
    pub attributes_json: Option<RawAttributes>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Aggregated observations over an interval
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct Summary {
    pub name: String,
    #[builder(default)]
    pub count: f64,
    #[builder(default)]
    pub sum: f64,
    #[builder(default)]
    pub min: f64,
    #[builder(default)]
    pub max: f64,
    pub attributes: Option<Attributes>,
    /// Pre-serialized attributes; takes precedence over `attributes`
    #[builder(into)]
    pub attributes_json: Option<RawAttributes>,
    pub timestamp: Option<DateTime<Utc>>,
    #[builder(default)]
    pub interval: Duration,
}

/// A metric data point of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Count(Count),
    Gauge(Gauge),
    Summary(Summary),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::Count(m) => &m.name,
            Metric::Gauge(m) => &m.name,
            Metric::Summary(m) => &m.name,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Count(_) => MetricKind::Count,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Summary(_) => MetricKind::Summary,
        }
    }

    /// Append this metric's JSON object to `buf`.
    pub(crate) fn write_json(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.push(b'{');
        {
            let mut w = ObjectWriter::new(buf);
            w.string_field("name", self.name())?;
            w.string_field("type", self.kind().as_str())?;

            let (attributes, attributes_json, timestamp, interval) = match self {
                Metric::Count(m) => {
                    w.float_field("value", m.value)?;
                    (&m.attributes, &m.attributes_json, m.timestamp, m.interval)
                }
                Metric::Gauge(m) => {
                    w.float_field("value", m.value)?;
                    (&m.attributes, &m.attributes_json, m.timestamp, Duration::ZERO)
                }
                Metric::Summary(m) => {
                    let buf = w.key("value")?;
                    buf.push(b'{');
                    {
                        let mut value = ObjectWriter::new(buf);
                        value.float_field("sum", m.sum)?;
                        value.float_field("count", m.count)?;
                        value.float_field("min", m.min)?;
                        value.float_field("max", m.max)?;
                    }
                    buf.push(b'}');
                    (&m.attributes, &m.attributes_json, m.timestamp, m.interval)
                }
            };

            write_time_fields(&mut w, timestamp, interval)?;
            write_attributes_field(&mut w, attributes.as_ref(), attributes_json.as_ref())?;
        }
        buf.push(b'}');
        Ok(())
    }
}

/// Write `timestamp` and `interval.ms`, each omitted when absent or zero.
///
/// Both are truncated to whole milliseconds.
pub(crate) fn write_time_fields(
    w: &mut ObjectWriter<'_>,
    timestamp: Option<DateTime<Utc>>,
    interval: Duration,
) -> io::Result<()> {
    if let Some(timestamp) = timestamp {
        w.int_field("timestamp", unix_millis(timestamp))?;
    }
    if !interval.is_zero() {
        w.int_field("interval.ms", interval.as_millis())?;
    }
    Ok(())
}

/// Milliseconds since the epoch, truncated toward zero.
fn unix_millis(timestamp: DateTime<Utc>) -> i64 {
    let millis = timestamp.timestamp_millis();
    // `timestamp_millis` floors; pre-epoch instants with a sub-millisecond part round up.
    if millis < 0 && timestamp.timestamp_subsec_nanos() % 1_000_000 != 0 {
        millis + 1
    } else {
        millis
    }
}

impl From<Count> for Metric {
    fn from(value: Count) -> Self {
        Metric::Count(value)
    }
}

impl From<Gauge> for Metric {
    fn from(value: Gauge) -> Self {
        Metric::Gauge(value)
    }
}

impl From<Summary> for Metric {
    fn from(value: Summary) -> Self {
        Metric::Summary(value)
    }
}
