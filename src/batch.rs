//! Metric batches, common blocks and batch splitting

use bon::Builder;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::attributes::{write_attributes_field, Attributes, RawAttributes};
use crate::json::ObjectWriter;
use crate::metrics::{write_time_fields, Metric};

/// Fields shared by every metric in a batch, encoded once as the `"common"` block
///
/// Each field is omitted from the output when it is unset or zero. A block with no
/// fields set still encodes as `"common":{}`.
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct CommonBlock {
    pub timestamp: Option<DateTime<Utc>>,
    #[builder(default)]
    pub interval: Duration,
    pub attributes: Option<Attributes>,
    /// Pre-serialized attributes; takes precedence over `attributes`
    #[builder(into)]
    pub attributes_json: Option<RawAttributes>,
}

impl CommonBlock {
    pub(crate) fn write_json(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.push(b'{');
        {
            let mut w = ObjectWriter::new(buf);
            write_time_fields(&mut w, self.timestamp, self.interval)?;
            write_attributes_field(
                &mut w,
                self.attributes.as_ref(),
                self.attributes_json.as_ref(),
            )?;
        }
        buf.push(b'}');
        Ok(())
    }
}

/// A common block paired with the metrics it applies to
///
/// The common block is reference-counted so that the halves produced by
/// [`MetricBatch::split`] share it rather than copying its attributes.
#[derive(Debug, Clone, Default)]
pub struct MetricBatch {
    common: Option<Arc<CommonBlock>>,
    metrics: Vec<Metric>,
}

impl MetricBatch {
    /// Create a batch without a common block
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self {
            common: None,
            metrics,
        }
    }

    /// Create a batch whose metrics share `common`
    pub fn with_common(common: impl Into<Arc<CommonBlock>>, metrics: Vec<Metric>) -> Self {
        Self {
            common: Some(common.into()),
            metrics,
        }
    }

    pub fn common(&self) -> Option<&Arc<CommonBlock>> {
        self.common.as_ref()
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Append a metric, keeping insertion order
    pub fn push(&mut self, metric: impl Into<Metric>) {
        self.metrics.push(metric.into());
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Split the batch into two halves at the midpoint
    ///
    /// Returns `None` when the batch holds fewer than two metrics. Otherwise the first
    /// half holds `len / 2` metrics and the second the rest, both in their original
    /// order and both sharing this batch's common block.
    pub fn split(&self) -> Option<(MetricBatch, MetricBatch)> {
        if self.metrics.len() < 2 {
            return None;
        }

        let mid = self.metrics.len() / 2;
        let (first_half, second_half) = self.metrics.split_at(mid);
        Some((
            MetricBatch {
                common: self.common.clone(),
                metrics: first_half.to_vec(),
            },
            MetricBatch {
                common: self.common.clone(),
                metrics: second_half.to_vec(),
            },
        ))
    }

    /// Append this batch's envelope element, `{"common":{...},"metrics":[...]}`.
    pub(crate) fn write_json(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.push(b'{');
        {
            let mut w = ObjectWriter::new(buf);
            if let Some(common) = &self.common {
                let buf = w.key("common")?;
                common.write_json(buf)?;
            }

            let buf = w.key("metrics")?;
            buf.push(b'[');
            for (i, metric) in self.metrics.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                metric.write_json(buf)?;
            }
            buf.push(b']');
        }
        buf.push(b'}');
        Ok(())
    }
}

/// Encode batches as the top-level JSON array sent in one request body.
pub(crate) fn write_envelope(buf: &mut Vec<u8>, batches: &[MetricBatch]) -> io::Result<()> {
    buf.push(b'[');
    for (i, batch) in batches.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        batch.write_json(buf)?;
    }
    buf.push(b']');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Count;

    fn counts(n: usize) -> Vec<Metric> {
        (0..n)
            .map(|i| Count::builder().name(format!("c{}", i)).build().into())
            .collect()
    }

    fn envelope(batches: &[MetricBatch]) -> String {
        let mut buf = Vec::new();
        write_envelope(&mut buf, batches).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_split_too_small() {
        assert!(MetricBatch::default().split().is_none());
        assert!(MetricBatch::new(vec![Count::default().into()]).split().is_none());
    }

    #[test]
    fn test_split_halves() {
        let common = Arc::new(CommonBlock::default());
        for n in 2..=9 {
            let batch = MetricBatch::with_common(common.clone(), counts(n));
            let (first, second) = batch.split().expect("batch of two or more should split");

            assert_eq!(first.len(), n / 2);
            assert_eq!(first.len() + second.len(), n);
            assert!(second.len() - first.len() <= 1);

            let rejoined: Vec<Metric> = first
                .metrics()
                .iter()
                .chain(second.metrics())
                .cloned()
                .collect();
            assert_eq!(rejoined, batch.metrics());

            assert!(Arc::ptr_eq(first.common().unwrap(), &common));
            assert!(Arc::ptr_eq(second.common().unwrap(), &common));
        }
    }

    #[test]
    fn test_split_without_common() {
        let batch = MetricBatch::new(counts(3));
        let (first, second) = batch.split().unwrap();
        assert!(first.common().is_none());
        assert!(second.common().is_none());
        assert_eq!(
            envelope(&[first]),
            r#"[{"metrics":[{"name":"c0","type":"count","value":0}]}]"#
        );
        assert_eq!(
            envelope(&[second]),
            r#"[{"metrics":[{"name":"c1","type":"count","value":0},{"name":"c2","type":"count","value":0}]}]"#
        );
    }

    #[test]
    fn test_empty_common_block_is_kept() {
        let batch = MetricBatch::with_common(CommonBlock::default(), vec![]);
        assert_eq!(envelope(&[batch]), r#"[{"common":{},"metrics":[]}]"#);
        assert_eq!(
            envelope(&[MetricBatch::default()]),
            r#"[{"metrics":[]}]"#
        );
    }

    #[test]
    fn test_empty_envelope() {
        assert_eq!(envelope(&[]), "[]");
    }
}
