//! Tests for the JSON envelope produced by the request factory

use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;
use telemetry_ergonomic::{
    CommonBlock, Count, Gauge, MetricBatch, MetricRequest, MetricRequestFactory, RawAttributes,
    Summary,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 11, 28, 1, 1, 0).unwrap()
}

/// Strip insignificant whitespace from a hand-formatted JSON literal
fn compact(json: &str) -> String {
    serde_json::from_str::<serde_json::Value>(json).expect("expected JSON is valid");
    json.split_whitespace().collect()
}

fn inflate(body: &[u8]) -> String {
    let mut decoder = GzDecoder::new(body);
    let mut out = String::new();
    decoder.read_to_string(&mut out).expect("body is valid gzip");
    out
}

fn factory() -> MetricRequestFactory {
    MetricRequestFactory::builder()
        .build()
        .expect("default configuration is valid")
}

fn single_request(batches: &[MetricBatch]) -> MetricRequest {
    let mut requests = factory().build_requests(batches).unwrap();
    assert_eq!(requests.len(), 1);
    requests.remove(0)
}

fn assert_batch_json(batches: &[MetricBatch], expect: &str) {
    let request = single_request(batches);
    assert_eq!(inflate(request.body()), compact(expect));
}

#[test]
fn test_metrics_end_to_end() {
    let metrics = vec![
        Summary::builder()
            .name("mySummary")
            .attributes(HashMap::from([("attribute".to_string(), "string".into())]))
            .count(3.0)
            .sum(15.0)
            .min(4.0)
            .max(6.0)
            .timestamp(start())
            .interval(Duration::from_secs(5))
            .build()
            .into(),
        Gauge::builder()
            .name("myGauge")
            .attributes(HashMap::from([("attribute".to_string(), true.into())]))
            .value(12.3)
            .timestamp(start())
            .build()
            .into(),
        Count::builder()
            .name("myCount")
            .attributes(HashMap::from([("attribute".to_string(), 123.into())]))
            .value(100.0)
            .timestamp(start())
            .interval(Duration::from_secs(5))
            .build()
            .into(),
    ];
    let common = CommonBlock::builder()
        .attributes_json(r#"{"zip":"zap"}"#)
        .build();

    let expect = compact(
        r#"[{
            "common":{
                "attributes":{"zip":"zap"}
            },
            "metrics":[
                {
                    "name":"mySummary",
                    "type":"summary",
                    "value":{"sum":15,"count":3,"min":4,"max":6},
                    "timestamp":1417136460000,
                    "interval.ms":5000,
                    "attributes":{"attribute":"string"}
                },
                {
                    "name":"myGauge",
                    "type":"gauge",
                    "value":12.3,
                    "timestamp":1417136460000,
                    "attributes":{"attribute":true}
                },
                {
                    "name":"myCount",
                    "type":"count",
                    "value":100,
                    "timestamp":1417136460000,
                    "interval.ms":5000,
                    "attributes":{"attribute":123}
                }
            ]
        }]"#,
    );

    let request = single_request(&[MetricBatch::with_common(common, metrics)]);

    // The body can be read for inspection and again for transmission.
    let mut first_read = Vec::new();
    request.body_reader().read_to_end(&mut first_read).unwrap();
    assert_eq!(inflate(&first_read), expect);

    let mut second_read = Vec::new();
    request.body_reader().read_to_end(&mut second_read).unwrap();
    assert_eq!(first_read, second_read);
    assert_eq!(second_read.len(), request.content_length());
    assert_eq!(request.headers()["content-length"], request.content_length().to_string().as_str());
    assert_eq!(inflate(&second_read), expect);

    assert_eq!(request.uncompressed_len(), expect.len());
    assert_eq!(request.metric_count(), 3);
}

#[test]
fn test_count_attributes_json() {
    let batch = MetricBatch::new(vec![Count::builder()
        .name("")
        .attributes(HashMap::from([("zip".to_string(), "zap".into())]))
        .attributes_json(r#"{"zing":"zang"}"#)
        .build()
        .into()]);
    assert_batch_json(
        &[batch],
        r#"[{"metrics":[{"name":"","type":"count","value":0,"attributes":{"zing":"zang"}}]}]"#,
    );

    let batch = MetricBatch::new(vec![Count::builder()
        .name("")
        .attributes(HashMap::from([("zip".to_string(), "zap".into())]))
        .build()
        .into()]);
    assert_batch_json(
        &[batch],
        r#"[{"metrics":[{"name":"","type":"count","value":0,"attributes":{"zip":"zap"}}]}]"#,
    );
}

#[test]
fn test_gauge_attributes_json() {
    let batch = MetricBatch::new(vec![Gauge::builder()
        .name("")
        .attributes(HashMap::from([("zip".to_string(), "zap".into())]))
        .attributes_json(r#"{"zing":"zang"}"#)
        .timestamp(start())
        .build()
        .into()]);
    assert_batch_json(
        &[batch],
        r#"[{"metrics":[{"name":"","type":"gauge","value":0,"timestamp":1417136460000,"attributes":{"zing":"zang"}}]}]"#,
    );
}

#[test]
fn test_summary_attributes_json() {
    let batch = MetricBatch::new(vec![Summary::builder()
        .name("")
        .attributes(HashMap::from([("zip".to_string(), "zap".into())]))
        .attributes_json(r#"{"zing":"zang"}"#)
        .build()
        .into()]);
    assert_batch_json(
        &[batch],
        r#"[{"metrics":[{"name":"","type":"summary","value":{"sum":0,"count":0,"min":0,"max":0},"attributes":{"zing":"zang"}}]}]"#,
    );
}

#[test]
fn test_batch_attributes_json() {
    let common = CommonBlock::builder()
        .attributes_json(r#"{"zing":"zang"}"#)
        .build();
    assert_batch_json(
        &[MetricBatch::with_common(common, vec![])],
        r#"[{"common":{"attributes":{"zing":"zang"}},"metrics":[]}]"#,
    );
}

#[test]
fn test_common_block_fields() {
    let cases: Vec<(CommonBlock, &str)> = vec![
        (CommonBlock::default(), r#"[{"common":{},"metrics":[]}]"#),
        (
            CommonBlock::builder().timestamp(start()).build(),
            r#"[{"common":{"timestamp":1417136460000},"metrics":[]}]"#,
        ),
        (
            CommonBlock::builder()
                .interval(Duration::from_secs(5))
                .build(),
            r#"[{"common":{"interval.ms":5000},"metrics":[]}]"#,
        ),
        (
            CommonBlock::builder()
                .timestamp(start())
                .interval(Duration::from_secs(5))
                .build(),
            r#"[{"common":{"timestamp":1417136460000,"interval.ms":5000},"metrics":[]}]"#,
        ),
        (
            CommonBlock::builder()
                .attributes_json(RawAttributes::default())
                .build(),
            r#"[{"common":{},"metrics":[]}]"#,
        ),
        (
            CommonBlock::builder()
                .attributes(HashMap::new())
                .build(),
            r#"[{"common":{},"metrics":[]}]"#,
        ),
        (
            CommonBlock::builder()
                .attributes_json(r#"{"zip":"zap"}"#)
                .build(),
            r#"[{"common":{"attributes":{"zip":"zap"}},"metrics":[]}]"#,
        ),
    ];

    for (common, expect) in cases {
        assert_batch_json(&[MetricBatch::with_common(common, vec![])], expect);
    }
}

#[test]
fn test_missing_common_block_omits_key() {
    assert_batch_json(&[MetricBatch::default()], r#"[{"metrics":[]}]"#);
}

#[test]
fn test_multiple_batches_share_one_envelope() {
    let common = CommonBlock::builder()
        .timestamp(start())
        .interval(Duration::from_secs(5))
        .attributes_json(r#"{"zup":"wup"}"#)
        .build();

    let first = MetricBatch::with_common(
        common,
        vec![Summary::builder()
            .name("foo")
            .attributes(HashMap::from([("zip".to_string(), "zap".into())]))
            .build()
            .into()],
    );
    let second = MetricBatch::new(vec![Summary::builder().name("bar").build().into()]);

    assert_batch_json(
        &[first, second],
        r#"[
            {
                "common": {
                    "timestamp":1417136460000,
                    "interval.ms":5000,
                    "attributes": {"zup":"wup"}
                },
                "metrics":[
                    {
                        "name":"foo",
                        "type":"summary",
                        "value":{"sum":0,"count":0,"min":0,"max":0},
                        "attributes":{"zip":"zap"}
                    }
                ]
            },
            {
                "metrics":[
                    {
                        "name":"bar",
                        "type":"summary",
                        "value":{"sum":0,"count":0,"min":0,"max":0}
                    }
                ]
            }
        ]"#,
    );
}

#[test]
fn test_envelope_with_map_attributes_parses() {
    let mut attributes = HashMap::new();
    attributes.insert("host".to_string(), "web-1".into());
    attributes.insert("cpus".to_string(), 8u8.into());
    attributes.insert("load".to_string(), 0.25f32.into());

    let common = CommonBlock::builder().attributes(attributes).build();
    let batch = MetricBatch::with_common(
        common,
        vec![Gauge::builder().name("load").value(0.25).build().into()],
    );

    let request = single_request(&[batch]);
    let parsed: serde_json::Value = serde_json::from_str(&inflate(request.body())).unwrap();
    assert_eq!(
        parsed,
        serde_json::json!([{
            "common": {"attributes": {"host": "web-1", "cpus": 8, "load": 0.25}},
            "metrics": [{"name": "load", "type": "gauge", "value": 0.25}]
        }])
    );
}

#[test]
fn test_no_batches_no_requests() {
    let requests = factory().build_requests(&[]).unwrap();
    assert!(requests.is_empty());
}
