//! Example building compressed metric requests and sending them with reqwest

use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use telemetry_ergonomic::{
    CommonBlock, Count, Gauge, MetricBatch, MetricRequestFactory, Summary,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Reads NEW_RELIC_API_KEY and optionally NEW_RELIC_METRIC_URL
    let factory = MetricRequestFactory::from_env()?;

    let now = Utc::now();
    let common = CommonBlock::builder()
        .timestamp(now)
        .interval(Duration::from_secs(10))
        .attributes(HashMap::from([
            ("service".to_string(), "checkout".into()),
            ("replicas".to_string(), 3u8.into()),
        ]))
        .build();

    let batch = MetricBatch::with_common(
        common,
        vec![
            Count::builder().name("http.requests").value(1280.0).build().into(),
            Gauge::builder()
                .name("memory.used")
                .value(512.5)
                .timestamp(now)
                .build()
                .into(),
            Summary::builder()
                .name("http.latency")
                .count(1280.0)
                .sum(64_000.0)
                .min(3.0)
                .max(410.0)
                .build()
                .into(),
        ],
    );

    let requests = factory.build_requests(&[batch])?;
    println!("Built {} request(s)", requests.len());

    let client = reqwest::Client::new();
    for request in requests {
        println!(
            "Sending {} metrics ({} bytes compressed, {} bytes uncompressed)",
            request.metric_count(),
            request.content_length(),
            request.uncompressed_len()
        );
        let response = client.execute(request.into_reqwest(&client)?).await?;
        println!("Response status: {}", response.status());
    }

    Ok(())
}
