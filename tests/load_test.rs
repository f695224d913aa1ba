//! Concurrent load against the telemetry pipeline.

use std::collections::HashSet;
use std::time::Instant;

use telemetry_pipeline::http::X_CORRELATION_ID;
use telemetry_pipeline::observability::LabelSet;

mod common;

#[tokio::test]
async fn test_load_keeps_telemetry_consistent() {
    let svc = common::start_service().await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = svc.url("/?name=Al");
        tasks.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client.get(&url).send().await.unwrap();
                assert!(res.status().is_success());
                let id = res.headers()[X_CORRELATION_ID]
                    .to_str()
                    .unwrap()
                    .to_string();
                results.push((id, req_start.elapsed()));
            }
            results
        }));
    }

    let mut ids = HashSet::new();
    let mut latencies = Vec::new();
    for task in tasks {
        for (id, latency) in task.await.unwrap() {
            ids.insert(id);
            latencies.push(latency);
        }
    }
    let duration = start.elapsed();

    // One distinct correlation id per request.
    assert_eq!(ids.len(), total_requests);

    let counter = LabelSet::new().with("method", "GET").with("endpoint", "/");
    assert_eq!(svc.metrics.counter(&counter), total_requests as u64);
    assert_eq!(svc.metrics.observation_count(), total_requests as u64);

    // Three spans per greeting request, each tagged with a known id.
    let spans = svc.spans.finished();
    assert_eq!(spans.len(), total_requests * 3);
    assert!(spans.iter().all(|s| ids.contains(s.correlation_id.as_str())));

    latencies.sort();
    let p50 = latencies[latencies.len() / 2];
    let p99 = latencies[(latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!(
        "Requests/sec:   {:.2}",
        total_requests as f64 / duration.as_secs_f64()
    );
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");
}
