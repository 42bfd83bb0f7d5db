//! Load testing for the gateway.

use std::time::Instant;

mod common;

#[tokio::test]
async fn test_load_performance() {
    let backend = common::start_programmable_backend(|request| async move {
        (200, String::from_utf8_lossy(&request.body).into_owned())
    })
    .await;
    let policy = common::start_mock_policy(&[("echo", 2_000)]).await;
    let gw = common::spawn_gateway(common::config(policy, &[("echo", backend)])).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task_id in 0..concurrency {
        let client = client.clone();
        let url = gw.url("/echo/say");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let payload = format!("{task_id}-{i}");
                let req_start = Instant::now();
                if let Ok(res) = client.post(&url).body(payload.clone()).send().await {
                    if res.status().is_success() && res.text().await.ok().as_deref() == Some(payload.as_str()) {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every call should echo its payload");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    gw.shutdown.trigger();
}
