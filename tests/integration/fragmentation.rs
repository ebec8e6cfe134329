//! Fragmented publication. A payload well over the link MTU must arrive
//! at the subscriber as a single callback with the full, correctly
//! reassembled payload.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use zenoh::Sample;
use zenoh_protocol::config::TransportConfig;

use crate::{open_pair, wait_until};

fn repeating_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

#[tokio::test]
async fn large_payload_reassembles_into_one_callback() {
    let cfg = TransportConfig {
        lease_millis: 5_000,
        batch_size: 1500,
        ..TransportConfig::default()
    };
    let (publisher, subscriber_side) = open_pair(&cfg).await.unwrap();

    let received: Arc<Mutex<Vec<Sample>>> = Arc::new(Mutex::new(Vec::new()));
    let received2 = received.clone();
    subscriber_side
        .declare_subscriber("demo/example/big", move |s: Sample| {
            received2.lock().unwrap().push(s);
        })
        .await
        .unwrap();

    let payload = repeating_payload(100_000);
    publisher.put("demo/example/big", payload.clone()).await.unwrap();

    let got = wait_until(
        || !received.lock().unwrap().is_empty(),
        Duration::from_secs(5),
        Duration::from_millis(25),
    )
    .await;
    assert!(got, "fragmented publication never arrived");

    let samples = received.lock().unwrap();
    assert_eq!(samples.len(), 1, "payload must be dispatched exactly once");
    assert_eq!(samples[0].payload.len(), 100_000);
    assert_eq!(samples[0].payload, payload);
}

#[tokio::test]
async fn several_fragmented_publications_in_a_row_stay_distinct() {
    let cfg = TransportConfig {
        lease_millis: 5_000,
        batch_size: 1500,
        ..TransportConfig::default()
    };
    let (publisher, subscriber_side) = open_pair(&cfg).await.unwrap();

    let received: Arc<Mutex<Vec<Sample>>> = Arc::new(Mutex::new(Vec::new()));
    let received2 = received.clone();
    subscriber_side
        .declare_subscriber("demo/example/big", move |s: Sample| {
            received2.lock().unwrap().push(s);
        })
        .await
        .unwrap();

    let first = repeating_payload(50_000);
    let second = repeating_payload(60_000);
    publisher.put("demo/example/big", first.clone()).await.unwrap();
    publisher.put("demo/example/big", second.clone()).await.unwrap();

    let got = wait_until(
        || received.lock().unwrap().len() == 2,
        Duration::from_secs(5),
        Duration::from_millis(25),
    )
    .await;
    assert!(got, "expected two reassembled publications");
    let samples = received.lock().unwrap();
    assert_eq!(samples[0].payload, first);
    assert_eq!(samples[1].payload, second);
}
