//! Pub/sub local loop: declare a subscriber, publish, observe delivery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use zenoh::{Sample, SampleKind};

use crate::{default_test_config, open_pair, wait_until};

#[tokio::test]
async fn subscriber_receives_exactly_one_matching_publication() {
    let (publisher, subscriber_side) = open_pair(&default_test_config()).await.unwrap();

    let received: Arc<Mutex<Vec<Sample>>> = Arc::new(Mutex::new(Vec::new()));
    let received2 = received.clone();
    subscriber_side
        .declare_subscriber("demo/example/**", move |s: Sample| {
            received2.lock().unwrap().push(s);
        })
        .await
        .unwrap();

    publisher.put("demo/example/k1", b"hello".to_vec()).await.unwrap();

    let got = wait_until(
        || received.lock().unwrap().len() == 1,
        Duration::from_secs(2),
        Duration::from_millis(20),
    )
    .await;
    assert!(got, "subscriber never received the publication");

    let samples = received.lock().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].key, "demo/example/k1");
    assert_eq!(samples[0].payload, b"hello");
    assert_eq!(samples[0].kind, SampleKind::Put);
}

#[tokio::test]
async fn non_intersecting_subscriber_never_fires() {
    let (publisher, subscriber_side) = open_pair(&default_test_config()).await.unwrap();

    let received = Arc::new(Mutex::new(0usize));
    let received2 = received.clone();
    subscriber_side
        .declare_subscriber("other/branch/**", move |_s: Sample| {
            *received2.lock().unwrap() += 1;
        })
        .await
        .unwrap();

    publisher.put("demo/example/k1", b"hello".to_vec()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*received.lock().unwrap(), 0);
}

#[tokio::test]
async fn delete_is_delivered_as_a_sample_with_empty_payload() {
    let (publisher, subscriber_side) = open_pair(&default_test_config()).await.unwrap();

    let received: Arc<Mutex<Vec<Sample>>> = Arc::new(Mutex::new(Vec::new()));
    let received2 = received.clone();
    subscriber_side
        .declare_subscriber("demo/example/k1", move |s: Sample| {
            received2.lock().unwrap().push(s);
        })
        .await
        .unwrap();

    publisher.delete("demo/example/k1").await.unwrap();
    let got = wait_until(
        || !received.lock().unwrap().is_empty(),
        Duration::from_secs(2),
        Duration::from_millis(20),
    )
    .await;
    assert!(got);
    let samples = received.lock().unwrap();
    assert_eq!(samples[0].kind, SampleKind::Delete);
    assert!(samples[0].payload.is_empty());
}

#[tokio::test]
async fn undeclared_subscriber_stops_receiving() {
    let (publisher, subscriber_side) = open_pair(&default_test_config()).await.unwrap();

    let received = Arc::new(Mutex::new(0usize));
    let received2 = received.clone();
    let sub_id = subscriber_side
        .declare_subscriber("demo/example/**", move |_s: Sample| {
            *received2.lock().unwrap() += 1;
        })
        .await
        .unwrap();

    publisher.put("demo/example/k1", b"one".to_vec()).await.unwrap();
    wait_until(
        || *received.lock().unwrap() == 1,
        Duration::from_secs(2),
        Duration::from_millis(20),
    )
    .await;

    subscriber_side.undeclare_subscriber(sub_id).await.unwrap();
    publisher.put("demo/example/k2", b"two".to_vec()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*received.lock().unwrap(), 1);
}
