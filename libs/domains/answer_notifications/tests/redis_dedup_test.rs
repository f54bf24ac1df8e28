//! `RedisDedupStore` against a real Redis container.
//!
//! Ignored by default: run with `cargo test -- --ignored` where a container
//! runtime is available.

use domain_answer_notifications::{
    DedupRecord, DedupStore, EmailMessage, EventKind, RedisDedupStore, dedup_key,
};
use redis::AsyncCommands;
use test_utils::TestRedis;

fn email(text: &str) -> EmailMessage {
    EmailMessage {
        recipient: "jane@x.com".to_string(),
        subject: "Your question 'meaning of cat' on bh7cw.me has been answered".to_string(),
        html_body: format!("<p>{}</p>", text),
        text_body: text.to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires a container runtime
async fn test_insert_if_absent_claims_once() {
    let redis = TestRedis::new().await;
    let store = RedisDedupStore::new(redis.connection_manager().await);

    let email = email("Hi Jane, lovely");
    let key = dedup_key(&redis.key_prefix("claims_once"), &email);
    let record = DedupRecord::new(key.clone(), EventKind::Created, &email);

    assert!(!store.exists(&key).await.unwrap());
    assert!(store.insert_if_absent(&record).await.unwrap());
    assert!(!store.insert_if_absent(&record).await.unwrap());
    assert!(store.exists(&key).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires a container runtime
async fn test_insert_is_idempotent_and_keeps_first_record() {
    let redis = TestRedis::new().await;
    let store = RedisDedupStore::new(redis.connection_manager().await);

    let email = email("Hi Jane, updated");
    let key = dedup_key(&redis.key_prefix("idempotent"), &email);
    let first = DedupRecord::new(key.clone(), EventKind::Updated, &email);

    store.insert(&first).await.unwrap();
    store
        .insert(&DedupRecord::new(key.clone(), EventKind::Updated, &email))
        .await
        .unwrap();

    let mut conn = redis.connection_manager().await;
    let stored: String = conn.get(&key).await.unwrap();
    let stored: DedupRecord = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored, first);

    let ttl: i64 = conn.ttl(&key).await.unwrap();
    assert_eq!(ttl, -1, "dedup records never expire");
}

#[tokio::test]
#[ignore] // Requires a container runtime
async fn test_concurrent_claims_have_one_winner() {
    let redis = TestRedis::new().await;
    let store = RedisDedupStore::new(redis.connection_manager().await);

    let email = email("Hi Jane, raced");
    let key = dedup_key(&redis.key_prefix("race"), &email);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let record = DedupRecord::new(key.clone(), EventKind::Created, &email);
            tokio::spawn(async move { store.insert_if_absent(&record).await.unwrap() })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
