mod common;

use audience_sync::db;
use audience_sync::dispatch::dispatch;
use audience_sync::model::{SegmentType, AUDIENCE_ENTERED};
use audience_sync::outbox::process_next_task;
use common::{company, segment, settings, user, RecordingDmp};
use serde_json::{json, Value};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

async fn make_due(pool: &sqlx::SqlitePool) {
    sqlx::query("UPDATE redrive_outbox SET due_at = datetime('now', '-1 seconds')")
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn retryable_batch_is_queued_then_redriven() {
    let pool = setup_pool().await;
    let dmp = RecordingDmp::with_segment("seg_1", SegmentType::User);
    dmp.push_update(404, Value::Null).await;

    let payloads = vec![
        user(Some("a@example.com"), AUDIENCE_ENTERED),
        user(Some("b@example.com"), AUDIENCE_ENTERED),
    ];
    let status = dispatch(&dmp, &settings(), Some(&pool), &payloads).await;
    assert_eq!(status.failure_count(), 2);
    assert_eq!(db::count_remaining(&pool).await.unwrap(), 1);

    let task = db::next_due(&pool).await.unwrap().unwrap();
    assert_eq!(task.kind, SegmentType::User);
    let stored: Vec<Value> = serde_json::from_str(&task.payloads).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1]["email"], "b@example.com");

    // First redrive: segment still not ready.
    dmp.push_fetch(Ok(vec![segment("seg_1", SegmentType::User)]))
        .await;
    dmp.push_update(404, Value::Null).await;
    assert!(process_next_task(&pool, &dmp, &settings(), 60).await.unwrap());
    assert_eq!(db::count_remaining(&pool).await.unwrap(), 1);
    assert_eq!(db::max_attempt(&pool).await.unwrap(), 1);
    assert!(!process_next_task(&pool, &dmp, &settings(), 60).await.unwrap());

    let last_error: Option<String> =
        sqlx::query_scalar("SELECT last_error FROM redrive_outbox LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(last_error.unwrap().contains("404"));

    // Second redrive succeeds and removes the task.
    make_due(&pool).await;
    dmp.push_fetch(Ok(vec![segment("seg_1", SegmentType::User)]))
        .await;
    dmp.push_update(200, json!({ "elements": [{ "status": 200 }, { "status": 200 }] }))
        .await;
    assert!(process_next_task(&pool, &dmp, &settings(), 60).await.unwrap());
    assert_eq!(db::count_remaining(&pool).await.unwrap(), 0);

    let updates = dmp.update_calls().await;
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|u| u.segment_id == "seg_1"));
    assert_eq!(updates[2].elements.len(), 2);
}

#[tokio::test]
async fn non_retryable_failures_are_not_queued() {
    let pool = setup_pool().await;
    let dmp = RecordingDmp::with_segment("seg_1", SegmentType::User);

    let payloads = [company(Some("acme.com"), None, true)];
    let status = dispatch(&dmp, &settings(), Some(&pool), &payloads).await;
    assert_eq!(status.failure_count(), 1);
    assert_eq!(db::count_remaining(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_queue_write_keeps_other_partitions() {
    // No migrations: every enqueue fails.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let dmp = RecordingDmp::default();
    dmp.push_fetch(Ok(vec![segment("seg_a", SegmentType::User)]))
        .await;
    dmp.push_fetch(Ok(vec![segment("seg_b", SegmentType::User)]))
        .await;
    dmp.push_fetch(Ok(vec![segment("seg_c", SegmentType::User)]))
        .await;
    dmp.push_update(200, json!({ "elements": [{ "status": 200 }] }))
        .await;
    dmp.push_update(503, json!({ "message": "segment not ready" }))
        .await;
    dmp.push_update(200, json!({ "elements": [{ "status": 200 }] }))
        .await;

    let mut second = user(Some("b@example.com"), AUDIENCE_ENTERED);
    second.source_segment_id = "audience_b".into();
    second.personas_audience_key = Some("audience_b".into());
    let mut third = user(Some("c@example.com"), AUDIENCE_ENTERED);
    third.source_segment_id = "audience_c".into();
    third.personas_audience_key = Some("audience_c".into());
    let payloads = vec![user(Some("a@example.com"), AUDIENCE_ENTERED), second, third];

    let status = dispatch(&dmp, &settings(), Some(&pool), &payloads).await;
    let results = status.into_results();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert_eq!(results[1].status(), 500);
    assert!(results[1]
        .error_message()
        .unwrap()
        .contains("could not be queued for retry"));
    assert!(results[2].is_success());
    assert_eq!(dmp.update_calls().await.len(), 3);
}

#[tokio::test]
async fn permanently_failing_task_is_dropped() {
    let pool = setup_pool().await;
    let mut bad = user(Some("a@example.com"), AUDIENCE_ENTERED);
    bad.personas_audience_key = Some("something_else".into());
    let body = serde_json::to_string(&vec![bad]).unwrap();
    db::enqueue(&pool, SegmentType::User, &body, chrono::Utc::now())
        .await
        .unwrap();

    let dmp = RecordingDmp::default();
    assert!(process_next_task(&pool, &dmp, &settings(), 60).await.unwrap());
    assert_eq!(db::count_remaining(&pool).await.unwrap(), 0);
    assert!(dmp.fetch_calls().await.is_empty());
}

#[tokio::test]
async fn corrupt_task_is_dropped() {
    let pool = setup_pool().await;
    db::enqueue(&pool, SegmentType::Company, "not json", chrono::Utc::now())
        .await
        .unwrap();

    let dmp = RecordingDmp::default();
    assert!(process_next_task(&pool, &dmp, &settings(), 60).await.unwrap());
    assert_eq!(db::count_remaining(&pool).await.unwrap(), 0);
}
