use anyhow::anyhow;
use async_trait::async_trait;
use course_shop_sync::api::{AdminApi, ApiError};
use course_shop_sync::db::{self, NewCourse};
use course_shop_sync::runner::{
    BatchSyncDriver, LocalEndpoint, Progress, SyncEndpoint, DEFAULT_BATCH_SIZE,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

const TOKEN: &str = "test-token";

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

async fn add_course(pool: &sqlx::SqlitePool, title: &str, status: &str) -> i64 {
    db::insert_course(
        pool,
        &NewCourse {
            title: title.into(),
            description: "body".into(),
            excerpt: "blurb".into(),
            status: status.into(),
            category: None,
            price: Some(10.0),
            image_id: None,
        },
    )
    .await
    .unwrap()
}

#[derive(Clone, Default)]
struct RecordingEndpoint {
    pending: Option<Vec<i64>>,
    batch_responses: Arc<Mutex<VecDeque<Result<usize, ApiError>>>>,
    batches: Arc<Mutex<Vec<Vec<i64>>>>,
}

impl RecordingEndpoint {
    fn with_pending(ids: Vec<i64>) -> Self {
        Self {
            pending: Some(ids),
            ..Default::default()
        }
    }

    async fn push_responses(&self, responses: Vec<Result<usize, ApiError>>) {
        let mut guard = self.batch_responses.lock().await;
        guard.extend(responses);
    }

    async fn batches(&self) -> Vec<Vec<i64>> {
        self.batches.lock().await.clone()
    }
}

#[async_trait]
impl SyncEndpoint for RecordingEndpoint {
    async fn start_sync(&self) -> Result<Vec<i64>, ApiError> {
        match &self.pending {
            Some(ids) => Ok(ids.clone()),
            None => Err(ApiError::NothingToSync),
        }
    }

    async fn process_batch(&self, courses: &[i64]) -> Result<usize, ApiError> {
        self.batches.lock().await.push(courses.to_vec());
        let mut guard = self.batch_responses.lock().await;
        guard.pop_front().unwrap_or(Ok(courses.len()))
    }
}

// --- server side -----------------------------------------------------------

#[tokio::test]
async fn start_sync_lists_published_courses_in_order() {
    let pool = setup_pool().await;
    let a = add_course(&pool, "A", "publish").await;
    let _draft = add_course(&pool, "B", "draft").await;
    let c = add_course(&pool, "C", "publish").await;

    let api = AdminApi::new(pool.clone(), TOKEN);
    let ids = api.start_sync(TOKEN).await.unwrap();
    assert_eq!(ids, vec![a, c]);
}

#[tokio::test]
async fn start_sync_with_no_courses_is_an_error() {
    let pool = setup_pool().await;
    let api = AdminApi::new(pool.clone(), TOKEN);

    let err = api.start_sync(TOKEN).await.unwrap_err();
    assert!(matches!(err, ApiError::NothingToSync));
    assert_eq!(err.to_string(), "no courses found to sync");
}

#[tokio::test]
async fn wrong_token_is_denied() {
    let pool = setup_pool().await;
    add_course(&pool, "A", "publish").await;
    let api = AdminApi::new(pool.clone(), TOKEN);

    assert!(matches!(
        api.start_sync("nope").await.unwrap_err(),
        ApiError::PermissionDenied
    ));
    assert!(matches!(
        api.process_batch("nope", &[1]).await.unwrap_err(),
        ApiError::PermissionDenied
    ));
}

#[tokio::test]
async fn process_batch_skips_nonpositive_ids() {
    let pool = setup_pool().await;
    let a = add_course(&pool, "A", "publish").await;
    let b = add_course(&pool, "B", "publish").await;
    let api = AdminApi::new(pool.clone(), TOKEN);

    let processed = api.process_batch(TOKEN, &[a, 0, -3, b]).await.unwrap();
    assert_eq!(processed, 2);
    assert!(db::course_product_id(&pool, a).await.unwrap().is_some());
    assert!(db::course_product_id(&pool, b).await.unwrap().is_some());
}

#[tokio::test]
async fn process_batch_counts_positive_ids_even_when_unresolvable() {
    let pool = setup_pool().await;
    let a = add_course(&pool, "A", "publish").await;
    let api = AdminApi::new(pool.clone(), TOKEN);

    // A positive id that resolves to nothing is a mapper no-op but still counted.
    let processed = api.process_batch(TOKEN, &[a, 999_999]).await.unwrap();
    assert_eq!(processed, 2);
}

#[tokio::test]
async fn process_batch_rejects_an_empty_slice() {
    let pool = setup_pool().await;
    let api = AdminApi::new(pool.clone(), TOKEN);

    let err = api.process_batch(TOKEN, &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidBatch));
}

// --- client driver ---------------------------------------------------------

#[tokio::test]
async fn twenty_three_courses_run_in_three_batches() {
    let endpoint = RecordingEndpoint::with_pending((1..=23).collect());
    let mut driver = BatchSyncDriver::new(DEFAULT_BATCH_SIZE);

    let mut events = Vec::new();
    let report = driver.run(&endpoint, |p| events.push(p)).await;

    let batches = endpoint.batches().await;
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].len(), 10);
    assert_eq!(batches[1].len(), 10);
    assert_eq!(batches[2].len(), 3);
    assert_eq!(batches[0], (1..=10).collect::<Vec<i64>>());

    assert_eq!(report.total, 23);
    assert_eq!(report.processed, 23);
    assert!(report.completed);
    assert_eq!(report.error, None);

    assert_eq!(events.first(), Some(&Progress::Started { total: 23 }));
    match events.last() {
        Some(Progress::Step {
            processed,
            total,
            percent,
        }) => {
            assert_eq!(*processed, 23);
            assert_eq!(*total, 23);
            assert!((percent - 100.0).abs() < f64::EPSILON);
        }
        other => panic!("unexpected final event: {other:?}"),
    }
}

#[tokio::test]
async fn short_batch_counts_still_complete() {
    let endpoint = RecordingEndpoint::with_pending((1..=23).collect());
    endpoint
        .push_responses(vec![Ok(10), Ok(8), Ok(3)])
        .await;
    let mut driver = BatchSyncDriver::new(10);

    let report = driver.run(&endpoint, |_| {}).await;

    // Completion is local; a short count only dents the displayed total.
    assert!(report.completed);
    assert_eq!(report.processed, 21);
    assert_eq!(report.total, 23);
}

#[tokio::test]
async fn failure_halts_the_loop_and_keeps_prior_progress() {
    let endpoint = RecordingEndpoint::with_pending((1..=23).collect());
    endpoint
        .push_responses(vec![Ok(10), Err(ApiError::InvalidBatch)])
        .await;
    let mut driver = BatchSyncDriver::new(10);

    let report = driver.run(&endpoint, |_| {}).await;

    assert!(!report.completed);
    assert_eq!(report.processed, 10);
    assert_eq!(report.error.as_deref(), Some("invalid course list"));
    // The third slice was never sent.
    assert_eq!(endpoint.batches().await.len(), 2);
}

#[tokio::test]
async fn transport_failure_uses_the_generic_message() {
    let endpoint = RecordingEndpoint::with_pending(vec![1, 2, 3]);
    endpoint
        .push_responses(vec![Err(ApiError::Internal(anyhow!("connection reset")))])
        .await;
    let mut driver = BatchSyncDriver::new(10);

    let report = driver.run(&endpoint, |_| {}).await;

    assert_eq!(
        report.error.as_deref(),
        Some("the sync request to the server failed")
    );
}

#[tokio::test]
async fn failed_start_reports_the_server_message() {
    let endpoint = RecordingEndpoint::default();
    let mut driver = BatchSyncDriver::new(10);

    let report = driver.run(&endpoint, |_| {}).await;

    assert!(!report.completed);
    assert_eq!(report.error.as_deref(), Some("no courses found to sync"));
    assert!(endpoint.batches().await.is_empty());
}

#[tokio::test]
async fn full_sync_against_the_local_endpoint() {
    let pool = setup_pool().await;
    for i in 0..5 {
        add_course(&pool, &format!("Course {i}"), "publish").await;
    }
    let _draft = add_course(&pool, "Unpublished", "draft").await;

    let api = AdminApi::new(pool.clone(), TOKEN);
    let endpoint = LocalEndpoint::new(api, TOKEN);
    let mut driver = BatchSyncDriver::new(2);

    let mut steps = 0;
    let report = driver
        .run(&endpoint, |p| {
            if matches!(p, Progress::Step { .. }) {
                steps += 1;
            }
        })
        .await;

    assert!(report.completed);
    assert_eq!(report.total, 5);
    assert_eq!(report.processed, 5);
    assert_eq!(steps, 3);

    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(products, 5);
}
