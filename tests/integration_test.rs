use perfume_catalog::{
    config::AppConfig,
    db::{self, PgCatalog, PgScrapeQueue},
    models::perfume::{Gender, NotesPyramid, PerfumePatch, ScrapedPerfume},
    models::queue::QueueStatus,
    services::{catalog::CatalogStore, queue::ScrapeQueue},
};
use sqlx::PgPool;
use uuid::Uuid;

/// Connect and migrate using DATABASE_URL.
///
/// Note: these tests require a disposable PostgreSQL database. The queue
/// test clears the scrape queue table.
async fn pool() -> PgPool {
    let config = AppConfig::from_env().expect("Failed to load config");
    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn unique_url(slug: &str) -> String {
    format!(
        "https://www.fragrantica.com/perfume/Integration/{}-{}.html",
        slug,
        Uuid::new_v4().as_u128() % 1_000_000
    )
}

fn scraped(url: &str, name: &str) -> ScrapedPerfume {
    ScrapedPerfume {
        id: Uuid::new_v4(),
        source_url: url.to_string(),
        name: name.to_string(),
        brand: "Integration House".to_string(),
        year: Some(1999),
        perfumer: None,
        perfumer_image: None,
        gender: None,
        concentration: Some("Eau de Parfum".to_string()),
        notes: NotesPyramid {
            top: vec!["Bergamot".to_string()],
            heart: vec![],
            base: vec!["Musk".to_string()],
        },
        accords: vec!["citrus".to_string()],
        description: None,
        image_url: None,
        rating: Some(4.2),
        longevity: None,
        sillage: None,
        season_usage: None,
        scraped_at: chrono::Utc::now(),
    }
}

/// Queue lifecycle against PostgreSQL: idempotent enqueue, claim order,
/// requeue position, stuck recovery, retries and clearing.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_queue_lifecycle() {
    let pool = pool().await;
    let queue = PgScrapeQueue::new(pool.clone());
    queue.clear(None).await.expect("Failed to clear queue");

    let first = unique_url("First");
    let second = unique_url("Second");
    let third = unique_url("Third");
    let urls = vec![first.clone(), second.clone(), third.clone()];

    assert_eq!(queue.enqueue(&urls).await.unwrap(), 3);
    assert_eq!(queue.enqueue(&urls).await.unwrap(), 0);

    let claimed = queue.dequeue_next().await.unwrap().unwrap();
    assert_eq!(claimed.url, first);
    assert_eq!(claimed.status, QueueStatus::Processing);
    queue.mark_done(&first).await.unwrap();

    let claimed = queue.dequeue_next().await.unwrap().unwrap();
    assert_eq!(claimed.url, second);
    queue.mark_pending(&second).await.unwrap();

    // A requeued entry keeps its place ahead of later entries.
    let claimed = queue.dequeue_next().await.unwrap().unwrap();
    assert_eq!(claimed.url, second);
    assert_eq!(claimed.retry_count, 1);
    queue.mark_failed(&second, "navigation failed").await.unwrap();

    let stuck = queue.dequeue_next().await.unwrap().unwrap();
    assert_eq!(stuck.url, third);
    assert_eq!(queue.reset_stuck().await.unwrap(), 1);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.done, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processing, 0);

    let failed = queue.get(&second).await.unwrap().unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("navigation failed"));
    assert_eq!(queue.retry_failed().await.unwrap(), 1);
    assert_eq!(queue.get(&second).await.unwrap().unwrap().retry_count, 2);

    assert_eq!(queue.enqueue_rescrape(&[first.clone()]).await.unwrap(), 1);
    let forced = queue.get(&first).await.unwrap().unwrap();
    assert_eq!(forced.status, QueueStatus::Pending);
    assert!(forced.force_rescrape);

    assert_eq!(queue.clear(Some(QueueStatus::Pending)).await.unwrap(), 3);
    assert_eq!(queue.stats().await.unwrap().total(), 0);
}

/// Catalog upsert merge rules, incomplete listing and patching.
#[tokio::test]
#[ignore]
async fn test_catalog_upsert_and_patch() {
    let pool = pool().await;
    let catalog = PgCatalog::new(pool.clone());
    let url = unique_url("Catalog");

    assert!(!catalog.exists_by_source_url(&url).await.unwrap());

    let first = catalog.upsert(&scraped(&url, "Original")).await.unwrap();
    assert_eq!(first.gender, Gender::Unisex);
    assert!(catalog.exists_by_source_url(&url).await.unwrap());
    assert!(catalog.all_source_urls().await.unwrap().contains(&url));

    // Absent scalars keep stored values; lists are replaced.
    let mut sparse = scraped(&url, "Renamed");
    sparse.year = None;
    sparse.rating = None;
    sparse.accords = vec!["woody".to_string()];
    let merged = catalog.upsert(&sparse).await.unwrap();
    assert_eq!(merged.id, first.id);
    assert_eq!(merged.name, "Renamed");
    assert_eq!(merged.year, Some(1999));
    assert_eq!(merged.rating, Some(4.2));
    assert_eq!(merged.accords, vec!["woody"]);

    let incomplete = catalog.get_incomplete(5000).await.unwrap();
    assert!(incomplete.iter().any(|r| r.id == first.id));

    let patch = PerfumePatch {
        perfumer: Some("Test Nose".to_string()),
        gender: Some(Gender::Feminine),
        ..Default::default()
    };
    let patched = catalog.update(first.id, &patch).await.unwrap().unwrap();
    assert_eq!(patched.perfumer.as_deref(), Some("Test Nose"));
    assert_eq!(patched.gender, Gender::Feminine);
    assert_eq!(patched.name, "Renamed");

    let fetched = catalog.get_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(fetched, patched);
    assert!(catalog.update(Uuid::new_v4(), &patch).await.unwrap().is_none());
}
