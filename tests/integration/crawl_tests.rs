//! Integration tests for the crawler
//!
//! These tests use wiremock to create a mock catalog and run the full
//! plan / crawl / merge cycle end-to-end against it.

use fotis_harvest::config::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, RetryConfig, SubjectEntry, SubjectsConfig,
    UserAgentConfig,
};
use fotis_harvest::crawler::{Coordinator, CrawlReport};
use fotis_harvest::storage::{ParquetStore, RecordStore};
use fotis_harvest::{HarvestError, PhotoRecord};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(server_uri: &str, store_path: &Path) -> Config {
    Config {
        catalog: CatalogConfig {
            listing_url: format!("{}/search", server_uri),
            page_param: "page".to_string(),
            first_page: 0,
            page_count_fallback: None,
        },
        crawler: CrawlerConfig {
            workers: 3,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 300, // Short so delayed mocks time out
        },
        retry: RetryConfig {
            base_delay_ms: 10,
            max_delay_ms: 50,
            max_attempts: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        },
        output: OutputConfig {
            store_path: store_path.display().to_string(),
        },
        subjects: None,
    }
}

/// Builds a listing page with one row per image id
fn listing_page(ids: &[u32]) -> String {
    let rows: String = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let class = if i % 2 == 0 { "odd" } else { "even" };
            format!(
                r#"<tr class="{class}">
                    <td>Photo {id}</td><td>Tallinn</td><td>1935</td>
                    <td>Unknown</td><td>EFA.{id}</td>
                    <td><a class="popup_image" href="/img/{id}.jpg">view</a></td>
                </tr>"#
            )
        })
        .collect();

    format!(
        r#"<html><body><table class="results">
            <tr><th>Kirjeldus</th><th>Asukoht</th></tr>
            {rows}
        </table></body></html>"#
    )
}

async fn mount_page(server: &MockServer, page: u32, ids: &[u32]) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(ids)))
        .mount(server)
        .await;
}

fn stored(store_path: &Path) -> Vec<PhotoRecord> {
    ParquetStore::new(store_path)
        .load()
        .expect("Failed to read snapshot")
        .expect("Snapshot should exist")
}

fn pages_of(records: &[PhotoRecord]) -> Vec<u32> {
    let mut pages: Vec<u32> = records.iter().filter_map(|r| r.page_index).collect();
    pages.sort_unstable();
    pages
}

#[tokio::test]
async fn test_full_crawl_writes_snapshot() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, &[1, 2]).await;
    mount_page(&mock_server, 1, &[3]).await;
    mount_page(&mock_server, 2, &[4, 5, 6]).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let report = coordinator
        .run_with_page_count(3)
        .await
        .expect("Crawl failed");

    assert_eq!(report.planned, 3);
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.new_records, 6);
    assert_eq!(report.stored_records, 6);
    assert!(!report.cancelled);

    let records = stored(&store_path);
    assert_eq!(records.len(), 6);
    assert_eq!(pages_of(&records), vec![0, 0, 1, 2, 2, 2]);

    let photo = records
        .iter()
        .find(|r| r.image_href == "/img/3.jpg")
        .expect("Record for image 3 missing");
    assert_eq!(photo.description.as_deref(), Some("Photo 3"));
    assert_eq!(photo.location.as_deref(), Some("Tallinn"));
    assert_eq!(photo.external_id.as_deref(), Some("EFA.3"));
    assert_eq!(photo.page_index, Some(1));
}

#[tokio::test]
async fn test_resume_skips_stored_pages() {
    let mock_server = MockServer::start().await;

    // Page 0 is already stored and must not be requested again
    Mock::given(method("GET"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[99])))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 1, &[10, 11]).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");

    let prior = PhotoRecord::from_cells(
        [
            "Old photo".to_string(),
            "Tartu".to_string(),
            String::new(),
            String::new(),
            "EFA.1".to_string(),
        ],
        "/img/1.jpg".to_string(),
    )
    .on_page(0);
    ParquetStore::new(&store_path)
        .save(&[prior])
        .expect("Failed to write prior snapshot");

    let config = create_test_config(&mock_server.uri(), &store_path);
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let report = coordinator
        .run_with_page_count(2)
        .await
        .expect("Crawl failed");

    assert_eq!(report.planned, 1);
    assert_eq!(report.new_records, 2);
    assert_eq!(report.stored_records, 3);
    assert_eq!(report.replaced_records, 0);

    let records = stored(&store_path);
    assert_eq!(pages_of(&records), vec![0, 1, 1]);
    let old = records
        .iter()
        .find(|r| r.page_index == Some(0))
        .expect("Prior record lost");
    assert_eq!(old.description.as_deref(), Some("Old photo"));
    assert_eq!(old.date, None);
}

#[tokio::test]
async fn test_second_run_requests_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[1])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let first = Coordinator::new(config.clone())
        .expect("Failed to create coordinator")
        .run_with_page_count(2)
        .await
        .expect("First crawl failed");
    assert_eq!(first.stored_records, 2);

    let second = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_with_page_count(2)
        .await
        .expect("Second crawl failed");

    assert_eq!(
        second,
        CrawlReport {
            stored_records: 2,
            ..CrawlReport::default()
        }
    );
    assert_eq!(stored(&store_path).len(), 2);
}

#[tokio::test]
async fn test_http_error_page_is_left_for_next_run() {
    let mock_server = MockServer::start().await;

    // Non-200 responses are not retried
    Mock::given(method("GET"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 1, &[5, 6]).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_with_page_count(2)
        .await
        .expect("Crawl failed");

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retries, 0);

    let records = stored(&store_path);
    assert_eq!(pages_of(&records), vec![1, 1]);
}

#[tokio::test]
async fn test_timed_out_page_is_retried() {
    let mock_server = MockServer::start().await;

    // First two requests for page 0 exceed the request timeout; their
    // content must never reach the store
    Mock::given(method("GET"))
        .and(query_param("page", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[99]))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 0, &[1]).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_with_page_count(1)
        .await
        .expect("Crawl failed");

    assert_eq!(report.failed, 0);
    assert_eq!(report.retries, 2);
    assert_eq!(report.stored_records, 1);

    let records = stored(&store_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].image_href, "/img/1.jpg");
    assert_eq!(records[0].external_id.as_deref(), Some("EFA.1"));
}

#[tokio::test]
async fn test_page_without_rows_contributes_nothing() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, &[1, 2]).await;
    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Maintenance</body></html>"),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_with_page_count(2)
        .await
        .expect("Crawl failed");

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);

    let records = stored(&store_path);
    assert_eq!(pages_of(&records), vec![0, 0]);
}

#[tokio::test]
async fn test_run_discovers_page_count() {
    let mock_server = MockServer::start().await;

    // The probe of page 1 carries the pagination block
    let probe = format!(
        r#"{}<ul class="pager"><li class="last"><a href="/search?page=2">»</a></li></ul>"#,
        listing_page(&[3])
    );
    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(probe))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 0, &[1, 2]).await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[4])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    // Pages 0 and 1 are planned; the last-page number is the count
    assert_eq!(report.planned, 2);
    assert_eq!(pages_of(&stored(&store_path)), vec![0, 0, 1]);
}

#[tokio::test]
async fn test_failed_discovery_without_fallback_aborts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let config = create_test_config(&mock_server.uri(), &store_path);

    let result = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run()
        .await;

    assert!(matches!(result, Err(HarvestError::Discovery(_))));
    assert!(!store_path.exists());
}

#[tokio::test]
async fn test_failed_discovery_uses_fallback() {
    let mock_server = MockServer::start().await;

    // No pagination block on the probe page
    mount_page(&mock_server, 0, &[1]).await;
    mount_page(&mock_server, 1, &[2]).await;
    mount_page(&mock_server, 2, &[3]).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    let mut config = create_test_config(&mock_server.uri(), &store_path);
    config.catalog.page_count_fallback = Some(3);

    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.planned, 3);
    assert_eq!(report.stored_records, 3);
}

#[tokio::test]
async fn test_unreadable_snapshot_is_not_overwritten() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[1])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("photos.parquet");
    std::fs::write(&store_path, b"not a parquet file").expect("Failed to write file");

    let config = create_test_config(&mock_server.uri(), &store_path);
    let result = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_with_page_count(2)
        .await;

    assert!(matches!(result, Err(HarvestError::Storage(_))));
    let content = std::fs::read(&store_path).expect("Failed to read file");
    assert_eq!(content, b"not a parquet file");
}

#[tokio::test]
async fn test_subject_crawl_writes_batches_and_final_file() {
    let mock_server = MockServer::start().await;
    for page in 1..=2 {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("m_messages", "1"))
            .and(query_param("search", "Endel Veliste"))
            .and(query_param("q", "1"))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&[page * 10, page * 10 + 1])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(query_param("search", "Harju"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[7])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let batch_dir = temp_dir.path().join("batches");
    let final_path = temp_dir.path().join("photo_details_final.parquet");

    let mut config = create_test_config(&mock_server.uri(), &temp_dir.path().join("unused.parquet"));
    config.subjects = Some(SubjectsConfig {
        batch_size: 2,
        batch_dir: batch_dir.display().to_string(),
        final_path: final_path.display().to_string(),
        max_attempts: 2,
        entries: vec![
            SubjectEntry {
                name: "Endel Veliste".to_string(),
                pages: 2,
            },
            SubjectEntry {
                name: "Harju".to_string(),
                pages: 1,
            },
        ],
    });

    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_subjects()
        .await
        .expect("Subject crawl failed");

    assert_eq!(report.planned, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.new_records, 5);
    assert_eq!(report.stored_records, 5);

    // Two full batches plus the remainder
    assert!(batch_dir.join("photo_details_batch_1.parquet").exists());
    assert!(batch_dir.join("photo_details_batch_2.parquet").exists());
    assert!(batch_dir.join("photo_details_batch_3.parquet").exists());

    let records = ParquetStore::without_page_index(&final_path)
        .load()
        .expect("Failed to read final file")
        .expect("Final file should exist");
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.page_index.is_none()));
}

#[tokio::test]
async fn test_subject_crawl_requires_subjects_section() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config("http://127.0.0.1:9", &temp_dir.path().join("p.parquet"));

    let result = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run_subjects()
        .await;

    assert!(matches!(result, Err(HarvestError::Config(_))));
}
