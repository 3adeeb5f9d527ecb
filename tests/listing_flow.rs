//! Chain and location listings against the in-process mock service

mod support;

use chrono::NaiveDate;
use cxy_export::jobs::ExportError;
use cxy_export::listings::{BoundingBox, CHAIN_COLUMNS, ChainQuery, LocationQuery};
use cxy_export::storage::{ArtifactStore, save_records};
use serde_json::Value;
use support::MockChainXy;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn ids(records: &[Value]) -> Vec<u64> {
    records.iter().filter_map(|r| r["Id"].as_u64()).collect()
}

async fn seeded() -> MockChainXy {
    let mock = MockChainXy::start().await;
    mock.add_chain(1, "Acme", "2022-09-05T10:00:00");
    mock.add_chain(2, "Bolt", "2022-08-01T10:00:00");
    mock.add_chain(3, "Crest", "2022-09-10T10:00:00");

    // Five recent Acme locations spread over Ontario, one stale, one Crest
    for (id, lat, lng) in [
        (11, 43.6, -79.4),
        (12, 45.4, -75.7),
        (13, 42.3, -83.0),
        (14, 46.5, -84.3),
        (15, 44.2, -76.5),
    ] {
        mock.add_location(id, 1, lat, lng, "2022-09-03T00:00:00");
    }
    mock.add_location(16, 1, 43.0, -81.2, "2022-07-01T00:00:00");
    mock.add_location(31, 3, 43.7, -79.3, "2022-09-04T00:00:00");
    mock
}

#[tokio::test]
async fn test_chains_filtered_by_scrape_date_and_ids() {
    let mock = seeded().await;
    let orchestrator = mock.orchestrator();

    let recent = ChainQuery::builder().scraped_after(date("2022-09-01")).build();
    let chains = orchestrator
        .list_chains(&recent, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ids(&chains), vec![1, 3]);

    let only_crest = ChainQuery::builder()
        .scraped_after(date("2022-09-01"))
        .chain_ids(vec!["3".to_string()])
        .build();
    let chains = orchestrator
        .list_chains(&only_crest, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ids(&chains), vec![3]);

    // Key checked once per listing before the query goes out
    assert_eq!(mock.count("GET", "/api/Users/Me"), 2);
    assert_eq!(mock.count("GET", "/api/Chains"), 2);
}

#[tokio::test]
async fn test_no_matching_chains_is_an_empty_listing() {
    let mock = seeded().await;

    let query = ChainQuery::builder().scraped_after(date("2030-01-01")).build();
    let chains = mock
        .orchestrator()
        .list_chains(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert!(chains.is_empty());
}

#[tokio::test]
async fn test_locations_walk_every_page() {
    let mock = seeded().await;
    let orchestrator = mock.orchestrator();

    let query = LocationQuery::builder()
        .updated_after(date("2022-09-01"))
        .chain_ids(vec!["1".to_string()])
        .page_size(2)
        .build();
    let locations = orchestrator
        .list_locations(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&locations), vec![11, 12, 13, 14, 15]);
    assert_eq!(mock.count("GET", "/api/Locations"), 3);
    assert_eq!(orchestrator.metrics().snapshot().pages_fetched, 3);

    let pages: Vec<String> = mock
        .requests()
        .into_iter()
        .filter(|r| r.path == "/api/Locations")
        .filter_map(|r| r.query.get("Page").cloned())
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);

    let first = mock
        .requests()
        .into_iter()
        .find(|r| r.path == "/api/Locations")
        .unwrap();
    assert_eq!(first.query.get("chainIds").map(String::as_str), Some("1"));
    assert_eq!(first.query.get("LastUpdate").map(String::as_str), Some(">2022-09-01"));
    assert_eq!(first.query.get("Limit").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn test_bounds_narrow_the_listing() {
    let mock = seeded().await;

    // Roughly the Greater Toronto Area
    let query = LocationQuery::builder()
        .updated_after(date("2022-09-01"))
        .bounds(BoundingBox {
            north: 44.0,
            east: -79.0,
            south: 43.4,
            west: -80.0,
        })
        .build();
    let locations = mock
        .orchestrator()
        .list_locations(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&locations), vec![11, 31]);
    assert_eq!(mock.count("GET", "/api/Locations"), 1);
}

#[tokio::test]
async fn test_unlimited_page_size_fetches_once() {
    let mock = seeded().await;

    let query = LocationQuery::builder()
        .updated_after(date("2022-01-01"))
        .page_size(-1)
        .build();
    let locations = mock
        .orchestrator()
        .list_locations(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(locations.len(), 7);
    assert_eq!(mock.count("GET", "/api/Locations"), 1);
}

#[tokio::test]
async fn test_empty_location_listing_stops_after_first_page() {
    let mock = seeded().await;

    let query = LocationQuery::builder().updated_after(date("2030-01-01")).build();
    let locations = mock
        .orchestrator()
        .list_locations(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert!(locations.is_empty());
    assert_eq!(mock.count("GET", "/api/Locations"), 1);
}

#[tokio::test]
async fn test_rejected_key_lists_nothing() {
    let mock = seeded().await;
    let orchestrator = mock.orchestrator_with_key("wrong");

    let chains = ChainQuery::builder().scraped_after(date("2022-09-01")).build();
    let err = orchestrator
        .list_chains(&chains, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Unauthorized));

    let locations = LocationQuery::builder().updated_after(date("2022-09-01")).build();
    let err = orchestrator
        .list_locations(&locations, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Unauthorized));

    assert_eq!(mock.count("GET", "/api/Chains"), 0);
    assert_eq!(mock.count("GET", "/api/Locations"), 0);
}

#[tokio::test]
async fn test_invalid_bounds_never_reach_the_service() {
    let mock = seeded().await;

    let query = LocationQuery::builder()
        .updated_after(date("2022-09-01"))
        .bounds(BoundingBox {
            north: 95.0,
            ..BoundingBox::default()
        })
        .build();
    let err = mock
        .orchestrator()
        .list_locations(&query, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_LISTING");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_cancelled_listing_makes_no_calls() {
    let mock = seeded().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let query = LocationQuery::builder().updated_after(date("2022-09-01")).build();
    let err = mock
        .orchestrator()
        .list_locations(&query, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_listings_saved_as_csv_and_json() {
    let mock = seeded().await;
    let orchestrator = mock.orchestrator();
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::local(dir.path()).unwrap();

    let chains = orchestrator
        .list_chains(
            &ChainQuery::builder().scraped_after(date("2022-09-01")).build(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    save_records(&store, "chains.csv", &chains, Some(&CHAIN_COLUMNS[..]))
        .await
        .unwrap();

    let csv = std::fs::read_to_string(dir.path().join("chains.csv")).unwrap();
    assert_eq!(
        csv,
        "Name,Id,LastScrapeDate\nAcme,1,2022-09-05T10:00:00\nCrest,3,2022-09-10T10:00:00\n"
    );

    let locations = orchestrator
        .list_locations(
            &LocationQuery::builder()
                .updated_after(date("2022-09-01"))
                .chain_ids(vec!["3".to_string()])
                .build(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let saved = save_records(&store, "locations.json", &locations, None)
        .await
        .unwrap();

    assert_eq!(saved.key, "locations.json");
    let written: Vec<Value> =
        serde_json::from_slice(&std::fs::read(dir.path().join("locations.json")).unwrap()).unwrap();
    assert_eq!(ids(&written), vec![31]);
    assert_eq!(written[0]["ChainId"], 3);
}
