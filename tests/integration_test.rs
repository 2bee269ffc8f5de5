//! Tests for the gallery service driven through its handle

use bcard_gallery::chain::memory::InMemoryCollection;
use bcard_gallery::gallery::{GalleryBuilder, ScrollPosition};
use bcard_gallery::{Address, CardId, FilterQuery, GallerySnapshot, ViewMode};
use std::time::Duration;

fn owner() -> Address {
    "0x00000000000000000000000000000000000000A1".parse().unwrap()
}

fn ids(snapshot: &GallerySnapshot) -> Vec<CardId> {
    snapshot.loaded.iter().map(|card| card.id).collect()
}

#[tokio::test]
async fn test_initial_load_and_scroll() {
    let collection = InMemoryCollection::demo(30, &owner());
    let (service, mut handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .expect("Failed to build gallery service");
    tokio::spawn(service.run());

    handle.refresh().await.unwrap();
    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.candidate_count == 30)
        .await
        .unwrap();
    assert_eq!(snapshot.mode, ViewMode::All);
    assert_eq!(snapshot.loaded.len(), 12);
    assert_eq!(snapshot.loaded[0].id, CardId(30));

    let scroll = handle.subscribe_scroll();
    assert!(!scroll.report(ScrollPosition::new(800.0, 0.0, 3000.0)));
    assert!(scroll.report(ScrollPosition::new(800.0, 2150.0, 3000.0)));

    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.loaded.len() == 16)
        .await
        .unwrap();
    assert_eq!(ids(&snapshot)[12..], [CardId(18), CardId(17), CardId(16), CardId(15)]);
    assert!(!snapshot.exhausted());
}

#[tokio::test]
async fn test_search_narrows_candidates() {
    let collection = InMemoryCollection::demo(30, &owner());
    let (service, mut handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .unwrap();
    tokio::spawn(service.run());

    let query: FilterQuery = serde_json::from_str(
        r#"{"Setting": ["Beach"], "Special": [{"trait_type": "Shadow", "value": "Long"}]}"#,
    )
    .unwrap();
    handle.set_search(Some(query)).await.unwrap();

    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.candidate_count > 0)
        .await
        .unwrap();
    assert_eq!(ids(&snapshot), vec![CardId(24), CardId(12)]);
    assert!(snapshot.exhausted());

    // Clearing the search restores the full set from cached metadata.
    let fetches = collection.store.fetch_count();
    handle.set_search(None).await.unwrap();
    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.candidate_count == 30)
        .await
        .unwrap();
    assert_eq!(snapshot.loaded.len(), 12);
    assert_eq!(collection.store.fetch_count(), fetches);
}

#[tokio::test]
async fn test_owned_listings_follow_account() {
    let collection = InMemoryCollection::demo(30, &owner());
    let (service, mut handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .unwrap();
    tokio::spawn(service.run());

    handle.set_account(Some(owner())).await.unwrap();
    handle.set_marketplace(true).await.unwrap();
    handle.set_owned(true).await.unwrap();

    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.mode == ViewMode::OwnedListings && s.candidate_count > 0)
        .await
        .unwrap();
    assert_eq!(ids(&snapshot), vec![CardId(24), CardId(16), CardId(8)]);

    // Disconnecting falls back to every listing.
    handle.set_account(None).await.unwrap();
    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.mode == ViewMode::Marketplace && s.candidate_count == 8)
        .await
        .unwrap();
    assert!(!snapshot.owned_on);
    assert_eq!(
        ids(&snapshot),
        vec![
            CardId(30),
            CardId(25),
            CardId(24),
            CardId(16),
            CardId(15),
            CardId(10),
            CardId(8),
            CardId(5)
        ]
    );
}

#[tokio::test]
async fn test_failed_cycle_keeps_previous_cards() {
    let collection = InMemoryCollection::demo(30, &owner());
    let (service, mut handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .unwrap();
    tokio::spawn(service.run());

    handle.refresh().await.unwrap();
    let before = handle
        .wait_for(|s| !s.is_loading && s.candidate_count == 30)
        .await
        .unwrap();

    collection.marketplace.set_failing(true);
    handle.set_marketplace(true).await.unwrap();
    let failed = handle.wait_for(|s| s.error.is_some()).await.unwrap();
    assert!(!failed.is_loading);
    assert_eq!(failed.loaded, before.loaded);
    assert_eq!(failed.candidate_count, 30);
    assert_eq!(failed.mode, ViewMode::All);
    assert!(!failed.marketplace_on);

    collection.marketplace.set_failing(false);
    handle.set_marketplace(true).await.unwrap();
    let recovered = handle
        .wait_for(|s| !s.is_loading && s.error.is_none())
        .await
        .unwrap();
    assert_eq!(recovered.mode, ViewMode::Marketplace);
    assert_eq!(recovered.candidate_count, 8);
}

#[tokio::test]
async fn test_scroll_during_page_load_is_dropped() {
    let collection = InMemoryCollection::demo(30, &owner());
    let (service, mut handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .unwrap();
    tokio::spawn(service.run());

    handle.refresh().await.unwrap();
    handle
        .wait_for(|s| !s.is_loading && s.loaded.len() == 12)
        .await
        .unwrap();

    // Slow token URI lookups keep the page load in flight.
    collection.ledger.set_latency(Some(Duration::from_millis(300)));
    let scroll = handle.subscribe_scroll();
    let near_bottom = ScrollPosition::new(800.0, 2150.0, 3000.0);
    assert!(scroll.report(near_bottom));
    handle.wait_for(|s| s.is_loading).await.unwrap();
    assert!(scroll.report(near_bottom));

    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.loaded.len() >= 16)
        .await
        .unwrap();
    assert_eq!(snapshot.loaded.len(), 16);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let settled = handle.snapshot();
    assert!(!settled.is_loading);
    assert_eq!(settled.loaded.len(), 16);
}

#[tokio::test]
async fn test_latest_event_wins() {
    let collection = InMemoryCollection::demo(30, &owner());
    collection.ledger.set_latency(Some(Duration::from_millis(200)));
    let (service, mut handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .unwrap();
    tokio::spawn(service.run());

    handle.refresh().await.unwrap();
    handle.set_marketplace(true).await.unwrap();
    handle.set_marketplace(false).await.unwrap();

    let snapshot = handle
        .wait_for(|s| !s.is_loading && s.candidate_count > 0)
        .await
        .unwrap();
    assert_eq!(snapshot.mode, ViewMode::All);
    assert_eq!(snapshot.candidate_count, 30);
}

#[tokio::test]
async fn test_service_stops_when_detached() {
    let collection = InMemoryCollection::demo(5, &owner());
    let (service, handle) = GalleryBuilder::new()
        .build_service(collection.sources(1_000))
        .unwrap();
    let task = tokio::spawn(service.run());

    let scroll = handle.subscribe_scroll();
    drop(handle);
    assert!(scroll.is_active());

    scroll.dispose();
    let gallery = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("service did not stop")
        .unwrap();
    assert!(gallery.candidates().is_empty());
}
