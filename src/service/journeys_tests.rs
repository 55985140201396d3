//! Tests for the journey service, run against the in-memory store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::*;
use crate::db::memory::MemoryStore;
use crate::error::ErrorKind;
use crate::ids::IdMasker;
use crate::models::UserId;
use crate::storage::memory::MemoryStorage;

struct Harness {
    store: Arc<MemoryStore>,
    storage: Arc<MemoryStorage>,
    ids: Arc<IdMasker>,
    service: Arc<JourneyService>,
    alice: UserId,
    bob: UserId,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStorage::new());
    let ids = Arc::new(IdMasker::new("journey-tests"));
    let alice = store.add_user("alice@example.com", "Alice");
    let bob = store.add_user("bob@example.com", "Bob");
    let service = Arc::new(JourneyService::new(
        store.clone(),
        storage.clone(),
        ids.clone(),
    ));
    Harness {
        store,
        storage,
        ids,
        service,
        alice,
        bob,
    }
}

fn journey_req(title: &str, is_public: bool) -> CreateJourneyRequest {
    CreateJourneyRequest {
        title: title.to_string(),
        description: String::new(),
        is_public,
    }
}

fn checkpoint_req(lat: f64, lng: f64, timestamp: Option<&str>) -> CreateCheckpointRequest {
    CreateCheckpointRequest {
        lat,
        lng,
        note: String::new(),
        timestamp: timestamp.map(str::to_string),
    }
}

impl Harness {
    async fn journey(&self, owner: UserId, is_public: bool) -> String {
        self.service
            .create_journey(owner, journey_req("Trip", is_public))
            .await
            .expect("create journey")
            .id
    }

    async fn checkpoint(&self, owner: UserId, journey: &str, timestamp: &str) -> String {
        self.service
            .add_checkpoint(owner, journey, checkpoint_req(41.9, 12.5, Some(timestamp)))
            .await
            .expect("add checkpoint")
            .id
    }
}

#[tokio::test]
async fn new_journey_is_ongoing_and_empty() {
    let h = harness();
    let before = Utc::now();
    let view = h
        .service
        .create_journey(h.alice, journey_req("Iceland ring road", false))
        .await
        .unwrap();

    assert_eq!(view.title, "Iceland ring road");
    assert_eq!(view.status, "Ongoing");
    assert_eq!(view.visibility, "Private");
    assert!(view.checkpoints.is_empty());
    assert_eq!(view.start_date, before.format("%b %d, %Y").to_string());
    assert!(h.ids.unmask(&view.id).is_ok());
}

#[tokio::test]
async fn private_journey_is_owner_only() {
    let h = harness();
    let id = h.journey(h.alice, false).await;

    assert!(h.service.get_journey(&id, h.alice).await.is_ok());
    let other = h.service.get_journey(&id, h.bob).await.unwrap_err();
    assert_eq!(other.kind(), ErrorKind::Forbidden);
    let anonymous = h
        .service
        .get_journey(&id, UserId::ANONYMOUS)
        .await
        .unwrap_err();
    assert_eq!(anonymous.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn public_journey_is_readable_by_anyone() {
    let h = harness();
    let id = h.journey(h.alice, true).await;

    for requester in [h.alice, h.bob, UserId::ANONYMOUS] {
        let view = h.service.get_journey(&id, requester).await.unwrap();
        assert_eq!(view.visibility, "Public");
    }
}

#[tokio::test]
async fn unknown_and_malformed_tokens() {
    let h = harness();
    let missing = h.ids.mask(9_999);
    let err = h.service.get_journey(&missing, h.alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.service.get_journey("42", h.alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn checkpoints_come_back_in_timestamp_order() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let late = h.checkpoint(h.alice, &id, "2024-05-03T09:00:00Z").await;
    let early = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;
    let middle = h.checkpoint(h.alice, &id, "2024-05-02T09:00:00+00:00").await;

    let view = h.service.get_journey(&id, h.alice).await.unwrap();
    let order: Vec<&str> = view.checkpoints.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, [early.as_str(), middle.as_str(), late.as_str()]);

    let mine = h.service.list_user_journeys(h.alice).await.unwrap();
    let order: Vec<&str> = mine[0].checkpoints.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, [early.as_str(), middle.as_str(), late.as_str()]);
}

#[tokio::test]
async fn list_mine_is_newest_first_and_scoped() {
    let h = harness();
    let first = h.journey(h.alice, false).await;
    let second = h.journey(h.alice, true).await;
    h.journey(h.bob, true).await;

    let mine: Vec<String> = h
        .service
        .list_user_journeys(h.alice)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(mine, [second, first]);
}

#[tokio::test]
async fn public_feed_filters_and_paginates() {
    let h = harness();
    let a = h.journey(h.alice, true).await;
    h.journey(h.alice, false).await;
    let b = h.journey(h.bob, true).await;
    let c = h.journey(h.bob, true).await;

    let ids = |views: Vec<crate::views::JourneyView>| -> Vec<String> {
        views.into_iter().map(|j| j.id).collect()
    };
    let page1 = h
        .service
        .list_public_journeys(Page::new(Some(1), Some(2)))
        .await
        .unwrap();
    assert_eq!(ids(page1), [c.clone(), b.clone()]);
    let page2 = h
        .service
        .list_public_journeys(Page::new(Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(ids(page2), [a]);
}

#[tokio::test]
async fn public_feed_caps_oversized_limit() {
    let h = harness();
    for _ in 0..55 {
        h.journey(h.bob, true).await;
    }
    let page = Page::new(Some(0), Some(1000));
    assert_eq!((page.page(), page.limit()), (1, 50));
    let feed = h.service.list_public_journeys(page).await.unwrap();
    assert_eq!(feed.len(), 50);
}

#[tokio::test]
async fn deleting_a_journey_cascades() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;
    let mut body: &[u8] = b"img";
    h.service
        .add_media(h.alice, &cp, "a.jpg", "image", &mut body)
        .await
        .unwrap();
    assert_eq!((h.store.checkpoint_count(), h.store.media_count()), (1, 1));

    h.service.delete_journey(h.alice, &id).await.unwrap();

    let err = h.service.get_journey(&id, h.alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!((h.store.checkpoint_count(), h.store.media_count()), (0, 0));
    let err = h.service.delete_checkpoint(h.alice, &cp).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleting_someone_elses_journey_looks_like_not_found() {
    let h = harness();
    let id = h.journey(h.alice, true).await;

    let foreign = h.service.delete_journey(h.bob, &id).await.unwrap_err();
    let missing = h
        .service
        .delete_journey(h.bob, &h.ids.mask(9_999))
        .await
        .unwrap_err();
    assert_eq!(foreign.kind(), ErrorKind::NotFound);
    assert_eq!(foreign.message(), missing.message());
    assert!(h.service.get_journey(&id, h.alice).await.is_ok());
}

#[tokio::test]
async fn add_checkpoint_checks_existence_then_ownership() {
    let h = harness();
    let id = h.journey(h.alice, true).await;

    let err = h
        .service
        .add_checkpoint(h.alice, &h.ids.mask(9_999), checkpoint_req(0.0, 0.0, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .service
        .add_checkpoint(h.bob, &id, checkpoint_req(0.0, 0.0, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .service
        .add_checkpoint(h.alice, &id, checkpoint_req(95.0, 0.0, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn checkpoint_coords_are_lat_first() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let view = h
        .service
        .add_checkpoint(h.alice, &id, checkpoint_req(48.8566, 2.3522, None))
        .await
        .unwrap();
    assert_eq!(view.coords, Some([48.8566, 2.3522]));
}

#[tokio::test]
async fn supplied_timestamp_is_kept() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let view = h
        .service
        .add_checkpoint(
            h.alice,
            &id,
            checkpoint_req(1.0, 1.0, Some("2023-08-14T18:45:00+01:00")),
        )
        .await
        .unwrap();
    assert_eq!(
        view.timestamp,
        Utc.with_ymd_and_hms(2023, 8, 14, 17, 45, 0).unwrap()
    );
}

// Unparseable timestamps are replaced by "now" rather than rejected with
// BadRequest; a stricter policy would flip this test to expect an error.
#[tokio::test]
async fn unparseable_timestamp_falls_back_to_now() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let before = Utc::now();
    let view = h
        .service
        .add_checkpoint(h.alice, &id, checkpoint_req(1.0, 1.0, Some("14/08/2023")))
        .await
        .expect("lenient timestamp is accepted");
    let after = Utc::now();
    assert!(view.timestamp >= before && view.timestamp <= after);
}

#[tokio::test]
async fn foreign_checkpoint_delete_is_not_found_and_harmless() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;

    let err = h.service.delete_checkpoint(h.bob, &cp).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let view = h.service.get_journey(&id, h.alice).await.unwrap();
    assert_eq!(view.checkpoints.len(), 1);
    assert_eq!(view.checkpoints[0].id, cp);
}

#[tokio::test]
async fn concurrent_checkpoint_deletes_never_half_delete() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;
    for name in ["a.jpg", "b.jpg"] {
        let mut body: &[u8] = b"img";
        h.service
            .add_media(h.alice, &cp, name, "image", &mut body)
            .await
            .unwrap();
    }

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let service = h.service.clone();
            let cp = cp.clone();
            let owner = h.alice;
            tokio::spawn(async move { service.delete_checkpoint(owner, &cp).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap().map_err(|e| e.kind()));
    }

    outcomes.sort_by_key(|o| o.is_err());
    assert_eq!(outcomes, [Ok(()), Err(ErrorKind::NotFound)]);
    assert_eq!((h.store.checkpoint_count(), h.store.media_count()), (0, 0));
}

#[tokio::test]
async fn completing_is_one_way() {
    let h = harness();
    let id = h.journey(h.alice, false).await;

    let err = h
        .service
        .complete_journey(h.bob, &id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let view = h
        .service
        .complete_journey(h.alice, &id, Some("2024-05-09T12:00:00Z"))
        .await
        .unwrap();
    assert_eq!(view.status, "Completed");

    let err = h
        .service
        .complete_journey(h.alice, &id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn media_is_stored_and_listed() {
    let h = harness();
    let id = h.journey(h.alice, true).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;

    let mut body: &[u8] = b"\x89PNG";
    let media = h
        .service
        .add_media(h.alice, &cp, "view.png", "Image", &mut body)
        .await
        .unwrap();

    let key = format!("journeys/{id}/checkpoints/{cp}/view.png");
    assert_eq!(media.url, format!("https://cdn.test/{key}"));
    assert_eq!(media.kind, "image");
    assert_eq!(h.storage.get(&key).as_deref(), Some(&b"\x89PNG"[..]));

    let view = h.service.get_journey(&id, UserId::ANONYMOUS).await.unwrap();
    assert_eq!(view.checkpoints[0].image.as_deref(), Some(media.url.as_str()));
}

#[tokio::test]
async fn media_rejections() {
    let h = harness();
    let id = h.journey(h.alice, true).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;

    let mut body: &[u8] = b"x";
    let err = h
        .service
        .add_media(h.alice, &cp, "a.gif", "audio", &mut body)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = h
        .service
        .add_media(h.bob, &cp, "a.jpg", "image", &mut body)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .service
        .add_media(h.alice, &cp, "../a.jpg", "image", &mut body)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    h.storage.fail_writes();
    let err = h
        .service
        .add_media(h.alice, &cp, "a.jpg", "image", &mut body)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(err.message(), "Failed to save file");
    assert_eq!(h.store.media_count(), 0);
}

#[tokio::test]
async fn repeated_filename_keeps_both_uploads() {
    let h = harness();
    let id = h.journey(h.alice, true).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;

    let mut first: &[u8] = b"FIRST";
    let m1 = h
        .service
        .add_media(h.alice, &cp, "a.jpg", "image", &mut first)
        .await
        .unwrap();
    let mut second: &[u8] = b"SECOND";
    let m2 = h
        .service
        .add_media(h.alice, &cp, "a.jpg", "video", &mut second)
        .await
        .unwrap();

    assert_ne!(m1.id, m2.id);
    assert_ne!(m1.url, m2.url);
    let key = |url: &str| url.trim_start_matches("https://cdn.test/").to_string();
    assert_eq!(h.storage.get(&key(&m1.url)).as_deref(), Some(&b"FIRST"[..]));
    assert_eq!(h.storage.get(&key(&m2.url)).as_deref(), Some(&b"SECOND"[..]));

    let view = h.service.get_journey(&id, h.alice).await.unwrap();
    let kinds: Vec<(&str, &str)> = view.checkpoints[0]
        .media
        .iter()
        .map(|m| (m.url.as_str(), m.kind))
        .collect();
    assert_eq!(
        kinds,
        [(m1.url.as_str(), "image"), (m2.url.as_str(), "video")]
    );
}

#[tokio::test]
async fn failed_media_record_removes_the_stored_file() {
    let h = harness();
    let id = h.journey(h.alice, false).await;
    let cp = h.checkpoint(h.alice, &id, "2024-05-01T09:00:00Z").await;
    h.store.fail_media_inserts();

    let mut body: &[u8] = b"img";
    let err = h
        .service
        .add_media(h.alice, &cp, "a.jpg", "image", &mut body)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(err.message(), "Failed to record media");
    assert_eq!(h.storage.file_count(), 0);
    assert_eq!(h.store.media_count(), 0);
}
