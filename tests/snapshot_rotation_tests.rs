/// Draft snapshot rotation tests
///
/// Run with: cargo test --test snapshot_rotation_tests

use casekeeper::drafts::DEFAULT_RETENTION;
use casekeeper::{CaseError, CaseId, CaseService, NewCase, SaveOutcome, StoreConfig, Taxpayer};
use serde_json::json;

async fn new_case(service: &CaseService) -> CaseId {
    service
        .create(NewCase::scrutiny(
            Taxpayer::new("29AAACB1234C1Z5", "Bharat Metals"),
            "2023-24",
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_n_plus_two_saves_keep_n() {
    let service = CaseService::in_memory();
    let id = new_case(&service).await;

    for rev in 0..DEFAULT_RETENTION + 2 {
        let outcome = service
            .save_snapshot(id, json!({"rev": rev, "body": "draft text"}))
            .await
            .unwrap();
        assert!(outcome.is_stored());
    }

    let stored = service.list_snapshots(id).await.unwrap();
    assert_eq!(stored.len(), DEFAULT_RETENTION);
    let revs: Vec<u64> = stored
        .iter()
        .map(|s| s.blob["rev"].as_u64().unwrap())
        .collect();
    assert_eq!(revs, vec![6, 5, 4, 3, 2]);
}

#[tokio::test]
async fn test_identical_autosave_is_idempotent() {
    let service = CaseService::in_memory();
    let id = new_case(&service).await;

    service
        .save_snapshot(id, json!({"a": 1, "nested": {"x": true, "y": [1, 2]}}))
        .await
        .unwrap();
    let outcome = service
        .save_snapshot(id, json!({"nested": {"y": [1, 2], "x": true}, "a": 1}))
        .await
        .unwrap();

    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(service.list_snapshots(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retention_is_configurable() {
    let service = CaseService::open(&StoreConfig::new().snapshot_retention(2)).unwrap();
    let id = new_case(&service).await;

    for rev in 0..4 {
        service.save_snapshot(id, json!({"rev": rev})).await.unwrap();
    }
    let latest = service.latest_snapshot(id).await.unwrap().unwrap();
    assert_eq!(latest.blob, json!({"rev": 3}));
    assert_eq!(service.list_snapshots(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rotation_is_per_case() {
    let service = CaseService::in_memory();
    let a = new_case(&service).await;
    let b = new_case(&service).await;

    for rev in 0..DEFAULT_RETENTION {
        service.save_snapshot(a, json!({"rev": rev})).await.unwrap();
    }
    service.save_snapshot(b, json!({"rev": 0})).await.unwrap();

    assert_eq!(service.list_snapshots(a).await.unwrap().len(), DEFAULT_RETENTION);
    assert_eq!(service.list_snapshots(b).await.unwrap().len(), 1);
    assert!(matches!(
        service.save_snapshot(CaseId::new(), json!({})).await,
        Err(CaseError::NotFound(_))
    ));
}
