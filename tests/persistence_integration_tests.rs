/// Persistence integration tests
///
/// WAL replay and checkpoints across store restarts.
/// Run with: cargo test --test persistence_integration_tests

use casekeeper::{
    CaseService, DurabilityMode, FinalizeRequest, NewCase, OriginType, RegisterDraft,
    RegisterKind, Stage, StoreConfig, Taxpayer,
};
use chrono::NaiveDate;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::new()
        .data_dir(dir.path())
        .durability(DurabilityMode::Sync)
}

fn finalize_request() -> FinalizeRequest {
    let on = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
    FinalizeRequest::new(
        "range-officer",
        RegisterDraft::new("12/2025-26", "ASMT-10", on),
        RegisterDraft::new("12/2025-26", "ASMT-10", on),
    )
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let (source, downstream) = {
        let service = CaseService::open(&config(&dir)).unwrap();
        let id = service
            .create(NewCase::scrutiny(
                Taxpayer::new("27AAPFU0939F1ZV", "Acme Traders"),
                "2025-26",
            ))
            .await
            .unwrap();
        service.transition(id, Stage::IntimationDrafted).await.unwrap();
        service.save_snapshot(id, json!({"para": 1})).await.unwrap();
        let downstream = service.finalize(id, finalize_request()).await.unwrap();
        (id, downstream)
    };

    let service = CaseService::open(&config(&dir)).unwrap();
    let record = service.get(source).await.unwrap();
    assert_eq!(record.stage(), Stage::IntimationIssued);
    assert!(record.is_finalized());
    assert_eq!(record.linked_case(), Some(downstream));
    assert_eq!(
        service.get(downstream).await.unwrap().origin(),
        OriginType::Adjudication
    );
    assert!(
        service
            .register_entry(RegisterKind::CaseDocument, "12/2025-26")
            .await
            .is_ok()
    );
    assert_eq!(service.list_snapshots(source).await.unwrap().len(), 1);
    assert_eq!(service.stage_history(source).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_checkpoint_then_more_commits() {
    let dir = TempDir::new().unwrap();
    let taxpayer = Taxpayer::new("07AABCS1429B1Z1", "Sharma Logistics");
    let (before, after) = {
        let service = CaseService::open(&config(&dir)).unwrap();
        let before = service
            .create(NewCase::adjudication(taxpayer.clone(), "2024-25"))
            .await
            .unwrap();
        service.checkpoint().await.unwrap();
        assert_eq!(service.stats().await.wal_entries_since_checkpoint, 0);

        let after = service
            .create(NewCase::adjudication(taxpayer.clone(), "2024-25"))
            .await
            .unwrap();
        (before, after)
    };

    let service = CaseService::open(&config(&dir)).unwrap();
    assert!(service.get(before).await.is_ok());
    assert!(service.get(after).await.is_ok());
}

#[tokio::test]
async fn test_torn_wal_tail_is_ignored() {
    let dir = TempDir::new().unwrap();
    let id = {
        let service = CaseService::open(&config(&dir)).unwrap();
        service
            .create(NewCase::adjudication(
                Taxpayer::new("29AAACB1234C1Z5", "Bharat Metals"),
                "2024-25",
            ))
            .await
            .unwrap()
    };

    // simulate a crash in the middle of writing the next entry
    let wal = dir.path().join("casekeeper.wal");
    let mut file = OpenOptions::new().append(true).open(&wal).unwrap();
    file.write_all(&512u32.to_le_bytes()).unwrap();
    file.write_all(&[0x82, 0xa1]).unwrap();

    let service = CaseService::open(&config(&dir)).unwrap();
    assert_eq!(service.get(id).await.unwrap().version(), 1);
    assert_eq!(service.stats().await.tables.registry, 1);
}

#[tokio::test]
async fn test_in_memory_mode_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let service = CaseService::open(
        &StoreConfig::new()
            .data_dir(dir.path())
            .durability(DurabilityMode::None),
    )
    .unwrap();
    service
        .create(NewCase::adjudication(
            Taxpayer::new("29AAACB1234C1Z5", "Bharat Metals"),
            "2024-25",
        ))
        .await
        .unwrap();
    assert!(!service.store().is_persistent());
    assert!(!dir.path().join("casekeeper.wal").exists());
}
