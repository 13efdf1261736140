/// Case lifecycle tests
///
/// Registry resolution, transition rules and stage-scoped immutability
/// through the public service API.
/// Run with: cargo test --test lifecycle_tests

use casekeeper::{
    CaseError, CaseFilter, CasePatch, CaseService, IssueStage, NewCase, OriginType, SkipGuards,
    Stage, Taxpayer,
};
use casekeeper::registry;
use casekeeper::issues::NewIssue;

fn taxpayer() -> Taxpayer {
    Taxpayer::new("27AAPFU0939F1ZV", "Acme Traders")
}

#[tokio::test]
async fn test_registry_resolves_both_origins() {
    let service = CaseService::in_memory();
    let s = service.create(NewCase::scrutiny(taxpayer(), "2023-24")).await.unwrap();
    let a = service
        .create(NewCase::adjudication(taxpayer(), "2023-24"))
        .await
        .unwrap();

    let (s_origin, a_origin) = service
        .store()
        .read(|tables| Ok((registry::resolve(tables, s)?, registry::resolve(tables, a)?)))
        .await
        .unwrap();
    assert_eq!(s_origin, OriginType::Scrutiny);
    assert_eq!(a_origin, OriginType::Adjudication);

    assert_eq!(service.get(s).await.unwrap().origin(), OriginType::Scrutiny);
    assert_eq!(service.get(a).await.unwrap().origin(), OriginType::Adjudication);
}

#[tokio::test]
async fn test_scenario_a_no_regression() {
    let service = CaseService::in_memory();
    let id = service.create(NewCase::scrutiny(taxpayer(), "2023-24")).await.unwrap();
    assert_eq!(service.get(id).await.unwrap().stage().code(), 10);

    let record = service.transition(id, Stage::IntimationDrafted).await.unwrap();
    assert_eq!(record.stage().code(), 20);

    let err = service.transition(id, Stage::Intake).await.unwrap_err();
    assert_eq!(
        err,
        CaseError::IllegalTransition {
            from: Stage::IntimationDrafted,
            to: Stage::Intake
        }
    );
    assert!(err.is_usage_error());
    assert!(!err.is_retryable());
    assert_eq!(service.get(id).await.unwrap().stage(), Stage::IntimationDrafted);
}

#[tokio::test]
async fn test_skip_requires_guard() {
    let service = CaseService::in_memory();
    let plain = service
        .create(NewCase::adjudication(taxpayer(), "2023-24"))
        .await
        .unwrap();
    assert!(matches!(
        service.transition(plain, Stage::NoticeDrafted).await,
        Err(CaseError::SkipGuardViolation { .. })
    ));
    assert!(matches!(
        service.transition(plain, Stage::NoticeIssued).await,
        Err(CaseError::InvalidTransition { .. })
    ));

    service
        .update(
            plain,
            CasePatch::new().skip_guards(SkipGuards::bypass_intimation()),
            Some(1),
        )
        .await
        .unwrap();
    let record = service.transition(plain, Stage::NoticeDrafted).await.unwrap();
    assert_eq!(record.status(), "Notice Drafted");
    assert_eq!(record.version(), 3);
}

#[tokio::test]
async fn test_order_requires_completed_hearing() {
    let service = CaseService::in_memory();
    let id = service
        .create(
            NewCase::adjudication(taxpayer(), "2023-24")
                .skip_guards(SkipGuards::bypass_intimation()),
        )
        .await
        .unwrap();
    for stage in [Stage::NoticeDrafted, Stage::NoticeIssued, Stage::HearingScheduled] {
        service.transition(id, stage).await.unwrap();
    }
    // adjournment
    service.transition(id, Stage::HearingScheduled).await.unwrap();

    assert!(matches!(
        service.transition(id, Stage::OrderIssued).await,
        Err(CaseError::InvalidTransition { .. })
    ));
    service.transition(id, Stage::HearingCompleted).await.unwrap();
    let record = service.transition(id, Stage::OrderIssued).await.unwrap();
    assert_eq!(record.status(), "Order Issued");
    assert!(record.stage().is_terminal());

    let history = service.stage_history(id).await.unwrap();
    assert_eq!(history.len(), 7);
    assert!(history.windows(2).all(|w| w[0].to <= w[1].to));
}

#[tokio::test]
async fn test_scrutiny_cannot_issue_without_finalize() {
    let service = CaseService::in_memory();
    let id = service.create(NewCase::scrutiny(taxpayer(), "2023-24")).await.unwrap();
    service.transition(id, Stage::IntimationDrafted).await.unwrap();
    assert!(matches!(
        service.transition(id, Stage::IntimationIssued).await,
        Err(CaseError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_stage_never_decreases() {
    let service = CaseService::in_memory();
    let id = service
        .create(
            NewCase::adjudication(taxpayer(), "2024-25")
                .skip_guards(SkipGuards::bypass_intimation()),
        )
        .await
        .unwrap();

    // deterministic pseudo-random walk over all targets
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut previous = Stage::Intake;
    for _ in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let target = Stage::ALL[(seed >> 33) as usize % Stage::ALL.len()];
        let _ = service.transition(id, target).await;

        let current = service.get(id).await.unwrap().stage();
        assert!(current >= previous, "{} went back to {}", previous, current);
        previous = current;
    }
}

#[tokio::test]
async fn test_scenario_c_issued_stage_is_frozen() {
    let service = CaseService::in_memory();
    let id = service
        .create(NewCase::adjudication(taxpayer(), "2023-24"))
        .await
        .unwrap();
    for stage in [
        Stage::IntimationDrafted,
        Stage::IntimationIssued,
        Stage::NoticeDrafted,
    ] {
        service.transition(id, stage).await.unwrap();
    }
    let draft = service
        .add_issue(id, NewIssue::new(IssueStage::Notice, "ITC-1", "excess ITC"))
        .await
        .unwrap();
    service.transition(id, Stage::NoticeIssued).await.unwrap();

    let err = service
        .add_issue(id, NewIssue::new(IssueStage::Notice, "ITC-2", "late addition"))
        .await
        .unwrap_err();
    assert!(matches!(err, CaseError::IntegrityViolation(_)));
    assert!(matches!(
        service.remove_issue(id, draft.id).await,
        Err(CaseError::IntegrityViolation(_))
    ));

    service
        .add_issue(id, NewIssue::new(IssueStage::Hearing, "H-1", "personal hearing"))
        .await
        .unwrap();
    assert_eq!(service.issues(id, Some(IssueStage::Notice)).await.unwrap(), vec![draft]);
    assert_eq!(service.issues(id, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_and_delete() {
    let service = CaseService::in_memory();
    let keep = service.create(NewCase::scrutiny(taxpayer(), "2023-24")).await.unwrap();
    let gone = service
        .create(NewCase::adjudication(taxpayer(), "2023-24"))
        .await
        .unwrap();
    service.save_snapshot(gone, serde_json::json!({"x": 1})).await.unwrap();

    service.delete(gone, Some(1)).await.unwrap();
    assert!(matches!(service.get(gone).await, Err(CaseError::NotFound(_))));

    let remaining = service.list(&CaseFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), keep);
    assert_eq!(service.stats().await.tables.drafts, 0);
}
