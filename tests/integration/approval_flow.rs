//! Suspending at the story gate and resuming with a decision.

use super::support::{self, FakeConcatenator, FakeService};
use reelsmith::approval::{ApprovalState, ContinuationToken, Decision};
use reelsmith::error::PipelineError;
use reelsmith::executor::RunOutcome;
use reelsmith::provider::GenerationTask;
use reelsmith::record::RunInputs;
use reelsmith::stages::StageId;
use reelsmith::store::MemoryArtifactStore;
use std::sync::Arc;

fn inputs() -> RunInputs {
    RunInputs::new("A lighthouse keeper befriends a storm", "short", "ink wash")
}

fn suspended(outcome: RunOutcome) -> ContinuationToken {
    match outcome {
        RunOutcome::Suspended { token, .. } => token,
        RunOutcome::Completed { .. } => panic!("expected the run to wait for approval"),
    }
}

#[tokio::test]
async fn run_suspends_after_the_story() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, false);

    let outcome = engine.run(inputs()).await.unwrap();
    let RunOutcome::Suspended { token, prompt } = outcome else {
        panic!("expected suspension");
    };
    assert_eq!(token.revision, 0);
    assert_eq!(token.resume_at, StageId::StoryApproval);
    assert!(prompt.story.starts_with("Draft 1"));

    // nothing downstream of the gate ran
    assert_eq!(service.total_calls(), 1);
    let pending = engine.pending(&token.run_id).unwrap().unwrap();
    assert_eq!(pending.token, token);
    assert_eq!(
        pending.record.approval,
        ApprovalState::PendingApproval { revision: 0 }
    );
}

#[tokio::test]
async fn approval_resumes_to_completion() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, false);
    let token = suspended(engine.run(inputs()).await.unwrap());

    let outcome = engine.resume(&token, Decision::approve()).await.unwrap();
    let RunOutcome::Completed { record, .. } = outcome else {
        panic!("expected completion after approval");
    };
    assert_eq!(record.approval, ApprovalState::Approved { revision: 0 });
    assert_eq!(service.calls("story"), 1);
    assert_eq!(concat.calls(), 1);
    assert!(engine.pending(&token.run_id).unwrap().is_none());

    // re-running the same inputs no longer stops at the gate
    let again = engine.run(inputs()).await.unwrap();
    assert!(matches!(again, RunOutcome::Completed { .. }));
    assert_eq!(concat.calls(), 1);
}

#[tokio::test]
async fn rejection_regenerates_the_story_with_feedback() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, false);
    let first = suspended(engine.run(inputs()).await.unwrap());

    let outcome = engine
        .resume(&first, Decision::reject("make the storm gentler"))
        .await
        .unwrap();
    let RunOutcome::Suspended { token: second, prompt } = outcome else {
        panic!("a rejected story must be reviewed again");
    };
    assert_eq!(second.revision, 1);
    assert!(prompt.story.contains("Revised for: make the storm gentler"));

    let stories = service.requests(GenerationTask::Story);
    assert_eq!(stories.len(), 2);
    assert!(stories[1].text.contains("<PREVIOUS_DRAFT>\nDraft 1"));
    assert!(stories[1].text.contains("<FEEDBACK>\nmake the storm gentler"));

    let outcome = engine.resume(&second, Decision::approve()).await.unwrap();
    let RunOutcome::Completed { record, .. } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(record.story_revision, 1);
    assert_eq!(record.approval, ApprovalState::Approved { revision: 1 });
    assert!(record.story.unwrap().starts_with("Draft 2"));
    assert_eq!(service.calls("story"), 2);
}

#[tokio::test]
async fn repeated_decision_is_idempotent_and_conflicting_one_is_refused() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, false);
    let token = suspended(engine.run(inputs()).await.unwrap());

    engine.resume(&token, Decision::approve()).await.unwrap();
    let calls = service.total_calls();
    let again = engine.resume(&token, Decision::approve()).await.unwrap();
    assert!(matches!(again, RunOutcome::Completed { .. }));
    assert_eq!(service.total_calls(), calls);

    let err = engine
        .resume(&token, Decision::reject("actually, no"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidContinuation(_)));
}

#[tokio::test]
async fn rejection_without_feedback_is_refused() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, false);
    let token = suspended(engine.run(inputs()).await.unwrap());

    let err = engine.resume(&token, Decision::reject("   ")).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidContinuation(_)));
    // still waiting on the same revision
    assert_eq!(engine.pending(&token.run_id).unwrap().unwrap().token, token);
}

#[tokio::test]
async fn unknown_continuation_is_refused() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, false);
    let token = ContinuationToken {
        run_id: "never-started".to_string(),
        revision: 0,
        resume_at: StageId::StoryApproval,
    };
    let err = engine.resume(&token, Decision::approve()).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidContinuation(_)));
    assert_eq!(service.total_calls(), 0);
}

#[tokio::test]
async fn auto_approval_never_suspends() {
    let service = FakeService::new();
    let concat = FakeConcatenator::new();
    let engine = support::engine(&service, Arc::new(MemoryArtifactStore::new()), &concat, true);
    let outcome = engine.run(inputs()).await.unwrap();
    let RunOutcome::Completed { record, .. } = outcome else {
        panic!("auto approval must not suspend");
    };
    assert_eq!(record.approval, ApprovalState::Approved { revision: 0 });
}
