//! End-to-end scenarios from spec.md §8 (S1-S7), driven directly against
//! `JobEngine` over the in-memory store. The HTTP-level equivalents live in
//! `spine-server`'s integration tests.

use serde_json::{json, Map};
use spine_core::engine::EngineConfig;
use spine_core::storage::InMemoryJobStore;
use spine_core::{CreateJobInput, JobEngine, JobFilter, Role, SpineError, Status, Target};

fn engine(lease_secs: i64, max_attempts: u32) -> JobEngine<InMemoryJobStore> {
    JobEngine::new(
        InMemoryJobStore::new(),
        EngineConfig {
            lease_duration: chrono::Duration::seconds(lease_secs),
            default_max_attempts: max_attempts,
        },
    )
    .unwrap()
}

fn create(engine: &JobEngine<InMemoryJobStore>, target: Target, max_attempts: Option<u32>) -> String {
    engine
        .create(CreateJobInput {
            target,
            spec: "do stuff".into(),
            meta: Map::new(),
            max_attempts,
        })
        .unwrap()
        .id
}

#[test]
fn s1_create_claim_complete_happy_path() {
    let engine = engine(300, 2);
    let id = create(&engine, Target::LeftClaw, Some(2));

    let queued = engine
        .list(Role::Head, &JobFilter { status: Some(Status::Queued), target: None })
        .unwrap();
    assert!(queued.iter().any(|j| j.id == id));

    let claimed = engine.claim(Role::LeftClaw, &id).unwrap();
    assert_eq!(claimed.status, Status::Running);
    assert_eq!(claimed.attempts, 1);

    let done = engine
        .complete(Role::LeftClaw, &id, Some(json!("ok")))
        .unwrap();
    assert_eq!(done.status, Status::Done);
    assert_eq!(done.result, Some(json!("ok")));
}

#[test]
fn s2_ownership_is_enforced() {
    let engine = engine(300, 2);
    let id = create(&engine, Target::LeftClaw, Some(2));
    engine.claim(Role::LeftClaw, &id).unwrap();

    assert_eq!(
        engine.heartbeat(Role::RightClaw, &id, None).unwrap_err(),
        SpineError::NotOwner
    );
    assert!(engine.heartbeat(Role::Head, &id, None).is_ok());
    assert_eq!(
        engine.complete(Role::RightClaw, &id, None).unwrap_err(),
        SpineError::NotOwner
    );

    let failed = engine
        .fail(Role::Head, &id, None, Some(false))
        .unwrap();
    assert_eq!(failed.status, Status::Failed);
}

#[test]
fn s3_attempts_and_terminal_dead() {
    let engine = engine(300, 1);
    let id = create(&engine, Target::LeftClaw, Some(1));

    let claimed = engine.claim(Role::LeftClaw, &id).unwrap();
    assert_eq!(claimed.attempts, 1);

    let failed = engine.fail(Role::LeftClaw, &id, None, None).unwrap();
    assert_eq!(failed.status, Status::Dead);

    let err = engine.claim(Role::LeftClaw, &id).unwrap_err();
    assert_eq!(err, SpineError::TerminalStatus);
}

#[test]
fn s4_retry_then_complete() {
    let engine = engine(300, 5);
    let id = create(&engine, Target::LeftClaw, Some(5));

    let claimed = engine.claim(Role::LeftClaw, &id).unwrap();
    assert_eq!(claimed.attempts, 1);

    let failed = engine
        .fail(
            Role::LeftClaw,
            &id,
            Some("transient".into()),
            Some(true),
        )
        .unwrap();
    assert_eq!(failed.status, Status::Queued);
    assert_eq!(failed.attempts, 1);

    let reclaimed = engine.claim(Role::LeftClaw, &id).unwrap();
    assert_eq!(reclaimed.attempts, 2);

    let done = engine.complete(Role::LeftClaw, &id, None).unwrap();
    assert_eq!(done.status, Status::Done);
}

#[test]
fn s5_lease_reaper_requeues_without_reincrementing_attempts() {
    let engine = engine(-1, 5); // already-expired lease as soon as it's granted
    let id = create(&engine, Target::LeftClaw, Some(5));

    let claimed = engine.claim(Role::LeftClaw, &id).unwrap();
    assert_eq!(claimed.attempts, 1);

    let summary = engine.reap_once();
    assert_eq!(summary.reaped_requeued, 1);

    let job = engine.get(Role::Head, &id).unwrap();
    assert_eq!(job.status, Status::Queued);
    assert_eq!(job.claimed_by, None);
    assert_eq!(job.lease_until, None);
    assert_eq!(job.attempts, 1);
}

#[test]
fn s5b_reaper_marks_dead_when_attempts_exhausted() {
    let engine = engine(-1, 1);
    let id = create(&engine, Target::Any, Some(1));
    engine.claim(Role::RightClaw, &id).unwrap();

    let summary = engine.reap_once();
    assert_eq!(summary.reaped_dead, 1);

    let job = engine.get(Role::Head, &id).unwrap();
    assert_eq!(job.status, Status::Dead);
}

#[test]
fn s6_any_target_is_claimable_by_either_claw() {
    let engine = engine(300, 3);
    let id = create(&engine, Target::Any, Some(3));

    let claimed = engine.claim(Role::RightClaw, &id).unwrap();
    assert_eq!(claimed.claimed_by.as_deref(), Some("right-claw"));

    let done = engine.complete(Role::RightClaw, &id, None).unwrap();
    assert_eq!(done.status, Status::Done);
}

#[test]
fn claim_on_running_job_is_blocked_even_with_expired_lease() {
    // Open question resolved: claim never reclaims inline; only the reaper
    // transitions an expired-lease job back to queued.
    let engine = engine(-1, 5);
    let id = create(&engine, Target::LeftClaw, Some(5));
    engine.claim(Role::LeftClaw, &id).unwrap();

    let err = engine.claim(Role::LeftClaw, &id).unwrap_err();
    assert_eq!(err, SpineError::AlreadyClaimed);
}

#[test]
fn comment_appends_without_touching_other_fields() {
    let engine = engine(300, 3);
    let id = create(&engine, Target::LeftClaw, Some(3));

    let before = engine.get(Role::Head, &id).unwrap();
    let after = engine.comment(Role::Head, &id, "looks good".into()).unwrap();

    assert_eq!(after.comments.len(), 1);
    assert_eq!(after.comments[0].text, "looks good");
    assert_eq!(after.status, before.status);
    assert_eq!(after.attempts, before.attempts);
}

#[test]
fn release_leaves_attempts_unchanged() {
    let engine = engine(300, 3);
    let id = create(&engine, Target::LeftClaw, Some(3));
    let claimed = engine.claim(Role::LeftClaw, &id).unwrap();
    assert_eq!(claimed.attempts, 1);

    let released = engine
        .release(Role::LeftClaw, &id, Some("pausing".into()))
        .unwrap();
    assert_eq!(released.status, Status::Queued);
    assert_eq!(released.attempts, 1);
    assert_eq!(released.claimed_by, None);
}

#[test]
fn forbidden_when_target_does_not_match_role() {
    let engine = engine(300, 3);
    let id = create(&engine, Target::RightClaw, Some(3));

    let err = engine.claim(Role::LeftClaw, &id).unwrap_err();
    assert_eq!(err, SpineError::Forbidden);

    let err = engine.get(Role::LeftClaw, &id).unwrap_err();
    assert_eq!(err, SpineError::Forbidden);
}
