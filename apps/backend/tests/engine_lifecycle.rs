//! Host commands, force-close and the state machine under contention.

mod common;
mod support;

use quizroom::domain::participant::ParticipantStatus;
use quizroom::domain::session::{SessionSettings, SessionStatus};
use quizroom::domain::transition::{CloseReason, SessionTransition};
use quizroom::errors::domain::{ConflictKind, DomainError, InfraErrorKind, ValidationKind};
use quizroom::services::notify::SessionEvent;
use quizroom::services::sweeper;
use support::fixtures::{at, host, new_session, player, right, t0, wrong};
use support::harness::harness;

#[tokio::test]
async fn correct_answer_at_time_zero_scores_full_points() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10]).await;

    let started = h.engine.start(&host(), session.id, t0()).await.unwrap();
    assert_eq!(started.session.status, SessionStatus::QuestionActive);
    assert_eq!(started.session.current_question_index, Some(0));
    assert_eq!(started.transitions.first(), Some(&SessionTransition::Started));

    let question_id = session.questions[0].id;
    let receipt = h
        .engine
        .submit_answer(&player(10), session.id, question_id, right(), 0, at(1))
        .await
        .unwrap();
    assert_eq!(receipt.points_earned, Some(10));
    assert_eq!(receipt.is_correct, Some(true));

    let record = h.record(session.id, 10).await;
    assert_eq!(record.total_score(), 10);
    assert_eq!(record.correct_count(), 1);
    assert_eq!(record.status, ParticipantStatus::InProgress);
}

#[tokio::test]
async fn end_during_question_closes_records_and_broadcasts_leaderboard() {
    let h = harness();
    let session = h.create_quiz(2, 30).await;
    h.join_all(session.id, &[10, 11]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    let q = session.questions[0].id;
    h.engine
        .submit_answer(&player(10), session.id, q, right(), 2_000, at(2))
        .await
        .unwrap();

    let ended = h.engine.end(&host(), session.id, at(5)).await.unwrap();
    assert_eq!(ended.session.status, SessionStatus::Done);
    assert_eq!(ended.session.ended_at, Some(at(5)));
    assert!(ended.transitions.contains(&SessionTransition::Ended));

    for id in [10, 11] {
        let record = h.record(session.id, id).await;
        assert_eq!(record.status, ParticipantStatus::Completed);
        assert_eq!(record.completed_at, Some(at(5)));
    }

    let ended_events = h.notifier.of_kind("session_ended");
    assert_eq!(ended_events.len(), 1);
    let SessionEvent::SessionEnded { reason, entries, .. } = &ended_events[0] else {
        panic!("expected session_ended");
    };
    assert_eq!(*reason, CloseReason::HostEnded);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].participant_id, 10);
    assert_eq!(h.notifier.closed_sessions(), vec![session.id]);
}

#[tokio::test]
async fn ties_share_rank_and_next_rank_skips() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10, 11, 12]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    let q = session.questions[0].id;

    for (id, ms) in [(10, 3_000), (11, 3_000), (12, 9_000)] {
        h.engine
            .submit_answer(&player(id), session.id, q, right(), ms, at(10))
            .await
            .unwrap();
    }
    h.engine.end(&host(), session.id, at(20)).await.unwrap();

    assert_eq!(h.record(session.id, 10).await.rank, Some(1));
    assert_eq!(h.record(session.id, 11).await.rank, Some(1));
    assert_eq!(h.record(session.id, 12).await.rank, Some(3));
}

#[tokio::test]
async fn sweeper_expiry_racing_advance_has_exactly_one_effect() {
    let h = harness();
    let session = h.create_quiz(2, 1).await;
    h.join_all(session.id, &[10]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();

    let now = at(5);
    let host = host();
    let (advanced, swept) = tokio::join!(
        h.engine.advance(&host, session.id, now),
        sweeper::tick(&h.engine, now)
    );
    let report = swept.unwrap();
    let final_status = h.session(session.id).await.status;

    match advanced {
        Ok(outcome) => {
            assert!(report.closed.is_empty());
            assert_eq!(outcome.session.status, SessionStatus::Leaderboard);
            assert_eq!(final_status, SessionStatus::Leaderboard);
        }
        Err(err) => {
            assert!(matches!(err, DomainError::InvalidTransition(_)));
            assert_eq!(report.closed, vec![session.id]);
            assert_eq!(final_status, SessionStatus::Done);
        }
    }
    assert!(h.notifier.count("session_ended") <= 1);
}

#[tokio::test]
async fn advance_walks_questions_then_finishes() {
    let h = harness();
    let session = h.create_quiz(2, 0).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();

    let board = h.engine.advance(&host(), session.id, at(1)).await.unwrap();
    assert_eq!(board.session.status, SessionStatus::Leaderboard);
    assert_eq!(board.transitions, vec![SessionTransition::LeaderboardShown]);
    assert_eq!(h.notifier.count("leaderboard"), 1);

    let next = h.engine.advance(&host(), session.id, at(2)).await.unwrap();
    assert_eq!(next.session.status, SessionStatus::QuestionActive);
    assert_eq!(next.session.current_question_index, Some(1));

    h.engine.advance(&host(), session.id, at(3)).await.unwrap();
    let done = h.engine.advance(&host(), session.id, at(4)).await.unwrap();
    assert_eq!(done.session.status, SessionStatus::Done);

    let SessionEvent::SessionEnded { reason, .. } = &h.notifier.of_kind("session_ended")[0] else {
        panic!("expected session_ended");
    };
    assert_eq!(*reason, CloseReason::Finished);
}

#[tokio::test]
async fn force_close_is_idempotent() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    h.engine.end(&host(), session.id, at(1)).await.unwrap();
    let version = h.session(session.id).await.version;

    let again = h.engine.end(&host(), session.id, at(2)).await.unwrap();
    assert!(!again.changed());
    assert_eq!(again.session.status, SessionStatus::Done);
    assert_eq!(h.session(session.id).await.version, version);
    assert_eq!(h.notifier.count("session_ended"), 1);
}

#[tokio::test]
async fn repeated_close_finishes_interrupted_record_updates() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    h.engine.end(&host(), session.id, at(1)).await.unwrap();

    // Simulate a close that stopped before this record was written.
    let mut stale = h.record(session.id, 10).await;
    stale.status = ParticipantStatus::InProgress;
    stale.completed_at = None;
    stale.rank = None;
    h.engine
        .store()
        .upsert_participant_record(&stale)
        .await
        .unwrap();

    h.engine.end(&host(), session.id, at(2)).await.unwrap();
    let record = h.record(session.id, 10).await;
    assert_eq!(record.status, ParticipantStatus::Completed);
    assert_eq!(record.rank, Some(1));

    let ended = h.notifier.of_kind("session_ended");
    assert_eq!(ended.len(), 2);
    let SessionEvent::SessionEnded { reason, entries, .. } = &ended[1] else {
        panic!("expected session_ended");
    };
    assert_eq!(*reason, CloseReason::HostEnded);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].participant_id, 10);

    // Nothing left to finish: no further announcement.
    h.engine.end(&host(), session.id, at(3)).await.unwrap();
    assert_eq!(h.notifier.count("session_ended"), 2);
}

#[tokio::test]
async fn commands_after_done_are_rejected() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    h.engine.end(&host(), session.id, at(1)).await.unwrap();

    assert!(matches!(
        h.engine.advance(&host(), session.id, at(2)).await,
        Err(DomainError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.engine.start(&host(), session.id, at(2)).await,
        Err(DomainError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.engine
            .submit_answer(&player(10), session.id, session.questions[0].id, wrong(), 0, at(2))
            .await,
        Err(DomainError::SessionInactive(_))
    ));
    assert!(matches!(
        h.engine.join(&player(12), session.id, at(2)).await,
        Err(DomainError::SessionInactive(_))
    ));
}

#[tokio::test]
async fn only_the_owner_or_an_admin_drives_a_session() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;

    let err = h
        .engine
        .start(&player(10), session.id, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let mut admin = player(99);
    admin.role = quizroom::domain::identity::Role::Admin;
    let outcome = h.engine.start(&admin, session.id, t0()).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::QuestionActive);
}

#[tokio::test]
async fn starting_an_empty_session_is_a_validation_error() {
    let h = harness();
    let session = h
        .create(new_session(Vec::new(), SessionSettings::default()))
        .await;

    let err = h.engine.start(&host(), session.id, t0()).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Validation(ValidationKind::EmptySession, _)
    ));
    assert_eq!(h.session(session.id).await.status, SessionStatus::Waiting);
}

#[tokio::test]
async fn participants_cannot_create_sessions() {
    let h = harness();
    let err = h
        .engine
        .create_session(
            &player(10),
            new_session(support::fixtures::quiz(1, 30), SessionSettings::default()),
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
}

#[tokio::test]
async fn lost_optimistic_lock_is_retried_against_fresh_state() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.store.fail_saves(
        2,
        DomainError::conflict(ConflictKind::OptimisticLock, "version moved"),
    );

    let outcome = h.engine.start(&host(), session.id, t0()).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::QuestionActive);
    assert_eq!(h.store.save_attempts(), 3);
    assert_eq!(h.notifier.count("state_changed"), 1);
}

#[tokio::test]
async fn retries_stop_after_the_configured_attempts() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.store
        .fail_saves(10, DomainError::infra(InfraErrorKind::DbUnavailable, "down"));

    let err = h.engine.start(&host(), session.id, t0()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.store.save_attempts(), 3);
    assert_eq!(h.session(session.id).await.status, SessionStatus::Waiting);
    assert_eq!(h.notifier.count("state_changed"), 0);
}

#[tokio::test]
async fn non_retryable_save_failures_are_not_retried() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.store.fail_saves(
        1,
        DomainError::infra(InfraErrorKind::DataCorruption, "bad row"),
    );

    assert!(h.engine.start(&host(), session.id, t0()).await.is_err());
    assert_eq!(h.store.save_attempts(), 1);
}

#[tokio::test]
async fn committed_save_with_lost_acknowledgement_advances_once() {
    let h = harness();
    let session = h.create_quiz(2, 30).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    let attempts_before = h.store.save_attempts();
    h.store
        .fail_after_commit(1, DomainError::infra(InfraErrorKind::Timeout, "ack lost"));

    let outcome = h.engine.advance(&host(), session.id, at(1)).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::Leaderboard);
    assert_eq!(outcome.session.current_question_index, Some(0));
    assert_eq!(outcome.transitions, vec![SessionTransition::LeaderboardShown]);

    let stored = h.session(session.id).await;
    assert_eq!(stored.status, SessionStatus::Leaderboard);
    assert_eq!(stored.current_question_index, Some(0));
    assert_eq!(h.store.save_attempts(), attempts_before + 1);
    assert_eq!(h.notifier.count("leaderboard"), 1);
}

#[tokio::test]
async fn committed_close_with_lost_acknowledgement_still_announces() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    h.store
        .fail_after_commit(1, DomainError::infra(InfraErrorKind::Timeout, "ack lost"));

    let outcome = h.engine.end(&host(), session.id, at(1)).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::Done);
    assert!(outcome.transitions.contains(&SessionTransition::Ended));
    assert_eq!(
        h.record(session.id, 10).await.status,
        ParticipantStatus::Completed
    );
    assert_eq!(h.notifier.count("session_ended"), 1);
}
