//! Schedule sweeper: auto-start and expiry force-close.

mod common;
mod support;

use std::time::Duration;

use quizroom::domain::participant::ParticipantStatus;
use quizroom::domain::session::{SessionSettings, SessionStatus};
use quizroom::domain::transition::CloseReason;
use quizroom::services::notify::SessionEvent;
use quizroom::services::sweeper;
use support::fixtures::{at, host, new_session, quiz, t0};
use support::harness::harness;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn due_scheduled_session_is_started() {
    let h = harness();
    let mut new = new_session(quiz(2, 30), SessionSettings::default());
    new.scheduled_at = Some(at(60));
    new.auto_start = true;
    let session = h.create(new).await;
    assert_eq!(session.status, SessionStatus::Scheduled);
    h.join_all(session.id, &[10]).await;

    let early = sweeper::tick(&h.engine, at(30)).await.unwrap();
    assert!(early.is_empty());
    assert_eq!(h.session(session.id).await.status, SessionStatus::Scheduled);

    let report = sweeper::tick(&h.engine, at(60)).await.unwrap();
    assert_eq!(report.started, vec![session.id]);

    let started = h.session(session.id).await;
    assert_eq!(started.status, SessionStatus::QuestionActive);
    assert_eq!(started.started_at, Some(at(60)));
    assert_eq!(started.expires_at, Some(at(90)));
    assert_eq!(
        h.record(session.id, 10).await.status,
        ParticipantStatus::InProgress
    );
}

#[tokio::test]
async fn manual_scheduled_session_is_left_alone() {
    let h = harness();
    let mut new = new_session(quiz(1, 30), SessionSettings::default());
    new.scheduled_at = Some(at(60));
    let session = h.create(new).await;

    let report = sweeper::tick(&h.engine, at(600)).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(h.session(session.id).await.status, SessionStatus::Scheduled);

    // The host can still start it by hand.
    h.engine.start(&host(), session.id, at(601)).await.unwrap();
}

#[tokio::test]
async fn expired_question_force_closes_the_session() {
    let h = harness();
    let session = h.create_quiz(2, 10).await;
    h.join_all(session.id, &[10]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();

    let before = sweeper::tick(&h.engine, at(9)).await.unwrap();
    assert!(before.closed.is_empty());

    let report = sweeper::tick(&h.engine, at(10)).await.unwrap();
    assert_eq!(report.closed, vec![session.id]);

    let closed = h.session(session.id).await;
    assert_eq!(closed.status, SessionStatus::Done);
    assert_eq!(
        h.record(session.id, 10).await.status,
        ParticipantStatus::Completed
    );
    let ended = h.notifier.of_kind("session_ended");
    assert!(matches!(
        ended.as_slice(),
        [SessionEvent::SessionEnded {
            reason: CloseReason::Expired,
            ..
        }]
    ));

    // Nothing left to sweep.
    let again = sweeper::tick(&h.engine, at(20)).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn quiz_deadline_applies_while_on_the_leaderboard() {
    let h = harness();
    let settings = SessionSettings {
        quiz_time_limit_seconds: Some(40),
        ..SessionSettings::default()
    };
    let session = h.create(new_session(quiz(3, 30), settings)).await;
    h.join_all(session.id, &[10]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    let board = h.engine.advance(&host(), session.id, at(5)).await.unwrap();
    assert_eq!(board.session.expires_at, Some(at(40)));

    let report = sweeper::tick(&h.engine, at(40)).await.unwrap();
    assert_eq!(report.closed, vec![session.id]);
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_runs_until_cancelled() {
    let h = harness();
    let mut new = new_session(quiz(1, 30), SessionSettings::default());
    new.scheduled_at = Some(OffsetDateTime::now_utc() - time::Duration::minutes(1));
    new.auto_start = true;
    let session = h.create(new).await;

    let shutdown = CancellationToken::new();
    let handle = sweeper::spawn(h.engine.clone(), Duration::from_secs(1), shutdown.clone());

    let mut status = SessionStatus::Scheduled;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        status = h.session(session.id).await.status;
        if status != SessionStatus::Scheduled {
            break;
        }
    }
    assert_eq!(status, SessionStatus::QuestionActive);

    shutdown.cancel();
    handle.await.unwrap();
}
