//! Debounced leaderboard broadcasts, on paused tokio time.

mod common;
mod support;

use std::time::Duration;

use quizroom::services::notify::SessionEvent;
use support::fixtures::{at, host, player, right, t0};
use support::harness::harness;

const PAST_WINDOW: Duration = Duration::from_millis(2_100);

#[tokio::test(start_paused = true)]
async fn triggers_inside_one_window_coalesce() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10, 11, 12]).await;

    assert!(h.engine.leaderboard().has_pending(session.id));
    assert_eq!(h.notifier.count("leaderboard"), 0);

    tokio::time::sleep(PAST_WINDOW).await;

    assert_eq!(h.notifier.count("leaderboard"), 1);
    assert!(!h.engine.leaderboard().has_pending(session.id));
    match &h.notifier.of_kind("leaderboard")[0] {
        SessionEvent::Leaderboard { entries, .. } => assert_eq!(entries.len(), 3),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn a_later_trigger_opens_a_new_window() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10]).await;
    tokio::time::sleep(PAST_WINDOW).await;
    assert_eq!(h.notifier.count("leaderboard"), 1);

    h.engine.start(&host(), session.id, t0()).await.unwrap();
    h.engine
        .submit_answer(&player(10), session.id, session.questions[0].id, right(), 0, at(1))
        .await
        .unwrap();
    assert!(h.engine.leaderboard().has_pending(session.id));
    tokio::time::sleep(PAST_WINDOW).await;

    let boards = h.notifier.of_kind("leaderboard");
    assert_eq!(boards.len(), 2);
    match &boards[1] {
        SessionEvent::Leaderboard { entries, .. } => {
            assert_eq!(entries[0].total_score, 10);
            assert_eq!(entries[0].rank, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }
    // Rank was written back.
    assert_eq!(h.record(session.id, 10).await.rank, Some(1));
}

#[tokio::test(start_paused = true)]
async fn ending_cancels_the_pending_flush() {
    let h = harness();
    let session = h.create_quiz(1, 30).await;
    h.join_all(session.id, &[10, 11]).await;
    h.engine.start(&host(), session.id, t0()).await.unwrap();
    assert!(h.engine.leaderboard().has_pending(session.id));

    h.engine.end(&host(), session.id, at(1)).await.unwrap();
    assert!(!h.engine.leaderboard().has_pending(session.id));

    tokio::time::sleep(PAST_WINDOW).await;
    assert_eq!(h.notifier.count("leaderboard"), 0);
    assert_eq!(h.notifier.count("session_ended"), 1);
}

#[tokio::test(start_paused = true)]
async fn entering_leaderboard_status_publishes_at_once() {
    let h = harness();
    let session = h.create_quiz(2, 30).await;
    h.join_all(session.id, &[10]).await;
    tokio::time::sleep(PAST_WINDOW).await;
    h.notifier.clear();

    h.engine.start(&host(), session.id, t0()).await.unwrap();
    h.engine.advance(&host(), session.id, at(5)).await.unwrap();

    assert_eq!(h.notifier.count("leaderboard"), 1);
}
