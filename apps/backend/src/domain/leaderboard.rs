//! Competition ranking over participant records.

use serde::Serialize;

use crate::domain::participant::{ParticipantRecord, ParticipantStatus};
use crate::domain::session::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub participant_id: UserId,
    pub display_name: String,
    pub total_score: i64,
    pub correct_count: u32,
    pub total_time_ms: u64,
    pub status: ParticipantStatus,
}

/// Rank records by (score desc, total time asc). Equal keys share a rank
/// and the next distinct key skips ahead ("1, 1, 3"). Terminated records
/// are left out. Participant id only fixes display order within a tie.
pub fn compute_leaderboard(records: &[ParticipantRecord]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&ParticipantRecord> =
        records.iter().filter(|r| r.status.is_ranked()).collect();
    ranked.sort_by(|a, b| {
        b.total_score()
            .cmp(&a.total_score())
            .then(a.total_time_ms().cmp(&b.total_time_ms()))
            .then(a.participant_id.cmp(&b.participant_id))
    });

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(ranked.len());
    for (pos, record) in ranked.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev)
                if prev.total_score == record.total_score()
                    && prev.total_time_ms == record.total_time_ms() =>
            {
                prev.rank
            }
            _ => pos as u32 + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            participant_id: record.participant_id,
            display_name: record.display_name.clone(),
            total_score: record.total_score(),
            correct_count: record.correct_count(),
            total_time_ms: record.total_time_ms(),
            status: record.status,
        });
    }
    entries
}

/// Records whose stored rank differs from the computed one, with the new
/// rank applied.
pub fn changed_ranks(
    records: &[ParticipantRecord],
    entries: &[LeaderboardEntry],
) -> Vec<ParticipantRecord> {
    records
        .iter()
        .filter_map(|r| {
            let rank = entries
                .iter()
                .find(|e| e.participant_id == r.participant_id)
                .map(|e| e.rank);
            (r.rank != rank).then(|| {
                let mut updated = r.clone();
                updated.rank = rank;
                updated
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::participant::{apply_answer, AnswerSlot, GradedAnswer, RecordParts};
    use crate::domain::scoring::Grade;

    fn rec(id: UserId, points: u32, ms: u64, status: ParticipantStatus) -> ParticipantRecord {
        let now = datetime!(2026-01-01 12:00 UTC);
        let base = ParticipantRecord::from_parts(RecordParts {
            session_id: 1,
            participant_id: id,
            display_name: format!("p{id}"),
            status,
            answers: vec![AnswerSlot::empty(1)],
            tab_switch_count: 0,
            rank: None,
            joined_at: now,
            completed_at: None,
            updated_at: now,
        });
        apply_answer(
            &base,
            GradedAnswer {
                question_id: 1,
                answer: None,
                grade: Grade {
                    is_correct: points > 0,
                    points_earned: points,
                },
                time_taken_ms: ms,
                answered_at: now,
            },
        )
        .unwrap()
    }

    #[test]
    fn ties_share_rank_and_next_skips() {
        let records = vec![
            rec(1, 10, 1_000, ParticipantStatus::InProgress),
            rec(2, 10, 1_000, ParticipantStatus::Completed),
            rec(3, 5, 500, ParticipantStatus::InProgress),
        ];
        let board = compute_leaderboard(&records);
        let ranks: Vec<u32> = board.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3]);
    }

    #[test]
    fn faster_wins_on_equal_score() {
        let records = vec![
            rec(1, 10, 2_000, ParticipantStatus::InProgress),
            rec(2, 10, 1_000, ParticipantStatus::InProgress),
        ];
        let board = compute_leaderboard(&records);
        assert_eq!(board[0].participant_id, 2);
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn terminated_records_are_unranked() {
        let records = vec![
            rec(1, 10, 0, ParticipantStatus::Terminated),
            rec(2, 1, 0, ParticipantStatus::Waiting),
        ];
        let board = compute_leaderboard(&records);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].rank, 1);

        let changed = changed_ranks(&records, &board);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].participant_id, 2);
    }
}
