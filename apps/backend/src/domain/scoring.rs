//! Answer grading: correctness plus time-weighted points.

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

use crate::domain::session::{AnswerValue, Question, QuestionKind, SessionSettings};

/// Separator between accepted variants of a fill-blank answer.
pub const FILL_BLANK_DELIMITER: char = '|';

/// Free-text answers sharing this many leading characters are accepted
/// when both are longer than it.
pub const FREE_TEXT_PREFIX_LEN: usize = 4;

/// A correct answer at the deadline keeps this share of the points.
const MIN_SPEED_FACTOR: f64 = 0.5;

/// Ceiling for the reported time on questions without a limit (one day).
pub const MAX_UNTIMED_ANSWER_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub is_correct: bool,
    pub points_earned: u32,
}

impl Grade {
    pub const WRONG: Grade = Grade {
        is_correct: false,
        points_earned: 0,
    };
}

/// Grade one answer. `None` or a blank answer is wrong and earns nothing.
pub fn grade(
    question: &Question,
    answer: Option<&AnswerValue>,
    time_taken_seconds: f64,
    settings: &SessionSettings,
) -> Grade {
    let Some(answer) = answer.filter(|a| !a.is_blank()) else {
        return Grade::WRONG;
    };

    if !is_correct(question, answer) {
        return Grade::WRONG;
    }

    let factor = if settings.speed_bonus {
        match settings.effective_time_limit(question) {
            Some(limit) => speed_factor(time_taken_seconds, f64::from(limit)),
            None => 1.0,
        }
    } else {
        1.0
    };

    Grade {
        is_correct: true,
        points_earned: (f64::from(question.points) * factor).round() as u32,
    }
}

/// Client-reported answer time as stored: capped at the question's limit,
/// or at [`MAX_UNTIMED_ANSWER_MS`] when it has none.
pub fn recorded_time_ms(
    question: &Question,
    settings: &SessionSettings,
    reported_ms: u64,
) -> u64 {
    let cap = settings
        .effective_time_limit(question)
        .map_or(MAX_UNTIMED_ANSWER_MS, |limit| u64::from(limit) * 1000);
    reported_ms.min(cap)
}

/// `1 - 0.5 * min(t / T, 1)`; negative times count as instant.
pub fn speed_factor(time_taken_seconds: f64, limit_seconds: f64) -> f64 {
    if limit_seconds <= 0.0 {
        return 1.0;
    }
    let ratio = (time_taken_seconds.max(0.0) / limit_seconds).min(1.0);
    1.0 - MIN_SPEED_FACTOR * ratio
}

fn is_correct(question: &Question, answer: &AnswerValue) -> bool {
    match question.kind {
        QuestionKind::SingleChoice => {
            let submitted = as_single(answer);
            let expected = as_single(&question.correct_answer);
            matches!((submitted, expected), (Some(s), Some(e)) if normalize(&s) == normalize(&e))
        }
        QuestionKind::MultiChoice => {
            let submitted = as_set(answer);
            !submitted.is_empty() && submitted == as_set(&question.correct_answer)
        }
        QuestionKind::FillBlank => {
            let Some(submitted) = as_single(answer).map(|s| normalize(&s)) else {
                return false;
            };
            flatten(&question.correct_answer)
                .iter()
                .flat_map(|v| v.split(FILL_BLANK_DELIMITER))
                .map(normalize)
                .any(|variant| !variant.is_empty() && variant == submitted)
        }
        QuestionKind::FreeText => {
            let submitted = flatten(answer).join(" ");
            let expected = flatten(&question.correct_answer).join(" ");
            free_text_matches(&submitted, &expected)
        }
    }
}

/// Loose match: either normalized form contains the other, or both are
/// long enough and share a prefix.
pub fn free_text_matches(submitted: &str, expected: &str) -> bool {
    let a = normalize(submitted);
    let b = normalize(expected);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    a_len > FREE_TEXT_PREFIX_LEN
        && b_len > FREE_TEXT_PREFIX_LEN
        && a.chars()
            .take(FREE_TEXT_PREFIX_LEN)
            .eq(b.chars().take(FREE_TEXT_PREFIX_LEN))
}

/// NFKC, lowercase, trimmed, inner whitespace collapsed.
pub fn normalize(s: &str) -> String {
    let folded: String = s.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn flatten(value: &AnswerValue) -> Vec<&str> {
    match value {
        AnswerValue::Text(s) => vec![s.as_str()],
        AnswerValue::Choices(c) => c.iter().map(String::as_str).collect(),
    }
}

fn as_single(value: &AnswerValue) -> Option<String> {
    match value {
        AnswerValue::Text(s) => Some(s.clone()),
        AnswerValue::Choices(c) if c.len() == 1 => c.first().cloned(),
        AnswerValue::Choices(_) => None,
    }
}

fn as_set(value: &AnswerValue) -> BTreeSet<String> {
    flatten(value)
        .into_iter()
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect()
}
