// src/services/scoring.rs

use std::collections::HashMap;

use crate::models::{
    attempt::{Answer, ReviewItem, ScoreSummary},
    question::Question,
};

/// Grades one selection against the question as it is right now.
///
/// The first option flagged correct is authoritative. An absent selection is
/// never correct, so it earns `-negative_marks` like any wrong answer.
pub fn grade(question: &Question, selected_option_id: Option<String>) -> Answer {
    let selected_option_id = selected_option_id.filter(|id| !id.is_empty());
    let correct = match (question.correct_option(), selected_option_id.as_deref()) {
        (Some(option), Some(selected)) => option.id == selected,
        _ => false,
    };
    let marks_awarded = if correct {
        question.marks
    } else {
        -question.negative_marks
    };

    Answer {
        question_id: question.id,
        selected_option_id,
        correct,
        marks_awarded,
    }
}

/// Rounds half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregates saved answers into a summary.
///
/// Only answered questions count towards `total_possible_marks`. Answers whose
/// question no longer exists are left out of every aggregate and listed in
/// `skipped_question_ids`.
pub fn summarize(
    attempt_id: i64,
    answers: &[Answer],
    questions: &HashMap<i64, Question>,
    late: bool,
) -> ScoreSummary {
    let mut total_marks = 0.0;
    let mut total_possible_marks = 0.0;
    let mut correct_count = 0;
    let mut attempted_count = 0;
    let mut review = Vec::with_capacity(answers.len());
    let mut skipped = Vec::new();

    for answer in answers {
        let Some(question) = questions.get(&answer.question_id) else {
            skipped.push(answer.question_id);
            continue;
        };

        if answer.is_attempted() {
            attempted_count += 1;
        }
        if answer.correct {
            correct_count += 1;
        }
        total_possible_marks += question.marks;
        total_marks += answer.marks_awarded;

        review.push(ReviewItem {
            question_id: question.id,
            question_text: question.text.clone(),
            selected_option_id: answer.selected_option_id.clone(),
            correct_option_id: question.correct_option().map(|o| o.id.clone()),
            marks_awarded: answer.marks_awarded,
        });
    }

    let percentage = if total_possible_marks > 0.0 {
        round2(total_marks / total_possible_marks * 100.0)
    } else {
        0.0
    };
    let accuracy = if attempted_count > 0 {
        round2(correct_count as f64 / attempted_count as f64 * 100.0)
    } else {
        0.0
    };

    ScoreSummary {
        attempt_id,
        total_marks,
        total_possible_marks,
        correct_count,
        attempted_count,
        percentage,
        accuracy,
        late,
        answers: review,
        skipped_question_ids: skipped,
    }
}
