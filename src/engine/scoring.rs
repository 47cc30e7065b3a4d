// src/engine/scoring.rs

//! Grades a submission against a quiz's answer key.
//!
//! Every question is worth [`POINTS_PER_QUESTION`]. Answers are keyed by option id, so the
//! order in which questions or options were displayed never affects the outcome.

use std::collections::{BTreeSet, HashMap};

use crate::models::{
    attempt::{Answer, QuestionResult},
    quiz::{Question, QuestionType, Quiz},
};

pub const POINTS_PER_QUESTION: f64 = 1.0;

/// Share of the available points at which a multiple choice question counts as correct.
pub const MULTI_CORRECT_THRESHOLD: f64 = 0.5;

/// Per-question results in quiz order plus the point totals.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    pub results: Vec<QuestionResult>,
    pub points_earned: f64,
    pub points_possible: f64,
}

impl ScoreSheet {
    pub fn percentage(&self) -> f64 {
        score_percentage(self.points_earned, self.points_possible)
    }

    /// `None` when the quiz has no pass threshold.
    pub fn passed(&self, pass_score: Option<f64>) -> Option<bool> {
        pass_score.map(|threshold| self.percentage() >= threshold)
    }
}

pub fn score_percentage(points_earned: f64, points_possible: f64) -> f64 {
    if points_possible > 0.0 {
        points_earned / points_possible * 100.0
    } else {
        0.0
    }
}

/// Scores every question of `quiz`. Questions missing from `answers` count as unanswered.
pub fn score_quiz(quiz: &Quiz, answers: &HashMap<String, Answer>) -> ScoreSheet {
    let mut results = Vec::with_capacity(quiz.questions.len());
    let mut points_earned = 0.0;
    let mut points_possible = 0.0;

    for question in &quiz.questions {
        let selected = answers
            .get(&question.id)
            .map(Answer::selected)
            .unwrap_or_default();

        let (is_correct, earned) = score_question(question, &selected);
        points_earned += earned;
        points_possible += POINTS_PER_QUESTION;

        results.push(QuestionResult {
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            is_correct,
            points_earned: earned,
            points_possible: POINTS_PER_QUESTION,
            selected_option_ids: selected.iter().map(|id| id.to_string()).collect(),
            correct_option_ids: question.correct_option_ids(),
            explanation: question.explanation.clone(),
        });
    }

    ScoreSheet {
        results,
        points_earned,
        points_possible,
    }
}

/// Returns `(is_correct, points_earned)` for one question.
///
/// Selected ids that are not correct options of the question, including unknown ids,
/// count as incorrect selections.
pub fn score_question(question: &Question, selected: &BTreeSet<&str>) -> (bool, f64) {
    let correct: BTreeSet<&str> = question
        .options
        .iter()
        .filter(|o| o.is_correct)
        .map(|o| o.id.as_str())
        .collect();

    match question.question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            let hit = selected.len() == 1 && selected.iter().all(|id| correct.contains(id));
            (hit, if hit { POINTS_PER_QUESTION } else { 0.0 })
        }
        QuestionType::MultipleChoice => {
            if correct.is_empty() {
                return (false, 0.0);
            }
            let hits = selected.iter().filter(|id| correct.contains(*id)).count() as f64;
            let misses = selected.len() as f64 - hits;
            let per_option = POINTS_PER_QUESTION / correct.len() as f64;
            let earned = (per_option * (hits - misses)).max(0.0);
            (earned >= MULTI_CORRECT_THRESHOLD * POINTS_PER_QUESTION, earned)
        }
        // No pairing rule yet: always zero credit, still counted in points possible.
        QuestionType::Matching => (false, 0.0),
    }
}
