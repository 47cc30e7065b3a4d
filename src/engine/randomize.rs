// src/engine/randomize.rs

use rand::{Rng, seq::SliceRandom};

use crate::models::quiz::Quiz;

/// Shuffles the display order of an attempt's quiz according to its randomization flags.
///
/// Only positions change. Question and option ids stay the same, so scoring is unaffected.
pub fn randomize_for_attempt<R: Rng + ?Sized>(quiz: &mut Quiz, rng: &mut R) {
    if quiz.randomize_questions {
        quiz.questions.shuffle(rng);
        for (index, question) in quiz.questions.iter_mut().enumerate() {
            question.order_index = index as i32;
        }
    }

    if quiz.randomize_options {
        for question in &mut quiz.questions {
            question.options.shuffle(rng);
            for (index, option) in question.options.iter_mut().enumerate() {
                option.order_index = index as i32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use chrono::Utc;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        engine::scoring::score_quiz,
        models::{
            attempt::Answer,
            quiz::{AnswerOption, Question, QuestionType, QuizStatus},
        },
    };

    fn quiz(randomize_questions: bool, randomize_options: bool) -> Quiz {
        let questions = (0..8)
            .map(|q| Question {
                id: format!("q{q}"),
                text: format!("Question {q}"),
                question_type: QuestionType::SingleChoice,
                explanation: None,
                tags: vec![],
                difficulty: None,
                options: (0..4)
                    .map(|o| AnswerOption {
                        id: format!("q{q}o{o}"),
                        text: format!("Option {o}"),
                        is_correct: o == 0,
                        explanation: None,
                        order_index: o,
                    })
                    .collect(),
                order_index: q,
            })
            .collect();

        Quiz {
            id: "quiz".into(),
            title: "Quiz".into(),
            description: None,
            subject: "Physiology".into(),
            year_level: None,
            time_limit: None,
            pass_score: None,
            randomize_questions,
            randomize_options,
            tags: vec![],
            status: QuizStatus::Published,
            questions,
            created_by: "creator".into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn question_ids(quiz: &Quiz) -> Vec<String> {
        quiz.questions.iter().map(|q| q.id.clone()).collect()
    }

    #[test]
    fn flags_off_leaves_order_untouched() {
        let original = quiz(false, false);
        let mut shown = original.clone();
        randomize_for_attempt(&mut shown, &mut StdRng::seed_from_u64(7));
        assert_eq!(shown, original);
    }

    #[test]
    fn shuffled_questions_keep_the_same_id_set() {
        let original = quiz(true, false);
        let expected: BTreeSet<String> = question_ids(&original).into_iter().collect();

        for seed in 0..20 {
            let mut shown = original.clone();
            randomize_for_attempt(&mut shown, &mut StdRng::seed_from_u64(seed));

            let ids: BTreeSet<String> = question_ids(&shown).into_iter().collect();
            assert_eq!(ids, expected);
            let positions: Vec<i32> = shown.questions.iter().map(|q| q.order_index).collect();
            assert_eq!(positions, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn option_shuffle_keeps_each_question_option_set() {
        let original = quiz(false, true);
        let mut shown = original.clone();
        randomize_for_attempt(&mut shown, &mut StdRng::seed_from_u64(3));

        assert_eq!(question_ids(&shown), question_ids(&original));
        for (before, after) in original.questions.iter().zip(&shown.questions) {
            let a: BTreeSet<&str> = before.options.iter().map(|o| o.id.as_str()).collect();
            let b: BTreeSet<&str> = after.options.iter().map(|o| o.id.as_str()).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn scoring_ignores_display_order() {
        let original = quiz(true, true);
        let mut shown = original.clone();
        randomize_for_attempt(&mut shown, &mut StdRng::seed_from_u64(11));

        let answers: HashMap<String, Answer> = shown
            .questions
            .iter()
            .map(|q| (q.id.clone(), Answer::Single(format!("{}o0", q.id))))
            .collect();

        assert_eq!(score_quiz(&original, &answers).points_earned, 8.0);
    }
}
