// src/engine/analytics.rs

//! Longitudinal aggregates over a user's completed attempts.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::models::{
    analytics::{GroupPerformance, TypePerformance, UserStats, UserStrengthWeakness},
    attempt::Attempt,
    quiz::QuestionType,
};

/// Above this many groups, strong/weak take fixed-size buckets from each end of the ranking.
pub const STRONG_WEAK_GROUP_THRESHOLD: usize = 5;

/// Bucket size used once the threshold is exceeded.
pub const STRONG_WEAK_BUCKET_SIZE: usize = 3;

/// One graded question, annotated with the grouping keys of its quiz and question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuestion {
    pub subject: String,
    pub tags: Vec<String>,
    pub question_type: QuestionType,
    pub is_correct: bool,
}

/// Summary statistics over a set of completed attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistorySummary {
    pub total_attempts: usize,
    pub average_score: f64,
    pub best_score: f64,
    pub total_time_spent_seconds: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    answered: u32,
    correct: u32,
}

impl Tally {
    fn record(&mut self, is_correct: bool) {
        self.answered += 1;
        if is_correct {
            self.correct += 1;
        }
    }

    fn score(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.answered) * 100.0
        }
    }
}

/// Orders completed attempts newest first. Attempts without a completion time sort last.
pub fn sort_most_recent_first(attempts: &mut [Attempt]) {
    attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
}

pub fn history_summary(attempts: &[Attempt]) -> HistorySummary {
    if attempts.is_empty() {
        return HistorySummary::default();
    }

    let scores: Vec<f64> = attempts.iter().map(|a| a.score.unwrap_or(0.0)).collect();
    HistorySummary {
        total_attempts: attempts.len(),
        average_score: scores.iter().sum::<f64>() / scores.len() as f64,
        best_score: scores.iter().copied().fold(0.0, f64::max),
        total_time_spent_seconds: attempts.iter().filter_map(|a| a.time_taken_seconds).sum(),
    }
}

/// Groups answered questions by subject, tag and question type.
pub fn strengths_and_weaknesses(answers: &[AnsweredQuestion]) -> UserStrengthWeakness {
    let mut subjects: HashMap<&str, Tally> = HashMap::new();
    let mut tags: HashMap<&str, Tally> = HashMap::new();
    let mut types: BTreeMap<QuestionType, Tally> = BTreeMap::new();

    for answer in answers {
        subjects
            .entry(answer.subject.as_str())
            .or_default()
            .record(answer.is_correct);
        for tag in &answer.tags {
            tags.entry(tag.as_str()).or_default().record(answer.is_correct);
        }
        types
            .entry(answer.question_type)
            .or_default()
            .record(answer.is_correct);
    }

    let (strong_subjects, weak_subjects) = split_strong_weak(rank(subjects));
    let (strong_tags, weak_tags) = split_strong_weak(rank(tags));

    let performance_by_question_type = types
        .into_iter()
        .map(|(question_type, tally)| {
            (
                question_type.as_str().to_string(),
                TypePerformance {
                    score: tally.score(),
                    questions_answered: tally.answered,
                    questions_correct: tally.correct,
                },
            )
        })
        .collect();

    UserStrengthWeakness {
        strong_subjects,
        weak_subjects,
        strong_tags,
        weak_tags,
        performance_by_question_type,
    }
}

/// Score descending; ties broken by name ascending so the ranking is reproducible.
fn rank(groups: HashMap<&str, Tally>) -> Vec<GroupPerformance> {
    let mut ranked: Vec<GroupPerformance> = groups
        .into_iter()
        .map(|(name, tally)| GroupPerformance {
            name: name.to_string(),
            score: tally.score(),
            questions_answered: tally.answered,
            questions_correct: tally.correct,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    ranked
}

/// Splits a ranking into (strong, weak). Weak is returned worst first.
fn split_strong_weak(
    ranked: Vec<GroupPerformance>,
) -> (Vec<GroupPerformance>, Vec<GroupPerformance>) {
    let len = ranked.len();
    let (strong_end, weak_start) = if len > STRONG_WEAK_GROUP_THRESHOLD {
        (STRONG_WEAK_BUCKET_SIZE, len - STRONG_WEAK_BUCKET_SIZE)
    } else {
        (len / 2, len / 2)
    };

    let strong = ranked[..strong_end].to_vec();
    let weak = ranked[weak_start..].iter().rev().cloned().collect();
    (strong, weak)
}

/// Per-user statistics. Strongest/weakest subject come from the two ends of the subject ranking.
pub fn user_stats(
    user_id: &str,
    quizzes_created: i64,
    attempts: &[Attempt],
    answers: &[AnsweredQuestion],
    now: DateTime<Utc>,
) -> UserStats {
    let summary = history_summary(attempts);

    let mut subjects: HashMap<&str, Tally> = HashMap::new();
    for answer in answers {
        subjects
            .entry(answer.subject.as_str())
            .or_default()
            .record(answer.is_correct);
    }
    let ranked = rank(subjects);

    UserStats {
        user_id: user_id.to_string(),
        quizzes_created,
        quizzes_completed: attempts.len(),
        quizzes_passed: attempts.iter().filter(|a| a.passed == Some(true)).count(),
        total_questions: answers.len(),
        correct_answers: answers.iter().filter(|a| a.is_correct).count(),
        average_score: summary.average_score,
        total_time_spent: summary.total_time_spent_seconds,
        strongest_subject: ranked.first().map(|g| g.name.clone()),
        weakest_subject: ranked.last().map(|g| g.name.clone()),
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::attempt::AttemptStatus;

    fn answered(subject: &str, tags: &[&str], question_type: QuestionType, is_correct: bool) -> AnsweredQuestion {
        AnsweredQuestion {
            subject: subject.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            question_type,
            is_correct,
        }
    }

    fn completed(id: &str, score: f64, seconds: i64, completed_at: DateTime<Utc>) -> Attempt {
        Attempt {
            id: id.to_string(),
            quiz_id: "quiz".into(),
            user_id: "u1".into(),
            started_at: completed_at - Duration::seconds(seconds),
            expires_at: None,
            status: AttemptStatus::Completed,
            completed_at: Some(completed_at),
            time_taken_seconds: Some(seconds),
            score: Some(score),
            points_earned: None,
            points_possible: None,
            passed: Some(score >= 50.0),
        }
    }

    /// Subject named `name` answered `answered` times with `correct` right.
    fn subject_answers(name: &str, answered_count: usize, correct: usize) -> Vec<AnsweredQuestion> {
        (0..answered_count)
            .map(|i| answered(name, &[], QuestionType::SingleChoice, i < correct))
            .collect()
    }

    #[test]
    fn empty_history_is_all_zero() {
        let summary = history_summary(&[]);
        assert_eq!(summary, HistorySummary::default());

        let sw = strengths_and_weaknesses(&[]);
        assert_eq!(sw, UserStrengthWeakness::default());
    }

    #[test]
    fn summary_uses_mean_max_and_sum() {
        let now = Utc::now();
        let attempts = vec![
            completed("a", 50.0, 60, now),
            completed("b", 100.0, 30, now),
            completed("c", 75.0, 10, now),
        ];
        let summary = history_summary(&attempts);
        assert_eq!(summary.total_attempts, 3);
        assert_eq!(summary.average_score, 75.0);
        assert_eq!(summary.best_score, 100.0);
        assert_eq!(summary.total_time_spent_seconds, 100);
    }

    #[test]
    fn newest_attempts_come_first() {
        let now = Utc::now();
        let mut attempts = vec![
            completed("old", 10.0, 1, now - Duration::days(2)),
            completed("new", 10.0, 1, now),
            completed("mid", 10.0, 1, now - Duration::days(1)),
        ];
        sort_most_recent_first(&mut attempts);
        let ids: Vec<&str> = attempts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn few_groups_split_at_midpoint() {
        let mut answers = subject_answers("Anatomy", 4, 4);
        answers.extend(subject_answers("Biochem", 4, 3));
        answers.extend(subject_answers("Cardio", 4, 1));

        let sw = strengths_and_weaknesses(&answers);
        let strong: Vec<&str> = sw.strong_subjects.iter().map(|g| g.name.as_str()).collect();
        let weak: Vec<&str> = sw.weak_subjects.iter().map(|g| g.name.as_str()).collect();

        assert_eq!(strong, vec!["Anatomy"]);
        assert_eq!(weak, vec!["Cardio", "Biochem"]);
        assert_eq!(sw.weak_subjects[0].score, 25.0);
    }

    #[test]
    fn many_groups_take_three_from_each_end() {
        let mut answers = Vec::new();
        for (i, name) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
            answers.extend(subject_answers(name, 7, 7 - i));
        }

        let sw = strengths_and_weaknesses(&answers);
        let strong: Vec<&str> = sw.strong_subjects.iter().map(|g| g.name.as_str()).collect();
        let weak: Vec<&str> = sw.weak_subjects.iter().map(|g| g.name.as_str()).collect();

        assert_eq!(strong, vec!["A", "B", "C"]);
        assert_eq!(weak, vec!["G", "F", "E"]);
    }

    #[test]
    fn ties_rank_by_name() {
        let mut answers = subject_answers("Zoology", 2, 1);
        answers.extend(subject_answers("Botany", 2, 1));

        let sw = strengths_and_weaknesses(&answers);
        assert_eq!(sw.strong_subjects[0].name, "Botany");
        assert_eq!(sw.weak_subjects[0].name, "Zoology");
    }

    #[test]
    fn tags_and_types_are_counted_per_answer() {
        let answers = vec![
            answered("Anatomy", &["bones", "limbs"], QuestionType::SingleChoice, true),
            answered("Anatomy", &["bones"], QuestionType::MultipleChoice, false),
        ];

        let sw = strengths_and_weaknesses(&answers);
        let all_tags: Vec<&GroupPerformance> = sw.strong_tags.iter().chain(&sw.weak_tags).collect();
        let bones = all_tags.iter().find(|g| g.name == "bones").unwrap();
        assert_eq!((bones.questions_answered, bones.questions_correct), (2, 1));

        let single = &sw.performance_by_question_type["single_choice"];
        assert_eq!(single.score, 100.0);
        let multi = &sw.performance_by_question_type["multiple_choice"];
        assert_eq!(multi.score, 0.0);
    }

    #[test]
    fn user_stats_derive_from_attempts_and_answers() {
        let now = Utc::now();
        let attempts = vec![completed("a", 40.0, 20, now), completed("b", 80.0, 40, now)];
        let mut answers = subject_answers("Anatomy", 3, 3);
        answers.extend(subject_answers("Pharmacology", 3, 0));

        let stats = user_stats("u1", 2, &attempts, &answers, now);
        assert_eq!(stats.quizzes_created, 2);
        assert_eq!(stats.quizzes_completed, 2);
        assert_eq!(stats.quizzes_passed, 1);
        assert_eq!(stats.total_questions, 6);
        assert_eq!(stats.correct_answers, 3);
        assert_eq!(stats.average_score, 60.0);
        assert_eq!(stats.total_time_spent, 60);
        assert_eq!(stats.strongest_subject.as_deref(), Some("Anatomy"));
        assert_eq!(stats.weakest_subject.as_deref(), Some("Pharmacology"));
    }
}
