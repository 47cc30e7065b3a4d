// src/models/quiz.rs

use std::{str::FromStr, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    error::{AppError, AppResult},
    utils::html::clean_html,
};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} _\-]{0,49}$").expect("tag pattern is a valid regex")
});

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    /// Pairing question. Contributes no credit until a pairing rule exists.
    Matching,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Matching => "matching",
        }
    }
}

impl FromStr for QuestionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_choice" => Ok(QuestionType::SingleChoice),
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "matching" => Ok(QuestionType::Matching),
            other => Err(AppError::RepositoryError(format!(
                "unknown question type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Published => "published",
            QuizStatus::Archived => "archived",
        }
    }
}

impl FromStr for QuizStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(QuizStatus::Draft),
            "published" => Ok(QuizStatus::Published),
            "archived" => Ok(QuizStatus::Archived),
            other => Err(AppError::RepositoryError(format!(
                "unknown quiz status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub explanation: Option<String>,
    pub tags: Vec<String>,
    /// 1 (easiest) to 5.
    pub difficulty: Option<i16>,
    pub options: Vec<AnswerOption>,
    pub order_index: i32,
}

impl Question {
    /// Ids of the options marked correct, in display order.
    pub fn correct_option_ids(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.clone())
            .collect()
    }
}

/// A quiz with its full question set, including answer keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub year_level: Option<i32>,
    /// Minutes allowed per attempt. No limit when unset.
    pub time_limit: Option<i32>,
    /// Percentage needed to pass.
    pub pass_score: Option<f64>,
    pub randomize_questions: bool,
    pub randomize_options: bool,
    pub tags: Vec<String>,
    pub status: QuizStatus,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quiz {
    pub fn is_published(&self) -> bool {
        self.status == QuizStatus::Published
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Applies a partial update. Fields left `None` are untouched.
    pub fn apply_update(&mut self, update: UpdateQuizRequest, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = clean_html(&title);
        }
        if let Some(description) = update.description {
            self.description = Some(clean_html(&description));
        }
        if let Some(subject) = update.subject {
            self.subject = clean_html(&subject);
        }
        if let Some(year_level) = update.year_level {
            self.year_level = Some(year_level);
        }
        if let Some(time_limit) = update.time_limit {
            self.time_limit = Some(time_limit);
        }
        if let Some(pass_score) = update.pass_score {
            self.pass_score = Some(pass_score);
        }
        if let Some(flag) = update.randomize_questions {
            self.randomize_questions = flag;
        }
        if let Some(flag) = update.randomize_options {
            self.randomize_options = flag;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = Some(now);
    }
}

/// Listing row: quiz header plus question count, without questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub year_level: Option<i32>,
    pub time_limit: Option<i32>,
    pub pass_score: Option<f64>,
    pub randomize_questions: bool,
    pub randomize_options: bool,
    pub tags: Vec<String>,
    pub status: QuizStatus,
    pub question_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            subject: quiz.subject.clone(),
            year_level: quiz.year_level,
            time_limit: quiz.time_limit,
            pass_score: quiz.pass_score,
            randomize_questions: quiz.randomize_questions,
            randomize_options: quiz.randomize_options,
            tags: quiz.tags.clone(),
            status: quiz.status,
            question_count: quiz.questions.len() as i64,
            created_by: quiz.created_by.clone(),
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        }
    }
}

/// Option as shown while an attempt is in progress (no answer key).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicOption {
    pub id: String,
    pub text: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub tags: Vec<String>,
    pub difficulty: Option<i16>,
    pub options: Vec<PublicOption>,
    pub order_index: i32,
}

/// DTO for sending a quiz to an attempt taker (excludes correctness flags and explanations).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicQuiz {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub year_level: Option<i32>,
    pub time_limit: Option<i32>,
    pub pass_score: Option<f64>,
    pub tags: Vec<String>,
    pub questions: Vec<PublicQuestion>,
}

impl From<Quiz> for PublicQuiz {
    fn from(quiz: Quiz) -> Self {
        let questions = quiz
            .questions
            .into_iter()
            .map(|q| PublicQuestion {
                id: q.id,
                text: q.text,
                question_type: q.question_type,
                tags: q.tags,
                difficulty: q.difficulty,
                options: q
                    .options
                    .into_iter()
                    .map(|o| PublicOption {
                        id: o.id,
                        text: o.text,
                        order_index: o.order_index,
                    })
                    .collect(),
                order_index: q.order_index,
            })
            .collect();

        Self {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            subject: quiz.subject,
            year_level: quiz.year_level,
            time_limit: quiz.time_limit,
            pass_score: quiz.pass_score,
            tags: quiz.tags,
            questions,
        }
    }
}

/// A quiz as returned to a given caller: the creator sees the answer key, everyone else
/// the public view.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum QuizView {
    Full(Quiz),
    Public(PublicQuiz),
}

impl QuizView {
    pub fn for_user(quiz: Quiz, user_id: &str) -> Self {
        if quiz.is_owned_by(user_id) {
            QuizView::Full(quiz)
        } else {
            QuizView::Public(quiz.into())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[validate(length(max = 1000))]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: Option<i16>,
    #[validate(length(min = 2, message = "A question needs at least two options."), nested)]
    pub options: Vec<CreateOptionRequest>,
}

impl CreateQuestionRequest {
    /// Enforces the per-type correctness rules on the option set.
    pub fn check_option_rules(&self) -> AppResult<()> {
        let total = self.options.len();
        let correct = self.options.iter().filter(|o| o.is_correct).count();

        let violation = match self.question_type {
            QuestionType::SingleChoice if correct != 1 => {
                Some("single choice questions need exactly one correct option")
            }
            QuestionType::TrueFalse if total != 2 || correct != 1 => {
                Some("true/false questions need exactly two options with one correct")
            }
            QuestionType::MultipleChoice if correct == 0 => {
                Some("multiple choice questions need at least one correct option")
            }
            QuestionType::Matching if correct != total => {
                Some("matching questions must mark every option correct")
            }
            _ => None,
        };

        match violation {
            Some(msg) => Err(AppError::ValidationError(format!(
                "{msg} (question '{}')",
                self.text
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateQuizRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(range(min = 1, max = 10))]
    pub year_level: Option<i32>,
    #[validate(range(min = 1, message = "Time limit must be positive."))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub pass_score: Option<f64>,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub randomize_options: bool,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: QuizStatus,
    #[validate(length(min = 1, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

impl CreateQuizRequest {
    /// Runs field validation followed by the per-type option rules.
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        for question in &self.questions {
            question.check_option_rules()?;
        }
        Ok(())
    }

    /// Builds the domain quiz: sanitized text, fresh ids, positions in submission order.
    pub fn into_quiz(self, created_by: &str, now: DateTime<Utc>) -> Quiz {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(q_index, q)| Question {
                id: Uuid::new_v4().to_string(),
                text: clean_html(&q.text),
                question_type: q.question_type,
                explanation: q.explanation.as_deref().map(clean_html),
                tags: normalize_tags(q.tags),
                difficulty: q.difficulty,
                options: q
                    .options
                    .into_iter()
                    .enumerate()
                    .map(|(o_index, o)| AnswerOption {
                        id: Uuid::new_v4().to_string(),
                        text: clean_html(&o.text),
                        is_correct: o.is_correct,
                        explanation: o.explanation.as_deref().map(clean_html),
                        order_index: o_index as i32,
                    })
                    .collect(),
                order_index: q_index as i32,
            })
            .collect();

        Quiz {
            id: Uuid::new_v4().to_string(),
            title: clean_html(&self.title),
            description: self.description.as_deref().map(clean_html),
            subject: clean_html(&self.subject),
            year_level: self.year_level,
            time_limit: self.time_limit,
            pass_score: self.pass_score,
            randomize_questions: self.randomize_questions,
            randomize_options: self.randomize_options,
            tags: normalize_tags(self.tags),
            status: self.status,
            questions,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: None,
        }
    }
}

/// Partial update of quiz header fields and tag set.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub year_level: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub pass_score: Option<f64>,
    pub randomize_questions: Option<bool>,
    pub randomize_options: Option<bool>,
    #[validate(custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
    pub status: Option<QuizStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuizListParams {
    pub subject: Option<String>,
    pub year_level: Option<i32>,
    pub status: Option<QuizStatus>,
    /// Quizzes must carry every one of these. Filled from repeated `tag` pairs.
    #[serde(skip)]
    pub tags: Vec<String>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    pub created_by: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl QuizListParams {
    pub const DEFAULT_LIMIT: i64 = 10;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    /// Requested tags, normalized the way stored tags are.
    pub fn normalized_tags(&self) -> Vec<String> {
        normalize_tags(self.tags.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 20 {
        return Err(ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|tag| !TAG_PATTERN.is_match(tag.trim())) {
        return Err(ValidationError::new("invalid_tag"));
    }
    Ok(())
}

/// Trims, lowercases and de-duplicates tags, keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, is_correct: bool) -> CreateOptionRequest {
        CreateOptionRequest {
            text: text.to_string(),
            is_correct,
            explanation: None,
        }
    }

    fn question(question_type: QuestionType, options: Vec<CreateOptionRequest>) -> CreateQuestionRequest {
        CreateQuestionRequest {
            text: "Which one".to_string(),
            question_type,
            explanation: None,
            tags: vec![],
            difficulty: None,
            options,
        }
    }

    fn quiz_request(questions: Vec<CreateQuestionRequest>) -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Cardiology basics".to_string(),
            description: None,
            subject: "Cardiology".to_string(),
            year_level: Some(2),
            time_limit: Some(30),
            pass_score: Some(60.0),
            randomize_questions: false,
            randomize_options: false,
            tags: vec!["Heart ".to_string(), "heart".to_string()],
            status: QuizStatus::Published,
            questions,
        }
    }

    #[test]
    fn single_choice_requires_exactly_one_correct_option() {
        let two_correct = question(
            QuestionType::SingleChoice,
            vec![option("A", true), option("B", true)],
        );
        assert!(matches!(
            two_correct.check_option_rules(),
            Err(AppError::ValidationError(_))
        ));

        let ok = question(
            QuestionType::SingleChoice,
            vec![option("A", true), option("B", false)],
        );
        assert!(ok.check_option_rules().is_ok());
    }

    #[test]
    fn true_false_requires_two_options() {
        let three = question(
            QuestionType::TrueFalse,
            vec![option("True", true), option("False", false), option("Maybe", false)],
        );
        assert!(three.check_option_rules().is_err());
    }

    #[test]
    fn multiple_choice_requires_a_correct_option() {
        let none = question(
            QuestionType::MultipleChoice,
            vec![option("A", false), option("B", false)],
        );
        assert!(none.check_option_rules().is_err());
    }

    #[test]
    fn matching_requires_all_options_correct() {
        let partial = question(
            QuestionType::Matching,
            vec![option("A-1", true), option("B-2", false)],
        );
        assert!(partial.check_option_rules().is_err());
    }

    #[test]
    fn quiz_without_questions_is_rejected() {
        let request = quiz_request(vec![]);
        assert!(matches!(request.check(), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn invalid_option_is_reported_under_questions() {
        let request = quiz_request(vec![question(
            QuestionType::SingleChoice,
            vec![option("", true), option("B", false)],
        )]);

        let errors = request.validate().unwrap_err();
        assert!(errors.errors().contains_key("questions"));
    }

    #[test]
    fn question_with_one_option_is_rejected() {
        let request = quiz_request(vec![question(
            QuestionType::MultipleChoice,
            vec![option("A", true)],
        )]);
        assert!(request.check().is_err());
    }

    #[test]
    fn into_quiz_assigns_positions_and_normalizes_tags() {
        let request = quiz_request(vec![
            question(QuestionType::SingleChoice, vec![option("A", true), option("B", false)]),
            question(QuestionType::TrueFalse, vec![option("True", false), option("False", true)]),
        ]);
        assert!(request.check().is_ok());

        let quiz = request.into_quiz("user-1", Utc::now());
        assert_eq!(quiz.tags, vec!["heart"]);
        assert_eq!(quiz.created_by, "user-1");
        assert_eq!(quiz.questions[1].order_index, 1);
        assert_eq!(quiz.questions[1].options[1].order_index, 1);
        assert_eq!(quiz.questions[1].correct_option_ids(), vec![quiz.questions[1].options[1].id.clone()]);
    }

    #[test]
    fn public_view_hides_answer_key() {
        let request = quiz_request(vec![question(
            QuestionType::SingleChoice,
            vec![option("A", true), option("B", false)],
        )]);
        let public = PublicQuiz::from(request.into_quiz("user-1", Utc::now()));
        let json = serde_json::to_value(&public).unwrap();
        let rendered = json.to_string();
        assert!(!rendered.contains("is_correct"));
        assert!(!rendered.contains("explanation"));
    }

    #[test]
    fn pagination_rounds_total_pages_up() {
        let page: PaginatedResponse<u8> = PaginatedResponse::new(vec![], 21, 1, 10);
        assert_eq!(page.total_pages, 3);

        let params = QuizListParams {
            page: Some(3),
            limit: Some(5),
            ..Default::default()
        };
        assert_eq!(params.offset(), 10);
    }
}
