// src/repositories/mod.rs

pub mod attempt_repository;
pub mod quiz_repository;
pub mod user_repository;

pub use attempt_repository::{AttemptRepository, PgAttemptRepository};
pub use quiz_repository::{PgQuizRepository, QuizRepository};
pub use user_repository::{PgUserRepository, UserRepository};
