//! Content generation: lesson authoring, section expansion and exam synthesis.

use async_trait::async_trait;

use course_core::model::Question;

use crate::error::GenerationError;

mod chat;
pub mod prompts;

pub use chat::{ChatContentGenerator, parse_questions, settings_from_env};

/// Generative-content provider.
///
/// Every call is a single request with no retry; failures surface as one error.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Write the full markdown text of a lesson.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the provider fails or answers with nothing.
    async fn author_lesson(&self, lesson_title: &str, topic: &str)
    -> Result<String, GenerationError>;

    /// Write an in-depth expansion of one section of a lesson.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the provider fails or answers with nothing.
    async fn expand_section(
        &self,
        lesson_title: &str,
        section_title: &str,
    ) -> Result<String, GenerationError>;

    /// Produce `count` multiple-choice questions grounded in `corpus`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the provider fails or the response does not
    /// hold valid questions.
    async fn synthesize_exam(
        &self,
        title: &str,
        corpus: &[String],
        count: usize,
    ) -> Result<Vec<Question>, GenerationError>;
}

/// Enforce the requested question count: surplus questions are dropped, a
/// short set is rejected.
///
/// # Errors
///
/// Returns `GenerationError::TooFewQuestions` when fewer than `count` arrive.
pub fn fit_to_count(
    mut questions: Vec<Question>,
    count: usize,
) -> Result<Vec<Question>, GenerationError> {
    if questions.len() < count {
        return Err(GenerationError::TooFewQuestions {
            expected: count,
            found: questions.len(),
        });
    }
    questions.truncate(count);
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                Question::new(
                    format!("q{i}"),
                    vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    0,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn surplus_is_truncated_and_short_sets_rejected() {
        assert_eq!(fit_to_count(questions(12), 10).unwrap().len(), 10);
        assert!(matches!(
            fit_to_count(questions(9), 10),
            Err(GenerationError::TooFewQuestions {
                expected: 10,
                found: 9
            })
        ));
    }
}
