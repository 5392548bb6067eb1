use thiserror::Error;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("expected {OPTION_COUNT} options, got {found}")]
    OptionCount { found: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct index {index} is out of range")]
    CorrectIndexOutOfRange { index: i64 },
}

/// A multiple-choice exam question with exactly four options and one correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: [String; OPTION_COUNT],
    correct_index: usize,
}

impl Question {
    /// Validate an untrusted question shape.
    ///
    /// Text and options are trimmed; the correct index is checked against the
    /// option count rather than clamped.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or an option is blank, the option
    /// count is not four, or the correct index is out of range.
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        correct_index: i64,
    ) -> Result<Self, QuestionError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let options: Vec<String> = options
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect();
        if let Some(index) = options.iter().position(String::is_empty) {
            return Err(QuestionError::EmptyOption { index });
        }
        let found = options.len();
        let options: [String; OPTION_COUNT] = options
            .try_into()
            .map_err(|_| QuestionError::OptionCount { found })?;

        let correct_index = usize::try_from(correct_index)
            .ok()
            .filter(|index| *index < OPTION_COUNT)
            .ok_or(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
            })?;

        Ok(Self {
            text,
            options,
            correct_index,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_index
    }
}
