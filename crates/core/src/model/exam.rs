use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::model::question::{OPTION_COUNT, Question};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("operation requires an exam in progress, exam is {phase}")]
    NotInProgress { phase: ExamPhase },

    #[error("question index {index} is out of range for {total} questions")]
    QuestionOutOfRange { index: usize, total: usize },

    #[error("option index {option} is out of range")]
    OptionOutOfRange { option: usize },

    #[error("only {answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },

    #[error("exam is {phase}, retry requires a graded exam")]
    NotGraded { phase: ExamPhase },

    #[error("a passed exam cannot be retried")]
    AlreadyPassed,

    #[error("exam is {phase} and cannot be closed")]
    CannotClose { phase: ExamPhase },

    #[error("exam attempt {attempt} is no longer loading")]
    StaleAttempt { attempt: u64 },

    #[error("exam has no questions")]
    NoQuestions,
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// Which exam is being taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExamKind {
    /// Covers the cached content of the current block; passing unlocks the next block.
    Block,
    /// Covers the whole curriculum; passing completes the program.
    Final,
}

impl ExamKind {
    #[must_use]
    pub fn from_final_flag(is_final: bool) -> Self {
        if is_final { Self::Final } else { Self::Block }
    }

    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }

    /// Number of questions requested from the generator.
    #[must_use]
    pub fn question_count(self) -> usize {
        match self {
            Self::Block => 30,
            Self::Final => 10,
        }
    }

    /// Minimum score required to pass (80% block, 70% final).
    #[must_use]
    pub fn pass_threshold(self) -> u32 {
        match self {
            Self::Block => 24,
            Self::Final => 7,
        }
    }
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamResult {
    score: u32,
    passed: bool,
}

impl ExamResult {
    #[must_use]
    pub fn new(score: u32, passed: bool) -> Self {
        Self { score, passed }
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }
}

/// Counts the answers that match each question's correct option.
#[must_use]
pub fn score_answers(questions: &[Question], answers: &BTreeMap<usize, usize>) -> u32 {
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(index, question)| {
            answers
                .get(index)
                .is_some_and(|option| question.is_correct(*option))
        })
        .count();
    u32::try_from(correct).unwrap_or(u32::MAX)
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Coarse lifecycle stage of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    Idle,
    Loading,
    InProgress,
    Graded,
}

impl fmt::Display for ExamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExamPhase::Idle => "idle",
            ExamPhase::Loading => "loading",
            ExamPhase::InProgress => "in progress",
            ExamPhase::Graded => "graded",
        };
        f.write_str(label)
    }
}

/// Exam sub-machine: `idle → loading → in-progress → graded`.
///
/// Loading and a recorded result cannot coexist, and answer keys always index
/// into the question list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExamSession {
    #[default]
    Idle,
    Loading {
        kind: ExamKind,
        attempt: u64,
    },
    InProgress {
        kind: ExamKind,
        questions: Vec<Question>,
        answers: BTreeMap<usize, usize>,
    },
    Graded {
        kind: ExamKind,
        questions: Vec<Question>,
        answers: BTreeMap<usize, usize>,
        result: ExamResult,
    },
}

impl ExamSession {
    /// Rebuild a session from persisted parts.
    ///
    /// A mode without questions collapses to idle (a load that never finished);
    /// answers pointing outside the question list or option range are dropped.
    #[must_use]
    pub fn restore(
        kind: Option<ExamKind>,
        questions: Vec<Question>,
        answers: BTreeMap<usize, usize>,
        result: Option<ExamResult>,
    ) -> Self {
        let Some(kind) = kind else {
            return Self::Idle;
        };
        if questions.is_empty() {
            return Self::Idle;
        }

        let total = questions.len();
        let answers = answers
            .into_iter()
            .filter(|(index, option)| *index < total && *option < OPTION_COUNT)
            .collect();

        match result {
            Some(result) => Self::Graded {
                kind,
                questions,
                answers,
                result,
            },
            None => Self::InProgress {
                kind,
                questions,
                answers,
            },
        }
    }

    #[must_use]
    pub fn phase(&self) -> ExamPhase {
        match self {
            Self::Idle => ExamPhase::Idle,
            Self::Loading { .. } => ExamPhase::Loading,
            Self::InProgress { .. } => ExamPhase::InProgress,
            Self::Graded { .. } => ExamPhase::Graded,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    #[must_use]
    pub fn kind(&self) -> Option<ExamKind> {
        match self {
            Self::Idle => None,
            Self::Loading { kind, .. }
            | Self::InProgress { kind, .. }
            | Self::Graded { kind, .. } => Some(*kind),
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        match self {
            Self::InProgress { questions, .. } | Self::Graded { questions, .. } => questions,
            Self::Idle | Self::Loading { .. } => &[],
        }
    }

    #[must_use]
    pub fn answers(&self) -> Option<&BTreeMap<usize, usize>> {
        match self {
            Self::InProgress { answers, .. } | Self::Graded { answers, .. } => Some(answers),
            Self::Idle | Self::Loading { .. } => None,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<ExamResult> {
        match self {
            Self::Graded { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Enter `loading` for a fresh attempt, discarding any previous questions.
    pub fn begin(&mut self, kind: ExamKind, attempt: u64) {
        *self = Self::Loading { kind, attempt };
    }

    /// Apply generated questions to the matching loading attempt.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::StaleAttempt` if the session moved on since the
    /// attempt began, or `ExamError::NoQuestions` for an empty set.
    pub fn load(&mut self, attempt: u64, questions: Vec<Question>) -> Result<(), ExamError> {
        let kind = match self {
            Self::Loading {
                kind,
                attempt: current,
            } if *current == attempt => *kind,
            _ => return Err(ExamError::StaleAttempt { attempt }),
        };
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        *self = Self::InProgress {
            kind,
            questions,
            answers: BTreeMap::new(),
        };
        Ok(())
    }

    /// Abandon the loading attempt, if it is still the current one.
    ///
    /// Returns true when the session was reset to idle.
    pub fn abort_loading(&mut self, attempt: u64) -> bool {
        match self {
            Self::Loading {
                attempt: current, ..
            } if *current == attempt => {
                *self = Self::Idle;
                true
            }
            _ => false,
        }
    }

    /// Record or overwrite the chosen option for a question.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if no exam is in progress or either index is out of range.
    pub fn answer(&mut self, index: usize, option: usize) -> Result<(), ExamError> {
        let phase = self.phase();
        let Self::InProgress {
            questions, answers, ..
        } = self
        else {
            return Err(ExamError::NotInProgress { phase });
        };
        if index >= questions.len() {
            return Err(ExamError::QuestionOutOfRange {
                index,
                total: questions.len(),
            });
        }
        if option >= OPTION_COUNT {
            return Err(ExamError::OptionOutOfRange { option });
        }
        answers.insert(index, option);
        Ok(())
    }

    /// Grade a fully answered exam and move to `graded`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotInProgress` outside `in-progress` and
    /// `ExamError::Incomplete` when any question lacks an answer; the session
    /// is left untouched in both cases.
    pub fn submit(&mut self) -> Result<(ExamKind, ExamResult), ExamError> {
        let phase = self.phase();
        let Self::InProgress {
            kind,
            questions,
            answers,
        } = self
        else {
            return Err(ExamError::NotInProgress { phase });
        };

        let total = questions.len();
        let answered = (0..total).filter(|index| answers.contains_key(index)).count();
        if answered < total {
            return Err(ExamError::Incomplete { answered, total });
        }

        let kind = *kind;
        let score = score_answers(questions, answers);
        let result = ExamResult::new(score, score >= kind.pass_threshold());
        let questions = std::mem::take(questions);
        let answers = std::mem::take(answers);
        *self = Self::Graded {
            kind,
            questions,
            answers,
            result,
        };
        Ok((kind, result))
    }

    /// Kind of the failed exam that may be retried.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotGraded` outside `graded` and
    /// `ExamError::AlreadyPassed` for a passing result.
    pub fn retry_kind(&self) -> Result<ExamKind, ExamError> {
        match self {
            Self::Graded { result, .. } if result.passed() => Err(ExamError::AlreadyPassed),
            Self::Graded { kind, .. } => Ok(*kind),
            other => Err(ExamError::NotGraded {
                phase: other.phase(),
            }),
        }
    }

    /// Abandon an in-progress exam or dismiss a graded one.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::CannotClose` when idle or still loading.
    pub fn close(&mut self) -> Result<(), ExamError> {
        match self.phase() {
            ExamPhase::InProgress | ExamPhase::Graded => {
                *self = Self::Idle;
                Ok(())
            }
            phase => Err(ExamError::CannotClose { phase }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: i64) -> Question {
        Question::new(
            "q",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
        )
        .unwrap()
    }

    fn in_progress(kind: ExamKind, correct: &[i64]) -> ExamSession {
        let mut session = ExamSession::default();
        session.begin(kind, 1);
        session
            .load(1, correct.iter().map(|c| question(*c)).collect())
            .unwrap();
        session
    }

    #[test]
    fn thresholds_and_counts() {
        assert_eq!(ExamKind::Block.question_count(), 30);
        assert_eq!(ExamKind::Block.pass_threshold(), 24);
        assert_eq!(ExamKind::Final.question_count(), 10);
        assert_eq!(ExamKind::Final.pass_threshold(), 7);
        assert_eq!(ExamKind::from_final_flag(true), ExamKind::Final);
    }

    #[test]
    fn scores_two_of_two() {
        let mut session = in_progress(ExamKind::Block, &[1, 0]);
        session.answer(0, 1).unwrap();
        session.answer(1, 0).unwrap();
        let (kind, result) = session.submit().unwrap();
        assert_eq!(kind, ExamKind::Block);
        assert_eq!(result.score(), 2);
        assert!(!result.passed());
        assert_eq!(session.phase(), ExamPhase::Graded);
    }

    #[test]
    fn answers_can_be_overwritten_before_submit() {
        let mut session = in_progress(ExamKind::Final, &[2]);
        session.answer(0, 0).unwrap();
        session.answer(0, 2).unwrap();
        assert_eq!(session.answers().unwrap().get(&0), Some(&2));
    }

    #[test]
    fn rejects_partial_submission() {
        let mut session = in_progress(ExamKind::Block, &[1, 0, 3]);
        session.answer(0, 1).unwrap();
        assert_eq!(
            session.submit(),
            Err(ExamError::Incomplete {
                answered: 1,
                total: 3
            })
        );
        assert_eq!(session.phase(), ExamPhase::InProgress);
    }

    #[test]
    fn rejects_out_of_range_answers() {
        let mut session = in_progress(ExamKind::Block, &[1]);
        assert_eq!(
            session.answer(1, 0),
            Err(ExamError::QuestionOutOfRange { index: 1, total: 1 })
        );
        assert_eq!(
            session.answer(0, 4),
            Err(ExamError::OptionOutOfRange { option: 4 })
        );
    }

    #[test]
    fn stale_attempt_is_ignored() {
        let mut session = ExamSession::default();
        session.begin(ExamKind::Block, 1);
        session.begin(ExamKind::Block, 2);
        assert_eq!(
            session.load(1, vec![question(0)]),
            Err(ExamError::StaleAttempt { attempt: 1 })
        );
        assert!(!session.abort_loading(1));
        assert!(session.abort_loading(2));
        assert_eq!(session, ExamSession::Idle);
    }

    #[test]
    fn retry_only_after_failure() {
        let mut session = in_progress(ExamKind::Final, &[0]);
        assert!(matches!(
            session.retry_kind(),
            Err(ExamError::NotGraded { .. })
        ));
        session.answer(0, 1).unwrap();
        session.submit().unwrap();
        assert_eq!(session.retry_kind(), Ok(ExamKind::Final));

        let mut passed = ExamSession::restore(
            Some(ExamKind::Final),
            vec![question(0)],
            BTreeMap::from([(0, 0)]),
            Some(ExamResult::new(1, true)),
        );
        assert_eq!(passed.retry_kind(), Err(ExamError::AlreadyPassed));
        passed.close().unwrap();
        assert_eq!(passed.phase(), ExamPhase::Idle);
    }

    #[test]
    fn close_requires_active_questions() {
        let mut session = ExamSession::default();
        assert!(session.close().is_err());
        session.begin(ExamKind::Block, 1);
        assert_eq!(
            session.close(),
            Err(ExamError::CannotClose {
                phase: ExamPhase::Loading
            })
        );
    }

    #[test]
    fn restore_drops_invalid_answers_and_empty_sessions() {
        let session = ExamSession::restore(
            Some(ExamKind::Block),
            vec![question(0), question(1)],
            BTreeMap::from([(0, 0), (1, 9), (5, 1)]),
            None,
        );
        assert_eq!(session.phase(), ExamPhase::InProgress);
        assert_eq!(session.answers().unwrap().len(), 1);

        let empty = ExamSession::restore(Some(ExamKind::Block), Vec::new(), BTreeMap::new(), None);
        assert_eq!(empty, ExamSession::Idle);
    }
}
