use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use course_core::model::{
    BlockId, Cursor, ExamKind, ExamResult, ExamSession, FontSize, LessonId, ProgressDraft,
    ProgressState, Question,
};

use crate::repository::StorageError;

/// Current snapshot layout. Snapshots without a version are the unversioned
/// legacy layout, which is field-compatible with version 1.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Persisted shape for a question.
///
/// Kept loose on purpose of round-tripping whatever was stored; validation
/// happens when converting back into a domain `Question`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionRecord {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i64,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            question: question.text().to_string(),
            options: question.options().to_vec(),
            correct_index: i64::try_from(question.correct_index()).unwrap_or(i64::MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResultRecord {
    pub score: u32,
    pub passed: bool,
}

/// Full progress state as a plain structured record.
///
/// Every field tolerates being missing or `null`; missing values fall back
/// individually and are re-validated by `ProgressState::restore`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unlocked_blocks: Vec<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_blocks: Vec<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_block_id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_lesson_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub master_completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub student_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub font_size: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lesson_cache: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expanded_cache: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_mode: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub final_master_exam: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_questions: Vec<QuestionRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_answers: BTreeMap<usize, usize>,
    #[serde(default)]
    pub exam_result: Option<ExamResultRecord>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub saved_at: Option<DateTime<Utc>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProgressSnapshot {
    /// Capture the persistable part of `state`.
    ///
    /// Pending cache entries and a loading exam are transient and left out.
    #[must_use]
    pub fn from_state(state: &ProgressState, saved_at: DateTime<Utc>) -> Self {
        let cursor = state.cursor();
        let exam = state.exam();
        let persisted_exam = matches!(
            exam,
            ExamSession::InProgress { .. } | ExamSession::Graded { .. }
        );

        let mut expanded_cache: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for lesson in state.expanded_lessons() {
            let sections = state
                .ready_expansions(lesson)
                .map(|(title, text)| (title.to_string(), text.to_string()))
                .collect();
            expanded_cache.insert(lesson.to_string(), sections);
        }

        Self {
            schema_version: Some(SNAPSHOT_SCHEMA_VERSION),
            unlocked_blocks: state.unlocked_blocks().iter().map(BlockId::value).collect(),
            completed_blocks: state.completed_blocks().iter().map(BlockId::value).collect(),
            current_block_id: cursor.block.value(),
            current_lesson_id: cursor.lesson.to_string(),
            master_completed: state.master_completed(),
            student_name: state.student_name().to_string(),
            font_size: state.font_size().css_value().to_string(),
            lesson_cache: state
                .ready_lessons()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
            expanded_cache,
            exam_mode: persisted_exam,
            final_master_exam: persisted_exam && exam.kind() == Some(ExamKind::Final),
            exam_questions: if persisted_exam {
                exam.questions().iter().map(QuestionRecord::from_question).collect()
            } else {
                Vec::new()
            },
            exam_answers: if persisted_exam {
                exam.answers().cloned().unwrap_or_default()
            } else {
                BTreeMap::new()
            },
            exam_result: exam.result().map(|result| ExamResultRecord {
                score: result.score(),
                passed: result.passed(),
            }),
            saved_at: Some(saved_at),
        }
    }

    /// Convert into a draft for `ProgressState::restore`.
    ///
    /// Unparseable ids are skipped; a single malformed question discards the
    /// stored exam.
    #[must_use]
    pub fn into_draft(self) -> ProgressDraft {
        let cursor = parse_lesson(&self.current_lesson_id).map(|lesson| Cursor {
            block: BlockId::new(self.current_block_id),
            lesson,
        });

        let lesson_cache = self
            .lesson_cache
            .into_iter()
            .filter_map(|(id, text)| parse_lesson(&id).map(|id| (id, text)))
            .collect();
        let expanded_cache = self
            .expanded_cache
            .into_iter()
            .filter_map(|(id, sections)| parse_lesson(&id).map(|id| (id, sections)))
            .collect();

        let exam = if self.exam_mode {
            restore_exam(
                ExamKind::from_final_flag(self.final_master_exam),
                self.exam_questions,
                self.exam_answers,
                self.exam_result,
            )
        } else {
            ExamSession::Idle
        };

        ProgressDraft {
            completed_blocks: self
                .completed_blocks
                .into_iter()
                .filter(|id| *id > 0)
                .map(BlockId::new)
                .collect(),
            cursor,
            master_completed: self.master_completed,
            student_name: Some(self.student_name).filter(|name| !name.trim().is_empty()),
            font_size: FontSize::from_css_value(&self.font_size),
            lesson_cache,
            expanded_cache,
            exam,
        }
    }

    /// Serialize to the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// Parse the stored JSON form and check its schema version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed payloads and
    /// `StorageError::UnsupportedVersion` for snapshots written by a newer build.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        let snapshot: Self =
            serde_json::from_str(raw).map_err(|err| StorageError::Serialization(err.to_string()))?;
        let found = snapshot.schema_version.unwrap_or(SNAPSHOT_SCHEMA_VERSION);
        if found > SNAPSHOT_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(snapshot)
    }
}

fn parse_lesson(raw: &str) -> Option<LessonId> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(%err, "skipping unparseable lesson id in snapshot");
            None
        }
    }
}

fn restore_exam(
    kind: ExamKind,
    records: Vec<QuestionRecord>,
    answers: BTreeMap<usize, usize>,
    result: Option<ExamResultRecord>,
) -> ExamSession {
    let questions: Result<Vec<Question>, _> = records
        .into_iter()
        .map(|record| Question::new(record.question, record.options, record.correct_index))
        .collect();
    match questions {
        Ok(questions) => ExamSession::restore(
            Some(kind),
            questions,
            answers,
            result.map(|result| ExamResult::new(result.score, result.passed)),
        ),
        Err(err) => {
            warn!(%err, "discarding stored exam with malformed question");
            ExamSession::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{Catalog, Claim};
    use course_core::time::fixed_now;

    fn lesson(block: u32, ordinal: u32) -> LessonId {
        LessonId::new(BlockId::new(block), ordinal)
    }

    fn question(correct: i64) -> Question {
        Question::new(
            "q",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
        )
        .unwrap()
    }

    #[test]
    fn restores_every_persisted_field() {
        let catalog = Catalog::standard();
        let mut state = ProgressState::new(&catalog);
        state.fill_lesson(lesson(1, 1), "lesson text".into());
        state.fill_expansion(lesson(1, 1), "Ethics", "deep".into());
        state.set_student_name("Ada Lovelace").unwrap();
        state.set_font_size(FontSize::Maximum);
        let attempt = state.begin_exam(ExamKind::Block);
        state
            .exam_mut()
            .load(attempt, vec![question(1), question(0)])
            .unwrap();
        state.exam_mut().answer(0, 1).unwrap();

        let snapshot = ProgressSnapshot::from_state(&state, fixed_now());
        let json = snapshot.to_json().unwrap();
        let restored =
            ProgressState::restore(&catalog, ProgressSnapshot::from_json(&json).unwrap().into_draft());

        assert_eq!(restored.unlocked_blocks(), state.unlocked_blocks());
        assert_eq!(restored.cursor(), state.cursor());
        assert_eq!(restored.student_name(), "Ada Lovelace");
        assert_eq!(restored.font_size(), FontSize::Maximum);
        assert_eq!(restored.lesson_text(lesson(1, 1)), Some("lesson text"));
        assert_eq!(
            restored.ready_expansions(lesson(1, 1)).collect::<Vec<_>>(),
            [("Ethics", "deep")]
        );
        assert_eq!(restored.exam(), state.exam());
    }

    #[test]
    fn transient_state_is_not_persisted() {
        let catalog = Catalog::standard();
        let mut state = ProgressState::new(&catalog);
        assert_eq!(state.claim_lesson(lesson(1, 2)), Claim::Claimed);
        state.claim_expansion(lesson(1, 1), "Pending");
        state.begin_exam(ExamKind::Block);

        let snapshot = ProgressSnapshot::from_state(&state, fixed_now());
        assert!(snapshot.lesson_cache.is_empty());
        assert!(snapshot.expanded_cache.is_empty());
        assert!(!snapshot.exam_mode);

        let restored = ProgressState::restore(&catalog, snapshot.into_draft());
        assert!(restored.lesson_entry(lesson(1, 2)).is_none());
        assert!(!restored.exam().is_active());
    }

    #[test]
    fn legacy_payload_defaults_missing_and_null_fields() {
        let raw = r#"{
            "unlockedBlocks": [1, 2],
            "completedBlocks": [1],
            "currentBlockId": 2,
            "currentLessonId": "2-3",
            "studentName": null,
            "fontSize": "1.6rem",
            "lessonCache": {"2-3": "text", "bogus": "x"},
            "examMode": true,
            "examQuestions": [],
            "savedAt": 1700000000000
        }"#;
        let snapshot = ProgressSnapshot::from_json(raw).unwrap();
        assert_eq!(snapshot.schema_version, None);
        assert_eq!(snapshot.saved_at, Some(fixed_now()));

        let state = ProgressState::restore(&Catalog::standard(), snapshot.into_draft());
        assert!(state.is_completed(BlockId::new(1)));
        assert_eq!(state.cursor().lesson, lesson(2, 3));
        assert_eq!(state.font_size(), FontSize::Extra);
        assert_eq!(state.student_name(), course_core::model::DEFAULT_STUDENT_NAME);
        assert_eq!(state.ready_lessons().count(), 1);
        assert!(!state.exam().is_active());
    }

    #[test]
    fn rejects_newer_schema_versions() {
        let raw = r#"{"schemaVersion": 99}"#;
        assert!(matches!(
            ProgressSnapshot::from_json(raw),
            Err(StorageError::UnsupportedVersion {
                found: 99,
                supported: SNAPSHOT_SCHEMA_VERSION
            })
        ));
    }

    #[test]
    fn malformed_stored_question_discards_exam() {
        let raw = r#"{
            "examMode": true,
            "examQuestions": [{"question": "q", "options": ["a", "b"], "correctIndex": 0}]
        }"#;
        let draft = ProgressSnapshot::from_json(raw).unwrap().into_draft();
        assert_eq!(draft.exam, ExamSession::Idle);
    }
}
