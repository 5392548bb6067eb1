use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::catalog::Catalog;
use crate::model::exam::{ExamError, ExamKind, ExamResult, ExamSession};
use crate::model::font::FontSize;
use crate::model::ids::{BlockId, LessonId};

pub const DEFAULT_STUDENT_NAME: &str = "Guest Student";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lesson {lesson} is not part of block {block}")]
    InvalidCursor { block: BlockId, lesson: LessonId },

    #[error("unknown lesson {0}")]
    UnknownLesson(LessonId),

    #[error("block {0} is locked")]
    BlockLocked(BlockId),

    #[error("final exam requires all {total} blocks completed, {completed} done")]
    FinalExamLocked { completed: usize, total: usize },

    #[error("student name cannot be empty")]
    EmptyStudentName,

    #[error(transparent)]
    Exam(#[from] ExamError),
}

//
// ─── CACHE ENTRIES ─────────────────────────────────────────────────────────────
//

/// A generated-content slot. Absence from the map means "never requested".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// A generation request is in flight.
    Pending,
    Ready(String),
}

impl CacheEntry {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            CacheEntry::Ready(text) => Some(text),
            CacheEntry::Pending => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, CacheEntry::Pending)
    }
}

/// Outcome of trying to reserve a cache slot for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Slot was absent and is now pending; the caller must dispatch the request.
    Claimed,
    AlreadyPending,
    AlreadyReady,
}

/// The learner's position in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub block: BlockId,
    pub lesson: LessonId,
}

//
// ─── RESTORE INPUT ─────────────────────────────────────────────────────────────
//

/// Loosely-typed persisted progress, re-validated by `ProgressState::restore`.
///
/// Unlocked blocks are not part of the draft: they are always derived from the
/// completed chain (block 1 plus the successor of every completed block).
#[derive(Debug, Clone, Default)]
pub struct ProgressDraft {
    pub completed_blocks: Vec<BlockId>,
    pub cursor: Option<Cursor>,
    pub master_completed: bool,
    pub student_name: Option<String>,
    pub font_size: Option<FontSize>,
    pub lesson_cache: BTreeMap<LessonId, String>,
    pub expanded_cache: BTreeMap<LessonId, BTreeMap<String, String>>,
    pub exam: ExamSession,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// The single mutable root of learner progress.
///
/// Unlocked and completed sets only grow (until an explicit reset), block 1 is
/// always unlocked, completed blocks are always unlocked and the master flag is
/// only set once every block is completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    unlocked: BTreeSet<BlockId>,
    completed: BTreeSet<BlockId>,
    cursor: Cursor,
    master_completed: bool,
    student_name: String,
    font_size: FontSize,
    lessons: BTreeMap<LessonId, CacheEntry>,
    expansions: BTreeMap<LessonId, BTreeMap<String, CacheEntry>>,
    exam: ExamSession,
    exam_attempts: u64,
}

impl ProgressState {
    /// Fresh progress: block 1 unlocked, cursor on the first lesson.
    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        let first = catalog.first_block();
        Self {
            unlocked: BTreeSet::from([BlockId::FIRST]),
            completed: BTreeSet::new(),
            cursor: Cursor {
                block: first.id(),
                lesson: first.first_lesson().id(),
            },
            master_completed: false,
            student_name: DEFAULT_STUDENT_NAME.to_string(),
            font_size: FontSize::default(),
            lessons: BTreeMap::new(),
            expansions: BTreeMap::new(),
            exam: ExamSession::Idle,
            exam_attempts: 0,
        }
    }

    /// Rebuild progress from persisted parts, repairing anything that would
    /// break an invariant against the current catalog.
    #[must_use]
    pub fn restore(catalog: &Catalog, draft: ProgressDraft) -> Self {
        let mut state = Self::new(catalog);

        // Walk the chain: a block is unlocked only if it is the first one or the
        // previous block is completed, and only unlocked blocks can be completed.
        let completed: BTreeSet<BlockId> = draft.completed_blocks.into_iter().collect();
        let mut previous_completed = true;
        for block in catalog.blocks() {
            let id = block.id();
            if !previous_completed {
                break;
            }
            state.unlocked.insert(id);
            previous_completed = completed.contains(&id);
            if previous_completed {
                state.completed.insert(id);
            }
        }
        state.master_completed = draft.master_completed && state.all_blocks_completed(catalog);

        if let Some(cursor) = draft
            .cursor
            .filter(|cursor| catalog.is_valid_cursor(cursor.block, cursor.lesson))
        {
            state.cursor = cursor;
        }
        // Blank names keep the default.
        if let Some(name) = draft
            .student_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            state.student_name = name.to_string();
        }
        if let Some(size) = draft.font_size {
            state.font_size = size;
        }

        state.lessons = draft
            .lesson_cache
            .into_iter()
            .filter(|(id, _)| catalog.lesson(*id).is_some())
            .map(|(id, text)| (id, CacheEntry::Ready(text)))
            .collect();
        state.expansions = draft
            .expanded_cache
            .into_iter()
            .filter(|(id, sections)| catalog.lesson(*id).is_some() && !sections.is_empty())
            .map(|(id, sections)| {
                let sections = sections
                    .into_iter()
                    .map(|(title, text)| (title, CacheEntry::Ready(text)))
                    .collect();
                (id, sections)
            })
            .collect();

        // A loading exam is never persisted; anything left in that state is dropped.
        state.exam = match draft.exam {
            ExamSession::Loading { .. } => ExamSession::Idle,
            other => other,
        };
        state
    }

    /// Back to defaults. The attempt counter keeps counting so exam results
    /// for attempts begun before the reset remain stale.
    pub fn reset(&mut self, catalog: &Catalog) {
        let attempts = self.exam_attempts;
        *self = Self::new(catalog);
        self.exam_attempts = attempts;
    }

    // ─── Queries ──────────────────────────────────────────────────────────────

    #[must_use]
    pub fn unlocked_blocks(&self) -> &BTreeSet<BlockId> {
        &self.unlocked
    }

    #[must_use]
    pub fn completed_blocks(&self) -> &BTreeSet<BlockId> {
        &self.completed
    }

    #[must_use]
    pub fn is_unlocked(&self, block: BlockId) -> bool {
        self.unlocked.contains(&block)
    }

    #[must_use]
    pub fn is_completed(&self, block: BlockId) -> bool {
        self.completed.contains(&block)
    }

    #[must_use]
    pub fn all_blocks_completed(&self, catalog: &Catalog) -> bool {
        catalog
            .blocks()
            .iter()
            .all(|block| self.completed.contains(&block.id()))
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[must_use]
    pub fn master_completed(&self) -> bool {
        self.master_completed
    }

    #[must_use]
    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    #[must_use]
    pub fn font_size(&self) -> FontSize {
        self.font_size
    }

    #[must_use]
    pub fn exam(&self) -> &ExamSession {
        &self.exam
    }

    #[must_use]
    pub fn lesson_entry(&self, lesson: LessonId) -> Option<&CacheEntry> {
        self.lessons.get(&lesson)
    }

    #[must_use]
    pub fn lesson_text(&self, lesson: LessonId) -> Option<&str> {
        self.lessons.get(&lesson).and_then(CacheEntry::text)
    }

    /// Ready lesson texts, for snapshotting.
    pub fn ready_lessons(&self) -> impl Iterator<Item = (LessonId, &str)> {
        self.lessons
            .iter()
            .filter_map(|(id, entry)| entry.text().map(|text| (*id, text)))
    }

    #[must_use]
    pub fn expansion_entry(&self, lesson: LessonId, section: &str) -> Option<&CacheEntry> {
        self.expansions.get(&lesson)?.get(section)
    }

    /// Ready expansions of one lesson, keyed by section title.
    pub fn ready_expansions(&self, lesson: LessonId) -> impl Iterator<Item = (&str, &str)> {
        self.expansions
            .get(&lesson)
            .into_iter()
            .flat_map(|sections| sections.iter())
            .filter_map(|(title, entry)| entry.text().map(|text| (title.as_str(), text)))
    }

    /// Lessons that have at least one ready expansion.
    pub fn expanded_lessons(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.expansions
            .iter()
            .filter(|(_, sections)| sections.values().any(|entry| entry.text().is_some()))
            .map(|(id, _)| *id)
    }

    /// Overall completion, counting the final exam as one extra block's worth
    /// of lessons.
    #[must_use]
    pub fn progress_percent(&self, catalog: &Catalog) -> u8 {
        let block_count = catalog.blocks().len().max(1);
        let final_weight = catalog.total_lessons() / block_count;
        let done: usize = catalog
            .blocks()
            .iter()
            .filter(|block| self.completed.contains(&block.id()))
            .map(|block| block.lessons().len())
            .sum::<usize>()
            + if self.master_completed { final_weight } else { 0 };
        let total = catalog.total_lessons() + final_weight;
        if total == 0 {
            return 0;
        }
        let percent = (done * 100 + total / 2) / total;
        u8::try_from(percent.min(100)).unwrap_or(100)
    }

    // ─── Cursor ───────────────────────────────────────────────────────────────

    /// Move the cursor and force the exam sub-machine back to idle.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidCursor` if the lesson is not part of the
    /// block; the cursor is left unchanged.
    pub fn select_lesson(
        &mut self,
        catalog: &Catalog,
        block: BlockId,
        lesson: LessonId,
    ) -> Result<(), ProgressError> {
        if !catalog.is_valid_cursor(block, lesson) {
            return Err(ProgressError::InvalidCursor { block, lesson });
        }
        self.cursor = Cursor { block, lesson };
        self.exam = ExamSession::Idle;
        Ok(())
    }

    // ─── Lesson cache ─────────────────────────────────────────────────────────

    /// Reserve a lesson slot for generation.
    pub fn claim_lesson(&mut self, lesson: LessonId) -> Claim {
        match self.lessons.get(&lesson) {
            Some(CacheEntry::Ready(_)) => Claim::AlreadyReady,
            Some(CacheEntry::Pending) => Claim::AlreadyPending,
            None => {
                self.lessons.insert(lesson, CacheEntry::Pending);
                Claim::Claimed
            }
        }
    }

    /// Store generated lesson text. Existing ready text is never replaced.
    ///
    /// Returns true if the text was stored.
    pub fn fill_lesson(&mut self, lesson: LessonId, text: String) -> bool {
        match self.lessons.get(&lesson) {
            Some(CacheEntry::Ready(_)) => false,
            _ => {
                self.lessons.insert(lesson, CacheEntry::Ready(text));
                true
            }
        }
    }

    /// Release a pending lesson slot after a failed request.
    pub fn release_lesson(&mut self, lesson: LessonId) {
        if matches!(self.lessons.get(&lesson), Some(CacheEntry::Pending)) {
            self.lessons.remove(&lesson);
        }
    }

    // ─── Expansion cache ──────────────────────────────────────────────────────

    /// Reserve an expansion slot, scoped by lesson then section title.
    pub fn claim_expansion(&mut self, lesson: LessonId, section: &str) -> Claim {
        let sections = self.expansions.entry(lesson).or_default();
        match sections.get(section) {
            Some(CacheEntry::Ready(_)) => Claim::AlreadyReady,
            Some(CacheEntry::Pending) => Claim::AlreadyPending,
            None => {
                sections.insert(section.to_string(), CacheEntry::Pending);
                Claim::Claimed
            }
        }
    }

    /// Store an expansion. Existing ready text is never replaced.
    pub fn fill_expansion(&mut self, lesson: LessonId, section: &str, text: String) -> bool {
        let sections = self.expansions.entry(lesson).or_default();
        match sections.get(section) {
            Some(CacheEntry::Ready(_)) => false,
            _ => {
                sections.insert(section.to_string(), CacheEntry::Ready(text));
                true
            }
        }
    }

    pub fn release_expansion(&mut self, lesson: LessonId, section: &str) {
        if let Some(sections) = self.expansions.get_mut(&lesson) {
            if matches!(sections.get(section), Some(CacheEntry::Pending)) {
                sections.remove(section);
            }
            if sections.is_empty() {
                self.expansions.remove(&lesson);
            }
        }
    }

    // ─── Exams ────────────────────────────────────────────────────────────────

    /// Check whether the learner may start the given exam.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::BlockLocked` for a block exam on a locked block
    /// and `ProgressError::FinalExamLocked` until every block is completed.
    pub fn check_exam_allowed(&self, catalog: &Catalog, kind: ExamKind) -> Result<(), ProgressError> {
        match kind {
            ExamKind::Block if !self.is_unlocked(self.cursor.block) => {
                Err(ProgressError::BlockLocked(self.cursor.block))
            }
            ExamKind::Final if !self.all_blocks_completed(catalog) => {
                Err(ProgressError::FinalExamLocked {
                    completed: self.completed.len(),
                    total: catalog.blocks().len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Enter the loading state for a new attempt and return its number.
    pub fn begin_exam(&mut self, kind: ExamKind) -> u64 {
        self.exam_attempts += 1;
        self.exam.begin(kind, self.exam_attempts);
        self.exam_attempts
    }

    /// Mutable access to the exam sub-machine for answer and load transitions.
    pub fn exam_mut(&mut self) -> &mut ExamSession {
        &mut self.exam
    }

    /// Grade the exam and apply a pass to progression.
    ///
    /// # Errors
    ///
    /// Propagates `ExamError` when no exam is in progress or answers are missing.
    pub fn submit_exam(&mut self, catalog: &Catalog) -> Result<(ExamKind, ExamResult), ProgressError> {
        let (kind, result) = self.exam.submit()?;
        if result.passed() {
            match kind {
                ExamKind::Final => self.master_completed = true,
                ExamKind::Block => {
                    let block = self.cursor.block;
                    self.completed.insert(block);
                    let next = block.next();
                    if catalog.contains_block(next) {
                        self.unlocked.insert(next);
                    }
                }
            }
        }
        Ok((kind, result))
    }

    // ─── Profile ──────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `ProgressError::EmptyStudentName` for a blank name.
    pub fn set_student_name(&mut self, name: &str) -> Result<(), ProgressError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProgressError::EmptyStudentName);
        }
        self.student_name = name.to_string();
        Ok(())
    }

    pub fn set_font_size(&mut self, size: FontSize) {
        self.font_size = size;
    }
}
