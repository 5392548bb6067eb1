use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use course_core::Clock;
use course_core::model::{
    BlockId, Catalog, Claim, ExamKind, ExamResult, FontSize, Lesson, LessonId, ProgressError,
    ProgressState, corpus, outline,
};
use storage::repository::SnapshotStore;

use crate::certificate::Certificate;
use crate::error::{CertificateError, CourseError};
use crate::generation::{ContentGenerator, fit_to_count};
use crate::snapshot_writer::{SnapshotWriter, lock_state};

/// What happened to the lesson text when the cursor moved.
#[derive(Debug)]
pub enum LessonLoad {
    /// Text is already cached.
    Ready,
    /// Another request for this lesson is in flight.
    InFlight,
    /// A generation request was spawned; awaiting the handle waits for it.
    Spawned(JoinHandle<()>),
}

/// Progression controller: owns the learner's state and orchestrates the
/// content generator and the snapshot store.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct CourseService {
    catalog: Arc<Catalog>,
    generator: Arc<dyn ContentGenerator>,
    snapshots: SnapshotStore,
    state: Arc<Mutex<ProgressState>>,
    writer: Arc<SnapshotWriter>,
}

impl CourseService {
    /// Build a controller with default progress and start its snapshot writer.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        generator: Arc<dyn ContentGenerator>,
        snapshots: SnapshotStore,
        clock: Clock,
    ) -> Self {
        let state = Arc::new(Mutex::new(ProgressState::new(&catalog)));
        let writer = Arc::new(SnapshotWriter::spawn(
            Arc::clone(&state),
            snapshots.clone(),
            clock,
        ));
        Self {
            catalog: Arc::new(catalog),
            generator,
            snapshots,
            state,
            writer,
        }
    }

    /// Replace the in-memory state with the persisted snapshot, if any.
    ///
    /// Returns true when a snapshot was restored. Storage failures and
    /// snapshots from newer builds are logged and leave the defaults in place.
    pub async fn hydrate(&self) -> bool {
        match self.snapshots.load().await {
            Ok(Some(snapshot)) => {
                let restored = ProgressState::restore(&self.catalog, snapshot.into_draft());
                info!(
                    completed = restored.completed_blocks().len(),
                    lesson = %restored.cursor().lesson,
                    "progress restored"
                );
                *lock_state(&self.state) = restored;
                true
            }
            Ok(None) => {
                info!("no saved progress, starting fresh");
                false
            }
            Err(err) => {
                warn!(%err, "could not load saved progress, starting fresh");
                false
            }
        }
    }

    // ─── Queries ──────────────────────────────────────────────────────────────

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Copy of the current progress state.
    #[must_use]
    pub fn progress(&self) -> ProgressState {
        lock_state(&self.state).clone()
    }

    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        lock_state(&self.state).progress_percent(&self.catalog)
    }

    #[must_use]
    pub fn current_lesson(&self) -> Option<Lesson> {
        let lesson = lock_state(&self.state).cursor().lesson;
        self.catalog.lesson(lesson).cloned()
    }

    /// Section titles of the current lesson's text, empty until it is loaded.
    #[must_use]
    pub fn current_sections(&self) -> Vec<String> {
        let state = lock_state(&self.state);
        state
            .lesson_text(state.cursor().lesson)
            .map(outline::section_titles)
            .unwrap_or_default()
    }

    // ─── Navigation ───────────────────────────────────────────────────────────

    /// Move the cursor, close any exam and start loading the lesson text if
    /// it is not cached yet.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Progress` if the lesson does not belong to the
    /// block; nothing changes in that case.
    pub fn select_lesson(
        &self,
        block: BlockId,
        lesson: LessonId,
    ) -> Result<LessonLoad, CourseError> {
        lock_state(&self.state).select_lesson(&self.catalog, block, lesson)?;
        self.writer.mark_dirty();
        debug!(%lesson, "cursor moved");
        Ok(self.spawn_lesson_load(lesson))
    }

    /// Move to the next lesson of the current block; `None` at the last one.
    ///
    /// # Errors
    ///
    /// Propagates `select_lesson` errors.
    pub fn next_lesson(&self) -> Result<Option<LessonLoad>, CourseError> {
        let cursor = lock_state(&self.state).cursor();
        match self.catalog.next_in_block(cursor.lesson) {
            Some(next) => self.select_lesson(cursor.block, next.id()).map(Some),
            None => Ok(None),
        }
    }

    /// Move to the previous lesson of the current block; `None` at the first one.
    ///
    /// # Errors
    ///
    /// Propagates `select_lesson` errors.
    pub fn previous_lesson(&self) -> Result<Option<LessonLoad>, CourseError> {
        let cursor = lock_state(&self.state).cursor();
        match self.catalog.previous_in_block(cursor.lesson) {
            Some(previous) => self.select_lesson(cursor.block, previous.id()).map(Some),
            None => Ok(None),
        }
    }

    fn spawn_lesson_load(&self, lesson: LessonId) -> LessonLoad {
        {
            let state = lock_state(&self.state);
            match state.lesson_entry(lesson) {
                Some(entry) if entry.is_pending() => return LessonLoad::InFlight,
                Some(_) => return LessonLoad::Ready,
                None => {}
            }
        }
        let service = self.clone();
        LessonLoad::Spawned(tokio::spawn(async move {
            // Failures are already logged; the entry stays absent and the next
            // visit tries again.
            let _ = service.ensure_lesson_content(lesson).await;
        }))
    }

    // ─── Content ──────────────────────────────────────────────────────────────

    /// Load the text of the lesson under the cursor.
    ///
    /// # Errors
    ///
    /// See `ensure_lesson_content`.
    pub async fn load_current_lesson(&self) -> Result<Option<String>, CourseError> {
        let lesson = lock_state(&self.state).cursor().lesson;
        self.ensure_lesson_content(lesson).await
    }

    /// Make sure `lesson` has generated text.
    ///
    /// Returns the text, or `None` when another request for the same lesson
    /// is already in flight. At most one request per lesson runs at a time.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Progress` for a lesson outside the catalog and
    /// `CourseError::Generation` when authoring fails; the lesson is then left
    /// absent so a later call retries.
    pub async fn ensure_lesson_content(
        &self,
        lesson: LessonId,
    ) -> Result<Option<String>, CourseError> {
        let Some(entry) = self.catalog.lesson(lesson) else {
            return Err(ProgressError::UnknownLesson(lesson).into());
        };

        let claim = lock_state(&self.state).claim_lesson(lesson);
        match claim {
            Claim::AlreadyPending => return Ok(None),
            Claim::AlreadyReady => {
                return Ok(lock_state(&self.state)
                    .lesson_text(lesson)
                    .map(str::to_string));
            }
            Claim::Claimed => {}
        }

        debug!(%lesson, "requesting lesson text");
        match self
            .generator
            .author_lesson(entry.title(), entry.topic())
            .await
        {
            Ok(text) => {
                lock_state(&self.state).fill_lesson(lesson, text.clone());
                self.writer.mark_dirty();
                debug!(%lesson, bytes = text.len(), "lesson text stored");
                Ok(Some(text))
            }
            Err(err) => {
                lock_state(&self.state).release_lesson(lesson);
                warn!(%lesson, %err, "lesson generation failed");
                Err(err.into())
            }
        }
    }

    /// Expand one section of the current lesson.
    ///
    /// A section that is already expanded is returned without a new request.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptySection` for a blank title,
    /// `CourseError::ExpansionInFlight` while the same section is being
    /// generated and `CourseError::Generation` when the request fails.
    pub async fn expand_section(&self, section_title: &str) -> Result<String, CourseError> {
        let section = section_title.trim();
        if section.is_empty() {
            return Err(CourseError::EmptySection);
        }

        let (lesson, claim) = {
            let mut state = lock_state(&self.state);
            let lesson = state.cursor().lesson;
            (lesson, state.claim_expansion(lesson, section))
        };
        match claim {
            Claim::AlreadyPending => return Err(CourseError::ExpansionInFlight(section.into())),
            Claim::AlreadyReady => {
                let state = lock_state(&self.state);
                if let Some(text) = state
                    .expansion_entry(lesson, section)
                    .and_then(|entry| entry.text())
                {
                    return Ok(text.to_string());
                }
            }
            Claim::Claimed => {}
        }

        let lesson_title = self
            .catalog
            .lesson(lesson)
            .map(|entry| entry.title().to_string())
            .unwrap_or_default();
        debug!(%lesson, section, "requesting section expansion");
        match self.generator.expand_section(&lesson_title, section).await {
            Ok(text) => {
                lock_state(&self.state).fill_expansion(lesson, section, text.clone());
                self.writer.mark_dirty();
                Ok(text)
            }
            Err(err) => {
                lock_state(&self.state).release_expansion(lesson, section);
                warn!(%lesson, section, %err, "section expansion failed");
                Err(err.into())
            }
        }
    }

    // ─── Exams ────────────────────────────────────────────────────────────────

    /// Start an exam and wait for its questions.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Progress` when the exam is locked,
    /// `CourseError::Generation` when synthesis fails (the exam returns to
    /// idle) and `CourseError::Exam` with `StaleAttempt` when the learner moved
    /// on before the questions arrived (they are discarded).
    pub async fn start_exam(&self, kind: ExamKind) -> Result<(), CourseError> {
        let (attempt, corpus) = {
            let mut state = lock_state(&self.state);
            state.check_exam_allowed(&self.catalog, kind)?;
            let attempt = state.begin_exam(kind);
            (attempt, corpus::assemble(&self.catalog, &state, kind))
        };
        self.writer.mark_dirty();
        debug!(
            attempt,
            ?kind,
            sections = corpus.sections.len(),
            degraded = corpus.degraded,
            "requesting exam questions"
        );

        let count = kind.question_count();
        let outcome = self
            .generator
            .synthesize_exam(&corpus.title, &corpus.sections, count)
            .await
            .and_then(|questions| fit_to_count(questions, count));

        let mut state = lock_state(&self.state);
        match outcome {
            Ok(questions) => {
                state.exam_mut().load(attempt, questions).map_err(|err| {
                    debug!(attempt, "discarding questions for a stale exam attempt");
                    err
                })?;
                drop(state);
                self.writer.mark_dirty();
                Ok(())
            }
            Err(err) => {
                state.exam_mut().abort_loading(attempt);
                drop(state);
                warn!(attempt, %err, "exam synthesis failed");
                Err(err.into())
            }
        }
    }

    /// # Errors
    ///
    /// Returns `CourseError::Exam` if no exam is in progress or an index is out of range.
    pub fn answer_question(&self, index: usize, option: usize) -> Result<(), CourseError> {
        lock_state(&self.state).exam_mut().answer(index, option)?;
        self.writer.mark_dirty();
        Ok(())
    }

    /// Grade the exam and apply a pass to progression.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Progress` if no exam is in progress or any
    /// question is unanswered.
    pub fn submit_exam(&self) -> Result<ExamResult, CourseError> {
        let (kind, result, block) = {
            let mut state = lock_state(&self.state);
            let block = state.cursor().block;
            let (kind, result) = state.submit_exam(&self.catalog)?;
            (kind, result, block)
        };
        self.writer.mark_dirty();

        match (kind, result.passed()) {
            (ExamKind::Final, true) => info!(score = result.score(), "master completed"),
            (ExamKind::Block, true) => info!(%block, score = result.score(), "block completed"),
            (_, false) => info!(?kind, score = result.score(), "exam failed"),
        }
        Ok(result)
    }

    /// Retake a failed exam with freshly generated questions.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Exam` unless the exam is graded and failed, plus
    /// any `start_exam` error.
    pub async fn retry_exam(&self) -> Result<(), CourseError> {
        let kind = lock_state(&self.state).exam().retry_kind()?;
        self.start_exam(kind).await
    }

    /// # Errors
    ///
    /// Returns `CourseError::Exam` when the exam is idle or still loading.
    pub fn close_exam(&self) -> Result<(), CourseError> {
        lock_state(&self.state).exam_mut().close()?;
        self.writer.mark_dirty();
        Ok(())
    }

    // ─── Profile ──────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `CourseError::Progress` for a blank name.
    pub fn set_student_name(&self, name: &str) -> Result<(), CourseError> {
        lock_state(&self.state).set_student_name(name)?;
        self.writer.mark_dirty();
        Ok(())
    }

    pub fn set_font_size(&self, size: FontSize) {
        lock_state(&self.state).set_font_size(size);
        self.writer.mark_dirty();
    }

    /// Render the completion certificate.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::Locked` until the final exam is passed.
    pub fn certificate(&self) -> Result<Certificate, CertificateError> {
        let state = lock_state(&self.state);
        if !state.master_completed() {
            return Err(CertificateError::Locked);
        }
        Ok(Certificate::for_student(state.student_name()))
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────────

    /// Restore default progress and clear the persisted snapshot.
    pub async fn reset(&self) {
        lock_state(&self.state).reset(&self.catalog);
        // Saves queued before the reset must land before the store is cleared.
        self.writer.mark_dirty();
        self.writer.flush().await;
        if let Err(err) = self.snapshots.reset().await {
            warn!(%err, "failed to clear persisted progress");
        }
        info!("progress reset");
    }

    /// Wait until all changes so far are persisted (or failed to persist).
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Flush and stop the snapshot writer. Later changes are not persisted.
    pub async fn close(&self) {
        self.writer.close().await;
    }
}
