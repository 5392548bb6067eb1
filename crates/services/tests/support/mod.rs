#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use course_core::model::{Catalog, Question};
use course_core::time::fixed_clock;
use services::{ContentGenerator, CourseService, GenerationError};
use storage::repository::{InMemoryRepository, KeyValueStore, SnapshotStore};
use tokio::sync::Notify;

/// Scripted generator with call counters and failure switches.
#[derive(Default)]
pub struct StubGenerator {
    pub lesson_calls: AtomicUsize,
    pub expansion_calls: AtomicUsize,
    pub exam_calls: AtomicUsize,
    pub fail_lessons: AtomicBool,
    pub fail_expansions: AtomicBool,
    pub fail_exams: AtomicBool,
    /// When set, exam synthesis waits for `release_exam`.
    pub hold_exams: AtomicBool,
    pub release_exam: Notify,
    pub exam_requests: Mutex<Vec<(String, Vec<String>, usize)>>,
}

impl StubGenerator {
    pub fn lessons(&self) -> usize {
        self.lesson_calls.load(Ordering::SeqCst)
    }

    pub fn expansions(&self) -> usize {
        self.expansion_calls.load(Ordering::SeqCst)
    }

    pub fn exams(&self) -> usize {
        self.exam_calls.load(Ordering::SeqCst)
    }

    pub fn last_exam_request(&self) -> Option<(String, Vec<String>, usize)> {
        self.exam_requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ContentGenerator for StubGenerator {
    async fn author_lesson(
        &self,
        lesson_title: &str,
        _topic: &str,
    ) -> Result<String, GenerationError> {
        self.lesson_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lessons.load(Ordering::SeqCst) {
            return Err(GenerationError::Other("lesson outage".into()));
        }
        Ok(format!(
            "> **EXECUTIVE SUMMARY:** {lesson_title}.\n\n## Overview\n\nBody.\n\n## Ethics\n\nMore."
        ))
    }

    async fn expand_section(
        &self,
        lesson_title: &str,
        section_title: &str,
    ) -> Result<String, GenerationError> {
        self.expansion_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_expansions.load(Ordering::SeqCst) {
            return Err(GenerationError::Other("expansion outage".into()));
        }
        Ok(format!("{section_title} of {lesson_title}, in depth"))
    }

    async fn synthesize_exam(
        &self,
        title: &str,
        corpus: &[String],
        count: usize,
    ) -> Result<Vec<Question>, GenerationError> {
        let call = self.exam_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.exam_requests
            .lock()
            .unwrap()
            .push((title.to_string(), corpus.to_vec(), count));
        if self.hold_exams.load(Ordering::SeqCst) {
            self.release_exam.notified().await;
        }
        if self.fail_exams.load(Ordering::SeqCst) {
            return Err(GenerationError::Other("exam outage".into()));
        }
        Ok((0..count)
            .map(|index| {
                Question::new(
                    format!("attempt {call} question {index}"),
                    vec!["right".into(), "w1".into(), "w2".into(), "w3".into()],
                    0,
                )
                .unwrap()
            })
            .collect())
    }
}

pub fn service_with(generator: Arc<StubGenerator>, store: Arc<dyn KeyValueStore>) -> CourseService {
    CourseService::new(
        Catalog::standard(),
        generator,
        SnapshotStore::new(store),
        fixed_clock(),
    )
}

pub fn fresh_service() -> (CourseService, Arc<StubGenerator>, InMemoryRepository) {
    let generator = Arc::new(StubGenerator::default());
    let repo = InMemoryRepository::new();
    let service = service_with(Arc::clone(&generator), Arc::new(repo.clone()));
    (service, generator, repo)
}

/// Answer every question with `option` and submit.
pub fn answer_all_and_submit(
    service: &CourseService,
    option: usize,
) -> course_core::model::ExamResult {
    let total = service.progress().exam().questions().len();
    for index in 0..total {
        service.answer_question(index, option).unwrap();
    }
    service.submit_exam().unwrap()
}
