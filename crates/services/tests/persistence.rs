mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use course_core::model::{BlockId, ExamKind, ExamPhase, FontSize, LessonId};
use course_core::time::fixed_now;
use services::LessonLoad;
use storage::repository::{InMemoryRepository, KeyValueStore, SNAPSHOT_KEY, StorageError};
use storage::snapshot::ProgressSnapshot;
use support::{StubGenerator, answer_all_and_submit, service_with};

fn lesson(block: u32, ordinal: u32) -> LessonId {
    LessonId::new(BlockId::new(block), ordinal)
}

/// In-memory store that counts writes and can be switched to fail them.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryRepository,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("disk full".into()));
        }
        self.inner.put(key, value).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear().await
    }
}

/// In-memory store whose writes take a while to land.
#[derive(Default)]
struct SlowStore {
    inner: InMemoryRepository,
}

#[async_trait]
impl KeyValueStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.inner.put(key, value).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear().await
    }
}

#[tokio::test]
async fn progress_round_trips_through_the_store() {
    let store = Arc::new(InMemoryRepository::new());
    let generator = Arc::new(StubGenerator::default());
    let first = service_with(Arc::clone(&generator), store.clone());
    assert!(!first.hydrate().await);

    first.load_current_lesson().await.unwrap();
    first.expand_section("Ethics").await.unwrap();
    first.start_exam(ExamKind::Block).await.unwrap();
    answer_all_and_submit(&first, 0);
    first.close_exam().unwrap();
    if let LessonLoad::Spawned(load) = first.select_lesson(BlockId::new(2), lesson(2, 3)).unwrap() {
        load.await.unwrap();
    }
    first.set_student_name("Ada Lovelace").unwrap();
    first.set_font_size(FontSize::Maximum);
    first.start_exam(ExamKind::Block).await.unwrap();
    first.answer_question(4, 2).unwrap();
    first.flush().await;

    let second = service_with(generator, store);
    assert!(second.hydrate().await);

    let saved = ProgressSnapshot::from_state(&first.progress(), fixed_now());
    let restored = ProgressSnapshot::from_state(&second.progress(), fixed_now());
    assert_eq!(restored, saved);

    let state = second.progress();
    assert!(state.is_completed(BlockId::new(1)));
    assert_eq!(state.cursor().lesson, lesson(2, 3));
    assert_eq!(state.student_name(), "Ada Lovelace");
    assert_eq!(state.exam().phase(), ExamPhase::InProgress);
    assert_eq!(state.exam().answers().unwrap().get(&4), Some(&2));
    assert_eq!(
        state.expansion_entry(lesson(1, 1), "Ethics").and_then(|e| e.text()),
        Some("Ethics of History and Evolution of AI, in depth")
    );
}

#[tokio::test]
async fn loading_exam_is_not_persisted() {
    let store = Arc::new(InMemoryRepository::new());
    let generator = Arc::new(StubGenerator::default());
    generator.hold_exams.store(true, Ordering::SeqCst);
    let service = service_with(Arc::clone(&generator), store.clone());

    let pending = tokio::spawn({
        let service = service.clone();
        async move { service.start_exam(ExamKind::Block).await }
    });
    while generator.exams() == 0 {
        tokio::task::yield_now().await;
    }
    service.flush().await;

    let reloaded = service_with(Arc::new(StubGenerator::default()), store.clone());
    assert!(reloaded.hydrate().await);
    assert_eq!(reloaded.progress().exam().phase(), ExamPhase::Idle);

    generator.release_exam.notify_one();
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn bursts_of_changes_collapse_into_one_write() {
    let store = Arc::new(RecordingStore::default());
    let service = service_with(Arc::new(StubGenerator::default()), store.clone());

    for size in FontSize::ALL.iter().cycle().take(50) {
        service.set_font_size(*size);
    }
    service.set_student_name("Last Name").unwrap();
    service.flush().await;

    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    let raw = store.inner.get(SNAPSHOT_KEY).await.unwrap().unwrap();
    let snapshot = ProgressSnapshot::from_json(&raw).unwrap();
    assert_eq!(snapshot.student_name, "Last Name");
    assert_eq!(snapshot.font_size, FontSize::ALL[49 % 4].css_value());
    assert_eq!(snapshot.saved_at, Some(fixed_now()));
}

#[tokio::test]
async fn failed_saves_are_swallowed() {
    let store = Arc::new(RecordingStore::default());
    store.fail_puts.store(true, Ordering::SeqCst);
    let service = service_with(Arc::new(StubGenerator::default()), store.clone());

    service.set_student_name("Grace Hopper").unwrap();
    service.flush().await;
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    assert_eq!(service.progress().student_name(), "Grace Hopper");

    store.fail_puts.store(false, Ordering::SeqCst);
    service.set_font_size(FontSize::Normal);
    service.flush().await;
    assert!(store.inner.get(SNAPSHOT_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn newer_snapshot_is_ignored_until_the_first_change() {
    let store = Arc::new(InMemoryRepository::new());
    let newer = r#"{"schemaVersion": 9, "studentName": "Future"}"#;
    store.put(SNAPSHOT_KEY, newer).await.unwrap();

    let service = service_with(Arc::new(StubGenerator::default()), store.clone());
    assert!(!service.hydrate().await);
    assert_eq!(service.progress().student_name(), "Guest Student");
    service.flush().await;
    assert_eq!(store.get(SNAPSHOT_KEY).await.unwrap().as_deref(), Some(newer));

    service.set_font_size(FontSize::Normal);
    service.flush().await;
    let raw = store.get(SNAPSHOT_KEY).await.unwrap().unwrap();
    assert_eq!(ProgressSnapshot::from_json(&raw).unwrap().schema_version, Some(1));
}

#[tokio::test]
async fn reset_restores_defaults_and_clears_the_store() {
    let store = Arc::new(InMemoryRepository::new());
    let service = service_with(Arc::new(StubGenerator::default()), store.clone());
    service.start_exam(ExamKind::Block).await.unwrap();
    answer_all_and_submit(&service, 0);
    service.set_student_name("Alan Turing").unwrap();

    service.reset().await;
    service.flush().await;

    assert!(store.is_empty().unwrap());
    let state = service.progress();
    assert!(state.completed_blocks().is_empty());
    assert_eq!(state.unlocked_blocks().len(), 1);
    assert_eq!(state.student_name(), "Guest Student");
    assert!(!state.exam().is_active());

    let reloaded = service_with(Arc::new(StubGenerator::default()), store);
    assert!(!reloaded.hydrate().await);
}

#[tokio::test]
async fn reset_is_not_undone_by_a_slow_write_in_flight() {
    let store = Arc::new(SlowStore::default());
    let service = service_with(Arc::new(StubGenerator::default()), store.clone());
    service.set_student_name("Old Learner").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    // The first write is still sleeping; this change queues behind it.
    service.set_student_name("Old Learner 2").unwrap();

    service.reset().await;
    service.flush().await;

    assert_eq!(service.progress().student_name(), "Guest Student");
    assert!(store.inner.is_empty().unwrap());
    let reloaded = service_with(Arc::new(StubGenerator::default()), store);
    assert!(!reloaded.hydrate().await);
}

#[tokio::test]
async fn close_flushes_pending_changes() {
    let store = Arc::new(InMemoryRepository::new());
    let service = service_with(Arc::new(StubGenerator::default()), store.clone());
    service.set_student_name("Barbara Liskov").unwrap();
    service.close().await;

    let raw = store.get(SNAPSHOT_KEY).await.unwrap().unwrap();
    assert_eq!(
        ProgressSnapshot::from_json(&raw).unwrap().student_name,
        "Barbara Liskov"
    );
}
