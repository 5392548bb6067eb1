use std::sync::Arc;

use course_core::model::Catalog;
use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::course_service::CourseService;
use crate::error::AppServicesError;
use crate::generation::{ChatContentGenerator, ContentGenerator};

/// Assembles the app-facing course controller over `SQLite` storage.
#[derive(Clone)]
pub struct AppServices {
    course: CourseService,
    restored: bool,
    generation_enabled: bool,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and rehydrate saved progress.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// generator settings in the environment are invalid.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let chat = ChatContentGenerator::from_env()?;
        let generation_enabled = chat.enabled();
        if generation_enabled {
            let settings = chat.settings();
            info!(
                base_url = settings.base_url(),
                lesson_model = settings.lesson_model(),
                exam_model = settings.exam_model(),
                language = settings.language(),
                "content generation enabled"
            );
        } else {
            info!("COURSE_AI_API_KEY not set, content generation disabled");
        }
        let generator: Arc<dyn ContentGenerator> = Arc::new(chat);

        let course = CourseService::new(Catalog::standard(), generator, storage.snapshots(), clock);
        let restored = course.hydrate().await;

        Ok(Self {
            course,
            restored,
            generation_enabled,
        })
    }

    #[must_use]
    pub fn course(&self) -> CourseService {
        self.course.clone()
    }

    /// True when saved progress was found on startup.
    #[must_use]
    pub fn restored(&self) -> bool {
        self.restored
    }

    #[must_use]
    pub fn generation_enabled(&self) -> bool {
        self.generation_enabled
    }
}
