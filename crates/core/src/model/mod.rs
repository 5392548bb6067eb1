mod catalog;
pub mod corpus;
mod exam;
mod font;
mod ids;
pub mod outline;
mod progress;
mod question;
mod settings;

pub use ids::{BlockId, LessonId, ParseIdError};

pub use catalog::{Block, Catalog, CatalogError, Lesson};
pub use corpus::ExamCorpus;
pub use exam::{ExamError, ExamKind, ExamPhase, ExamResult, ExamSession, score_answers};
pub use font::{FontSize, FontSizeError};
pub use progress::{
    CacheEntry, Claim, Cursor, DEFAULT_STUDENT_NAME, ProgressDraft, ProgressError, ProgressState,
};
pub use question::{OPTION_COUNT, Question, QuestionError};
pub use settings::{GeneratorSettings, GeneratorSettingsDraft, GeneratorSettingsError};
