use crate::model::catalog::{Catalog, Lesson};
use crate::model::exam::ExamKind;
use crate::model::outline::section_titles;
use crate::model::progress::ProgressState;

pub const FINAL_EXAM_TITLE: &str = "Final Master Exam";

/// Study material handed to exam synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamCorpus {
    pub title: String,
    pub sections: Vec<String>,
    /// True when no lesson content was cached and only lesson titles are used.
    pub degraded: bool,
}

/// Assemble the exam corpus from cached lesson content.
///
/// A block exam covers the cursor's block; the final exam covers every block.
/// Each cached lesson contributes a labelled section followed by its
/// expansions, in the order their headings appear in the lesson text. With no
/// cached content at all, the lesson titles of the covered scope are used.
/// For the final exam that fallback lists every lesson of the course, not
/// only the lessons of the cursor's block.
#[must_use]
pub fn assemble(catalog: &Catalog, state: &ProgressState, kind: ExamKind) -> ExamCorpus {
    let (title, lessons): (String, Vec<&Lesson>) = match kind {
        ExamKind::Final => (FINAL_EXAM_TITLE.to_string(), catalog.lessons().collect()),
        ExamKind::Block => {
            let block = catalog
                .block(state.cursor().block)
                .unwrap_or_else(|| catalog.first_block());
            (block.title().to_string(), block.lessons().iter().collect())
        }
    };

    let mut sections = Vec::new();
    for lesson in &lessons {
        let Some(text) = state.lesson_text(lesson.id()) else {
            continue;
        };
        sections.push(format!("--- LESSON: {} ---\n{text}", lesson.title()));

        let mut expansions: Vec<(&str, &str)> = state.ready_expansions(lesson.id()).collect();
        let outline = section_titles(text);
        expansions.sort_by_key(|(section, _)| {
            outline
                .iter()
                .position(|title| title.as_str() == *section)
                .unwrap_or(usize::MAX)
        });
        for (section, expanded) in expansions {
            sections.push(format!("--- EXPANSION: {section} ---\n{expanded}"));
        }
    }

    if sections.is_empty() {
        return ExamCorpus {
            title,
            sections: lessons.iter().map(|lesson| lesson.title().to_string()).collect(),
            degraded: true,
        };
    }

    ExamCorpus {
        title,
        sections,
        degraded: false,
    }
}
