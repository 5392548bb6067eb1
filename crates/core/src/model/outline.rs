use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Extract the expandable section titles of a lesson.
///
/// Sections are level-2 and level-3 headings, in document order, with inline
/// markup flattened to plain text. Duplicate titles are reported once.
#[must_use]
pub fn section_titles(markdown: &str) -> Vec<String> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut titles: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) if is_section_level(level) => {
                current = Some(String::new());
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(buf) = current.as_mut() {
                    buf.push(' ');
                }
            }
            Event::End(TagEnd::Heading(level)) if is_section_level(level) => {
                if let Some(title) = current.take() {
                    let title = title.trim().to_string();
                    if !title.is_empty() && !titles.contains(&title) {
                        titles.push(title);
                    }
                }
            }
            _ => {}
        }
    }

    titles
}

fn is_section_level(level: HeadingLevel) -> bool {
    matches!(level, HeadingLevel::H2 | HeadingLevel::H3)
}
