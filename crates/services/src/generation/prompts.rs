//! Prompt text sent to the chat-completions provider.

/// Chapter outline every lesson must follow, after the executive summary.
pub const LESSON_OUTLINE: [&str; 7] = [
    "Introduction and historical context",
    "Theoretical framework and foundations",
    "Architectures and technical development",
    "Use cases and industrial implementation",
    "Critical analysis and technical limitations",
    "Ethics and governance",
    "Conclusions and future research",
];

/// Separator placed between corpus sections in the exam prompt.
pub const CORPUS_SEPARATOR: &str = "\n\n---\n\n";

#[must_use]
pub fn lesson_prompt(language: &str, lesson_title: &str, topic: &str) -> String {
    let outline = LESSON_OUTLINE
        .iter()
        .enumerate()
        .map(|(index, section)| format!("{}. {section}", index + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Act as the lead author of an advanced, master's-level technical handbook on \
artificial intelligence. Write a complete, rigorous and academic chapter in {language} about: \
{lesson_title}.

CONTEXT:
{topic}

GOAL:
Produce dense, technical and direct study material. The text must be purely expository.

NEGATIVE CONSTRAINTS:
- Do NOT use greetings or personal address.
- Do NOT add administrative closing remarks.
- Do NOT act as a conversational partner.
- Do NOT summarize the main content; break it down in detail.

MANDATORY SUMMARY RULE:
- Start the chapter with a markdown blockquote labelled \"**EXECUTIVE SUMMARY:**\".
- The summary must be exactly 2-3 high-level sentences capturing the technical essence \
and learning objectives of the chapter.

CHAPTER STRUCTURE (use markdown level-2 headings):
0. EXECUTIVE SUMMARY (opening block)
{outline}

Begin directly with the EXECUTIVE SUMMARY followed by heading 1."
    )
}

#[must_use]
pub fn expansion_prompt(language: &str, lesson_title: &str, section_title: &str) -> String {
    format!(
        "Act as the lead author of the advanced AI handbook. Expand EXTENSIVELY, in {language}, \
the following section of the chapter \"{lesson_title}\":

SECTION TO EXPAND: \"{section_title}\"

GOAL:
Provide deeper technical detail, including more code examples, detailed formulas and \
specific cases.

CONSTRAINTS:
- Impersonal tone.
- No greetings and no farewells.
- Use advanced markdown."
    )
}

#[must_use]
pub fn exam_prompt(language: &str, title: &str, corpus: &[String], count: usize) -> String {
    let materials = corpus.join(CORPUS_SEPARATOR);
    format!(
        "Act as a master's-level academic examiner. Write an official exam in {language} based \
EXCLUSIVELY on the study material provided below.

EXAM TITLE: \"{title}\"

CRITICAL RULE:
Questions must rest only on the content, definitions, examples and explanations of the \
attached texts. Do NOT use outside information that does not appear in them.

STUDY MATERIALS:
{materials}

EXAM REQUIREMENTS:
- Write exactly {count} questions.
- Difficulty: university master's degree (technical and conceptual reasoning).
- Every question has 4 options (A, B, C, D) and exactly one correct answer.
- Format: JSON with the declared structure."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_prompt_carries_outline_and_language() {
        let prompt = lesson_prompt("Spanish", "Transformers", "Attention is all you need.");
        assert!(prompt.contains("in Spanish about: Transformers"));
        assert!(prompt.contains("**EXECUTIVE SUMMARY:**"));
        assert!(prompt.contains("1. Introduction and historical context"));
        assert!(prompt.contains("7. Conclusions and future research"));
    }

    #[test]
    fn exam_prompt_joins_corpus_and_states_count() {
        let corpus = vec!["first".to_string(), "second".to_string()];
        let prompt = exam_prompt("English", "Block", &corpus, 30);
        assert!(prompt.contains("first\n\n---\n\nsecond"));
        assert!(prompt.contains("exactly 30 questions"));
    }

    #[test]
    fn expansion_prompt_names_both_titles() {
        let prompt = expansion_prompt("English", "Ethics", "Bias");
        assert!(prompt.contains("\"Ethics\""));
        assert!(prompt.contains("SECTION TO EXPAND: \"Bias\""));
    }
}
