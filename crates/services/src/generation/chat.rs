use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use course_core::model::{
    GeneratorSettings, GeneratorSettingsDraft, GeneratorSettingsError, Question,
};

use crate::error::GenerationError;
use crate::generation::{ContentGenerator, prompts};

/// Read generator settings from `COURSE_AI_*` / `COURSE_LANGUAGE`.
///
/// # Errors
///
/// Returns `GeneratorSettingsError` if `COURSE_AI_BASE_URL` is not a valid URL.
pub fn settings_from_env() -> Result<GeneratorSettings, GeneratorSettingsError> {
    GeneratorSettingsDraft {
        api_key: env::var("COURSE_AI_API_KEY").ok(),
        base_url: env::var("COURSE_AI_BASE_URL").ok(),
        lesson_model: env::var("COURSE_AI_MODEL").ok(),
        exam_model: env::var("COURSE_AI_EXAM_MODEL").ok(),
        language: env::var("COURSE_LANGUAGE").ok(),
    }
    .validate()
}

/// `ContentGenerator` over an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct ChatContentGenerator {
    client: Client,
    settings: GeneratorSettings,
}

impl ChatContentGenerator {
    /// # Errors
    ///
    /// Returns `GeneratorSettingsError` if the environment holds an invalid base URL.
    pub fn from_env() -> Result<Self, GeneratorSettingsError> {
        Ok(Self::new(settings_from_env()?))
    }

    #[must_use]
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.settings.is_enabled()
    }

    #[must_use]
    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    async fn complete(
        &self,
        model: &str,
        prompt: String,
        response_format: Option<Value>,
    ) -> Result<String, GenerationError> {
        let api_key = self.settings.api_key().ok_or(GenerationError::Disabled)?;

        let url = format!("{}/chat/completions", self.settings.base_url());
        let payload = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
            response_format,
        };

        debug!(model, "dispatching chat completion");
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        Ok(content)
    }
}

#[async_trait]
impl ContentGenerator for ChatContentGenerator {
    async fn author_lesson(
        &self,
        lesson_title: &str,
        topic: &str,
    ) -> Result<String, GenerationError> {
        let prompt = prompts::lesson_prompt(self.settings.language(), lesson_title, topic);
        self.complete(self.settings.lesson_model(), prompt, None).await
    }

    async fn expand_section(
        &self,
        lesson_title: &str,
        section_title: &str,
    ) -> Result<String, GenerationError> {
        let prompt =
            prompts::expansion_prompt(self.settings.language(), lesson_title, section_title);
        self.complete(self.settings.lesson_model(), prompt, None).await
    }

    async fn synthesize_exam(
        &self,
        title: &str,
        corpus: &[String],
        count: usize,
    ) -> Result<Vec<Question>, GenerationError> {
        let prompt = prompts::exam_prompt(self.settings.language(), title, corpus, count);
        let raw = self
            .complete(self.settings.exam_model(), prompt, Some(exam_response_format()))
            .await?;
        parse_questions(&raw)
    }
}

fn exam_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "exam",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "question": { "type": "string" },
                                "options": { "type": "array", "items": { "type": "string" } },
                                "correctIndex": { "type": "integer" }
                            },
                            "required": ["question", "options", "correctIndex"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["questions"],
                "additionalProperties": false
            }
        }
    })
}

/// Validate a raw exam response.
///
/// Accepts either a bare array or a `{ "questions": [...] }` object, optionally
/// wrapped in a markdown code fence. A single malformed question rejects the set.
///
/// # Errors
///
/// Returns `GenerationError::Malformed` for non-JSON payloads and
/// `GenerationError::InvalidQuestion` for the first invalid entry.
pub fn parse_questions(raw: &str) -> Result<Vec<Question>, GenerationError> {
    let payload: ExamPayload = serde_json::from_str(strip_code_fence(raw))
        .map_err(|err| GenerationError::Malformed(err.to_string()))?;
    let records = match payload {
        ExamPayload::Wrapped { questions } => questions,
        ExamPayload::Bare(questions) => questions,
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            Question::new(record.question, record.options, record.correct_index)
                .map_err(|source| GenerationError::InvalidQuestion { index, source })
        })
        .collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExamPayload {
    Wrapped { questions: Vec<QuestionPayload> },
    Bare(Vec<QuestionPayload>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPayload {
    question: String,
    options: Vec<String>,
    correct_index: i64,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
