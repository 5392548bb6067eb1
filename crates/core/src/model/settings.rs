use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LANGUAGE: &str = "Spanish";

/// Validated connection settings for the content generator.
///
/// Generation is enabled only when an API key is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorSettings {
    api_key: Option<String>,
    base_url: String,
    lesson_model: String,
    exam_model: String,
    language: String,
}

#[derive(Clone, Debug, Default)]
pub struct GeneratorSettingsDraft {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub lesson_model: Option<String>,
    pub exam_model: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeneratorSettingsError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl GeneratorSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft.
    ///
    /// Blank values fall back to defaults; the exam model falls back to the
    /// lesson model.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorSettingsError` if the base URL is present but invalid.
    pub fn validate(self) -> Result<GeneratorSettings, GeneratorSettingsError> {
        let api_key = normalize_optional(self.api_key);
        let base_url =
            normalize_optional(self.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let lesson_model =
            normalize_optional(self.lesson_model).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let exam_model = normalize_optional(self.exam_model).unwrap_or_else(|| lesson_model.clone());
        let language =
            normalize_optional(self.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        if Url::parse(&base_url).is_err() {
            return Err(GeneratorSettingsError::InvalidBaseUrl(base_url));
        }

        Ok(GeneratorSettings {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            lesson_model,
            exam_model,
            language,
        })
    }
}

impl GeneratorSettings {
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn lesson_model(&self) -> &str {
        &self.lesson_model
    }

    #[must_use]
    pub fn exam_model(&self) -> &str {
        &self.exam_model
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            lesson_model: DEFAULT_MODEL.to_string(),
            exam_model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let settings = GeneratorSettingsDraft {
            api_key: Some("   ".into()),
            lesson_model: Some("model-a".into()),
            ..GeneratorSettingsDraft::default()
        }
        .validate()
        .unwrap();

        assert!(!settings.is_enabled());
        assert_eq!(settings.base_url(), DEFAULT_BASE_URL);
        assert_eq!(settings.exam_model(), "model-a");
        assert_eq!(settings.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn trims_trailing_slash_and_rejects_bad_urls() {
        let settings = GeneratorSettingsDraft {
            api_key: Some("key".into()),
            base_url: Some("http://localhost:8080/v1/".into()),
            ..GeneratorSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert_eq!(settings.base_url(), "http://localhost:8080/v1");
        assert_eq!(settings.api_key(), Some("key"));

        let err = GeneratorSettingsDraft {
            base_url: Some("not a url".into()),
            ..GeneratorSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, GeneratorSettingsError::InvalidBaseUrl(_)));
    }
}
