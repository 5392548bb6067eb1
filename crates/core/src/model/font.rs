use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown font size preset: {0}")]
pub struct FontSizeError(pub String);

/// Reading font size preset. Presentation preference only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontSize {
    Normal,
    #[default]
    Large,
    Extra,
    Maximum,
}

impl FontSize {
    pub const ALL: [FontSize; 4] = [
        FontSize::Normal,
        FontSize::Large,
        FontSize::Extra,
        FontSize::Maximum,
    ];

    /// CSS value persisted in snapshots.
    #[must_use]
    pub fn css_value(self) -> &'static str {
        match self {
            FontSize::Normal => "1.125rem",
            FontSize::Large => "1.35rem",
            FontSize::Extra => "1.6rem",
            FontSize::Maximum => "1.85rem",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FontSize::Normal => "normal",
            FontSize::Large => "large",
            FontSize::Extra => "extra",
            FontSize::Maximum => "maximum",
        }
    }

    /// Looks up a preset by its CSS value.
    #[must_use]
    pub fn from_css_value(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.css_value() == value.trim())
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FontSize {
    type Err = FontSizeError;

    /// Accepts either the label or the CSS value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|size| size.label() == needle || size.css_value() == needle)
            .ok_or_else(|| FontSizeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_css_values() {
        assert_eq!("Extra".parse::<FontSize>(), Ok(FontSize::Extra));
        assert_eq!("1.85rem".parse::<FontSize>(), Ok(FontSize::Maximum));
        assert!("huge".parse::<FontSize>().is_err());
    }

    #[test]
    fn default_is_large() {
        assert_eq!(FontSize::default().css_value(), "1.35rem");
        assert_eq!(FontSize::from_css_value("1.125rem"), Some(FontSize::Normal));
    }
}
