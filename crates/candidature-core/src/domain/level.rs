use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LanguageLevel {
    #[serde(rename = "Débutant")]
    Beginner,
    #[serde(rename = "Intermédiaire")]
    Intermediate,
    #[serde(rename = "Avancé")]
    Advanced,
    #[serde(rename = "Natif")]
    Native,
}

/// Whole-word matches on the folded (accent-free, lowercase) input.
const SYNONYMS: &[(&str, LanguageLevel)] = &[
    ("courant", LanguageLevel::Advanced),
    ("fluent", LanguageLevel::Advanced),
    ("natif", LanguageLevel::Native),
    ("native", LanguageLevel::Native),
    ("maternelle", LanguageLevel::Native),
];

/// Checked in order after the synonyms.
const PREFIXES: &[(&str, LanguageLevel)] = &[
    ("deb", LanguageLevel::Beginner),
    ("int", LanguageLevel::Intermediate),
    ("av", LanguageLevel::Advanced),
];

impl LanguageLevel {
    pub const ALL: [LanguageLevel; 4] = [
        LanguageLevel::Beginner,
        LanguageLevel::Intermediate,
        LanguageLevel::Advanced,
        LanguageLevel::Native,
    ];

    pub const LABELS: &'static [&'static str] = &["Débutant", "Intermédiaire", "Avancé", "Natif"];

    pub fn as_str(self) -> &'static str {
        match self {
            LanguageLevel::Beginner => "Débutant",
            LanguageLevel::Intermediate => "Intermédiaire",
            LanguageLevel::Advanced => "Avancé",
            LanguageLevel::Native => "Natif",
        }
    }
}

impl FromStr for LanguageLevel {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        LanguageLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == raw)
            .ok_or_else(|| CoreError::InvalidLanguageLevel(raw.to_string()))
    }
}

/// Maps free-text proficiency ("courant", "INTERMEDIAIRE", "Débutante") to a
/// canonical level. Total: never panics, `None` means "not recognized".
pub fn normalize_level(value: &str) -> Option<LanguageLevel> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let folded = fold(raw);
    if let Some((_, level)) = SYNONYMS.iter().find(|(word, _)| *word == folded) {
        return Some(*level);
    }
    if let Some((_, level)) = PREFIXES
        .iter()
        .find(|(prefix, _)| folded.starts_with(prefix))
    {
        return Some(*level);
    }

    LanguageLevel::from_str(raw).ok()
}

fn fold(raw: &str) -> String {
    raw.nfd()
        .filter(|ch| !('\u{0300}'..='\u{036f}').contains(ch))
        .collect::<String>()
        .to_lowercase()
}
