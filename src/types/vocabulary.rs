use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed emotion vocabulary shared by every label and score field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Calm,
    Anxious,
    Sad,
    Angry,
    Hopeful,
    Tired,
    Stressed,
    Motivated,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Calm,
        Emotion::Anxious,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Hopeful,
        Emotion::Tired,
        Emotion::Stressed,
        Emotion::Motivated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Calm => "calm",
            Emotion::Anxious => "anxious",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Hopeful => "hopeful",
            Emotion::Tired => "tired",
            Emotion::Stressed => "stressed",
            Emotion::Motivated => "motivated",
        }
    }

    /// Case-insensitive lookup; `None` for anything outside the vocabulary.
    pub fn parse_label(label: &str) -> Option<Self> {
        let wanted = label.trim().to_lowercase();
        Self::ALL.iter().copied().find(|e| e.as_str() == wanted)
    }

    /// Comma separated list used inside prompts.
    pub fn vocabulary_list() -> String {
        Self::ALL
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::parse_label(s)
            .ok_or_else(|| crate::Error::invalid_input(format!("unknown emotion '{}'", s)))
    }
}

/// Response language preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Hinglish,
}

impl Language {
    /// Lenient parse: anything unrecognised falls back to English.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "hi" | "hindi" => Language::Hi,
            "hinglish" => Language::Hinglish,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Hinglish => "hinglish",
        }
    }

    /// Instruction appended to prompts.
    pub fn instruction(&self) -> &'static str {
        match self {
            Language::En => "Respond in clear, simple English.",
            Language::Hi => "Respond in simple Hindi written in Devanagari script.",
            Language::Hinglish => {
                "Respond in Hinglish (conversational Hindi written in Latin script, mixed with English)."
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
