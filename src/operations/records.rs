//! 结构化结果记录：供应商原始结构 → 规范化后的类型化结果。
//!
//! Every structured operation has two shapes:
//!
//! - a *wire record* (`Raw*`): lenient, deserialized from whatever the
//!   provider returned after repair, and the source of both the provider
//!   schema and the validation schema;
//! - a *typed record*: what callers receive, produced by
//!   [`WireRecord::normalize`].
//!
//! Normalization filters, clamps and truncates. It never fills in a value
//! the provider did not supply.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::Emotion;
use crate::{Error, Result};

pub const MAX_KEYWORDS: usize = 8;
pub const MAX_EXPLANATIONS: usize = 2;
pub const MAX_COMIC_PANELS: usize = 4;
pub const MIN_MEDITATION_SECS: u32 = 60;
pub const MAX_MEDITATION_SECS: u32 = 1800;
pub const SUPPORTIVE_TONE: &str = "supportive";

/// Provider-facing record with a normalization step into its typed form.
pub trait WireRecord: DeserializeOwned + JsonSchema {
    /// Name used in validation errors.
    const NAME: &'static str;
    type Output;

    fn normalize(self) -> Result<Self::Output>;
}

// ---------------------------------------------------------------------------
// normalization helpers

fn clean_text(s: String) -> String {
    s.trim().to_string()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_optional(s: Option<String>) -> Option<String> {
    s.map(clean_text).filter(|s| !s.is_empty())
}

/// Lowercase, filter to the vocabulary, keep first occurrence order.
fn clean_emotions(labels: Vec<String>) -> Vec<Emotion> {
    let mut out = Vec::new();
    for label in labels {
        if let Some(e) = Emotion::parse_label(&label) {
            if !out.contains(&e) {
                out.push(e);
            }
        }
    }
    out
}

fn unit_interval(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v.clamp(0.0, 1.0) as f32)
}

/// Vocabulary keys only, numeric values only, clamped to [0, 1].
fn clean_scores(raw: BTreeMap<String, Value>) -> BTreeMap<Emotion, f32> {
    raw.into_iter()
        .filter_map(|(k, v)| Some((Emotion::parse_label(&k)?, unit_interval(&v)?)))
        .collect()
}

fn clean_confidence(raw: Option<Value>) -> Option<f32> {
    raw.as_ref().and_then(unit_interval)
}

fn malformed(record: &str, reason: &str) -> Error {
    Error::structured_output(format!("invalid {}: {}", record, reason))
}

// ---------------------------------------------------------------------------
// emotion analysis

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawEmotionAnalysis {
    #[serde(default)]
    pub primary_label: String,
    #[serde(default)]
    pub scores: BTreeMap<String, Value>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    /// `None` when the provider's label was missing or outside the vocabulary.
    pub primary_label: Option<Emotion>,
    pub scores: BTreeMap<Emotion, f32>,
    pub keywords: Vec<String>,
    pub confidence: Option<f32>,
    pub explanations: Vec<String>,
}

impl WireRecord for RawEmotionAnalysis {
    const NAME: &'static str = "EmotionAnalysis";
    type Output = EmotionAnalysis;

    fn normalize(self) -> Result<EmotionAnalysis> {
        let mut keywords = clean_list(self.keywords);
        keywords.truncate(MAX_KEYWORDS);
        let mut explanations = clean_list(self.explanations);
        explanations.truncate(MAX_EXPLANATIONS);
        Ok(EmotionAnalysis {
            primary_label: Emotion::parse_label(&self.primary_label),
            scores: clean_scores(self.scores),
            keywords,
            confidence: clean_confidence(self.confidence),
            explanations,
        })
    }
}

// ---------------------------------------------------------------------------
// journal summary

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawJournalSummary {
    pub summary: String,
    #[serde(default)]
    pub actionable_suggestions: Vec<String>,
    #[serde(default)]
    pub detected_emotions: Vec<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalSummary {
    pub summary: String,
    pub actionable_suggestions: Vec<String>,
    pub detected_emotions: Vec<Emotion>,
    /// Only what the provider sent; journal insights always carry "supportive".
    pub tone: Option<String>,
}

impl WireRecord for RawJournalSummary {
    const NAME: &'static str = "JournalSummary";
    type Output = JournalSummary;

    fn normalize(self) -> Result<JournalSummary> {
        Ok(JournalSummary {
            summary: clean_text(self.summary),
            actionable_suggestions: clean_list(self.actionable_suggestions),
            detected_emotions: clean_emotions(self.detected_emotions),
            tone: clean_optional(self.tone),
        })
    }
}

// ---------------------------------------------------------------------------
// unified journal insights

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawJournalInsights {
    pub summary: String,
    #[serde(default)]
    pub actionable_suggestions: Vec<String>,
    #[serde(default)]
    pub detected_emotions: Vec<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub primary_label: String,
    #[serde(default)]
    pub scores: BTreeMap<String, Value>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub explanations: Vec<String>,
}

/// Summary, emotion analysis and keywords from one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalInsights {
    pub summary: JournalSummary,
    pub emotions: EmotionAnalysis,
    pub keywords: Vec<String>,
}

impl WireRecord for RawJournalInsights {
    const NAME: &'static str = "JournalInsights";
    type Output = JournalInsights;

    fn normalize(self) -> Result<JournalInsights> {
        let detected = clean_emotions(self.detected_emotions);
        let primary = Emotion::parse_label(&self.primary_label).or_else(|| detected.first().copied());

        let mut keywords = clean_list(self.keywords);
        keywords.truncate(MAX_KEYWORDS);
        let mut explanations = clean_list(self.explanations);
        explanations.truncate(MAX_EXPLANATIONS);

        let summary = JournalSummary {
            summary: clean_text(self.summary),
            actionable_suggestions: clean_list(self.actionable_suggestions),
            detected_emotions: detected,
            tone: Some(SUPPORTIVE_TONE.to_string()),
        };
        let emotions = EmotionAnalysis {
            primary_label: primary,
            scores: clean_scores(self.scores),
            keywords: keywords.clone(),
            confidence: clean_confidence(self.confidence),
            explanations,
        };
        Ok(JournalInsights {
            summary,
            emotions,
            keywords,
        })
    }
}

// ---------------------------------------------------------------------------
// meditation

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawMeditationPlan {
    pub title: String,
    pub duration_sec: f64,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeditationPlan {
    pub title: String,
    pub duration_sec: u32,
    pub steps: Vec<String>,
}

impl WireRecord for RawMeditationPlan {
    const NAME: &'static str = "MeditationPlan";
    type Output = MeditationPlan;

    fn normalize(self) -> Result<MeditationPlan> {
        let steps = clean_list(self.steps);
        if steps.is_empty() {
            return Err(malformed(Self::NAME, "no steps"));
        }
        let duration = self
            .duration_sec
            .round()
            .clamp(MIN_MEDITATION_SECS as f64, MAX_MEDITATION_SECS as f64) as u32;
        Ok(MeditationPlan {
            title: clean_text(self.title),
            duration_sec: duration,
            steps,
        })
    }
}

// ---------------------------------------------------------------------------
// cultural story

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawCulturalStory {
    pub title: String,
    pub story: String,
    pub moral: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalStory {
    pub title: String,
    pub story: String,
    pub moral: String,
    pub language: String,
}

impl WireRecord for RawCulturalStory {
    const NAME: &'static str = "CulturalStory";
    type Output = CulturalStory;

    fn normalize(self) -> Result<CulturalStory> {
        let story = clean_text(self.story);
        if story.is_empty() {
            return Err(malformed(Self::NAME, "empty story"));
        }
        Ok(CulturalStory {
            title: clean_text(self.title),
            story,
            moral: clean_text(self.moral),
            language: clean_text(self.language),
        })
    }
}

// ---------------------------------------------------------------------------
// resilience prompts

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawResiliencePrompts {
    pub prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiliencePrompts {
    pub prompts: Vec<String>,
}

impl WireRecord for RawResiliencePrompts {
    const NAME: &'static str = "ResiliencePrompts";
    type Output = ResiliencePrompts;

    fn normalize(self) -> Result<ResiliencePrompts> {
        Ok(ResiliencePrompts {
            prompts: clean_list(self.prompts),
        })
    }
}

// ---------------------------------------------------------------------------
// question answering (also used by exam snacks)

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawQaAnswer {
    pub answer: String,
    #[serde(default)]
    pub reading_grade: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    pub reading_grade: String,
    pub language: String,
    pub references: Vec<String>,
}

impl WireRecord for RawQaAnswer {
    const NAME: &'static str = "QAAnswer";
    type Output = QaAnswer;

    fn normalize(self) -> Result<QaAnswer> {
        let answer = clean_text(self.answer);
        if answer.is_empty() {
            return Err(malformed(Self::NAME, "empty answer"));
        }
        Ok(QaAnswer {
            answer,
            reading_grade: clean_text(self.reading_grade),
            language: clean_text(self.language),
            references: clean_list(self.references),
        })
    }
}

// ---------------------------------------------------------------------------
// peer moderation

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawPeerModeration {
    pub safe: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suggested_rewrite: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerModeration {
    pub safe: bool,
    pub reason: String,
    pub suggested_rewrite: Option<String>,
}

impl WireRecord for RawPeerModeration {
    const NAME: &'static str = "PeerModeration";
    type Output = PeerModeration;

    fn normalize(self) -> Result<PeerModeration> {
        Ok(PeerModeration {
            safe: self.safe,
            reason: clean_text(self.reason),
            suggested_rewrite: clean_optional(self.suggested_rewrite),
        })
    }
}

// ---------------------------------------------------------------------------
// comic script

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawComicPanel {
    #[serde(default)]
    pub panel_caption: String,
    #[serde(default)]
    pub dialogue: String,
    #[serde(default)]
    pub visual_style: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawComicScript {
    pub panels: Vec<RawComicPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicPanel {
    pub panel_caption: String,
    pub dialogue: String,
    pub visual_style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicScript {
    pub panels: Vec<ComicPanel>,
}

impl WireRecord for RawComicScript {
    const NAME: &'static str = "ComicScript";
    type Output = ComicScript;

    fn normalize(self) -> Result<ComicScript> {
        let panels: Vec<ComicPanel> = self
            .panels
            .into_iter()
            .map(|p| ComicPanel {
                panel_caption: clean_text(p.panel_caption),
                dialogue: clean_text(p.dialogue),
                visual_style: clean_text(p.visual_style),
            })
            // a panel with neither caption nor dialogue has nothing to show
            .filter(|p| !(p.panel_caption.is_empty() && p.dialogue.is_empty()))
            .take(MAX_COMIC_PANELS)
            .collect();
        if panels.is_empty() {
            return Err(malformed(Self::NAME, "no panels"));
        }
        Ok(ComicScript { panels })
    }
}
