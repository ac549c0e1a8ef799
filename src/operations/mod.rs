//! 类型化操作门面：每个产品操作一个异步方法。
//!
//! # Typed Operation Façade
//!
//! Each method caps and (for free user text) redacts its input, renders a
//! fixed prompt, calls the [`Gateway`] under its own operation key and turns
//! the reply into a typed record. Structured replies are validated against
//! the full schema of their wire record, then normalized.
//!
//! Journal insights and comic scripts are latency sensitive: on `Timeout`,
//! `Unavailable` or `StructuredOutput` they retry exactly once with a
//! shorter prompt (see [`with_short_prompt_retry`]). Every other failure,
//! and the second failure of a short-prompt retry, reaches the caller as a
//! typed [`Error`](crate::Error). No method ever returns placeholder content.

mod fallback;
pub mod prompts;
pub mod records;

pub use fallback::with_short_prompt_retry;
pub use prompts::PromptVariant;
pub use records::{
    ComicPanel, ComicScript, CulturalStory, EmotionAnalysis, JournalInsights, JournalSummary,
    MeditationPlan, PeerModeration, QaAnswer, ResiliencePrompts, WireRecord,
};

use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

use crate::config::GatewayConfig;
use crate::gateway::{CallRequest, Gateway};
use crate::guardrails::{apply_response_safety, should_block, CrisisDetector, CrisisSignal, Redactor, SafetyConfig};
use crate::structured::{provider_schema, OutputValidator};
use crate::types::{Emotion, Language, Modality, OperationKey};
use crate::{Error, ErrorContext, Result};
use records::{
    RawComicScript, RawCulturalStory, RawEmotionAnalysis, RawJournalInsights, RawJournalSummary,
    RawMeditationPlan, RawPeerModeration, RawQaAnswer, RawResiliencePrompts,
};

pub const MAX_JOURNAL_CHARS: usize = 2000;
pub const MAX_QUESTION_CHARS: usize = 800;
const ANALYSIS_CAP: usize = 1600;
const ANALYSIS_SHORT_CAP: usize = 800;
const INSIGHTS_CAP: usize = 1500;
const THEME_CAP: usize = 50;
const CONTEXT_CAP: usize = 400;
const POST_CAP: usize = 240;
const SITUATION_CAP: usize = 240;
const MOOD_CAP: usize = 40;
const MODE_CAP: usize = 40;
const ART_MOOD_CAP: usize = 200;
const ART_PROMPT_CAP: usize = 200;
const DEFAULT_MEDITATION_SECS: u32 = 180;
const DEFAULT_THEME: &str = "hope";
const DEFAULT_SITUATION: &str = "Exam stress";
const DEFAULT_EXAM_MODE: &str = "focus";

/// First `max` characters of `text`.
fn cap(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub struct AiOperations {
    gateway: Arc<Gateway>,
    safety: SafetyConfig,
    redactor: Redactor,
    detector: CrisisDetector,
}

impl AiOperations {
    pub fn new(gateway: Arc<Gateway>, safety: SafetyConfig) -> Self {
        let detector = CrisisDetector::new(&safety);
        Self {
            gateway,
            safety,
            redactor: Redactor::new(),
            detector,
        }
    }

    /// Façade over a Gemini-backed gateway built from `config`.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let gateway = Gateway::from_config(&config)?;
        Ok(Self::new(Arc::new(gateway), config.safety))
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn safety(&self) -> &SafetyConfig {
        &self.safety
    }

    fn text_key(&self, operation: &str) -> OperationKey {
        self.gateway.key(Modality::Text, operation)
    }

    fn redact(&self, text: &str) -> String {
        self.redactor.redact_text(text)
    }

    /// Schema-constrained call, validated and normalized into `W::Output`.
    async fn structured<W: WireRecord + 'static>(
        &self,
        key: &OperationKey,
        prompt: String,
        variant: PromptVariant,
    ) -> Result<W::Output> {
        let request = CallRequest::text(prompt)
            .with_schema(provider_schema::<W>())
            .with_short_prompt(variant.is_short());
        let value = self.gateway.call(key, request).await?.into_json()?;

        let ctx = |source: &str| ErrorContext::new().with_operation_key(key.as_str()).with_source(source);
        let raw: W = OutputValidator::cached::<W>(W::NAME)?
            .decode(value)
            .map_err(|e| e.with_context(ctx("validator")))?;
        raw.normalize().map_err(|e| e.with_context(ctx("normalize")))
    }

    /// Unstructured call; the reply is trimmed and checked against the block list.
    async fn plain_text(&self, key: &OperationKey, request: CallRequest) -> Result<String> {
        let text = self.gateway.call(key, request).await?.into_text();
        let text = text.trim().to_string();
        if should_block(&self.safety, &text) {
            warn!(key = %key, len = text.len(), "ai_response_blocked");
            return Err(Error::safety("response withheld by safety filter")
                .with_context(ErrorContext::new().with_operation_key(key.as_str()).with_source("filters")));
        }
        Ok(text)
    }

    pub async fn analyze_emotions(
        &self,
        text: &str,
        lang: Language,
        variant: PromptVariant,
    ) -> Result<EmotionAnalysis> {
        let limit = if variant.is_short() { ANALYSIS_SHORT_CAP } else { ANALYSIS_CAP };
        let content = cap(&self.redact(text), limit);
        let key = self.text_key("analyze_emotions");
        self.structured::<RawEmotionAnalysis>(&key, prompts::emotion_analysis(&content, lang), variant)
            .await
    }

    pub async fn summarize_journal(
        &self,
        text: &str,
        lang: Language,
        variant: PromptVariant,
    ) -> Result<JournalSummary> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("journal text is empty"));
        }
        let limit = if variant.is_short() { ANALYSIS_SHORT_CAP } else { ANALYSIS_CAP };
        let content = cap(&self.redact(text.trim()), limit);
        let key = self.text_key("summarize_journal");
        self.structured::<RawJournalSummary>(&key, prompts::journal_summary(&content, lang), variant)
            .await
    }

    /// Summary, emotions and keywords in one call, with a single short-prompt retry.
    pub async fn journal_insights(&self, text: &str, lang: Language) -> Result<JournalInsights> {
        let trimmed = text.trim();
        let len = trimmed.chars().count();
        if len == 0 || len > MAX_JOURNAL_CHARS {
            return Err(Error::invalid_input(format!(
                "journal text must be 1..={} characters, got {}",
                MAX_JOURNAL_CHARS, len
            )));
        }
        if self.detector.detect(trimmed).triggered {
            warn!(len, "journal_crisis_flag");
        }

        let entry = cap(&self.redact(trimmed), INSIGHTS_CAP);
        let key = self.text_key("journal_insights");
        with_short_prompt_retry(&self.gateway, &key, |variant| {
            let prompt = prompts::journal_insights(&entry, lang, variant);
            let key = &key;
            async move { self.structured::<RawJournalInsights>(key, prompt, variant).await }
        })
        .await
    }

    pub async fn generate_meditation(
        &self,
        emotions: &[Emotion],
        duration_hint_sec: u32,
        lang: Language,
    ) -> Result<MeditationPlan> {
        if emotions.is_empty() {
            return Err(Error::invalid_input("at least one emotion is required"));
        }
        let duration = if (records::MIN_MEDITATION_SECS..=records::MAX_MEDITATION_SECS).contains(&duration_hint_sec) {
            duration_hint_sec
        } else {
            DEFAULT_MEDITATION_SECS
        };
        let key = self.text_key("generate_meditation");
        self.structured::<RawMeditationPlan>(&key, prompts::meditation(emotions, duration, lang), PromptVariant::Full)
            .await
    }

    pub async fn tell_cultural_story(&self, theme: &str, lang: Language) -> Result<CulturalStory> {
        let theme = match theme.trim() {
            "" => DEFAULT_THEME.to_string(),
            t => cap(t, THEME_CAP),
        };
        let key = self.text_key("tell_cultural_story");
        self.structured::<RawCulturalStory>(&key, prompts::cultural_story(&theme, lang), PromptVariant::Full)
            .await
    }

    pub async fn make_resilience_prompts(&self, context: &str, lang: Language) -> Result<ResiliencePrompts> {
        let context = cap(&self.redact(context.trim()), CONTEXT_CAP);
        let key = self.text_key("make_resilience_prompts");
        self.structured::<RawResiliencePrompts>(
            &key,
            prompts::resilience_prompts(&context, lang),
            PromptVariant::Full,
        )
        .await
    }

    pub async fn answer_question(&self, question: &str, lang: Language) -> Result<QaAnswer> {
        let question = question.trim();
        let len = question.chars().count();
        if len == 0 || len > MAX_QUESTION_CHARS {
            return Err(Error::invalid_input(format!(
                "question must be 1..={} characters, got {}",
                MAX_QUESTION_CHARS, len
            )));
        }
        let masked = self.redact(question);
        let key = self.text_key("answer_question");
        self.structured::<RawQaAnswer>(&key, prompts::answer_question(&masked, lang), PromptVariant::Full)
            .await
    }

    pub async fn moderate_peer_post(&self, text: &str) -> Result<PeerModeration> {
        let content = cap(&self.redact(text.trim()), POST_CAP);
        if content.is_empty() {
            return Err(Error::invalid_input("post is empty"));
        }
        let key = self.text_key("moderate_peer_post");
        self.structured::<RawPeerModeration>(&key, prompts::peer_moderation(&content), PromptVariant::Full)
            .await
    }

    pub async fn exam_snack(&self, mode: &str, duration_sec: u32, lang: Language) -> Result<QaAnswer> {
        let mode = match mode.trim() {
            "" => DEFAULT_EXAM_MODE.to_string(),
            m => cap(m, MODE_CAP),
        };
        let key = self.text_key("exam_snack");
        self.structured::<RawQaAnswer>(&key, prompts::exam_snack(&mode, duration_sec / 60, lang), PromptVariant::Full)
            .await
    }

    /// Three or four panels, with a single short-prompt retry.
    pub async fn generate_comic_script(&self, situation: &str, lang: Language) -> Result<ComicScript> {
        let situation = match situation.trim() {
            "" => DEFAULT_SITUATION.to_string(),
            s => cap(&self.redact(s), SITUATION_CAP),
        };
        let key = self.text_key("generate_comic_script");
        with_short_prompt_retry(&self.gateway, &key, |variant| {
            let prompt = prompts::comic_script(&situation, lang, variant);
            let key = &key;
            async move { self.structured::<RawComicScript>(key, prompt, variant).await }
        })
        .await
    }

    pub async fn music_rationale(&self, mood: &str, lang: Language) -> Result<String> {
        let mood = cap(&mood.trim().to_lowercase(), MOOD_CAP);
        if mood.is_empty() {
            return Err(Error::invalid_input("mood is required"));
        }
        let key = self.text_key("music_rationale");
        let text = self
            .plain_text(&key, CallRequest::text(prompts::music_rationale(&mood, lang)))
            .await?;
        Ok(apply_response_safety(&text))
    }

    /// Single-line abstract art prompt.
    pub async fn generate_art_prompt(&self, mood: &str, lang: Language) -> Result<String> {
        let mood = cap(mood.trim(), ART_MOOD_CAP);
        if mood.is_empty() {
            return Err(Error::invalid_input("mood is required"));
        }
        let key = self.text_key("generate_art_prompt");
        let text = self
            .plain_text(&key, CallRequest::text(prompts::art_prompt(&mood, lang)))
            .await?;
        Ok(cap(&text.replace(['\r', '\n'], " "), ART_PROMPT_CAP))
    }

    pub async fn describe_image(
        &self,
        image: impl Into<Bytes>,
        mime_type: &str,
        lang: Language,
    ) -> Result<String> {
        let image = image.into();
        if image.is_empty() {
            return Err(Error::invalid_input("image is empty"));
        }
        let key = self.gateway.key(Modality::Vision, "describe_image");
        let request = CallRequest::image(image, mime_type, prompts::describe_image(lang));
        let text = self.plain_text(&key, request).await?;
        Ok(apply_response_safety(&text))
    }

    /// Keyword crisis scan; never calls the provider.
    pub fn detect_crisis(&self, text: &str) -> CrisisSignal {
        self.detector.detect(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_counts_characters() {
        assert_eq!(cap("नमस्ते दुनिया", 3).chars().count(), 3);
        assert_eq!(cap("abc", 10), "abc");
    }
}
