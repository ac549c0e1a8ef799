//! Prompt templates.
//!
//! Every template is rendered with plain `format!`; user text has already
//! been capped and redacted by the caller.

use crate::types::{Emotion, Language};

const SYSTEM_STYLE: &str = "You are a warm, non-judgmental wellness companion for students in India. \
Keep answers short, kind and culturally aware. Never diagnose. \
If someone sounds unsafe, gently point them to professional help and local helplines.";

const DISCLAIMER: &str =
    "This is supportive guidance, not medical advice. In an emergency, contact a local helpline.";

const STRICT_JSON: &str =
    "Return strict JSON only, matching the schema. No markdown, no backticks, no text outside the JSON.";

/// Which prompt size to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Full,
    /// Smaller instructions for the single cheaper retry.
    Short,
}

impl PromptVariant {
    pub fn is_short(&self) -> bool {
        matches!(self, PromptVariant::Short)
    }
}

fn header() -> String {
    format!("{}\n{}\n", SYSTEM_STYLE, DISCLAIMER)
}

pub fn emotion_analysis(content: &str, lang: Language) -> String {
    format!(
        "{header}\nIdentify the emotions in the text below. Use only these labels: {vocab}.\n\
         Give a primary label, scores between 0 and 1, a few neutral keywords and one or two short explanations.\n\
         {strict}\n{lang}\nText:\n---\n{content}\n---\n",
        header = header(),
        vocab = Emotion::vocabulary_list(),
        strict = STRICT_JSON,
        lang = lang.instruction(),
        content = content,
    )
}

pub fn journal_summary(content: &str, lang: Language) -> String {
    format!(
        "{header}\nSummarize this journal entry in two or three sentences, offer one to three practical suggestions \
         and list the emotions you notice (labels: {vocab}).\n{strict}\n{lang}\nEntry:\n---\n{content}\n---\n",
        header = header(),
        vocab = Emotion::vocabulary_list(),
        strict = STRICT_JSON,
        lang = lang.instruction(),
        content = content,
    )
}

pub fn journal_insights(entry: &str, lang: Language, variant: PromptVariant) -> String {
    match variant {
        PromptVariant::Full => format!(
            "{disclaimer}\nRead the student's journal entry and reflect it back supportively.\n\
             Use exactly these keys: summary, actionable_suggestions, detected_emotions, tone, primary_label, \
             scores, keywords, confidence, explanations.\n\
             - summary: two or three gentle sentences\n\
             - actionable_suggestions: two to four short tips\n\
             - detected_emotions: lowercase labels from [{vocab}] only\n\
             - tone: the string \"supportive\"\n\
             - primary_label: the single best label from the same list\n\
             - scores: up to four of those labels mapped to numbers between 0 and 1\n\
             - keywords: three to eight neutral phrases, no names, dates or contact details\n\
             - confidence: a number between 0 and 1\n\
             - explanations: one or two very short reasons\n\
             Do not add keys. Do not use clinical language.\n{strict}\n{lang}\n\
             Entry (may be truncated):\n---\n{entry}\n---\n",
            disclaimer = DISCLAIMER,
            vocab = Emotion::vocabulary_list(),
            strict = STRICT_JSON,
            lang = lang.instruction(),
            entry = entry,
        ),
        PromptVariant::Short => format!(
            "{disclaimer}\nKeys: summary, actionable_suggestions, detected_emotions, tone, primary_label, scores, \
             keywords, confidence, explanations. Labels only from [{vocab}]. tone=\"supportive\".\n\
             {strict}\n{lang}\nEntry:\n---\n{entry}\n---\n",
            disclaimer = DISCLAIMER,
            vocab = Emotion::vocabulary_list(),
            strict = STRICT_JSON,
            lang = lang.instruction(),
            entry = entry,
        ),
    }
}

pub fn meditation(emotions: &[Emotion], duration_sec: u32, lang: Language) -> String {
    let names = emotions.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(", ");
    format!(
        "{header}\nDesign a short guided meditation for someone feeling: {names}.\n\
         Aim for about {duration_sec} seconds and a handful of calm, simple steps.\n{strict}\n{lang}\n",
        header = header(),
        names = names,
        duration_sec = duration_sec,
        strict = STRICT_JSON,
        lang = lang.instruction(),
    )
}

pub fn cultural_story(theme: &str, lang: Language) -> String {
    format!(
        "{header}\nTell a one-minute story rooted in Indian culture about \"{theme}\", ending with a clear moral.\n\
         {strict}\n{lang}\n",
        header = header(),
        theme = theme,
        strict = STRICT_JSON,
        lang = lang.instruction(),
    )
}

pub fn resilience_prompts(context: &str, lang: Language) -> String {
    format!(
        "{header}\nWrite three to five reflective questions that help build resilience.\n\
         Context:\n---\n{context}\n---\n{strict}\n{lang}\n",
        header = header(),
        context = context,
        strict = STRICT_JSON,
        lang = lang.instruction(),
    )
}

pub fn answer_question(question: &str, lang: Language) -> String {
    format!(
        "{header}\nAnswer the student's question simply and with empathy. Keep it practical.\n\
         Question:\n---\n{question}\n---\n{strict}\n{lang}\n",
        header = header(),
        question = question,
        strict = STRICT_JSON,
        lang = lang.instruction(),
    )
}

pub fn peer_moderation(text: &str) -> String {
    format!(
        "Review this short post for a kind, safe peer wall. If it is unsafe, say why in one line. \
         If it is safe but could be gentler or clearer, suggest a rewrite.\n\
         Post:\n---\n{text}\n---\n{strict}\n",
        text = text,
        strict = STRICT_JSON,
    )
}

pub fn exam_snack(mode: &str, duration_min: u32, lang: Language) -> String {
    format!(
        "{header}\nGive two or three quick, practical study tips for a {mode} session of {duration_min} minutes. \
         Put the tips as bullets in the answer field.\n{strict}\n{lang}\n",
        header = header(),
        mode = mode,
        duration_min = duration_min,
        strict = STRICT_JSON,
        lang = lang.instruction(),
    )
}

pub fn comic_script(situation: &str, lang: Language, variant: PromptVariant) -> String {
    match variant {
        PromptVariant::Full => format!(
            "{header}\nWrite a short encouraging comic (three or four panels) about this situation:\n\
             ---\n{situation}\n---\n\
             Each panel needs panel_caption, dialogue and visual_style. Keep it hopeful and simple.\n{strict}\n{lang}\n",
            header = header(),
            situation = situation,
            strict = STRICT_JSON,
            lang = lang.instruction(),
        ),
        PromptVariant::Short => format!(
            "{disclaimer}\nThree panels. Situation:\n---\n{situation}\n---\n\
             Only key: panels, each with panel_caption, dialogue (under 60 characters), visual_style.\n{strict}\n{lang}\n",
            disclaimer = DISCLAIMER,
            situation = situation,
            strict = STRICT_JSON,
            lang = lang.instruction(),
        ),
    }
}

pub fn music_rationale(mood: &str, lang: Language) -> String {
    format!(
        "{header}\nIn one or two kind lines, explain why calming playlists suit someone feeling {mood}. \
         Plain text only, no JSON.\n{lang}\n",
        header = header(),
        mood = mood,
        lang = lang.instruction(),
    )
}

pub fn art_prompt(mood: &str, lang: Language) -> String {
    format!(
        "{header}\nWrite ONE abstract art prompt of at most 25 words that captures this mood: {mood}.\n\
         Uplifting, subtle Indian cultural touches welcome. Return only the prompt text, no quotes, no JSON.\n{lang}\n",
        header = header(),
        mood = mood,
        lang = lang.instruction(),
    )
}

pub fn describe_image(lang: Language) -> String {
    format!(
        "{header}\nDescribe this drawing with warmth. You may gently name feelings it suggests, without diagnosing. \
         One short paragraph of plain text.\n{lang}\n",
        header = header(),
        lang = lang.instruction(),
    )
}
