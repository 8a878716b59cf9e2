use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::llm::{ChatClient, LlmError};
use crate::prompt::{translation_messages, TRANSLATION_TEMPERATURE};

const ENGLISH_MARKERS: [&str; 16] = [
    "the", "and", "with", "for", "your", "this", "that", "is", "are", "of", "to", "from", "our",
    "you", "will", "have",
];

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, LlmError>;
}

pub struct LlmTranslator {
    client: Arc<dyn ChatClient>,
}

impl LlmTranslator {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, LlmError> {
        let messages = translation_messages(text, source, target);
        let translated = self.client.chat(&messages, TRANSLATION_TEMPERATURE).await?;
        Ok(translated.trim().to_string())
    }
}

/// Flags a French candidate that still reads like English. Other targets are never flagged.
pub fn looks_untranslated(candidate: &str, target: &str) -> bool {
    if !target.trim().to_ascii_lowercase().starts_with("fr") {
        return false;
    }

    let words: Vec<String> = candidate
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return false;
    }

    let markers: HashSet<&str> = ENGLISH_MARKERS.into_iter().collect();
    let hits = words.iter().filter(|word| markers.contains(word.as_str())).count();
    hits >= 2 && hits * 100 >= words.len() * 15
}

/// Translated text to store, or `None` to leave the field as it is.
pub async fn translate_field(
    translator: &dyn Translator,
    text: &str,
    source: &str,
    target: &str,
) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    match translator.translate(text, source, target).await {
        Ok(candidate) if candidate.trim().is_empty() => None,
        Ok(candidate) if looks_untranslated(&candidate, target) => {
            warn!(
                event_name = "translation.suspected_untranslated",
                target_locale = target,
                "discarding translation that still looks like the source language"
            );
            None
        }
        Ok(candidate) => Some(candidate),
        Err(error) => {
            warn!(
                event_name = "translation.failed",
                target_locale = target,
                error = %error,
                "translation failed"
            );
            None
        }
    }
}
