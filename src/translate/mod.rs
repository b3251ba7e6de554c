//! Translation bridge — detours unsupported languages through a pivot.
//!
//! The service only understands a few languages. When a question is written
//! in anything else, the bridge translates it into the pivot language, and
//! the answer back into the asker's language afterwards.

pub mod google;

use tracing::{info, warn};

use crate::transport::TransportError;

pub use google::GoogleTranslator;

/// Languages the service answers in natively.
pub const SUPPORTED_LANGUAGES: [&str; 3] = ["en", "ja", "ko"];

pub const DEFAULT_PIVOT_LANGUAGE: &str = "en";

/// Errors from language detection or translation.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("language detection failed: {0}")]
    Detect(String),

    #[error("translation {from} -> {to} failed: {message}")]
    Translate {
        from: String,
        to: String,
        message: String,
    },

    #[error("translator transport: {0}")]
    Transport(#[from] TransportError),

    #[error("unexpected translator response: {0}")]
    MalformedResponse(String),
}

/// Language detection and translation capability.
pub trait Translator: Send + Sync {
    /// Language code of `text`, e.g. `en`, `zh-CN`.
    fn detect(&self, text: &str) -> Result<String, TranslationError>;

    fn translate(&self, from: &str, to: &str, text: &str) -> Result<String, TranslationError>;
}

pub fn is_supported(lang: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&lang)
}

/// Result of the inbound leg, needed again for the outbound one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub text: String,
    pub used_translator: bool,
    pub detected_lang: String,
}

/// Wraps a [`Translator`] with a pivot language.
pub struct TranslationBridge {
    translator: Box<dyn Translator>,
    pivot: String,
}

impl TranslationBridge {
    pub fn new(translator: Box<dyn Translator>, pivot: impl Into<String>) -> Self {
        let pivot = pivot.into();
        if !is_supported(&pivot) {
            warn!("pivot language '{pivot}' is not one the service supports");
        }
        Self { translator, pivot }
    }

    /// Bridge with the default `en` pivot.
    pub fn with_default_pivot(translator: Box<dyn Translator>) -> Self {
        Self::new(translator, DEFAULT_PIVOT_LANGUAGE)
    }

    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    /// Translate `text` into the pivot when its language is unsupported.
    pub fn maybe_translate_in(&self, text: &str) -> Result<Inbound, TranslationError> {
        let detected_lang = self.translator.detect(text)?;
        if is_supported(&detected_lang) {
            return Ok(Inbound {
                text: text.to_string(),
                used_translator: false,
                detected_lang,
            });
        }

        info!("translating question {detected_lang} -> {}", self.pivot);
        let translated = self.translator.translate(&detected_lang, &self.pivot, text)?;
        Ok(Inbound {
            text: translated,
            used_translator: true,
            detected_lang,
        })
    }

    /// Translate an answer back to `detected_lang` if the inbound leg did.
    pub fn maybe_translate_out(
        &self,
        text: &str,
        used_translator: bool,
        detected_lang: &str,
    ) -> Result<String, TranslationError> {
        if !used_translator {
            return Ok(text.to_string());
        }
        info!("translating answer {} -> {detected_lang}", self.pivot);
        self.translator.translate(&self.pivot, detected_lang, text)
    }
}

impl std::fmt::Debug for TranslationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationBridge")
            .field("pivot", &self.pivot)
            .finish_non_exhaustive()
    }
}
