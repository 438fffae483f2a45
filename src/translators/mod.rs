//! Event-to-message translators, keyed by source system id.
//!
//! Each upstream source (the `service_id` of an incoming event) has one
//! [`Translator`]. The [`TranslatorRegistry`] is built at startup and only
//! read afterwards, so it is shared between requests behind an `Arc`.

pub mod fallback;
pub mod pipeline;
pub mod toolchain;

use crate::types::{CorrelationId, OutboundMessage, RawPayload, ToolchainCredentials};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use fallback::FallbackTranslator;
pub use pipeline::PipelineTranslator;
pub use toolchain::ToolchainTranslator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("malformed {source_id} payload: {reason}")]
    MalformedPayload { source_id: String, reason: String },
    #[error("{0}")]
    Other(String),
}

/// Maps one source's raw payload to a chat message, or to nothing
pub trait Translator: Send + Sync {
    fn source(&self) -> &'static str;

    /// `Ok(None)` means the event is valid but has nothing worth posting.
    fn translate(
        &self,
        correlation_id: &CorrelationId,
        payload: &RawPayload,
        credentials: Option<&ToolchainCredentials>,
    ) -> Result<Option<OutboundMessage>, TranslateError>;
}

pub struct TranslatorRegistry {
    translators: HashMap<String, Arc<dyn Translator>>,
    fallback: Option<Arc<dyn Translator>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self {
            translators: HashMap::new(),
            fallback: None,
        }
    }

    /// Registry with a translator for every supported source and no fallback
    pub fn builtin() -> Self {
        Self::new()
            .register(PipelineTranslator)
            .register(ToolchainTranslator)
    }

    pub fn register<T: Translator + 'static>(mut self, translator: T) -> Self {
        self.translators
            .insert(translator.source().to_string(), Arc::new(translator));
        self
    }

    /// Translator used for sources without a dedicated one
    pub fn with_fallback<T: Translator + 'static>(mut self, translator: T) -> Self {
        self.fallback = Some(Arc::new(translator));
        self
    }

    pub fn lookup(&self, source: &str) -> Option<Arc<dyn Translator>> {
        self.translators
            .get(source)
            .cloned()
            .or_else(|| self.fallback.clone())
    }

    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.translators.keys().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }
}

impl Default for TranslatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<TranslatorRegistry>> =
    Lazy::new(|| Arc::new(TranslatorRegistry::builtin()));

/// Process-wide built-in registry
pub fn default_registry() -> Arc<TranslatorRegistry> {
    DEFAULT_REGISTRY.clone()
}

/// Registry for a relay; unknown sources get the fallback only when asked for
pub fn registry_for(forward_unknown_sources: bool) -> Arc<TranslatorRegistry> {
    if forward_unknown_sources {
        Arc::new(TranslatorRegistry::builtin().with_fallback(FallbackTranslator))
    } else {
        default_registry()
    }
}

/// Reads a string field at a JSON pointer, ignoring empty strings
pub(crate) fn str_at<'a>(payload: &'a RawPayload, pointer: &str) -> Option<&'a str> {
    payload
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}
