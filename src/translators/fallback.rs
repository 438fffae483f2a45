use super::{TranslateError, Translator};
use crate::constants::FALLBACK_USERNAME;
use crate::types::{CorrelationId, OutboundMessage, RawPayload, ToolchainCredentials};

/// Posts the raw payload as JSON text. Only reachable for sources without a
/// dedicated translator, and only when the registry is built with a fallback.
pub struct FallbackTranslator;

impl Translator for FallbackTranslator {
    fn source(&self) -> &'static str {
        "fallback"
    }

    fn translate(
        &self,
        _correlation_id: &CorrelationId,
        payload: &RawPayload,
        _credentials: Option<&ToolchainCredentials>,
    ) -> Result<Option<OutboundMessage>, TranslateError> {
        let text = serde_json::to_string(payload).map_err(|e| TranslateError::Other(e.to_string()))?;
        Ok(Some(OutboundMessage::new(FALLBACK_USERNAME, text)))
    }
}
