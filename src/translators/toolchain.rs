use super::{str_at, TranslateError, Translator};
use crate::constants::{TOOLCHAIN_SOURCE, TOOLCHAIN_USERNAME};
use crate::types::{CorrelationId, OutboundMessage, RawPayload, ToolchainCredentials};
use tracing::debug;

/// Translates toolchain lifecycle events (service binds, toolchain create/delete)
pub struct ToolchainTranslator;

impl Translator for ToolchainTranslator {
    fn source(&self) -> &'static str {
        TOOLCHAIN_SOURCE
    }

    fn translate(
        &self,
        correlation_id: &CorrelationId,
        payload: &RawPayload,
        _credentials: Option<&ToolchainCredentials>,
    ) -> Result<Option<OutboundMessage>, TranslateError> {
        let event = str_at(payload, "/event").ok_or_else(|| TranslateError::MalformedPayload {
            source_id: TOOLCHAIN_SOURCE.to_string(),
            reason: "missing event kind".to_string(),
        })?;
        let toolchain = str_at(payload, "/toolchain/name")
            .or_else(|| str_at(payload, "/toolchain/id"))
            .unwrap_or("unknown");
        let service = str_at(payload, "/service/label")
            .or_else(|| str_at(payload, "/service/service_id"))
            .unwrap_or("unknown");

        let text = match event {
            "bind" => format!("Service *{}* was bound to toolchain *{}*", service, toolchain),
            "unbind" => format!("Service *{}* was unbound from toolchain *{}*", service, toolchain),
            "create" => format!("Toolchain *{}* was created", toolchain),
            "delete" => format!("Toolchain *{}* was deleted", toolchain),
            other => {
                debug!(correlation_id = %correlation_id, event = other, "No message for toolchain event");
                return Ok(None);
            }
        };

        Ok(Some(OutboundMessage::new(TOOLCHAIN_USERNAME, text)))
    }
}
