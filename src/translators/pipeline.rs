use super::{str_at, TranslateError, Translator};
use crate::constants::{PIPELINE_SOURCE, PIPELINE_USERNAME};
use crate::types::{Attachment, CorrelationId, OutboundMessage, RawPayload, ToolchainCredentials};
use tracing::debug;

/// Translates delivery pipeline stage and job events
pub struct PipelineTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Passed,
    Failed,
    Aborted,
}

impl Outcome {
    fn parse(status: &str) -> Option<Self> {
        match status.to_ascii_uppercase().as_str() {
            "SUCCESS" | "PASSED" | "SUCCEEDED" => Some(Outcome::Passed),
            "FAILURE" | "FAILED" | "ERROR" => Some(Outcome::Failed),
            "ABORTED" | "CANCELLED" | "CANCELED" => Some(Outcome::Aborted),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
            Outcome::Aborted => "ABORTED",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Outcome::Passed => "good",
            Outcome::Failed => "danger",
            Outcome::Aborted => "warning",
        }
    }
}

fn malformed(reason: impl Into<String>) -> TranslateError {
    TranslateError::MalformedPayload {
        source_id: PIPELINE_SOURCE.to_string(),
        reason: reason.into(),
    }
}

/// Execution numbers arrive either as JSON numbers or strings
fn execution_number(payload: &RawPayload) -> Option<String> {
    match payload.pointer("/execution/number")? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl PipelineTranslator {
    fn stage_heading(payload: &RawPayload) -> Result<String, TranslateError> {
        let stage = str_at(payload, "/stage/name").ok_or_else(|| malformed("missing stage.name"))?;
        Ok(match execution_number(payload) {
            Some(n) => format!("Stage *{}* #{}", stage, n),
            None => format!("Stage *{}*", stage),
        })
    }

    fn pipeline_name(payload: &RawPayload) -> &str {
        str_at(payload, "/pipeline/name")
            .or_else(|| str_at(payload, "/pipeline/id"))
            .unwrap_or("unknown")
    }
}

impl Translator for PipelineTranslator {
    fn source(&self) -> &'static str {
        PIPELINE_SOURCE
    }

    fn translate(
        &self,
        correlation_id: &CorrelationId,
        payload: &RawPayload,
        _credentials: Option<&ToolchainCredentials>,
    ) -> Result<Option<OutboundMessage>, TranslateError> {
        let event = str_at(payload, "/event").ok_or_else(|| malformed("missing event kind"))?;
        let pipeline = Self::pipeline_name(payload);
        let link = str_at(payload, "/url").map(str::to_string);

        let message = match event {
            "stageStarted" => {
                let heading = Self::stage_heading(payload)?;
                OutboundMessage::new(
                    PIPELINE_USERNAME,
                    format!("{} has STARTED in pipeline *{}*", heading, pipeline),
                )
            }
            "stageCompleted" => {
                let heading = Self::stage_heading(payload)?;
                let status = str_at(payload, "/execution/status")
                    .ok_or_else(|| malformed("missing execution.status"))?;
                match Outcome::parse(status) {
                    Some(outcome) => {
                        let text = format!("{} has {} in pipeline *{}*", heading, outcome.label(), pipeline);
                        OutboundMessage::new(PIPELINE_USERNAME, text.clone()).with_attachment(Attachment {
                            color: Some(outcome.color().to_string()),
                            title: Some(pipeline.to_string()),
                            title_link: link,
                            text,
                        })
                    }
                    None => OutboundMessage::new(
                        PIPELINE_USERNAME,
                        format!(
                            "{} has completed with status {} in pipeline *{}*",
                            heading,
                            status.to_ascii_uppercase(),
                            pipeline
                        ),
                    ),
                }
            }
            "jobCompleted" => {
                let status = str_at(payload, "/execution/status").and_then(Outcome::parse);
                if status != Some(Outcome::Failed) {
                    debug!(correlation_id = %correlation_id, "Skipping non-failing job completion");
                    return Ok(None);
                }
                let job = str_at(payload, "/job/name").ok_or_else(|| malformed("missing job.name"))?;
                let stage = str_at(payload, "/stage/name").unwrap_or("unknown");
                let text = format!("Job *{}* in stage *{}* has FAILED in pipeline *{}*", job, stage, pipeline);
                OutboundMessage::new(PIPELINE_USERNAME, text.clone()).with_attachment(Attachment {
                    color: Some(Outcome::Failed.color().to_string()),
                    title: Some(pipeline.to_string()),
                    title_link: link,
                    text,
                })
            }
            other => {
                debug!(correlation_id = %correlation_id, event = other, "No message for pipeline event");
                return Ok(None);
            }
        };

        Ok(Some(message))
    }
}
