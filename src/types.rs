use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw event payload as delivered by the upstream platform
pub type RawPayload = serde_json::Value;

/// Opaque toolchain credential blob stored alongside a service instance
pub type ToolchainCredentials = serde_json::Value;

/// Body of a `POST /accept` request. Every field is optional on the wire;
/// presence is checked by the instance resolver, not by deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptRequest {
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub toolchain_id: Option<String>,
    #[serde(default)]
    pub payload: RawPayload,
}

/// An event as seen by the relay pipeline, built once per request
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    pub source: String,
    pub service_instance_id: String,
    pub toolchain_id: String,
    pub payload: RawPayload,
}

impl IncomingEvent {
    pub fn from_request(request: AcceptRequest) -> Self {
        Self {
            source: request.service_id.unwrap_or_default(),
            service_instance_id: request.instance_id.unwrap_or_default(),
            toolchain_id: request.toolchain_id.unwrap_or_default(),
            payload: request.payload,
        }
    }

    /// True when source, instance id and toolchain id are all non-empty
    pub fn has_identifying_fields(&self) -> bool {
        !self.source.is_empty() && !self.service_instance_id.is_empty() && !self.toolchain_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceParameters {
    pub api_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A toolchain bound to a service instance, with the credentials it registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainBinding {
    pub id: String,
    #[serde(default)]
    pub credentials: ToolchainCredentials,
}

/// Service instance document as held by the instance store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredInstanceDocument")]
pub struct ServiceInstanceRecord {
    pub instance_id: String,
    pub parameters: InstanceParameters,
    #[serde(default)]
    pub toolchain_ids: Vec<ToolchainBinding>,
}

/// Wire shape of a stored document. Document stores add `_id` (and `_rev`)
/// next to `instance_id`; `_id` only stands in when `instance_id` is absent.
#[derive(Deserialize)]
struct StoredInstanceDocument {
    #[serde(default)]
    instance_id: Option<String>,
    #[serde(default, rename = "_id")]
    doc_id: Option<String>,
    parameters: InstanceParameters,
    #[serde(default)]
    toolchain_ids: Vec<ToolchainBinding>,
}

impl TryFrom<StoredInstanceDocument> for ServiceInstanceRecord {
    type Error = String;

    fn try_from(doc: StoredInstanceDocument) -> Result<Self, Self::Error> {
        let instance_id = doc
            .instance_id
            .filter(|id| !id.is_empty())
            .or(doc.doc_id)
            .ok_or_else(|| "missing field `instance_id`".to_string())?;
        Ok(Self {
            instance_id,
            parameters: doc.parameters,
            toolchain_ids: doc.toolchain_ids,
        })
    }
}

impl ServiceInstanceRecord {
    /// First binding whose id matches `toolchain_id`
    pub fn credentials_for(&self, toolchain_id: &str) -> Option<&ToolchainCredentials> {
        self.toolchain_ids
            .iter()
            .find(|binding| binding.id == toolchain_id)
            .map(|binding| &binding.credentials)
    }

    /// Human-facing channel name for logs: the label if set, else the channel id
    pub fn channel_name(&self) -> &str {
        self.parameters
            .label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.instance_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    pub text: String,
}

/// Chat message handed to the messaging client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub username: String,
    pub text: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
            channel: String::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Advisory per-request token used only to correlate log lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationId {
    Header(String),
    Timestamp(i64),
}

impl CorrelationId {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => CorrelationId::Header(v.to_string()),
            None => CorrelationId::Timestamp(chrono::Utc::now().timestamp_millis()),
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationId::Header(v) => write!(f, "{}", v),
            CorrelationId::Timestamp(ms) => write!(f, "{}", ms),
        }
    }
}
