use crate::types::{OutboundMessage, ServiceInstanceRecord, ToolchainCredentials};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("service instance not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
}

/// Resolves a service instance id to its configuration document
#[async_trait]
pub trait InstanceStorePort: Send + Sync {
    async fn get(&self, instance_id: &str) -> Result<ServiceInstanceRecord, StoreError>;
}

/// Rejection from the introspection service; both fields go back to the caller as-is
#[derive(Debug, Clone, PartialEq, Error)]
#[error("introspection failed with status {status}: {description}")]
pub struct IntrospectionError {
    pub status: u16,
    pub description: String,
}

/// Validates a caller-presented credential against stored toolchain credentials
#[async_trait]
pub trait IntrospectionPort: Send + Sync {
    async fn introspect(
        &self,
        toolchain_credentials: &ToolchainCredentials,
        credential: &str,
    ) -> Result<(), IntrospectionError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessagingError {
    #[error("{0}")]
    Transport(String),
}

/// Body returned by the messaging API on a completed round trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMessageResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn post_message(
        &self,
        api_token: &str,
        message: &OutboundMessage,
    ) -> Result<PostMessageResponse, MessagingError>;
}
