use crate::app::ports::{IntrospectionError, IntrospectionPort};
use crate::error::Result;
use crate::types::ToolchainCredentials;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const INTROSPECT_PATH: &str = "/identity/v1/introspect";

#[derive(Serialize)]
struct IntrospectRequest<'a> {
    toolchain_credentials: &'a ToolchainCredentials,
    credential: &'a str,
}

#[derive(Deserialize)]
struct IntrospectFailure {
    description: Option<String>,
    message: Option<String>,
}

/// Introspects caller credentials against the toolchain identity service
pub struct HttpCredentialIntrospector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialIntrospector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), INTROSPECT_PATH),
        })
    }
}

/// Uses the body's `description` (or `message`) field when it is JSON, else the raw body
fn failure_description(body: &str) -> String {
    serde_json::from_str::<IntrospectFailure>(body)
        .ok()
        .and_then(|f| f.description.or(f.message))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl IntrospectionPort for HttpCredentialIntrospector {
    async fn introspect(
        &self,
        toolchain_credentials: &ToolchainCredentials,
        credential: &str,
    ) -> std::result::Result<(), IntrospectionError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&IntrospectRequest {
                toolchain_credentials,
                credential,
            })
            .send()
            .await
            .map_err(|e| IntrospectionError {
                status: 500,
                description: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        debug!("Introspection returned {}: {}", status, body);
        Err(IntrospectionError {
            status: status.as_u16(),
            description: failure_description(&body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::test_support::spawn_stub;
    use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn introspect(Json(body): Json<Value>) -> axum::response::Response {
        assert_eq!(body["toolchain_credentials"], json!("X"));
        match body["credential"].as_str() {
            Some("good") => StatusCode::OK.into_response(),
            Some("expired") => (
                StatusCode::FORBIDDEN,
                Json(json!({ "description": "credential expired" })),
            )
                .into_response(),
            _ => (StatusCode::UNAUTHORIZED, "bad credential").into_response(),
        }
    }

    async fn client() -> HttpCredentialIntrospector {
        let base = spawn_stub(Router::new().route(INTROSPECT_PATH, post(introspect))).await;
        HttpCredentialIntrospector::new(&base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_accepted_credential() {
        assert!(client().await.introspect(&json!("X"), "good").await.is_ok());
    }

    #[tokio::test]
    async fn test_status_and_description_pass_through() {
        let err = client().await.introspect(&json!("X"), "expired").await.unwrap_err();
        assert_eq!(err.status, 403);
        assert_eq!(err.description, "credential expired");
    }

    #[tokio::test]
    async fn test_plain_text_failure_body() {
        let err = client().await.introspect(&json!("X"), "other").await.unwrap_err();
        assert_eq!(err.status, 401);
        assert_eq!(err.description, "bad credential");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_500() {
        let client = HttpCredentialIntrospector::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client.introspect(&json!("X"), "good").await.unwrap_err();
        assert_eq!(err.status, 500);
    }
}
