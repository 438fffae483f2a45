use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

use slack_relay::app::ports::{
    InstanceStorePort, IntrospectionError, IntrospectionPort, MessagingError, MessagingPort,
    PostMessageResponse, StoreError,
};
use slack_relay::app::RelayService;
use slack_relay::server::create_server;
use slack_relay::translators::{registry_for, TranslateError, Translator, TranslatorRegistry};
use slack_relay::types::{CorrelationId, OutboundMessage, RawPayload, ServiceInstanceRecord, ToolchainCredentials};

struct MockStore {
    result: std::result::Result<ServiceInstanceRecord, StoreError>,
    lookups: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl InstanceStorePort for MockStore {
    async fn get(&self, instance_id: &str) -> std::result::Result<ServiceInstanceRecord, StoreError> {
        self.lookups.lock().await.push(instance_id.to_string());
        self.result.clone()
    }
}

struct MockIntrospection {
    result: std::result::Result<(), IntrospectionError>,
    calls: Arc<Mutex<Vec<(Value, String)>>>,
}

#[async_trait]
impl IntrospectionPort for MockIntrospection {
    async fn introspect(
        &self,
        toolchain_credentials: &ToolchainCredentials,
        credential: &str,
    ) -> std::result::Result<(), IntrospectionError> {
        self.calls
            .lock()
            .await
            .push((toolchain_credentials.clone(), credential.to_string()));
        self.result.clone()
    }
}

struct MockMessaging {
    result: std::result::Result<PostMessageResponse, MessagingError>,
    posted: Arc<Mutex<Vec<(String, OutboundMessage)>>>,
}

#[async_trait]
impl MessagingPort for MockMessaging {
    async fn post_message(
        &self,
        api_token: &str,
        message: &OutboundMessage,
    ) -> std::result::Result<PostMessageResponse, MessagingError> {
        self.posted
            .lock()
            .await
            .push((api_token.to_string(), message.clone()));
        self.result.clone()
    }
}

/// Tries to pick its own channel; the forwarder must ignore it
struct ChannelPickingTranslator;

impl Translator for ChannelPickingTranslator {
    fn source(&self) -> &'static str {
        "sneaky"
    }

    fn translate(
        &self,
        _correlation_id: &CorrelationId,
        _payload: &RawPayload,
        _credentials: Option<&ToolchainCredentials>,
    ) -> std::result::Result<Option<OutboundMessage>, TranslateError> {
        let mut message = OutboundMessage::new("Sneaky", "hi");
        message.channel = "C-elsewhere".to_string();
        Ok(Some(message))
    }
}

struct Harness {
    store: std::result::Result<ServiceInstanceRecord, StoreError>,
    introspection: std::result::Result<(), IntrospectionError>,
    messaging: std::result::Result<PostMessageResponse, MessagingError>,
    registry: Arc<TranslatorRegistry>,
    lookups: Arc<Mutex<Vec<String>>>,
    introspections: Arc<Mutex<Vec<(Value, String)>>>,
    posted: Arc<Mutex<Vec<(String, OutboundMessage)>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Ok(instance_record()),
            introspection: Ok(()),
            messaging: Ok(PostMessageResponse { ok: true, error: None }),
            registry: Arc::new(TranslatorRegistry::builtin().register(ChannelPickingTranslator)),
            lookups: Arc::new(Mutex::new(Vec::new())),
            introspections: Arc::new(Mutex::new(Vec::new())),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn router(&self) -> Router {
        let relay = RelayService::new(
            Arc::new(MockStore {
                result: self.store.clone(),
                lookups: self.lookups.clone(),
            }),
            Arc::new(MockIntrospection {
                result: self.introspection.clone(),
                calls: self.introspections.clone(),
            }),
            Arc::new(MockMessaging {
                result: self.messaging.clone(),
                posted: self.posted.clone(),
            }),
            self.registry.clone(),
        );
        create_server(Arc::new(relay))
    }
}

fn instance_record() -> ServiceInstanceRecord {
    serde_json::from_value(json!({
        "instance_id": "inst1",
        "parameters": { "api_token": "xoxb-token", "label": "#deploys" },
        "toolchain_ids": [{ "id": "tc1", "credentials": "X" }]
    }))
    .unwrap()
}

fn pipeline_body(source: &str) -> Value {
    json!({
        "service_id": source,
        "instance_id": "inst1",
        "toolchain_id": "tc1",
        "payload": {
            "event": "stageCompleted",
            "pipeline": { "id": "p1", "name": "Deploy" },
            "stage": { "name": "X" },
            "execution": { "number": 3, "status": "SUCCESS" }
        }
    })
}

fn accept_request(body: &Value, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/accept")
        .header("content-type", "application/json")
        .header("vcap_request_id", "req-1");
    if let Some(auth) = authorization {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

#[tokio::test]
async fn test_pipeline_event_is_forwarded_to_instance_channel() -> Result<()> {
    let harness = Harness::new();
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let introspections = harness.introspections.lock().await;
    assert_eq!(introspections.as_slice(), &[(json!("X"), "Y".to_string())]);

    let posted = harness.posted.lock().await;
    assert_eq!(posted.len(), 1);
    let (token, message) = &posted[0];
    assert_eq!(token, "xoxb-token");
    assert_eq!(message.channel, "inst1");
    assert_eq!(message.username, "Pipeline");
    assert_eq!(message.text, "Stage *X* #3 has PASSED in pipeline *Deploy*");
    Ok(())
}

#[tokio::test]
async fn test_unknown_instance_is_bad_request() -> Result<()> {
    let mut harness = Harness::new();
    harness.store = Err(StoreError::NotFound);
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["description"]
        .as_str()
        .unwrap()
        .contains("no service instance found for id inst1"));
    assert!(harness.introspections.lock().await.is_empty());
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_store_failure_is_internal_error() -> Result<()> {
    let mut harness = Harness::new();
    harness.store = Err(StoreError::Backend("connection refused".to_string()));
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["description"], "connection refused");
    Ok(())
}

#[tokio::test]
async fn test_missing_identifying_fields_skip_lookup() -> Result<()> {
    for missing in ["service_id", "instance_id", "toolchain_id"] {
        let harness = Harness::new();
        let mut body = pipeline_body("pipeline");
        body.as_object_mut().unwrap().remove(missing);

        let (status, response) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {}", missing);
        assert!(response["description"]
            .as_str()
            .unwrap()
            .contains("missing required identifying fields"));
        assert!(harness.lookups.lock().await.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_identifying_field_is_bad_request() -> Result<()> {
    let harness = Harness::new();
    let mut body = pipeline_body("pipeline");
    body["toolchain_id"] = json!("");
    let (status, _) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(harness.lookups.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_non_json_body_is_bad_request() -> Result<()> {
    let harness = Harness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/accept")
        .header("authorization", "Basic Y")
        .body(Body::from("not json"))?;
    let (status, _) = send(harness.router(), request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_missing_authorization_is_unauthorized() -> Result<()> {
    let harness = Harness::new();
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), None)).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], "invalid or missing authorization header");
    assert!(harness.introspections.lock().await.is_empty());
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_non_basic_schemes_are_unauthorized() -> Result<()> {
    for header in ["Bearer Y", "Digest Y", "Basic", "Y"] {
        let harness = Harness::new();
        let (status, _) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some(header))).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", header);
        assert!(harness.introspections.lock().await.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_basic_scheme_is_case_insensitive() -> Result<()> {
    let harness = Harness::new();
    let (status, _) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("bAsIc Y"))).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_unbound_toolchain_is_unauthorized() -> Result<()> {
    let harness = Harness::new();
    let mut body = pipeline_body("pipeline");
    body["toolchain_id"] = json!("tc-other");
    let (status, response) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["description"], "no toolchain credentials found");
    assert!(harness.introspections.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_introspection_status_passes_through() -> Result<()> {
    let mut harness = Harness::new();
    harness.introspection = Err(IntrospectionError {
        status: 403,
        description: "credential revoked".to_string(),
    });
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["description"], "credential revoked");
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_source_is_silently_accepted() -> Result<()> {
    let harness = Harness::new();
    let (status, _) = send(harness.router(), accept_request(&pipeline_body("unknown-tool"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_event_without_message_is_accepted() -> Result<()> {
    let harness = Harness::new();
    let mut body = pipeline_body("pipeline");
    body["payload"]["event"] = json!("pipelineRenamed");
    let (status, _) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_translator_failure_is_internal_error() -> Result<()> {
    let harness = Harness::new();
    let mut body = pipeline_body("pipeline");
    body["payload"] = json!({ "stage": { "name": "X" } });
    let (status, response) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response["description"].as_str().unwrap().contains("missing event kind"));
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_translator_cannot_choose_channel() -> Result<()> {
    let harness = Harness::new();
    let (status, _) = send(harness.router(), accept_request(&pipeline_body("sneaky"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::NO_CONTENT);
    let posted = harness.posted.lock().await;
    assert_eq!(posted[0].1.channel, "inst1");
    Ok(())
}

#[tokio::test]
async fn test_messaging_api_error_is_bad_request() -> Result<()> {
    let mut harness = Harness::new();
    harness.messaging = Ok(PostMessageResponse {
        ok: false,
        error: Some("channel_not_found".to_string()),
    });
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["description"], "Error - channel_not_found");
    Ok(())
}

#[tokio::test]
async fn test_messaging_transport_error_is_internal_error() -> Result<()> {
    let mut harness = Harness::new();
    harness.messaging = Err(MessagingError::Transport("connection reset".to_string()));
    let (status, body) = send(harness.router(), accept_request(&pipeline_body("pipeline"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["description"], "connection reset");
    Ok(())
}

#[tokio::test]
async fn test_replay_yields_same_status() -> Result<()> {
    let harness = Harness::new();
    let router = harness.router();
    let body = pipeline_body("pipeline");

    let (first, _) = send(router.clone(), accept_request(&body, Some("Basic Y"))).await?;
    let (second, _) = send(router, accept_request(&body, Some("Basic Y"))).await?;
    assert_eq!(first, second);
    assert_eq!(harness.posted.lock().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let harness = Harness::new();
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let (status, body) = send(harness.router(), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_forwarding_registry_posts_unknown_source_payload() -> Result<()> {
    let mut harness = Harness::new();
    harness.registry = registry_for(true);
    let body = json!({
        "service_id": "unknown-tool",
        "instance_id": "inst1",
        "toolchain_id": "tc1",
        "payload": { "build": 42 }
    });
    let (status, _) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::NO_CONTENT);
    let posted = harness.posted.lock().await;
    assert_eq!(posted.len(), 1);
    let (token, message) = &posted[0];
    assert_eq!(token, "xoxb-token");
    assert_eq!(message.channel, "inst1");
    assert_eq!(message.username, "Unknown Event");
    assert_eq!(message.text, r#"{"build":42}"#);
    Ok(())
}

#[tokio::test]
async fn test_default_registry_ignores_unknown_source() -> Result<()> {
    let mut harness = Harness::new();
    harness.registry = registry_for(false);
    let (status, _) = send(harness.router(), accept_request(&pipeline_body("unknown-tool"), Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(harness.posted.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_whitespace_instance_id_reaches_store_lookup() -> Result<()> {
    let mut harness = Harness::new();
    harness.store = Err(StoreError::NotFound);
    let mut body = pipeline_body("pipeline");
    body["instance_id"] = json!(" ");
    let (status, response) = send(harness.router(), accept_request(&body, Some("Basic Y"))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.lookups.lock().await.as_slice(), &[" ".to_string()]);
    assert!(response["description"]
        .as_str()
        .unwrap()
        .contains("no service instance found for id"));
    Ok(())
}
