use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};

use crate::app::ports::{InstanceStorePort, IntrospectionPort, MessagingError, MessagingPort, StoreError};
use crate::constants::BASIC_SCHEME;
use crate::translators::TranslatorRegistry;
use crate::types::{
    AcceptRequest, CorrelationId, IncomingEvent, OutboundMessage, ServiceInstanceRecord, ToolchainCredentials,
};

/// Terminal failure of a relay request. Each variant maps to one HTTP status.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),

    /// `status` is 401 unless the introspection service supplied its own
    #[error("{description}")]
    Unauthorized { status: u16, description: String },

    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    fn unauthorized(description: impl Into<String>) -> Self {
        RelayError::Unauthorized {
            status: 401,
            description: description.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RelayError::BadRequest(_) => 400,
            RelayError::Unauthorized { status, .. } => *status,
            RelayError::Internal(_) => 500,
        }
    }

    /// Metric label; follows the status the caller actually receives
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "bad_request",
            RelayError::Unauthorized { status, .. } if *status >= 500 => "internal",
            RelayError::Unauthorized { .. } => "unauthorized",
            RelayError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    UnknownSource,
    NoMessage,
}

impl NoOpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOpReason::UnknownSource => "unknown_source",
            NoOpReason::NoMessage => "no_message",
        }
    }
}

/// Successful end of a relay request; both variants answer 204
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded,
    NoOp(NoOpReason),
}

/// Event whose service instance has been looked up
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    pub event: IncomingEvent,
    pub instance: ServiceInstanceRecord,
}

/// Event whose caller has passed introspection
#[derive(Debug, Clone)]
pub struct AuthorizedEvent {
    pub event: IncomingEvent,
    pub instance: ServiceInstanceRecord,
    pub credentials: ToolchainCredentials,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Message(OutboundMessage),
    NoOp(NoOpReason),
}

/// Extracts the credential value from a `Basic` authorization header.
///
/// The header is a scheme token, whitespace, then the credential. The scheme
/// is matched case-insensitively.
pub fn parse_basic_authorization(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
        return None;
    }
    parts.next()
}

/// The accept pipeline: resolve instance, check credentials, translate, forward.
pub struct RelayService {
    store: Arc<dyn InstanceStorePort>,
    introspection: Arc<dyn IntrospectionPort>,
    messaging: Arc<dyn MessagingPort>,
    translators: Arc<TranslatorRegistry>,
}

impl RelayService {
    pub fn new(
        store: Arc<dyn InstanceStorePort>,
        introspection: Arc<dyn IntrospectionPort>,
        messaging: Arc<dyn MessagingPort>,
        translators: Arc<TranslatorRegistry>,
    ) -> Self {
        Self {
            store,
            introspection,
            messaging,
            translators,
        }
    }

    /// Runs one request through every stage, stopping at the first terminal result
    pub async fn relay(
        &self,
        request: AcceptRequest,
        authorization: Option<&str>,
        correlation_id: CorrelationId,
    ) -> Result<RelayOutcome, RelayError> {
        let event = Self::parse_event(request);
        let span = tracing::info_span!(
            "relay_event",
            correlation_id = %correlation_id,
            source = %event.source,
            instance_id = %event.service_instance_id,
            toolchain_id = %event.toolchain_id,
        );

        async move {
            crate::metrics::relay::event_received(&event.source);
            let source = event.source.clone();

            let result = self.run_stages(event, authorization, &correlation_id).await;
            match &result {
                Ok(RelayOutcome::Forwarded) => crate::metrics::relay::event_forwarded(&source),
                Ok(RelayOutcome::NoOp(reason)) => crate::metrics::relay::event_noop(reason.as_str()),
                Err(e) => {
                    crate::metrics::relay::event_failed(e.kind());
                    debug!(status = e.status(), "Relay request failed: {}", e);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        event: IncomingEvent,
        authorization: Option<&str>,
        correlation_id: &CorrelationId,
    ) -> Result<RelayOutcome, RelayError> {
        let resolved = self.resolve_instance(event).await?;
        let authorized = self.check_credentials(resolved, authorization).await?;
        match self.translate(&authorized, correlation_id)? {
            Translation::Message(message) => self.forward(&authorized, message).await,
            Translation::NoOp(reason) => Ok(RelayOutcome::NoOp(reason)),
        }
    }

    pub fn parse_event(request: AcceptRequest) -> IncomingEvent {
        let event = IncomingEvent::from_request(request);
        debug!("Incoming event payload: {}", event.payload);
        event
    }

    pub async fn resolve_instance(&self, event: IncomingEvent) -> Result<ResolvedEvent, RelayError> {
        if !event.has_identifying_fields() {
            return Err(RelayError::BadRequest(
                "missing required identifying fields: no service_id, instance_id or toolchain_id for the incoming event"
                    .to_string(),
            ));
        }

        debug!("Looking up service instance record");
        match self.store.get(&event.service_instance_id).await {
            Ok(instance) => Ok(ResolvedEvent { event, instance }),
            Err(StoreError::NotFound) => {
                info!("Service instance {} not found", event.service_instance_id);
                Err(RelayError::BadRequest(format!(
                    "no service instance found for id {}",
                    event.service_instance_id
                )))
            }
            Err(StoreError::Backend(e)) => {
                error!(
                    "Retrieving service instance {} failed: {}",
                    event.service_instance_id, e
                );
                Err(RelayError::Internal(e))
            }
        }
    }

    pub async fn check_credentials(
        &self,
        resolved: ResolvedEvent,
        authorization: Option<&str>,
    ) -> Result<AuthorizedEvent, RelayError> {
        let ResolvedEvent { event, instance } = resolved;
        let credentials = instance.credentials_for(&event.toolchain_id).cloned();
        if credentials.is_some() {
            debug!("Toolchain credentials found");
        }

        let credential = parse_basic_authorization(authorization)
            .ok_or_else(|| RelayError::unauthorized("invalid or missing authorization header"))?;

        let credentials =
            credentials.ok_or_else(|| RelayError::unauthorized("no toolchain credentials found"))?;

        self.introspection
            .introspect(&credentials, credential)
            .await
            .map_err(|e| {
                debug!("Credential introspection rejected caller: {}", e);
                RelayError::Unauthorized {
                    status: e.status,
                    description: e.description,
                }
            })?;
        debug!("Credentials introspected");

        Ok(AuthorizedEvent {
            event,
            instance,
            credentials,
        })
    }

    pub fn translate(
        &self,
        authorized: &AuthorizedEvent,
        correlation_id: &CorrelationId,
    ) -> Result<Translation, RelayError> {
        let event = &authorized.event;
        let Some(translator) = self.translators.lookup(&event.source) else {
            warn!(
                "No event to message translator found for {}. Content: {}",
                event.source, event.payload
            );
            return Ok(Translation::NoOp(NoOpReason::UnknownSource));
        };

        info!("Event about to be processed");
        match translator.translate(correlation_id, &event.payload, Some(&authorized.credentials)) {
            Ok(Some(message)) => Ok(Translation::Message(message)),
            Ok(None) => {
                info!("Event produced no message");
                Ok(Translation::NoOp(NoOpReason::NoMessage))
            }
            Err(e) => Err(RelayError::Internal(e.to_string())),
        }
    }

    pub async fn forward(
        &self,
        authorized: &AuthorizedEvent,
        mut message: OutboundMessage,
    ) -> Result<RelayOutcome, RelayError> {
        let instance = &authorized.instance;
        message.channel = instance.instance_id.clone();
        let channel_name = instance.channel_name();

        debug!("Posting message to channel '{}'", channel_name);
        let started = Instant::now();
        let result = self
            .messaging
            .post_message(&instance.parameters.api_token, &message)
            .await;
        crate::metrics::relay::forward_duration(started.elapsed().as_secs_f64());

        match result {
            Err(MessagingError::Transport(e)) => {
                error!("Posting message to channel '{}' failed: {}", channel_name, e);
                Err(RelayError::Internal(e))
            }
            Ok(response) => match response.error {
                Some(api_error) => {
                    warn!("Messaging API rejected message for '{}': {}", channel_name, api_error);
                    Err(RelayError::BadRequest(format!("Error - {}", api_error)))
                }
                None => {
                    debug!("Message sent to channel '{}'", channel_name);
                    Ok(RelayOutcome::Forwarded)
                }
            },
        }
    }
}
