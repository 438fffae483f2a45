use crate::app::ports::{MessagingError, MessagingPort, PostMessageResponse};
use crate::error::Result;
use crate::types::OutboundMessage;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Posts messages through Slack's `chat.postMessage` Web API method
pub struct SlackClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SlackClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat.postMessage", api_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl MessagingPort for SlackClient {
    async fn post_message(
        &self,
        api_token: &str,
        message: &OutboundMessage,
    ) -> std::result::Result<PostMessageResponse, MessagingError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_token)
            .json(message)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        let mut body = resp
            .json::<PostMessageResponse>()
            .await
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        if !body.ok && body.error.is_none() {
            body.error = Some("unknown_error".to_string());
        }
        Ok(body)
    }
}
