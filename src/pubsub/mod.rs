//! Cloud Pub/Sub module.
//!
//! Publishing to topics, pulling from subscriptions and acknowledging pulled
//! messages through the Pub/Sub v1 REST API.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use gapi::GoogleApis;
//! # async fn run(apis: GoogleApis) {
//! let pubsub = apis.pubsub();
//! let ids = pubsub.publish_data("my-topic", b"hello").await;
//! # }
//! ```

pub mod models;

use crate::core::middleware::AuthMiddleware;
use crate::core::{build_client, parse_error_response, ClientOptions};
use crate::pubsub::models::{
    AcknowledgeRequest, PublishRequest, PublishResponse, PubsubMessage, PullRequest, PullResponse,
    ReceivedMessage,
};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;


pub const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";

const PUBSUB_V1_API: &str = "https://pubsub.googleapis.com/v1";

#[derive(Error, Debug)]
pub enum PubSubError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Failed to decode message data: {0}")]
    DecodeError(#[from] base64::DecodeError),
}

/// Client for Cloud Pub/Sub.
#[derive(Clone)]
pub struct PubSub {
    client: ClientWithMiddleware,
    base_url: String,
    project_id: Option<String>,
}

impl PubSub {
    pub fn new(middleware: AuthMiddleware, options: ClientOptions) -> Self {
        let project_id = middleware.project_id().map(str::to_string);
        let client = build_client(middleware, options);

        Self {
            client,
            base_url: PUBSUB_V1_API.to_string(),
            project_id,
        }
    }

    /// Creates a `PubSub` client with a custom client and base URL.
    /// Internal use only, primarily for testing.
    #[allow(dead_code)]
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        project_id: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            project_id,
        }
    }

    /// Overrides the project used to expand short resource names.
    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        if project_id.is_some() {
            self.project_id = project_id;
        }
        self
    }

    /// `projects/{project}/topics/{topic}`, unless `topic` is already a full name.
    pub fn topic_path(&self, topic: &str) -> String {
        self.resource_path("topics", topic)
    }

    /// `projects/{project}/subscriptions/{subscription}`, unless already a full name.
    pub fn subscription_path(&self, subscription: &str) -> String {
        self.resource_path("subscriptions", subscription)
    }

    fn resource_path(&self, collection: &str, name: &str) -> String {
        match &self.project_id {
            Some(project) if !name.starts_with("projects/") => {
                format!("projects/{}/{}/{}", project, collection, name)
            }
            _ => name.to_string(),
        }
    }

    /// Publishes `messages` and returns the server-assigned message ids.
    pub async fn publish(&self, topic: &str, messages: &[PubsubMessage]) -> Result<Vec<String>, PubSubError> {
        let url = format!("{}/{}:publish", self.base_url, self.topic_path(topic));
        let request = PublishRequest { messages };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PubSubError::ApiError(
                parse_error_response(response, "Publish failed").await,
            ));
        }

        let result: PublishResponse = response.json().await?;
        Ok(result.message_ids)
    }

    /// Publishes a single message carrying `data`.
    pub async fn publish_data(&self, topic: &str, data: &[u8]) -> Result<Vec<String>, PubSubError> {
        self.publish(topic, &[PubsubMessage::from_data(data)]).await
    }

    /// Pulls up to `max_messages` messages. With `return_immediately` false
    /// the server holds the request open until messages are available.
    pub async fn pull(
        &self,
        subscription: &str,
        max_messages: i32,
        return_immediately: bool,
    ) -> Result<Vec<ReceivedMessage>, PubSubError> {
        let url = format!("{}/{}:pull", self.base_url, self.subscription_path(subscription));
        let request = PullRequest {
            return_immediately,
            max_messages,
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PubSubError::ApiError(
                parse_error_response(response, "Pull failed").await,
            ));
        }

        let result: PullResponse = response.json().await?;
        Ok(result.received_messages)
    }

    pub async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<(), PubSubError> {
        let url = format!(
            "{}/{}:acknowledge",
            self.base_url,
            self.subscription_path(subscription)
        );
        let request = AcknowledgeRequest { ack_ids };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PubSubError::ApiError(
                parse_error_response(response, "Acknowledge failed").await,
            ));
        }

        Ok(())
    }
}
