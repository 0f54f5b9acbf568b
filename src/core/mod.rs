pub mod credentials;
pub mod debug;
pub mod middleware;

use crate::core::debug::DebugMiddleware;
use crate::core::middleware::AuthMiddleware;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;


/// Error body returned by Google REST APIs.
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
    pub errors: Option<Vec<GoogleSubError>>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleSubError {
    pub message: String,
    pub domain: Option<String>,
    pub reason: Option<String>,
}

impl GoogleErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!("{} (code: {}, status: {})", self.error.message, self.error.code, status),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<GoogleErrorResponse>().await {
        Ok(error_resp) => format!("{}: {}", default_msg, error_resp.display_message()),
        Err(_) => format!("{}: {}", default_msg, status),
    }
}

/// Transport settings shared by every service client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientOptions {
    /// Log every request and response.
    pub debug: bool,
    /// Transient-failure retries per request. Zero disables retrying.
    pub max_retries: u32,
}

/// Builds the authenticated HTTP client used by the service clients.
///
/// Middleware runs in order: retry, authentication, then (with
/// `options.debug`) traffic logging, so every attempt is logged with the
/// headers that were actually sent.
pub fn build_client(middleware: AuthMiddleware, options: ClientOptions) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);

    let builder = ClientBuilder::new(Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(middleware);

    if options.debug {
        builder.with(DebugMiddleware).build()
    } else {
        builder.build()
    }
}
