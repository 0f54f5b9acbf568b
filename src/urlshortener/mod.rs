pub mod models;

use crate::core::middleware::AuthMiddleware;
use crate::core::{build_client, parse_error_response, ClientOptions};
use crate::urlshortener::models::{InsertUrlRequest, ShortUrl};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;


pub const URLSHORTENER_SCOPE: &str = "https://www.googleapis.com/auth/urlshortener";

const URLSHORTENER_V1_API: &str = "https://www.googleapis.com/urlshortener/v1";

#[derive(Error, Debug)]
pub enum UrlShortenerError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct UrlShortener {
    client: ClientWithMiddleware,
    base_url: String,
}

impl UrlShortener {
    pub fn new(middleware: AuthMiddleware, options: ClientOptions) -> Self {
        Self {
            client: build_client(middleware, options),
            base_url: URLSHORTENER_V1_API.to_string(),
        }
    }

    #[allow(dead_code)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Expands a short URL (short -> long).
    pub async fn get(&self, short_url: &str) -> Result<ShortUrl, UrlShortenerError> {
        let url = format!("{}/url", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("shortUrl", short_url)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UrlShortenerError::ApiError(
                parse_error_response(response, "URL get failed").await,
            ));
        }

        let result: ShortUrl = response.json().await?;
        Ok(result)
    }

    /// Shortens a long URL (long -> short).
    pub async fn insert(&self, long_url: &str) -> Result<ShortUrl, UrlShortenerError> {
        let url = format!("{}/url", self.base_url);
        let request = InsertUrlRequest {
            kind: "urlshortener#url",
            long_url,
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UrlShortenerError::ApiError(
                parse_error_response(response, "URL insert failed").await,
            ));
        }

        let result: ShortUrl = response.json().await?;
        Ok(result)
    }
}
