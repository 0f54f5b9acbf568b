//! Firebase Dynamic Links module.
//!
//! Currently supports fetching click and install statistics for a link.

pub mod models;

use crate::core::middleware::AuthMiddleware;
use crate::core::{build_client, parse_error_response, ClientOptions};
use crate::dynamic_links::models::DynamicLinkStats;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use url::Url;


pub const FIREBASE_SCOPE: &str = "https://www.googleapis.com/auth/firebase";

// Explicit host so the IPv4 endpoint is used.
const DYNAMIC_LINKS_V1_API: &str = "https://firebasedynamiclinks.googleapis.com/v1";

#[derive(Error, Debug)]
pub enum DynamicLinksError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client for the Firebase Dynamic Links API.
#[derive(Clone)]
pub struct DynamicLinks {
    client: ClientWithMiddleware,
    base_url: String,
}

impl DynamicLinks {
    pub fn new(middleware: AuthMiddleware, options: ClientOptions) -> Self {
        Self {
            client: build_client(middleware, options),
            base_url: DYNAMIC_LINKS_V1_API.to_string(),
        }
    }

    /// Creates a `DynamicLinks` client with a custom client and base URL.
    /// Internal use only, primarily for testing.
    #[allow(dead_code)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Fetches statistics for `link` (e.g. `https://xxx.app.goo.gl/abc`) over
    /// the last `duration_days` days.
    pub async fn get_link_stats(&self, link: &str, duration_days: i64) -> Result<DynamicLinkStats, DynamicLinksError> {
        let url = self.link_stats_url(link, duration_days)?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DynamicLinksError::ApiError(
                parse_error_response(response, &format!("GetLinkStats failed for {}", link)).await,
            ));
        }

        let stats: DynamicLinkStats = response.json().await?;
        Ok(stats)
    }

    /// `{base}/{link}/linkStats?durationDays=N`, with the link escaped as a
    /// single path segment.
    fn link_stats_url(&self, link: &str, duration_days: i64) -> Result<Url, DynamicLinksError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| DynamicLinksError::ApiError(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(link)
            .push("linkStats");
        url.query_pairs_mut()
            .append_pair("durationDays", &duration_days.to_string());
        Ok(url)
    }
}
