pub mod cli;
pub mod commands;
pub mod core;
pub mod dynamic_links;
pub mod pool;
pub mod pubsub;
pub mod urlshortener;

use crate::core::middleware::AuthMiddleware;
use crate::core::ClientOptions;
use dynamic_links::DynamicLinks;
use pubsub::PubSub;
use urlshortener::UrlShortener;

/// Entry point to the service clients. All clients share one authenticator.
pub struct GoogleApis {
    middleware: AuthMiddleware,
    options: ClientOptions,
    project_id: Option<String>,
}

impl GoogleApis {
    pub fn new(middleware: AuthMiddleware, options: ClientOptions) -> Self {
        Self {
            middleware,
            options,
            project_id: None,
        }
    }

    /// Project used when a short resource name needs expanding. Defaults to
    /// the project of the credentials.
    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn pubsub(&self) -> PubSub {
        PubSub::new(self.middleware.clone(), self.options).with_project_id(self.project_id.clone())
    }

    pub fn dynamic_links(&self) -> DynamicLinks {
        DynamicLinks::new(self.middleware.clone(), self.options)
    }

    pub fn url_shortener(&self) -> UrlShortener {
        UrlShortener::new(self.middleware.clone(), self.options)
    }
}
