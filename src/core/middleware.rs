use crate::core::credentials::{AuthType, Credentials, CredentialsError};
use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Adds `Authorization: Bearer <token>` to every request.
///
/// The authenticator is built on first use and shared between clones, so
/// all workers of a command reuse one token.
#[derive(Clone)]
pub struct AuthMiddleware {
    credentials: Arc<Credentials>,
    scopes: Arc<Vec<String>>,
    authenticator: Arc<OnceCell<Option<AuthType>>>,
}

impl AuthMiddleware {
    pub fn new(credentials: Credentials, scopes: &[&str]) -> Self {
        Self {
            credentials: Arc::new(credentials),
            scopes: Arc::new(scopes.iter().map(|s| s.to_string()).collect()),
            authenticator: Arc::new(OnceCell::new()),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.credentials.project_id()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    async fn get_token(&self) -> Result<String, CredentialsError> {
        let auth = self
            .authenticator
            .get_or_try_init(|| self.credentials.authenticator())
            .await?;

        match auth {
            Some(auth) => {
                let token = auth.token(self.scopes.as_slice()).await?;
                Ok(token.token().ok_or(CredentialsError::MissingToken)?.to_string())
            }
            None => match self.credentials.as_ref() {
                Credentials::AccessToken(token) => Ok(token.clone()),
                _ => Err(CredentialsError::MissingToken),
            },
        }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self.get_token().await.map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Failed to get auth token: {}", e))
        })?;

        let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid auth token: {}", e))
        })?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}
