//! Credential sources for the authenticated client.
//!
//! Three sources are supported:
//!
//! - a service-account JSON key,
//! - an OAuth 2.0 installed-app client (client id and secret), which runs the
//!   browser consent flow once and caches the resulting token on disk,
//! - a pre-issued access token, used as-is.

use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{
    ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
    ServiceAccountAuthenticator, ServiceAccountKey,
};

pub(crate) type AuthType =
    Authenticator<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Browsers tried, in order, to open the consent page.
const BROWSERS: [&str; 3] = ["xdg-open", "google-chrome", "open"];

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load service account key {path}: {source}")]
    ServiceAccountKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build authenticator: {0}")]
    Authenticator(#[from] std::io::Error),
    #[error("OAuth error: {0}")]
    OAuth(#[from] yup_oauth2::Error),
    #[error("no access token in OAuth response")]
    MissingToken,
}

/// Where bearer tokens come from.
#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    InstalledApp {
        secret: ApplicationSecret,
        /// Token cache file; `None` disables caching.
        token_cache: Option<PathBuf>,
    },
    AccessToken(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .field("project_id", &key.project_id)
                .finish(),
            Credentials::InstalledApp { secret, token_cache } => f
                .debug_struct("InstalledApp")
                .field("client_id", &secret.client_id)
                .field("token_cache", token_cache)
                .finish(),
            Credentials::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

impl Credentials {
    /// Loads a service-account key from a JSON file.
    pub async fn from_service_account_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let key = yup_oauth2::read_service_account_key(path)
            .await
            .map_err(|source| CredentialsError::ServiceAccountKey {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Credentials::ServiceAccount(key))
    }

    /// Installed-app credentials for Google's OAuth endpoints.
    ///
    /// With `cache_token`, tokens are persisted to a file keyed by the client
    /// and the requested scopes (see [`token_cache_file`]).
    pub fn installed_app(client_id: String, client_secret: String, scopes: &[&str], cache_token: bool) -> Self {
        let token_cache = cache_token.then(|| token_cache_file(&client_id, &client_secret, scopes));
        let secret = ApplicationSecret {
            client_id,
            client_secret,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            ..Default::default()
        };
        Credentials::InstalledApp { secret, token_cache }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Credentials::ServiceAccount(key) => key.project_id.as_deref(),
            Credentials::InstalledApp { secret, .. } => secret.project_id.as_deref(),
            Credentials::AccessToken(_) => None,
        }
    }

    /// Builds the token-issuing authenticator. `None` for a static access token.
    pub(crate) async fn authenticator(&self) -> Result<Option<AuthType>, CredentialsError> {
        match self {
            Credentials::ServiceAccount(key) => {
                let auth = ServiceAccountAuthenticator::builder(key.clone()).build().await?;
                Ok(Some(auth))
            }
            Credentials::InstalledApp { secret, token_cache } => {
                let mut builder = InstalledFlowAuthenticator::builder(
                    secret.clone(),
                    InstalledFlowReturnMethod::HTTPRedirect,
                )
                .flow_delegate(Box::new(BrowserFlowDelegate));

                match token_cache {
                    Some(path) => {
                        tracing::debug!(path = %path.display(), "using token cache");
                        builder = builder.persist_tokens_to_disk(path.clone());
                    }
                    None => tracing::debug!("token cache disabled"),
                }

                Ok(Some(builder.build().await?))
            }
            Credentials::AccessToken(_) => Ok(None),
        }
    }
}

/// Returns `value` unless it is empty, otherwise the trimmed contents of `path`.
pub fn value_or_file_contents(value: Option<&str>, path: &Path) -> Result<String, CredentialsError> {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }

    std::fs::read_to_string(path)
        .map(|contents| contents.trim().to_string())
        .map_err(|source| CredentialsError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Token cache location: `<user cache dir>/gapi-tok<hash>`, where the hash
/// covers the client id, the client secret and the requested scopes.
pub fn token_cache_file(client_id: &str, client_secret: &str, scopes: &[&str]) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update(client_secret.as_bytes());
    hasher.update(scopes.join(" ").as_bytes());
    let digest = hasher.finalize();

    user_cache_dir().join(format!("gapi-tok{}", hex::encode(&digest[..8])))
}

fn user_cache_dir() -> PathBuf {
    match (std::env::consts::OS, std::env::var_os("HOME")) {
        ("macos", Some(home)) => PathBuf::from(home).join("Library").join("Caches"),
        ("linux" | "freebsd", Some(home)) => PathBuf::from(home).join(".cache"),
        (os, _) => {
            tracing::warn!(os, "no user cache directory known, using the working directory");
            PathBuf::from(".")
        }
    }
}

/// Shows the consent URL and tries to open it in a browser.
struct BrowserFlowDelegate;

impl InstalledFlowDelegate for BrowserFlowDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!("Authorize this app at: {}", url);
            let mut opened = false;
            for bin in BROWSERS {
                if let Ok(status) = tokio::process::Command::new(bin).arg(url).status().await {
                    if status.success() {
                        opened = true;
                        break;
                    }
                }
            }
            if !opened {
                tracing::warn!("error opening URL in browser");
            }

            if !need_code {
                return Ok(String::new());
            }

            let mut code = String::new();
            std::io::stdin()
                .read_line(&mut code)
                .map_err(|e| format!("failed to read authorization code: {}", e))?;
            Ok(code.trim().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_wins_over_file() {
        let value = value_or_file_contents(Some("client-id"), Path::new("/does/not/exist")).unwrap();
        assert_eq!(value, "client-id");
    }

    #[test]
    fn test_empty_value_reads_trimmed_file() {
        let path = std::env::temp_dir().join(format!("gapi-secret-{}.dat", std::process::id()));
        std::fs::write(&path, "  s3cret\n").unwrap();

        let value = value_or_file_contents(Some(""), &path).unwrap();
        assert_eq!(value, "s3cret");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = value_or_file_contents(None, Path::new("/does/not/exist/clientid.dat")).unwrap_err();
        assert!(matches!(err, CredentialsError::ReadFile { .. }));
        assert!(err.to_string().contains("clientid.dat"));
    }

    #[test]
    fn test_token_cache_file_is_keyed_by_client_and_scopes() {
        let a = token_cache_file("id", "secret", &["scope-a"]);
        let b = token_cache_file("id", "secret", &["scope-a"]);
        let c = token_cache_file("id", "secret", &["scope-b"]);
        let d = token_cache_file("other-id", "secret", &["scope-a"]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("gapi-tok"));
        assert_eq!(name.len(), "gapi-tok".len() + 16);
    }

    #[test]
    fn test_installed_app_respects_cache_flag() {
        let cached = Credentials::installed_app("id".into(), "secret".into(), &["s"], true);
        let uncached = Credentials::installed_app("id".into(), "secret".into(), &["s"], false);

        match cached {
            Credentials::InstalledApp { secret, token_cache } => {
                assert_eq!(secret.client_id, "id");
                assert_eq!(secret.token_uri, GOOGLE_TOKEN_URI);
                assert!(token_cache.is_some());
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
        assert!(matches!(
            uncached,
            Credentials::InstalledApp { token_cache: None, .. }
        ));
    }

    #[test]
    fn test_debug_output_hides_access_token() {
        let credentials = Credentials::AccessToken("ya29.secret".to_string());
        assert_eq!(format!("{:?}", credentials), "AccessToken(..)");
        assert_eq!(credentials.project_id(), None);
    }
}
