use crate::commands::Command;
use crate::core::credentials::{value_or_file_contents, Credentials, CredentialsError};
use crate::core::ClientOptions;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gapi")]
#[command(about = "Command-line client for Google APIs")]
#[command(version)]
pub struct Cli {
    /// Service account key file (JSON). Takes precedence over the installed-app flow.
    #[arg(long, env = "GAPI_SERVICE_ACCOUNT", value_name = "PATH")]
    pub service_account: Option<PathBuf>,

    /// OAuth client id for the installed-app flow
    #[arg(long, env = "GAPI_CLIENT_ID")]
    pub clientid: Option<String>,

    /// File holding the OAuth client id, used when --clientid is empty
    #[arg(long, default_value = "clientid.dat", value_name = "PATH")]
    pub clientid_file: PathBuf,

    /// OAuth client secret for the installed-app flow
    #[arg(long, env = "GAPI_CLIENT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// File holding the OAuth client secret, used when --secret is empty
    #[arg(long, default_value = "clientsecret.dat", value_name = "PATH")]
    pub secret_file: PathBuf,

    /// Pre-issued bearer token; skips token acquisition entirely
    #[arg(long, env = "GAPI_ACCESS_TOKEN", hide_env_values = true, conflicts_with = "service_account")]
    pub access_token: Option<String>,

    /// Cache the installed-app OAuth token on disk
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub cachetoken: bool,

    /// Project used to expand short Pub/Sub topic and subscription names
    #[arg(long, env = "GAPI_PROJECT")]
    pub project: Option<String>,

    /// Log HTTP requests and responses
    #[arg(long)]
    pub debug: bool,

    /// Retry transient HTTP failures this many times
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Resolves credentials for `scope`: an access token first, then a
    /// service account key, then the installed-app flow.
    pub async fn credentials(&self, scope: &str) -> Result<Credentials, CredentialsError> {
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::AccessToken(token.to_string()));
        }

        if let Some(path) = &self.service_account {
            return Credentials::from_service_account_file(path).await;
        }

        let client_id = value_or_file_contents(self.clientid.as_deref(), &self.clientid_file)?;
        let client_secret = value_or_file_contents(self.secret.as_deref(), &self.secret_file)?;
        Ok(Credentials::installed_app(
            client_id,
            client_secret,
            &[scope],
            self.cachetoken,
        ))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            debug: self.debug,
            max_retries: self.max_retries,
        }
    }
}
