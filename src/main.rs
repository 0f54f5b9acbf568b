use anyhow::{Context, Result};
use clap::Parser;
use gapi::cli::Cli;
use gapi::core::middleware::AuthMiddleware;
use gapi::GoogleApis;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.debug { "gapi=debug" } else { "gapi=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let descriptor = cli.command.descriptor();
    tracing::debug!(command = descriptor.name, scope = descriptor.scope, "resolving credentials");

    let credentials = cli
        .credentials(descriptor.scope)
        .await
        .context("Failed to load credentials")?;
    let middleware = AuthMiddleware::new(credentials, &[descriptor.scope]);
    let apis = GoogleApis::new(middleware, cli.client_options()).with_project_id(cli.project);

    cli.command.run(&apis, &mut std::io::stdout()).await
}
