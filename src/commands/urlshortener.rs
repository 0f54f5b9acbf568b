use crate::commands::CommandDescriptor;
use crate::urlshortener::{UrlShortener, URLSHORTENER_SCOPE};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::Write;

pub const DESCRIPTOR: CommandDescriptor = CommandDescriptor {
    name: "urlshortener",
    scope: URLSHORTENER_SCOPE,
};

#[derive(Subcommand, Debug)]
pub enum UrlShortenerCommand {
    /// Expand a short URL and print the resource as JSON
    Get {
        /// Short URL, e.g. http://goo.gl/fbsS
        short_url: String,
    },

    /// Shorten a long URL
    Insert {
        long_url: String,
    },
}

pub async fn run(command: UrlShortenerCommand, service: &UrlShortener, out: &mut impl Write) -> Result<()> {
    match command {
        UrlShortenerCommand::Get { short_url } => {
            let url = service
                .get(&short_url)
                .await
                .with_context(|| format!("Failed to expand {}", short_url))?;
            serde_json::to_writer(&mut *out, &url)?;
            writeln!(out)?;
        }
        UrlShortenerCommand::Insert { long_url } => {
            let url = service
                .insert(&long_url)
                .await
                .with_context(|| format!("Failed to shorten {}", long_url))?;
            writeln!(out, "Shortened {} => {}", long_url, url.id.as_deref().unwrap_or_default())?;
        }
    }
    Ok(())
}
