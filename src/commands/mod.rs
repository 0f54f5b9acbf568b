//! Command table.
//!
//! Each command module exposes a [`CommandDescriptor`] naming the command and
//! the OAuth scope it needs. [`DESCRIPTORS`] lists them all; the entry point
//! requests credentials for the scope of the selected command before any
//! remote call is made.

pub mod dynamic_links;
pub mod pubsub;
pub mod urlshortener;

use crate::GoogleApis;
use clap::{Subcommand, ValueEnum};
use std::io::Write;

#[cfg(test)]
mod tests;

/// Name and OAuth scope of a top-level command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub scope: &'static str,
}

pub const DESCRIPTORS: [CommandDescriptor; 3] = [
    pubsub::DESCRIPTOR,
    dynamic_links::DESCRIPTOR,
    urlshortener::DESCRIPTOR,
];

pub fn find(name: &str) -> Option<&'static CommandDescriptor> {
    DESCRIPTORS.iter().find(|d| d.name == name)
}

pub fn names() -> Vec<&'static str> {
    DESCRIPTORS.iter().map(|d| d.name).collect()
}

/// Output format for commands that print results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cloud Pub/Sub
    Pubsub {
        #[command(subcommand)]
        command: pubsub::PubsubCommand,
    },

    /// Firebase Dynamic Links
    FirebaseDynamiclinks {
        #[command(subcommand)]
        command: dynamic_links::DynamicLinksCommand,
    },

    /// URL Shortener
    Urlshortener {
        #[command(subcommand)]
        command: urlshortener::UrlShortenerCommand,
    },
}

impl Command {
    pub fn descriptor(&self) -> &'static CommandDescriptor {
        match self {
            Command::Pubsub { .. } => &pubsub::DESCRIPTOR,
            Command::FirebaseDynamiclinks { .. } => &dynamic_links::DESCRIPTOR,
            Command::Urlshortener { .. } => &urlshortener::DESCRIPTOR,
        }
    }

    /// Runs the command, writing its results to `out`.
    pub async fn run(self, apis: &GoogleApis, out: &mut impl Write) -> anyhow::Result<()> {
        match self {
            Command::Pubsub { command } => pubsub::run(command, &apis.pubsub(), out).await,
            Command::FirebaseDynamiclinks { command } => {
                dynamic_links::run(command, &apis.dynamic_links(), out).await
            }
            Command::Urlshortener { command } => {
                urlshortener::run(command, &apis.url_shortener(), out).await
            }
        }
    }
}
