use crate::commands::{CommandDescriptor, OutputFormat};
use crate::dynamic_links::models::{DynamicLinkEventStat, DynamicLinkStats};
use crate::dynamic_links::{DynamicLinks, FIREBASE_SCOPE};
use crate::pool::{Completed, Failed, Submitter, WorkerPool};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

pub const DESCRIPTOR: CommandDescriptor = CommandDescriptor {
    name: "firebase-dynamiclinks",
    scope: FIREBASE_SCOPE,
};

#[derive(Subcommand, Debug)]
pub enum DynamicLinksCommand {
    /// Fetch statistics for Dynamic Links
    Stat(StatArgs),
}

#[derive(Args, Debug)]
pub struct StatArgs {
    /// Duration days
    #[arg(long, default_value_t = 10)]
    pub duration: i64,

    /// File with one link per line, used instead of command-line links
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Number of simultaneous requests
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub parallelism: u64,

    #[arg(long, short, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Links to look up, e.g. https://xxx.app.goo.gl/xxxxx
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub urls: Vec<String>,
}

#[derive(Serialize)]
struct StatLine<'a> {
    url: &'a str,
    events: &'a [DynamicLinkEventStat],
}

pub async fn run(command: DynamicLinksCommand, service: &DynamicLinks, out: &mut impl Write) -> Result<()> {
    match command {
        DynamicLinksCommand::Stat(args) => stat(service, args, out).await,
    }
}

/// Looks up every link through the worker pool and prints one result per
/// link as soon as it arrives. Links come from `--file` (one per line, read
/// as they are submitted) or from the command line.
pub async fn stat(service: &DynamicLinks, args: StatArgs, out: &mut impl Write) -> Result<()> {
    let StatArgs {
        duration,
        file,
        parallelism,
        output,
        urls,
    } = args;

    let pool = WorkerPool::new(parallelism as usize)?;
    let fetcher = service.clone();
    let (submitter, mut results) = pool.start(move |url: String| {
        let fetcher = fetcher.clone();
        async move { fetcher.get_link_stats(&url, duration).await }
    });

    let produce = async move {
        match file {
            Some(path) => submit_file_lines(&submitter, &path).await,
            None => {
                for url in urls {
                    if submitter.submit(url).await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
        }
    };

    let consume = async {
        let mut printed = 0usize;
        while let Some(outcome) = results.next().await {
            let written = match outcome {
                Ok(Completed { item, output: stats }) => {
                    write_stats(out, output, &item, &stats).context("Failed to write output")
                }
                Err(Failed { item, error }) => Err(anyhow::Error::new(error)
                    .context(format!("Failed to get link stats for {}", item))),
            };
            if let Err(err) = written {
                results.abort();
                return Err(err);
            }
            printed += 1;
        }
        Ok::<usize, anyhow::Error>(printed)
    };

    let (produced, consumed) = tokio::join!(produce, consume);
    let printed = consumed?;
    produced?;
    results.join().await?;

    tracing::debug!(links = printed, "stat finished");
    Ok(())
}

/// Submits each non-blank line of `path`. Bytes that are not valid UTF-8
/// are replaced rather than rejected.
async fn submit_file_lines(submitter: &Submitter<String>, path: &Path) -> Result<()> {
    let fp = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(fp).split(b'\n');

    while let Some(line) = lines
        .next_segment()
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?
    {
        let url = String::from_utf8_lossy(&line);
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        if submitter.submit(url.to_string()).await.is_err() {
            break;
        }
    }
    Ok(())
}

fn write_stats(out: &mut impl Write, format: OutputFormat, url: &str, stats: &DynamicLinkStats) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(&StatLine {
                url,
                events: &stats.link_event_stats,
            })?;
            writeln!(out, "{}", line)?;
        }
        OutputFormat::Text => {
            if stats.link_event_stats.is_empty() {
                writeln!(out, "{}", url)?;
            }
            for event in &stats.link_event_stats {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    url,
                    event.platform.as_deref().unwrap_or("-"),
                    event.event.as_deref().unwrap_or("-"),
                    event.count.as_deref().unwrap_or("0"),
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
