use crate::commands::CommandDescriptor;
use crate::pool::{PoolSummary, WorkerPool};
use crate::pubsub::{PubSub, PUBSUB_SCOPE};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use futures::stream;
use std::io::Write;

pub const DESCRIPTOR: CommandDescriptor = CommandDescriptor {
    name: "pubsub",
    scope: PUBSUB_SCOPE,
};

#[derive(Subcommand, Debug)]
pub enum PubsubCommand {
    /// Publish numbered dummy messages to a topic
    SendDummy(SendDummyArgs),

    /// Pull messages from a subscription one at a time, printing and acknowledging each
    PullMessage(PullMessageArgs),
}

#[derive(Args, Debug)]
pub struct SendDummyArgs {
    /// Number of concurrent publishers
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub parallel: u64,

    /// Number of messages to publish
    #[arg(long, default_value_t = 100)]
    pub count: u64,

    /// Topic name, or a full `projects/<p>/topics/<t>` path
    pub topic: String,
}

#[derive(Args, Debug)]
pub struct PullMessageArgs {
    /// Subscription name, or a full `projects/<p>/subscriptions/<s>` path
    pub subscription: String,

    /// Stop after this many pull requests instead of running until interrupted
    #[arg(long, value_name = "N")]
    pub max_loops: Option<u64>,
}

pub async fn run(command: PubsubCommand, service: &PubSub, out: &mut impl Write) -> Result<()> {
    match command {
        PubsubCommand::SendDummy(args) => {
            let topic = args.topic.clone();
            let summary = send_dummy(service, args).await?;
            tracing::info!(topic = %topic, published = summary.completed, "send-dummy finished");
            Ok(())
        }
        PubsubCommand::PullMessage(args) => pull_message(service, args, out).await,
    }
}

/// Publishes messages whose payloads are the decimal strings `0..count`.
/// Message ids are printed to stderr as each publish completes.
pub async fn send_dummy(service: &PubSub, args: SendDummyArgs) -> Result<PoolSummary> {
    let pool = WorkerPool::new(args.parallel as usize)?;
    let topic = service.topic_path(&args.topic);
    let publisher = service.clone();

    let summary = pool
        .for_each(stream::iter(0..args.count), move |n: u64| {
            let publisher = publisher.clone();
            let topic = topic.clone();
            async move {
                let ids = publisher.publish_data(&topic, n.to_string().as_bytes()).await?;
                eprintln!("[{}]", ids.join(", "));
                Ok::<(), crate::pubsub::PubSubError>(())
            }
        })
        .await
        .with_context(|| format!("Failed to publish to {}", args.topic))?;

    Ok(summary)
}

/// Pulls one message at a time and writes its decoded payload to `out`.
/// A failed acknowledgement is only logged; the message will be redelivered.
pub async fn pull_message(service: &PubSub, args: PullMessageArgs, out: &mut impl Write) -> Result<()> {
    let subscription = service.subscription_path(&args.subscription);
    let mut loops = 0u64;

    loop {
        if matches!(args.max_loops, Some(max) if loops >= max) {
            break;
        }
        loops += 1;

        let received = service
            .pull(&subscription, 1, false)
            .await
            .with_context(|| format!("Failed to pull from {}", args.subscription))?;

        for message in received {
            let data = message
                .message
                .decode_data()
                .with_context(|| format!("Failed to decode message {:?}", message.message.message_id))?;
            out.write_all(&data)?;
            writeln!(out)?;
            out.flush()?;

            if let Err(e) = service.acknowledge(&subscription, &[message.ack_id.clone()]).await {
                tracing::warn!(ack_id = %message.ack_id, error = %e, "failed to acknowledge message");
            }
        }
    }

    Ok(())
}
