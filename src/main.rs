// SPDX-License-Identifier: MIT

use anyhow::Context;
use branchline_rs::expression::{tokenize, translate, CompiledExpression};
use branchline_rs::pipeline::{ChannelSender, Event, PortSender};
use branchline_rs::stage::StageLoader;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the normalized form of an expression
    Translate {
        /// Surface expression
        expression: String,
    },
    /// Print the token stream of an expression
    Tokens {
        /// Surface expression
        expression: String,
    },
    /// Evaluate an expression against one event
    Eval {
        /// Surface expression
        expression: String,

        /// Event as a JSON object
        #[arg(short, long)]
        event: String,
    },
    /// Push newline-delimited JSON events through a stage
    Run {
        /// Path to the stage definition
        #[arg(short, long)]
        stage: String,

        /// Path to the NDJSON input
        #[arg(short, long)]
        input: String,

        /// Events evaluated in parallel (default: $BRANCHLINE_CONCURRENCY, then CPU count)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}

/// Records whether a `receive` call forwarded its event anywhere
struct TrackingSender<'a> {
    inner: &'a dyn PortSender,
    sent: AtomicBool,
}

impl PortSender for TrackingSender<'_> {
    fn send(&self, event: Event, port: usize) -> bool {
        self.sent.store(true, Ordering::Relaxed);
        self.inner.send(event, port)
    }
}

fn concurrency_limit(flag: Option<usize>) -> usize {
    flag.or_else(|| {
        std::env::var("BRANCHLINE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
    })
    .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
    .unwrap_or(1)
    .max(1)
}

fn read_events(path: &str) -> anyhow::Result<Vec<Event>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading input {}", path))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let value: serde_json::Value = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", path, n + 1))?;
            Event::from_json(value).with_context(|| format!("{}:{}", path, n + 1))
        })
        .collect()
}

async fn run_stage(stage: &str, input: &str, concurrency: usize) -> anyhow::Result<()> {
    let processor = StageLoader::new()
        .load_processor(stage)
        .with_context(|| format!("building stage from {}", stage))?;
    let events = read_events(input)?;
    let total = events.len();

    log::info!(
        "Running stage '{}' over {} events (concurrency {})",
        processor.name(),
        total,
        concurrency
    );

    let (sender, mut receivers) = ChannelSender::with_ports(processor.ports());
    let sender = Arc::new(sender);

    let outcomes: Vec<_> = stream::iter(events)
        .map(|event| {
            let processor = Arc::clone(&processor);
            let sender = Arc::clone(&sender);
            tokio::task::spawn_blocking(move || {
                let tracking = TrackingSender {
                    inner: sender.as_ref(),
                    sent: AtomicBool::new(false),
                };
                processor
                    .receive(event, &tracking)
                    .map(|_| tracking.sent.load(Ordering::Relaxed))
            })
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut unmatched = 0;
    for outcome in outcomes {
        if !outcome.context("worker task failed")?? {
            unmatched += 1;
        }
    }
    drop(sender);

    for (port, rx) in receivers.iter_mut().enumerate() {
        while let Ok(event) = rx.try_recv() {
            println!("{}\t{}", port, event.to_json());
        }
    }
    eprintln!("{} of {} events unmatched", unmatched, total);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Translate { expression } => {
            println!("{}", translate(&expression)?);
        }
        Commands::Tokens { expression } => {
            for token in tokenize(&translate(&expression)?)? {
                println!("{}", token);
            }
        }
        Commands::Eval { expression, event } => {
            let value: serde_json::Value =
                serde_json::from_str(&event).context("event is not valid JSON")?;
            let event = Event::from_json(value)?;
            let compiled = CompiledExpression::compile_surface(&expression)?;
            println!("{}", compiled.evaluate_bool(&event)?);
        }
        Commands::Run {
            stage,
            input,
            concurrency,
        } => {
            run_stage(&stage, &input, concurrency_limit(concurrency)).await?;
        }
    }

    Ok(())
}
