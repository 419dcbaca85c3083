#!/usr/bin/env rust
//! Raw Log Replay Driver
//!
//! Purpose:
//!     Replays a JSON batch of raw event logs through the decode engine and
//!     reports per-log outcomes plus a summary. The engine itself performs
//!     no I/O; this driver owns file loading and the worker fan-out.
//!
//! Author: AI-Generated
//! Created: 2026-07-30
//!
//! Dependencies:
//!     - tokio (task fan-out)
//!     - clap (CLI args)
//!     - anyhow (error handling)
//!     - tracing (logging)
//!
//! Usage:
//!     cargo run --release --bin decode-logs -- --logs data/logs.json
//!     cargo run --release --bin decode-logs -- --logs data/logs.json \
//!         --registrations config/protocols.json --children config/children.json

use anyhow::{Context, Result};
use chain_decoder::{
    config, protocols, AddressResolver, DispatchEngine, DispatchOutcome, DispatchStats,
    FactoryChildIndex, RawLog, RegistryBuilder,
};
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "decode-logs", about = "Replay raw event logs through the decode engine")]
struct Args {
    /// JSON file holding an array of raw logs to replay
    #[arg(short, long, env = "DECODER_LOGS")]
    logs: String,

    /// Extra protocol registrations JSON (merged with the built-in catalog)
    #[arg(short, long, env = "DECODER_REGISTRATIONS")]
    registrations: Option<String>,

    /// Pre-enumerated factory child bindings JSON
    #[arg(long, env = "DECODER_CHILDREN")]
    children: Option<String>,

    /// Concurrent dispatch tasks
    #[arg(long, default_value = "8")]
    concurrency: usize,

    /// Print every decoded event, not just the summary
    #[arg(long)]
    verbose_events: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    dotenv::dotenv().ok();
    let args = Args::parse();

    // Registrations: built-in catalog plus any configured extras
    let mut registrations = protocols::all_registrations();
    if let Some(path) = &args.registrations {
        let extra = config::load_registrations(path)
            .with_context(|| format!("Failed to load registrations from {path}"))?;
        info!("Loaded {} extra registrations from {}", extra.len(), path);
        registrations.extend(extra);
    }

    // Factory child bindings recorded ahead of the replay
    let children = Arc::new(FactoryChildIndex::new());
    if let Some(path) = &args.children {
        let bindings = config::load_child_bindings(path)
            .with_context(|| format!("Failed to load child bindings from {path}"))?;
        for binding in &bindings {
            let child = binding
                .child
                .parse()
                .with_context(|| format!("Invalid child address: {}", binding.child))?;
            let factory = binding
                .factory
                .parse()
                .with_context(|| format!("Invalid factory address: {}", binding.factory))?;
            children.bind(&binding.chain_name, child, factory);
        }
        info!("Loaded {} child bindings from {}", children.len(), path);
    }

    // Build the engine. Duplicate or ambiguous registrations abort here,
    // before any dispatch traffic.
    let resolver = AddressResolver::from_registrations(&registrations, Arc::clone(&children))
        .context("Address registration conflict")?;
    let mut builder = RegistryBuilder::new();
    protocols::register_all(&mut builder).context("Rule registration conflict")?;
    let engine = Arc::new(DispatchEngine::new(resolver, builder.build()));

    // Load the log batch
    let content = std::fs::read_to_string(&args.logs)
        .with_context(|| format!("Failed to read logs file: {}", args.logs))?;
    let logs: Vec<RawLog> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse logs JSON: {}", args.logs))?;

    info!("===========================================");
    info!("   Raw Log Replay");
    info!("===========================================");
    info!("Logs: {} from {}", logs.len(), args.logs);
    info!("Concurrency: {}", args.concurrency);

    let start = std::time::Instant::now();
    let verbose = args.verbose_events;

    // Dispatch is pure computation over frozen state; logs fan out across
    // tasks with no ordering dependency.
    let outcomes: Vec<DispatchOutcome> = stream::iter(logs)
        .map(|log| {
            let engine = Arc::clone(&engine);
            async move { engine.dispatch(&log) }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let mut stats = DispatchStats::default();
    for outcome in &outcomes {
        stats.record(outcome);
        match outcome {
            DispatchOutcome::Decoded(event) => {
                if verbose {
                    info!(
                        "{} | {} | {} | {} details",
                        event.category,
                        event.action,
                        event.name,
                        event.details.len()
                    );
                }
            }
            DispatchOutcome::Skipped(reason) => debug!("Skipped: {}", reason),
            DispatchOutcome::Failed(failure) => warn!("Failed: {}", failure),
        }
    }

    let elapsed = start.elapsed();
    info!("===========================================");
    info!("   Replay Complete");
    info!("===========================================");
    info!("Decoded:  {}", stats.decoded);
    info!("Skipped:  {}", stats.skipped);
    info!("Failed:   {}", stats.failed);
    info!("Total:    {}", stats.total());
    info!("Duration: {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
