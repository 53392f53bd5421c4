//! mempoolws CLI — watch the mempool WebSocket feed from the terminal.
//!
//! Usage:
//! ```bash
//! # Stream blocks and projected mempool blocks
//! mempoolws watch --url wss://mempool.space/api/v1/ws --want blocks,mempool-blocks
//!
//! # Track a transaction and an address
//! mempoolws watch --url ws://localhost:8999/ws --track-tx <txid> --track-address <addr>
//!
//! # Load endpoint and timings from a JSON config file
//! mempoolws watch --config feed.json --want stats,live-2h-chart
//! ```
//!
//! Events are printed to stdout as JSON lines; logs go to stderr.

mod print_sink;
mod tracing_setup;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use mempoolws_core::{categories, FeedConfig};
use mempoolws_ws::FeedClient;

use crate::print_sink::PrintSink;
use crate::tracing_setup::{init_tracing, LogConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "watch" => cmd_watch(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("mempoolws {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("mempoolws {}", env!("CARGO_PKG_VERSION"));
    println!("Watch the mempool WebSocket feed\n");
    println!("USAGE:");
    println!("    mempoolws <COMMAND>\n");
    println!("COMMANDS:");
    println!("    watch      Connect and print pushed events as JSON lines");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("WATCH FLAGS:");
    println!("    --url <URL>              WebSocket endpoint");
    println!("    --config <FILE>          JSON feed config (instead of --url)");
    println!("    --want <a,b,...>         Push categories [default: {}]", default_want());
    println!("    --track-tx <TXID>        Track a transaction");
    println!("    --track-address <ADDR>   Track an address");
    println!("    --history <DATE>         Request historical statistics once");
    println!("    --log-config <FILE>      JSON log config with per-crate levels");
    println!("    --log-level <LEVEL>      trace|debug|info|warn|error [default: info]");
    println!("    --json-logs              Emit logs as JSON");
}

fn default_want() -> String {
    [categories::BLOCKS, categories::MEMPOOL_BLOCKS].join(",")
}

async fn cmd_watch(args: &[String]) -> Result<()> {
    let mut log = match parse_flag(args, "--log-config") {
        Some(path) => LogConfig::from_file(path)?,
        None => LogConfig::default(),
    };
    if let Some(level) = parse_flag(args, "--log-level") {
        log.level = level;
    }
    log.json |= has_flag(args, "--json-logs");
    init_tracing(&log);

    let config = match (parse_flag(args, "--config"), parse_flag(args, "--url")) {
        (Some(path), _) => FeedConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        (None, Some(url)) => FeedConfig::new(url),
        (None, None) => bail!("--url or --config is required"),
    };

    let want = parse_flag(args, "--want").unwrap_or_else(default_want);
    let want: Vec<String> = want
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    let client = FeedClient::connect(config, Arc::new(PrintSink::new()))
        .await
        .context("starting feed client")?;

    if !want.is_empty() {
        client.want(want);
    }
    if let Some(txid) = parse_flag(args, "--track-tx") {
        client.track_transaction(txid);
    }
    if let Some(address) = parse_flag(args, "--track-address") {
        client.track_address(address);
    }
    if let Some(date) = parse_flag(args, "--history") {
        client.fetch_historical_statistics(date);
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    let metrics = client.metrics();
    tracing::info!(
        frames = metrics.frames_received,
        blocks = metrics.blocks_emitted,
        failures = metrics.transport_failures,
        replays = metrics.replays,
        "shutting down"
    );
    client.close();
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
