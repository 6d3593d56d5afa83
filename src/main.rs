//! CLI entry point for by-request.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use by_request::{Body, Client, ClientConfig, Destination, FetchOptions};
use clap::Parser;
use tracing::{debug, info};

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries the response body
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let bar = progress::progress_bar(args.progress && !args.quiet);
    let options = fetch_options(&args).with_progress(progress::observer(&bar));
    let client = Client::with_config(ClientConfig::from_env())
        .context("failed to build HTTP client")?;

    let result = run(&client, &args, &options).await;
    bar.finish_and_clear();
    result
}

fn fetch_options(args: &Args) -> FetchOptions {
    let mut options = FetchOptions::default()
        .with_response_info(|info| debug!(?info, "response info"));

    if let Some(encoding) = &args.encoding {
        options = options.with_encoding(encoding.clone());
        if args.force_encoding {
            options = options.with_force_encoding();
        }
    }
    if args.ignore_bom {
        options = options.with_ignore_bom();
    }
    if args.keep_bom {
        options = options.with_keep_bom();
    }
    if args.no_decompress {
        options = options.with_dont_decompress();
    }
    if let Some(secs) = args.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    options
}

async fn run(client: &Client, args: &Args, options: &FetchOptions) -> Result<()> {
    let url = args.url.as_str();

    if let Some(path) = &args.output {
        let bytes = client
            .fetch_to_file(url, Destination::Path(path.clone()), options)
            .await?;
        info!(bytes, path = %path.display(), "saved");
        return Ok(());
    }

    if args.json {
        let value = client.fetch_json(url, options).await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let body = if args.text {
        Body::Text(client.fetch_text(url, options).await?)
    } else if args.binary {
        Body::Bytes(client.fetch_binary(url, options).await?)
    } else {
        client.fetch(url, options).await?
    };

    let mut stdout = io::stdout().lock();
    match body {
        Body::Text(text) => stdout.write_all(text.as_bytes())?,
        Body::Bytes(bytes) => stdout.write_all(&bytes)?,
        Body::Written(_) => {}
    }
    stdout.flush()?;
    Ok(())
}
