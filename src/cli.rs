//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

/// Fetch a URL and print it, decoding text in whatever charset it uses.
///
/// Without a mode flag the Content-Type decides: text is printed decoded,
/// anything else is written to stdout as raw bytes.
#[derive(Parser, Debug)]
#[command(name = "by-request")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("mode").args(["text", "binary", "json", "output"])))]
pub struct Args {
    /// URL to fetch (http or https)
    pub url: String,

    /// Decode the body as text regardless of Content-Type
    #[arg(long)]
    pub text: bool,

    /// Write the body as raw bytes
    #[arg(long)]
    pub binary: bool,

    /// Parse the body as JSON or JSONP and pretty-print it
    #[arg(long)]
    pub json: bool,

    /// Save the body to a file; a path ending in '/' is a directory and the
    /// file is named after the URL
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Charset to use when the response does not declare one
    #[arg(short, long, value_name = "ENC")]
    pub encoding: Option<String>,

    /// Use --encoding even if the response declares a different charset
    #[arg(long, requires = "encoding")]
    pub force_encoding: bool,

    /// Do not treat a byte-order mark as a charset declaration
    #[arg(long)]
    pub ignore_bom: bool,

    /// Keep a byte-order mark in the decoded text
    #[arg(long)]
    pub keep_bom: bool,

    /// Leave compressed bodies compressed (ignored for text output)
    #[arg(long)]
    pub no_decompress: bool,

    /// Give up after this many seconds (1-3600)
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Show a progress bar on stderr
    #[arg(short, long)]
    pub progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
