//! Command-line interface parsing for skycache

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use skycache_weather::RenderFormat;

/// Skycache - cached weather lookups
#[derive(Parser, Debug)]
#[command(name = "skycache")]
#[command(about = "Look up weather for a location, served from cache when fresh")]
#[command(version)]
pub struct Cli {
    /// Location to look up. Multiple words are joined with spaces.
    ///
    /// Examples:
    ///   skycache Paris
    ///   skycache "Austin, TX"
    ///   skycache new york --format html
    #[arg(required = true, num_args = 1.., value_name = "LOCATION")]
    pub location: Vec<String>,

    /// Output format: json or html
    #[arg(long, short, default_value = "json")]
    pub format: RenderFormat,

    /// Show a single forecast day instead of the full record
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub day: Option<NaiveDate>,

    /// Config file (defaults to the per-user skycache/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// The location exactly as the user typed it, words rejoined.
    pub fn location(&self) -> String {
        self.location.join(" ")
    }
}
