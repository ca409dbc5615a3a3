//! CLI argument definitions for stockpulse.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `history` | Daily price history for one symbol |
//! | `quote` | Latest quote for one or more symbols |
//! | `chip` | Chip distribution for one symbol |
//! | `sources` | Active source table for the configured market |
//! | `run` | History for the whole stock list with a bounded worker pool |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML settings file |
//! | `--market` | `cn` | Market tag (`cn`, `us`) |
//! | `--timeout-ms` | `20000` | Per-source call budget |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! stockpulse history 600519 --days 30
//! stockpulse --market us quote AAPL MSFT --pretty
//! stockpulse chip 600519
//! stockpulse --config stockpulse.toml run
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Multi-source market data with ordered failover.
#[derive(Debug, Parser)]
#[command(
    name = "stockpulse",
    author,
    version,
    about = "Multi-source market data with ordered failover",
    long_about = "stockpulse fetches daily prices, quotes and chip distribution for domestic \
A-shares and US equities. Each request walks a fixed, per-market list of upstream sources \
and returns the first usable answer together with the failures that preceded it.\n\
\n\
Use 'stockpulse <command> --help' for command-specific help."
)]
pub struct Cli {
    /// TOML settings file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Market tag: cn (a, domestic) or us (international).
    ///
    /// Overrides `STOCKPULSE_MARKET` and the settings file.
    #[arg(long, global = true, value_name = "TAG")]
    pub market: Option<String>,

    /// Time budget for one source call in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch daily price history for one symbol.
    ///
    /// # Examples
    ///
    ///   stockpulse history 600519
    ///   stockpulse history 600519 --start 2024-01-01 --end 2024-03-31
    ///   stockpulse --market us history AAPL --days 10
    History(HistoryArgs),

    /// Fetch the latest quote for one or more symbols.
    Quote(QuoteArgs),

    /// Fetch chip distribution (domestic market only).
    Chip(ChipArgs),

    /// List the active sources for the configured market.
    Sources,

    /// Fetch history for the stock list (or the given symbols).
    Run(RunArgs),
}

/// Arguments for the `history` command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Symbol to fetch (e.g. 600519, sz000001, AAPL).
    pub symbol: String,

    /// First date, YYYY-MM-DD.
    #[arg(long)]
    pub start: Option<String>,

    /// Last date, YYYY-MM-DD (default: today).
    #[arg(long)]
    pub end: Option<String>,

    /// Calendar days to look back when `--start` is absent.
    #[arg(long)]
    pub days: Option<u32>,
}

/// Arguments for the `quote` command.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// One or more symbols.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

/// Arguments for the `chip` command.
#[derive(Debug, Args)]
pub struct ChipArgs {
    pub symbol: String,
}

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Symbols to fetch instead of the configured stock list.
    pub symbols: Vec<String>,

    /// Calendar days of history per symbol.
    #[arg(long)]
    pub days: Option<u32>,
}
