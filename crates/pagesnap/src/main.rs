// Copyright 2026 Pagesnap Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pagesnap::cli::{self, archive_cmd::ArchiveArgs, output::OutputMode};
use pagesnap::types::Viewport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pagesnap",
    about = "Pagesnap — archive a single web page with its assets and screenshots",
    version,
    after_help = "Run 'pagesnap <command> --help' for details on each command."
)]
struct Cli {
    /// Print the outcome as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Audit log path (default: $PAGESNAP_AUDIT_LOG, then ~/.pagesnap/audit.jsonl)
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a page: markup, assets, and screenshots
    Archive {
        /// Page URL (http or https)
        url: String,
        /// Output directory (default: snapshots/<host>)
        #[arg(long)]
        out: Option<PathBuf>,
        /// User agent for the browser and HTTP requests
        #[arg(long)]
        user_agent: Option<String>,
        /// Ignore robots.txt
        #[arg(long)]
        no_robots: bool,
        /// Navigation timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Per-asset download timeout in milliseconds
        #[arg(long)]
        asset_timeout: Option<u64>,
        /// Skip asset downloads
        #[arg(long)]
        no_assets: bool,
        /// Skip screenshots
        #[arg(long)]
        no_screenshots: bool,
        /// Desktop viewport as WIDTHxHEIGHT
        #[arg(long)]
        desktop: Option<Viewport>,
        /// Mobile viewport as WIDTHxHEIGHT
        #[arg(long)]
        mobile: Option<Viewport>,
        /// Maximum concurrent asset downloads
        #[arg(long)]
        concurrency: Option<usize>,
        /// Path to a Chromium binary
        #[arg(long)]
        chromium: Option<PathBuf>,
    },
    /// Archive from a JSON request file ('-' reads stdin)
    Run {
        request: PathBuf,
        /// Path to a Chromium binary
        #[arg(long)]
        chromium: Option<PathBuf>,
    },
    /// Check that a browser is available
    Doctor {
        /// Path to a Chromium binary
        #[arg(long)]
        chromium: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    cli::output::init(OutputMode {
        json: cli.json,
        quiet: cli.quiet,
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let audit_log = cli.audit_log.as_deref();
    let result = match cli.command {
        Commands::Archive {
            url,
            out,
            user_agent,
            no_robots,
            timeout,
            asset_timeout,
            no_assets,
            no_screenshots,
            desktop,
            mobile,
            concurrency,
            chromium,
        } => {
            let args = ArchiveArgs {
                url,
                out,
                user_agent,
                no_robots,
                timeout_ms: timeout,
                asset_timeout_ms: asset_timeout,
                no_assets,
                no_screenshots,
                desktop,
                mobile,
                concurrency,
            };
            cli::archive_cmd::run_archive(args, chromium.as_deref(), audit_log).await
        }
        Commands::Run { request, chromium } => {
            cli::archive_cmd::run_request_file(&request, chromium.as_deref(), audit_log).await
        }
        Commands::Doctor { chromium } => cli::doctor::run(chromium.as_deref(), audit_log).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pagesnap", &mut std::io::stdout());
            Ok(true)
        }
    };

    // Consistent exit codes: 0=success, 1=failure
    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            if cli::output::is_json() {
                cli::output::print_json(&serde_json::json!({
                    "success": false,
                    "message": format!("{e:#}"),
                }));
            } else if !cli::output::is_quiet() {
                eprintln!("  Error: {e:#}");
            }
            std::process::exit(1);
        }
    }
}
