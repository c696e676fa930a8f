// src/main.rs
// =============================================================================
// This is the entry point of link-sentry.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (stderr, so reports on stdout stay machine readable)
// 3. Load the configuration and find the documents to check
// 4. Stream one report per document to stdout as soon as it is checked
// 5. Exit with proper code (0 = all links valid, 1 = broken links, 2 = error)
// =============================================================================

mod checker; // src/checker/ - the link checking engine
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - .link-sentry.toml
mod discover; // src/discover.rs - which documents to check
mod error; // src/error.rs - fatal errors
mod extract; // src/extract/ - links from Markdown and AsciiDoc documents
mod link; // src/link.rs - LinkNode / LinkStatus
mod report; // src/report.rs - text, json and rdjson output

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checker::{CheckOptions, Engine};
use cli::{CheckArgs, Cli, Commands};
use config::Config;
use extract::{DocumentSource, Rewriter};
use report::{Format, Reporter};

/// Environment variable holding a tracing filter, e.g. `link_sentry=debug`.
const LOG_ENV: &str = "LINK_SENTRY_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "link_sentry=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

// Returns:
//   Ok(0) = no broken links
//   Ok(1) = broken links found
//   Err   = configuration or I/O problem (exit code 2)
async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check(args) => check(&args).await,
    }
}

async fn check(args: &CheckArgs) -> Result<i32> {
    let mut config = Config::load(&args.config_path())?;
    args.apply(&mut config);

    let root = Path::new(".");
    let mut documents = discover::discover(&config, root);
    if config.modified_files_only {
        let changed = discover::changed_in_last_commit(root)?;
        documents = discover::only_changed(documents, root, &changed);
        if documents.is_empty() {
            info!("no configured document was modified by the last commit");
            match args.output_format() {
                Format::Text => {
                    println!("Skipped link checking. Modified files are not specified in the configuration.")
                }
                // still a well-formed, empty report
                format => {
                    Reporter::new(io::stdout().lock(), format).finish()?;
                }
            }
            return Ok(0);
        }
    }
    if documents.is_empty() {
        warn!("no documents match the configuration");
    }
    info!(documents = documents.len(), "starting link check");

    let source = DocumentSource::new(Rewriter::from_config(&config)?);
    let engine = Engine::new(CheckOptions::from_config(&config)?, root)?;

    let stdout = io::stdout();
    let mut reporter = Reporter::new(stdout.lock(), args.output_format());

    let reports = engine.run(source, documents);
    futures::pin_mut!(reports);
    while let Some(report) = reports.next().await {
        reporter.document(&report)?;
    }

    let summary = reporter.finish()?;
    info!(
        links = summary.links,
        errors = summary.errors,
        skipped = summary.skipped,
        "link check finished"
    );

    Ok(if summary.errors > 0 { 1 } else { 0 })
}
