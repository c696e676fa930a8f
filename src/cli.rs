// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Everything about *what* to check lives in the configuration file; the
// command line only picks the file, the output format and a couple of
// switches that are handy to flip for a single run.
//
//   link-sentry check
//   link-sentry check --config docs/.link-sentry.toml --format rdjson
//   link-sentry check --no-cache --no-follow-redirects -v
// =============================================================================

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::report::Format;

#[derive(Parser, Debug)]
#[command(
    name = "link-sentry",
    version,
    about = "Checks web links, local files and section anchors referenced in Markdown and AsciiDoc documents",
    long_about = "link-sentry finds every link in your Markdown documentation and verifies it: \
                  web links over HTTP, relative links against the filesystem, #anchors against \
                  the headings of the target document. It exits with 1 when something is broken, \
                  which makes it a good fit for CI pipelines."
)]
pub struct Cli {
    /// Print debug logs to stderr (LINK_SENTRY_LOG overrides this)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every link in the configured documents
    ///
    /// Example: link-sentry check --format json
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CheckArgs {
    /// Configuration file (default: .link-sentry.toml in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Shorthand for --format json
    #[arg(long, conflicts_with = "format")]
    pub json: bool,

    /// Check every occurrence again instead of reusing earlier results
    #[arg(long)]
    pub no_cache: bool,

    /// Report redirects as errors instead of following them
    #[arg(long)]
    pub no_follow_redirects: bool,
}

impl CheckArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    pub fn output_format(&self) -> Format {
        if self.json {
            Format::Json
        } else {
            self.format
        }
    }

    /// Lets the command line switches win over the configuration file.
    pub fn apply(&self, config: &mut Config) {
        if self.no_cache {
            config.use_cache = false;
        }
        if self.no_follow_redirects {
            config.follow_redirects = false;
        }
    }
}
