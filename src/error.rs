// src/error.rs
// =============================================================================
// Errors that stop the whole run.
//
// Individual link failures are never errors in this sense - they become an
// `error` LinkStatus and the run continues. Only problems with the
// configuration (and reading a document, which the engine downgrades to a
// warning) live here.
// =============================================================================

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration file exists but could not be read.
    #[error("cannot read configuration file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid configuration file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The configuration file has no content at all.
    #[error("the configuration file {} is empty", path.display())]
    EmptyConfig { path: PathBuf },

    /// An ignore or replacement pattern is not a valid regular expression.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// A configured HTTP header cannot be sent.
    #[error("invalid HTTP header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// A value is out of range or options contradict each other.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A document could not be read.
    #[error("cannot read {}: {source}", path.display())]
    DocumentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `git` could not tell which files the last commit changed.
    #[error("cannot list modified files: {0}")]
    Git(String),

    /// The HTTP client could not be created.
    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
