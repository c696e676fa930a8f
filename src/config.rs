// src/config.rs
// =============================================================================
// Loads and validates `.link-sentry.toml`.
//
// A missing file is fine (we fall back to scanning the current directory),
// but a file that exists and is empty, malformed, or has out-of-range values
// stops the run before any link is checked.
//
// Example:
//
//   dirs = ["docs"]
//   alive_status_codes = [403]
//   follow_redirects = false
//   modified_files_only = true
//
//   [[http_headers]]
//   url = ["https://api.github.com"]
//   [http_headers.headers]
//   Authorization = "Bearer ${GITHUB_TOKEN}"
//
//   [[replacement_patterns]]
//   pattern = "^/docs"
//   replacement = "https://example.com/docs"
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::checker::HeaderRules;
use crate::error::{Error, Result};
use crate::extract::Rewriter;

pub const DEFAULT_CONFIG_FILE: &str = ".link-sentry.toml";

/// One `[[http_headers]]` table: headers sent to every URL that starts with
/// one of `url`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HeaderRuleConfig {
    pub url: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IgnorePattern {
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReplacementPattern {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
    pub excluded_files: Vec<String>,
    pub excluded_dirs: Vec<String>,
    pub file_extensions: Vec<String>,
    pub base_url: Option<String>,
    pub alive_status_codes: Vec<u16>,
    pub http_headers: Vec<HeaderRuleConfig>,
    pub ignore_patterns: Vec<IgnorePattern>,
    pub replacement_patterns: Vec<ReplacementPattern>,
    pub follow_redirects: bool,
    pub use_cache: bool,
    /// 0 means unbounded
    pub max_cache_size: usize,
    pub batch_size: usize,
    pub retry_count: u32,
    /// Seconds allowed for one request or page load
    pub timeout: u64,
    /// Leave out documents matched by the root `.gitignore`
    pub use_git_ignore: bool,
    /// Only check documents changed by the last commit
    pub modified_files_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            files: Vec::new(),
            dirs: Vec::new(),
            excluded_files: Vec::new(),
            excluded_dirs: Vec::new(),
            file_extensions: vec!["md".to_string()],
            base_url: None,
            alive_status_codes: Vec::new(),
            http_headers: Vec::new(),
            ignore_patterns: Vec::new(),
            replacement_patterns: Vec::new(),
            follow_redirects: true,
            use_cache: true,
            max_cache_size: 0,
            batch_size: 100,
            retry_count: 3,
            timeout: 30,
            use_git_ignore: true,
            modified_files_only: false,
        }
    }
}

impl Config {
    /// Configuration used when no file exists: scan the current directory.
    pub fn fallback() -> Self {
        Config {
            dirs: vec![".".to_string()],
            ..Config::default()
        }
    }

    /// Loads the configuration file at `path`.
    ///
    /// Returns the fallback configuration if the file does not exist. Any
    /// other read failure, an empty file, invalid TOML or a failed
    /// validation is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "configuration file not found, using default configuration");
                return Ok(Self::fallback());
            }
            Err(source) => {
                return Err(Error::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content, path)
    }

    /// Parses and validates configuration text. `origin` is only used in
    /// error messages.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(Error::EmptyConfig {
                path: origin.to_path_buf(),
            });
        }

        let config: Config = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and compiles every pattern and header once so
    /// that mistakes surface before the first document is processed.
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() && self.dirs.is_empty() {
            return Err(Error::InvalidOption(
                "at least one of `files` or `dirs` must be set".to_string(),
            ));
        }
        if self.file_extensions.is_empty() {
            return Err(Error::InvalidOption(
                "`file_extensions` must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidOption("`batch_size` must be at least 1".to_string()));
        }
        if self.retry_count == 0 {
            return Err(Error::InvalidOption("`retry_count` must be at least 1".to_string()));
        }
        if self.timeout == 0 {
            return Err(Error::InvalidOption("`timeout` must be at least 1 second".to_string()));
        }
        if let Some(code) = self
            .alive_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(Error::InvalidOption(format!(
                "`alive_status_codes` contains {code}, which is not an HTTP status code"
            )));
        }

        HeaderRules::compile(&self.http_headers)?;
        Rewriter::from_config(self)?;
        Ok(())
    }

    /// Extensions without a leading dot, lowercased.
    pub fn extensions(&self) -> Vec<String> {
        self.file_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .collect()
    }

    /// Where to look for the configuration when `--config` is not given.
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}
