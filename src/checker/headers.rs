// src/checker/headers.rs
// =============================================================================
// Per-URL request headers.
//
// The configuration holds an ordered list of rules. Each rule has a list of
// URL prefixes and a set of headers. For a given link the rules are tried
// top to bottom and the first rule with a matching prefix supplies the
// headers; later rules are never merged in.
//
// Header values may reference environment variables as `${NAME}`. They are
// expanded once when the rules are compiled; unset variables become "".
// =============================================================================

use std::sync::OnceLock;

use regex::{Captures, Regex};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::HeaderRuleConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct HeaderRule {
    prefixes: Vec<String>,
    headers: HeaderMap,
}

/// Ordered header rule table; first match wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderRules {
    rules: Vec<HeaderRule>,
}

impl HeaderRules {
    /// Builds the table, expanding `${ENV}` placeholders and validating every
    /// header name and value.
    pub fn compile(configs: &[HeaderRuleConfig]) -> Result<Self> {
        let mut rules = Vec::with_capacity(configs.len());

        for config in configs {
            let mut headers = HeaderMap::new();
            for (name, value) in &config.headers {
                let header_name =
                    HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                let header_value =
                    HeaderValue::from_str(&expand_env(value)).map_err(|e| Error::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                headers.insert(header_name, header_value);
            }

            rules.push(HeaderRule {
                prefixes: config.url.clone(),
                headers,
            });
        }

        Ok(HeaderRules { rules })
    }

    /// Headers for `url`, or an empty map when no rule matches.
    pub fn for_url(&self, url: &str) -> HeaderMap {
        self.rules
            .iter()
            .find(|rule| rule.prefixes.iter().any(|prefix| url.starts_with(prefix.as_str())))
            .map(|rule| rule.headers.clone())
            .unwrap_or_default()
    }
}

fn env_placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("valid regex"))
}

/// Replaces `${NAME}` with the value of the environment variable `NAME`.
pub fn expand_env(value: &str) -> String {
    env_placeholder()
        .replace_all(value, |caps: &Captures| std::env::var(&caps[1]).unwrap_or_default())
        .into_owned()
}
