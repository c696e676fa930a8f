// src/link.rs
// =============================================================================
// The two data types that flow through the whole program:
//
// - LinkNode:   one link reference found in a document (as written)
// - LinkStatus: the verification outcome for a link, later copied onto
//               every occurrence of that link by the reconciler
//
// Both derive Serialize so the report layer can dump them as JSON directly.
// =============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

/// Message attached to every `mailto:` link.
pub const EMAIL_NOT_CHECKED: &str = "Email links are not checked";

/// A location inside a document (1-based line and column, 0-based byte offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Start and end of a link in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: Point,
    pub end: Point,
}

/// What kind of markup produced a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Hyperlink,
    Definition,
    Image,
    InternalReference,
    ExternalReference,
}

/// One link reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub url: String,
    pub kind: NodeKind,
    /// None for synthetic or malformed references
    pub position: Option<Position>,
    pub title: Option<String>,
}

impl LinkNode {
    pub fn new(url: impl Into<String>, kind: NodeKind, position: Option<Position>) -> Self {
        LinkNode {
            url: url.into(),
            kind,
            position,
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.is_empty());
        self
    }

    pub fn is_mailto(&self) -> bool {
        is_mailto(&self.url)
    }

    /// Line of the start position, if the parser recorded one.
    pub fn line_number(&self) -> Option<usize> {
        self.position.map(|p| p.start.line)
    }
}

pub fn is_mailto(url: &str) -> bool {
    url.starts_with("mailto:")
}

/// Where a link points, which decides who checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Email,
    /// http or https URL
    Remote,
    /// file path and/or #fragment, relative to the document
    Local,
    /// any other scheme (tel:, ftp:, data:, ...)
    Unsupported,
}

pub fn target_of(url: &str) -> Target {
    if is_mailto(url) {
        return Target::Email;
    }
    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => Target::Remote,
            // a Windows drive letter parses as a one-letter scheme
            scheme if scheme.len() == 1 => Target::Local,
            _ => Target::Unsupported,
        },
        Err(_) => Target::Local,
    }
}

pub fn is_remote(url: &str) -> bool {
    target_of(url) == Target::Remote
}

/// Verification outcome of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "alive")]
    Alive,
    #[serde(rename = "assumed alive")]
    AssumedAlive,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "skipped")]
    Skipped,
}

/// The result of checking one link.
///
/// `status` is `None` only while a check is pending; the engine never hands
/// out a pending status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub link: String,
    pub status: Option<Status>,
    pub status_code: Option<u16>,
    pub line_number: Option<usize>,
    pub position: Option<Position>,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
}

impl LinkStatus {
    /// Placeholder for a node that has not been checked yet.
    pub fn pending(node: &LinkNode) -> Self {
        LinkStatus {
            link: node.url.clone(),
            status: None,
            status_code: None,
            line_number: node.line_number(),
            position: node.position,
            error_message: None,
            title: node.title.clone(),
        }
    }

    pub fn resolve(mut self, status: Status, code: Option<u16>, message: Option<String>) -> Self {
        self.status = Some(status);
        self.status_code = code;
        self.error_message = message;
        self
    }

    pub fn alive(node: &LinkNode, code: u16) -> Self {
        Self::pending(node).resolve(Status::Alive, Some(code), None)
    }

    pub fn error(node: &LinkNode, code: Option<u16>, message: impl Into<String>) -> Self {
        Self::pending(node).resolve(Status::Error, code, Some(message.into()))
    }

    pub fn skipped(node: &LinkNode, code: Option<u16>, message: impl Into<String>) -> Self {
        Self::pending(node).resolve(Status::Skipped, code, Some(message.into()))
    }

    /// The fixed outcome for `mailto:` links.
    pub fn email(node: &LinkNode) -> Self {
        Self::skipped(node, Some(200), EMAIL_NOT_CHECKED)
    }

    /// Copy of this status placed at another occurrence of the same link.
    pub fn at(&self, node: &LinkNode) -> Self {
        LinkStatus {
            line_number: node.line_number(),
            position: node.position,
            title: node.title.clone(),
            ..self.clone()
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(Status::Error)
    }
}
