// src/report.rs
// =============================================================================
// Prints check results.
//
// Formats:
// - text:   one line per broken link (`file:line:col: link  code  message`)
//           followed by a summary; easy to read and to grep
// - json:   `[{"file": ..., "result": [LinkStatus, ...]}, ...]`
// - rdjson: Reviewdog Diagnostic Format, one diagnostic per broken link,
//           for posting review comments from CI
//
// Text and json are written as soon as each document is done. rdjson is a
// single object whose top-level severity depends on whether anything broke,
// so its diagnostics are collected and written by `finish`.
// =============================================================================

use std::io::{self, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

use crate::checker::DocumentReport;
use crate::link::{LinkStatus, Status};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
    Rdjson,
}

/// Totals over the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub documents: usize,
    pub links: usize,
    pub errors: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
struct FileResult<'a> {
    file: String,
    result: &'a [LinkStatus],
}

#[derive(Debug, Serialize)]
struct RdSource {
    name: &'static str,
}

const SOURCE: RdSource = RdSource { name: "link-sentry" };

#[derive(Debug, Serialize)]
struct RdPoint {
    line: usize,
    column: usize,
}

#[derive(Debug, Serialize)]
struct RdRange {
    start: RdPoint,
    end: RdPoint,
}

#[derive(Debug, Serialize)]
struct RdLocation {
    path: String,
    range: RdRange,
}

#[derive(Debug, Serialize)]
struct RdCode {
    value: String,
}

#[derive(Debug, Serialize)]
struct Diagnostic {
    message: String,
    location: RdLocation,
    severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<RdCode>,
}

#[derive(Debug, Serialize)]
struct RdJson<'a> {
    source: RdSource,
    severity: &'static str,
    diagnostics: &'a [Diagnostic],
}

fn display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// Links without a position still get a diagnostic, pinned to the top of the file
fn diagnostic(file: &str, status: &LinkStatus) -> Diagnostic {
    let code = status
        .status_code
        .map_or_else(|| "unknown".to_string(), |code| code.to_string());
    let mut message = format!("Cannot reach {} Status: {}", status.link, code);
    if let Some(detail) = &status.error_message {
        message.push(' ');
        message.push_str(detail);
    }

    let range = match status.position {
        Some(position) => RdRange {
            start: RdPoint {
                line: status.line_number.unwrap_or(position.start.line).max(1),
                column: position.start.column.max(1),
            },
            end: RdPoint {
                line: position.end.line.max(1),
                column: position.end.column.max(1),
            },
        },
        None => {
            message.push_str(" (malformed link)");
            RdRange {
                start: RdPoint { line: 1, column: 1 },
                end: RdPoint { line: 1, column: 1 },
            }
        }
    };

    Diagnostic {
        message,
        location: RdLocation {
            path: file.to_string(),
            range,
        },
        severity: "ERROR",
        code: status.status_code.map(|code| RdCode { value: code.to_string() }),
    }
}

/// Writes reports in one format, document by document.
pub struct Reporter<W: Write> {
    out: W,
    format: Format,
    summary: Summary,
    diagnostics: Vec<Diagnostic>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: Format) -> Self {
        Reporter {
            out,
            format,
            summary: Summary::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Writes (or, for rdjson, records) the results of one document.
    pub fn document(&mut self, report: &DocumentReport) -> io::Result<()> {
        let file = display(&report.document);
        let errors: Vec<&LinkStatus> = report.results.iter().filter(|r| r.is_error()).collect();

        match self.format {
            Format::Text => {
                for status in &errors {
                    let (line, column) = status
                        .position
                        .map(|p| (p.start.line, p.start.column))
                        .unwrap_or((status.line_number.unwrap_or(1), 1));
                    let code = status.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
                    writeln!(
                        self.out,
                        "{}:{}:{}: {}  {}  {}",
                        file,
                        line,
                        column,
                        status.link,
                        code,
                        status.error_message.as_deref().unwrap_or("")
                    )?;
                }
            }
            Format::Json => {
                let separator = if self.summary.documents == 0 { "[\n" } else { ",\n" };
                let entry = FileResult {
                    file: file.clone(),
                    result: &report.results,
                };
                write!(self.out, "{}{}", separator, serde_json::to_string_pretty(&entry)?)?;
            }
            Format::Rdjson => {
                self.diagnostics.extend(errors.iter().map(|status| diagnostic(&file, status)));
            }
        }

        self.summary.documents += 1;
        self.summary.links += report.results.len();
        self.summary.errors += errors.len();
        self.summary.skipped += report
            .results
            .iter()
            .filter(|r| r.status == Some(Status::Skipped))
            .count();
        Ok(())
    }

    /// Closes the output and returns the totals.
    pub fn finish(mut self) -> io::Result<Summary> {
        let summary = self.summary;
        match self.format {
            Format::Text => {
                if summary.errors == 0 {
                    writeln!(
                        self.out,
                        "✅ All {} link(s) in {} document(s) are valid ({} skipped)",
                        summary.links, summary.documents, summary.skipped
                    )?;
                } else {
                    writeln!(
                        self.out,
                        "❌ {} broken link(s) out of {} in {} document(s) ({} skipped)",
                        summary.errors, summary.links, summary.documents, summary.skipped
                    )?;
                }
            }
            Format::Json => {
                let opening = if summary.documents == 0 { "[" } else { "" };
                writeln!(self.out, "{}\n]", opening)?;
            }
            Format::Rdjson => {
                let rdjson = RdJson {
                    source: SOURCE,
                    severity: if summary.errors > 0 { "ERROR" } else { "INFO" },
                    diagnostics: &self.diagnostics,
                };
                writeln!(self.out, "{}", serde_json::to_string_pretty(&rdjson)?)?;
            }
        }
        self.out.flush()?;
        Ok(summary)
    }
}
