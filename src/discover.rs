// src/discover.rs
// =============================================================================
// Finds the documents to check.
//
// - every entry of `files` (must exist and have a checked extension)
// - every file under `dirs` with a checked extension, found recursively
// - minus anything under `excluded_files` / `excluded_dirs`
// - minus anything the root `.gitignore` ignores (`use_git_ignore`)
//
// `.git` and `target` directories are never descended into. The result is
// sorted and free of duplicates, so runs are reproducible.
//
// With `modified_files_only`, the list is narrowed further to the files the
// last commit touched (`git diff --name-only HEAD HEAD~1`).
// =============================================================================

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{Error, Result};

const SKIPPED_DIRS: &[&str] = &[".git", "target"];

// "./docs/../docs/a.md" and "docs/a.md" should compare equal
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

// Rules of `<root>/.gitignore`, if there is one that parses.
fn gitignore(root: &Path) -> Option<Gitignore> {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    if let Some(e) = builder.add(&path) {
        warn!(error = %e, "some .gitignore rules were not understood");
    }
    match builder.build() {
        Ok(rules) => Some(rules),
        Err(e) => {
            warn!(error = %e, "cannot use .gitignore");
            None
        }
    }
}

fn is_git_ignored(rules: &Gitignore, root: &Path, document: &Path) -> bool {
    let relative = document.strip_prefix(root).unwrap_or(document);
    !relative.has_root() && rules.matched_path_or_any_parents(relative, false).is_ignore()
}

/// Documents selected by `config`, with `files` and `dirs` taken relative
/// to `root`.
pub fn discover(config: &Config, root: &Path) -> Vec<PathBuf> {
    let extensions = config.extensions();
    let excluded: Vec<PathBuf> = config
        .excluded_files
        .iter()
        .chain(&config.excluded_dirs)
        .map(|path| normalize(&root.join(path)))
        .collect();

    let mut documents = BTreeSet::new();

    for file in &config.files {
        let path = root.join(file);
        if !path.is_file() {
            warn!(file = %file, "configured file does not exist");
        } else if !has_extension(&path, &extensions) {
            warn!(file = %file, "configured file does not have a checked extension");
        } else {
            documents.insert(normalize(&path));
        }
    }

    for dir in &config.dirs {
        let path = root.join(dir);
        if !path.is_dir() {
            warn!(dir = %dir, "configured directory does not exist");
            continue;
        }

        let found = WalkDir::new(&path)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), &extensions))
            .map(|entry| normalize(entry.path()));
        documents.extend(found);
    }

    let ignored = config.use_git_ignore.then(|| gitignore(root)).flatten();
    let normalized_root = normalize(root);

    let documents: Vec<PathBuf> = documents
        .into_iter()
        .filter(|document| !excluded.iter().any(|prefix| document.starts_with(prefix)))
        .filter(|document| {
            ignored
                .as_ref()
                .map_or(true, |rules| !is_git_ignored(rules, &normalized_root, document))
        })
        .collect();
    debug!(count = documents.len(), "documents discovered");
    documents
}

// One path per line, as git prints them
fn parse_changed(output: &str) -> BTreeSet<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| normalize(Path::new(line)))
        .collect()
}

/// Files changed by the last commit of the repository at `root`.
pub fn changed_in_last_commit(root: &Path) -> Result<BTreeSet<PathBuf>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["diff", "--name-only", "HEAD", "HEAD~1"])
        .output()
        .map_err(|e| Error::Git(format!("cannot run git: {e}")))?;
    if !output.status.success() {
        return Err(Error::Git(format!(
            "git diff failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(parse_changed(&String::from_utf8_lossy(&output.stdout)))
}

/// Keeps the documents whose path below `root` is in `changed`.
pub fn only_changed(documents: Vec<PathBuf>, root: &Path, changed: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    let root = normalize(root);
    documents
        .into_iter()
        .filter(|document| changed.contains(document.strip_prefix(&root).unwrap_or(document)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, path: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# Title\n").unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for path in [
            "README.md",
            "CHANGELOG.MD",
            "notes.txt",
            "docs/guide.md",
            "docs/old/legacy.md",
            "docs/api/index.markdown",
            ".git/info.md",
            "target/doc/generated.md",
        ] {
            touch(dir.path(), path);
        }
        dir
    }

    fn relative(root: &Path, documents: Vec<PathBuf>) -> Vec<String> {
        documents
            .iter()
            .map(|d| d.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walks_dirs_and_skips_build_output() {
        let dir = tree();
        let found = relative(dir.path(), discover(&Config::fallback(), dir.path()));
        assert_eq!(found, vec!["CHANGELOG.MD", "README.md", "docs/guide.md", "docs/old/legacy.md"]);
    }

    #[test]
    fn test_exclusions_and_extensions() {
        let dir = tree();
        let config = Config {
            dirs: vec!["./docs".to_string()],
            excluded_dirs: vec!["./docs/old".to_string()],
            file_extensions: vec![".md".to_string(), "markdown".to_string()],
            ..Config::default()
        };
        let found = relative(dir.path(), discover(&config, dir.path()));
        assert_eq!(found, vec!["docs/api/index.markdown", "docs/guide.md"]);
    }

    #[test]
    fn test_explicit_files_are_checked_and_deduplicated() {
        let dir = tree();
        let config = Config {
            files: vec![
                "README.md".to_string(),
                "./README.md".to_string(),
                "notes.txt".to_string(),
                "missing.md".to_string(),
            ],
            dirs: vec!["docs".to_string()],
            excluded_files: vec!["docs/guide.md".to_string()],
            ..Config::default()
        };
        let found = relative(dir.path(), discover(&config, dir.path()));
        assert_eq!(found, vec!["README.md", "docs/old/legacy.md"]);
    }

    #[test]
    fn test_gitignore_is_honored() {
        let dir = tree();
        fs::write(dir.path().join(".gitignore"), "docs/old/\n/CHANGELOG.MD\n").unwrap();

        let found = relative(dir.path(), discover(&Config::fallback(), dir.path()));
        assert_eq!(found, vec!["README.md", "docs/guide.md"]);

        let config = Config {
            use_git_ignore: false,
            ..Config::fallback()
        };
        let found = relative(dir.path(), discover(&config, dir.path()));
        assert_eq!(found, vec!["CHANGELOG.MD", "README.md", "docs/guide.md", "docs/old/legacy.md"]);
    }

    #[test]
    fn test_only_changed_documents_are_kept() {
        let dir = tree();
        let documents = discover(&Config::fallback(), dir.path());
        let changed = parse_changed("README.md\nsrc/main.rs\n\n./docs/old/legacy.md\n");

        let kept = relative(dir.path(), only_changed(documents, dir.path(), &changed));
        assert_eq!(kept, vec!["README.md", "docs/old/legacy.md"]);
    }

    #[test]
    fn test_changed_files_outside_a_repository_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = changed_in_last_commit(dir.path());
        assert!(matches!(result, Err(Error::Git(_))));
    }
}
