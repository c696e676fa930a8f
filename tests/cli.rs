use std::path::Path;
use std::process::{Command, Output};

fn link_sentry(fixture: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_link-sentry"))
        .current_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(fixture))
        .env_remove("LINK_SENTRY_LOG")
        .arg("check")
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_valid_links_exit_zero() {
    let output = link_sentry("valid", &[]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stdout: {}\nstderr: {}",
        stdout(&output),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("are valid"));
}

#[test]
fn test_json_report_lists_every_occurrence() {
    let output = link_sentry("valid", &["--format", "json"]);
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let files = report.as_array().unwrap();
    assert_eq!(files.len(), 2);

    let readme = files.iter().find(|f| f["file"] == "README.md").unwrap();
    let results = readme["result"].as_array().unwrap();
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r["status"] != "error"));

    let email = results.iter().find(|r| r["link"] == "mailto:maintainers@example.com").unwrap();
    assert_eq!(email["status"], "skipped");
    assert_eq!(email["status_code"], 200);

    // sorted by position
    let lines: Vec<u64> = results.iter().map(|r| r["line_number"].as_u64().unwrap()).collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[test]
fn test_broken_links_exit_one() {
    let output = link_sentry("broken", &[]);
    assert_eq!(output.status.code(), Some(1));

    let text = stdout(&output);
    assert!(text.contains("README.md:3:3: nowhere.md  404  Cannot find: nowhere.md."), "{text}");
    assert!(text.contains("Cannot find section: not-here"), "{text}");
    assert!(text.contains("Cannot find Line 40 in file: short.txt. The file has 3 lines."), "{text}");
    assert!(text.contains("3 broken link(s) out of 4"), "{text}");
}

#[test]
fn test_asciidoc_documents() {
    let output = link_sentry("asciidoc", &[]);
    assert_eq!(output.status.code(), Some(1));

    let text = stdout(&output);
    assert!(
        text.contains("index.adoc:11:5: #missing-section  404  Cannot find section: missing-section"),
        "{text}"
    );
    assert!(text.contains("Cannot find section: _uninstalling in file: setup.adoc#_uninstalling."), "{text}");
    assert!(text.contains("2 broken link(s) out of 7 in 3 document(s)"), "{text}");
}

#[test]
fn test_rdjson_report() {
    let output = link_sentry("broken", &["--format", "rdjson"]);
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["source"]["name"], "link-sentry");
    assert_eq!(report["severity"], "ERROR");
    let diagnostics = report["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 3);
    assert!(diagnostics.iter().all(|d| d["location"]["path"] == "README.md"));
}

#[test]
fn test_empty_config_is_fatal() {
    let output = link_sentry("empty-config", &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("is empty"));
}

#[test]
fn test_missing_config_falls_back_to_current_directory() {
    let output = link_sentry("broken", &["--config", "nope.toml"]);
    assert_eq!(output.status.code(), Some(1));
}
