//! Command-line interface: compile, select and pseudo

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn opti_query(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_opti-query"))
        .args(args)
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn setup_site() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::write(
        dir.path().join("index.html"),
        r#"<html><body>
<div id="x" style="display:none">hi</div>
<div id="y">bye</div>
</body></html>"#,
    )
    .unwrap();

    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(
        dir.path().join("nested").join("about.htm"),
        r#"<div id="z" class="card">about</div>"#,
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "<div id=\"ignored\"></div>").unwrap();

    dir
}

#[test]
fn test_help_lists_commands() {
    let output = opti_query(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("compile"));
    assert!(stdout.contains("select"));
    assert!(stdout.contains("pseudo"));
}

#[test]
fn test_compile_json() {
    let output = opti_query(&["compile", "div:hidden", "--json"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["base"], "div");
    assert_eq!(value["predicates"][0]["fragment"], "div");
    assert_eq!(value["predicates"][0]["bag"]["hidden"], true);
}

#[test]
fn test_compile_prints_anchor_of_outer_compound() {
    let output = opti_query(&["compile", "div:hidden p"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("div p"));
    assert!(stdout.contains("[0.0]"));
}

#[test]
fn test_compile_text() {
    let output = opti_query(&["compile", "li:this-nth-child(2)"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("base: li"));
    assert!(stdout.contains("\"thisnthchild\":2"));
}

#[test]
fn test_compile_malformed_fails() {
    let output = opti_query(&["compile", "div:style(color=red"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed query"));
}

#[test]
fn test_select_single_file() {
    let site = setup_site();
    let file = site.path().join("index.html");

    let output = opti_query(&["select", file.to_str().unwrap(), "div:visible"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("div#y"));
    assert!(!stdout.contains("div#x"));
    assert!(stdout.contains("1 match(es) in 1 document(s)"));
}

#[test]
fn test_select_walks_directory_json() {
    let site = setup_site();

    let output = opti_query(&["select", site.path().to_str().unwrap(), "div", "--json"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<_> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["x", "y", "z"]);
}

#[test]
fn test_select_first_with_config() {
    let site = setup_site();
    fs::write(
        site.path().join("opti.toml"),
        "[[events]]\nselector = \"#y\"\nnames = [\"click\"]\n",
    )
    .unwrap();

    let output = opti_query(&[
        "select",
        site.path().join("index.html").to_str().unwrap(),
        "div:event(click)",
        "--first",
        "--config",
        site.path().join("opti.toml").to_str().unwrap(),
        "--json",
    ]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["id"], "y");
    assert_eq!(value[0]["text"], "bye");
}

#[test]
fn test_pseudo_lists_grammar() {
    let output = opti_query(&["pseudo"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [":hidden", ":visible", ":hasText", ":this-nth-child", ":event"] {
        assert!(stdout.contains(name), "missing {name}");
    }
}
