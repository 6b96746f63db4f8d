use assert_cmd::Command;
use std::fs;
use tempfile::tempdir;

fn reflex() -> Command {
    Command::cargo_bin("reflex").unwrap()
}

#[test]
fn summary_on_empty_database() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("reflex.db");

    let out = reflex()
        .arg("--db")
        .arg(&db)
        .arg("--summary")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "No reaction tests recorded yet.\n"
    );
    assert!(db.exists());
    assert!(dir.path().join("reflex.log").exists());
}

#[test]
fn csv_export_writes_header() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("history.csv");

    reflex()
        .arg("--db")
        .arg(dir.path().join("reflex.db"))
        .arg("--export-csv")
        .arg(&csv)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(csv).unwrap().trim_end(),
        "Date,Time,Test Type,Reaction Time (ms),Success,Attempts"
    );
}

#[test]
fn json_export_has_document_shape() {
    let dir = tempdir().unwrap();
    let json = dir.path().join("history.json");

    reflex()
        .arg("--db")
        .arg(dir.path().join("reflex.db"))
        .arg("--export-json")
        .arg(&json)
        .assert()
        .success();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(json).unwrap()).unwrap();
    assert!(value["exportDate"].is_string());
    assert_eq!(value["testResults"], serde_json::json!([]));
    assert_eq!(value["summary"]["totalTests"], 0);
    assert_eq!(value["statistics"]["version"], "1.0.0");
}

#[test]
fn reset_succeeds() {
    let dir = tempdir().unwrap();
    reflex()
        .arg("--db")
        .arg(dir.path().join("reflex.db"))
        .arg("--reset")
        .assert()
        .success();
}

#[test]
fn interactive_mode_requires_tty() {
    let dir = tempdir().unwrap();
    reflex()
        .arg("--db")
        .arg(dir.path().join("reflex.db"))
        .assert()
        .failure();
}

#[test]
fn unknown_test_type_is_rejected() {
    reflex().args(["-t", "smell"]).assert().failure();
}
