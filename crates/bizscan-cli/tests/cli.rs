use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PREFILLED_LINK: &str = "https://docs.google.com/forms/d/e/FORM_ID/viewform?usp=pp_url\
                              &entry.111=congty&entry.222=email&entry.333=xyz";

fn bizscan(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bizscan").unwrap();
    cmd.arg("--config").arg(config).env_remove("GEMINI_API_KEY");
    cmd
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    (dir, config)
}

#[test]
fn test_init_then_show() {
    let (_dir, config) = setup();

    bizscan(&config)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(config.exists());

    bizscan(&config)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    bizscan(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"method\": \"GOOGLE_FORM\""))
        .stdout(predicate::str::contains("\"googleFormMapping\""));
}

#[test]
fn test_parse_link_and_save() {
    let (_dir, config) = setup();

    bizscan(&config)
        .args(["config", "parse-link", PREFILLED_LINK, "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://docs.google.com/forms/d/e/FORM_ID/formResponse",
        ))
        .stdout(predicate::str::contains("entry.333 did not match any field"));

    bizscan(&config)
        .args(["config", "get", "submission.googleFormMapping.companyName"])
        .assert()
        .success()
        .stdout("\"entry.111\"\n");

    bizscan(&config)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("via Google Form"));
}

#[test]
fn test_parse_link_rejects_spreadsheet() {
    let (_dir, config) = setup();

    bizscan(&config)
        .args([
            "config",
            "parse-link",
            "https://docs.google.com/spreadsheets/d/abc/edit",
            "--save",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("spreadsheet link"));
    assert!(!config.exists());
}

#[test]
fn test_validate_rejects_sheet_as_webhook() {
    let (_dir, config) = setup();

    bizscan(&config).args(["config", "use", "webhook"]).assert().success();
    bizscan(&config)
        .args([
            "config",
            "set",
            "submission.webhookUrl",
            "https://docs.google.com/spreadsheets/d/abc/edit",
        ])
        .assert()
        .success();

    bizscan(&config)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("points at a spreadsheet"));
}

#[test]
fn test_webhook_payload_uses_mapping() {
    let (dir, config) = setup();
    let record = dir.path().join("record.json");
    fs::write(
        &record,
        r#"{"companyName":"ABC Co","representativeName":"Nguyen Van A","email":"a@x.com"}"#,
    )
    .unwrap();

    bizscan(&config).args(["config", "use", "webhook"]).assert().success();
    bizscan(&config)
        .args(["config", "set", "submission.webhookMapping.companyName", "company"])
        .assert()
        .success();

    bizscan(&config)
        .arg("payload")
        .arg(&record)
        .assert()
        .success()
        .stdout(
            "{\"company\":\"ABC Co\",\"representativeName\":\"Nguyen Van A\",\"position\":\"\",\
             \"email\":\"a@x.com\",\"phoneNumber\":\"\",\"workerCount\":\"\"}\n",
        )
        .stderr(predicate::str::contains("No destination set for webhook"));
}

#[test]
fn test_form_payload_only_mapped_fields() {
    let (dir, config) = setup();
    let record = dir.path().join("record.json");
    fs::write(&record, r#"{"companyName":"ABC Co","email":"a@x.com","position":"CEO"}"#).unwrap();

    bizscan(&config)
        .args(["config", "parse-link", PREFILLED_LINK, "--save"])
        .assert()
        .success();

    bizscan(&config)
        .arg("payload")
        .arg(&record)
        .assert()
        .success()
        .stdout("entry.111=ABC Co\nentry.222=a@x.com\n")
        .stderr(predicate::str::contains("POST https://docs.google.com/forms/d/e/FORM_ID/formResponse"));
}

#[test]
fn test_apps_script_template() {
    let (_dir, config) = setup();

    bizscan(&config)
        .args(["config", "apps-script"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("function doPost(e) {"))
        .stdout(predicate::str::contains("data[\"workerCount\"]"));
}

#[test]
fn test_extract_missing_file() {
    let (dir, config) = setup();

    bizscan(&config)
        .arg("extract")
        .arg(dir.path().join("missing.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_extract_rejects_non_image() {
    let (dir, config) = setup();
    let file = dir.path().join("card.png");
    fs::write(&file, "not an image").unwrap();

    bizscan(&config)
        .arg("extract")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read image"));
}

#[test]
fn test_scan_requires_terminal_for_review() {
    let (dir, config) = setup();
    let file = dir.path().join("card.png");
    fs::write(&file, "not an image").unwrap();

    bizscan(&config)
        .arg("scan")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_scan_rejects_unknown_field_override() {
    let (dir, config) = setup();
    let file = dir.path().join("card.png");
    fs::write(&file, "not an image").unwrap();

    bizscan(&config)
        .arg("scan")
        .arg(&file)
        .args(["--yes", "--set", "company=ABC"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field 'company'"));
}
