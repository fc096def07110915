use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn kharcha(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kharcha").unwrap();
    cmd.env("HOME", home).env("RUST_LOG", "off");
    cmd
}

/// A fresh HOME with `kharcha init` already run against a data dir inside it.
fn initialized() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    kharcha(home.path())
        .args(["init", "--data-dir", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized kharcha"));
    home
}

#[test]
fn status_before_init() {
    let home = tempfile::tempdir().unwrap();
    kharcha(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}

#[test]
fn commands_require_init() {
    let home = tempfile::tempdir().unwrap();
    kharcha(home.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("kharcha init"));
}

#[test]
fn notify_imports_once() {
    let home = initialized();
    let text = "Rs. 499.00 debited from A/c XX1234 on 05-01-24 to AMAZON";
    let notify = |home: &Path| {
        let mut cmd = kharcha(home);
        cmd.args([
            "notify",
            "--source",
            "VM-HDFCBK",
            "--key",
            "sms-1",
            "--timestamp",
            "1704441600000",
            text,
        ]);
        cmd
    };

    notify(home.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported: -₹499.00 AMAZON [shopping]"));
    // a new process has an empty dedup map; the stored id still guards
    notify(home.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Already stored"));

    kharcha(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  1"));
}

#[test]
fn notify_skips_otp() {
    let home = initialized();
    kharcha(home.path())
        .args([
            "notify",
            "--source",
            "VM-HDFCBK",
            "--key",
            "otp",
            "Your OTP for Rs.5000 transaction is 482913",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped: not a transaction"));
}

#[test]
fn inbox_sync_is_incremental() {
    let home = initialized();
    let inbox = home.path().join("sms.jsonl");
    std::fs::write(
        &inbox,
        concat!(
            r#"{"text":"You paid ₹1,200.50 to Swiggy","timestamp_millis":1704441600000,"source_channel":"VM-HDFCBK","event_key":"1"}"#,
            "\n",
            r#"{"text":"INR 5,000.00 credited to your A/c XX9876 on 03-Jan-24 by UPI ref 401234567890","timestamp_millis":1704441700000,"source_channel":"VM-HDFCBK","event_key":"2"}"#,
            "\n",
            "\n",
            r#"{"text":"Your OTP is 482913","timestamp_millis":1704441800000,"source_channel":"VM-HDFCBK","event_key":"3"}"#,
            "\n",
        ),
    )
    .unwrap();

    kharcha(home.path())
        .args(["inbox", "load", inbox.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 loaded, 0 skipped"));
    kharcha(home.path())
        .args(["inbox", "load", inbox.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 loaded, 3 skipped"));

    kharcha(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("added 2 new transactions from import"))
        .stdout(predicate::str::contains("full scan"));

    kharcha(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("added 0 new transactions from import"))
        .stdout(predicate::str::contains("0 scanned (incremental scan)"));

    kharcha(home.path())
        .args(["sync", "--full"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added 0 new transactions from import"))
        .stdout(predicate::str::contains("3 scanned (full scan), 2 duplicates"));
}

#[test]
fn listen_reads_stdin() {
    let home = initialized();
    let input = concat!(
        r#"{"title":"Ravi paid you ₹250","text":"via GPay","timestamp_millis":1704441600000,"source_channel":"com.google.android.apps.nbu.paisa.user","event_key":"n1"}"#,
        "\n",
        r#"{"title":"Ravi paid you ₹250","text":"via GPay","timestamp_millis":1704441600000,"source_channel":"com.google.android.apps.nbu.paisa.user","event_key":"n1"}"#,
        "\n",
        "not json\n",
    );
    kharcha(home.path())
        .arg("listen")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("added 1 new transactions from import"))
        .stdout(predicate::str::contains("1 malformed"));
}

#[test]
fn rule_changes_recategorize() {
    let home = initialized();
    kharcha(home.path())
        .args([
            "notify",
            "--source",
            "VM-HDFCBK",
            "--key",
            "1",
            "You paid ₹300 to Kamla Stores",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[other]"));

    kharcha(home.path())
        .args(["rules", "add", "kamla", "--category", "groceries", "--priority", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 of 1 matching transactions recategorized)"));

    kharcha(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("groceries"));

    kharcha(home.path())
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kamla"));
}

#[test]
fn rules_reject_unknown_category_and_rule() {
    let home = initialized();
    kharcha(home.path())
        .args(["rules", "add", "chai", "--category", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown category: nope"));
    kharcha(home.path())
        .args(["rules", "delete", "9999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rule with ID 9999"));
}

#[test]
fn manual_add_and_export() {
    let home = initialized();
    kharcha(home.path())
        .args(["add", "--amount", "1,250.00", "--title", "Landlord", "--category", "rent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-₹1,250.00 [rent]"));
    kharcha(home.path())
        .args(["add", "--amount=-5", "--title", "Bad"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid amount"));

    let out = home.path().join("out").join("all.csv");
    kharcha(home.path())
        .args(["export", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 transactions"));
    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("id,date,direction,amount,title,category,counterparty,origin,note"));
    assert!(csv.contains("expense,1250.00,Landlord,rent,,manual,"));
}

#[test]
fn categories_lists_seeded_set() {
    let home = initialized();
    kharcha(home.path())
        .arg("categories")
        .assert()
        .success()
        .stdout(predicate::str::contains("Food & Dining"))
        .stdout(predicate::str::contains("other"));
}

#[test]
fn rule_delete_restores_configured_default() {
    let home = initialized();
    let settings_path = home.path().join(".config").join("kharcha").join("settings.json");
    let mut settings: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&settings_path).unwrap()).unwrap();
    settings["default_category"] = serde_json::json!("transfers");
    std::fs::write(&settings_path, settings.to_string()).unwrap();

    kharcha(home.path())
        .args(["notify", "--source", "VM-HDFCBK", "--key", "1", "You paid ₹300 to Kamla Stores"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[transfers]"));

    let added = kharcha(home.path())
        .args(["rules", "add", "kamla", "--category", "groceries"])
        .assert()
        .success();
    let stdout = String::from_utf8(added.get_output().stdout.clone()).unwrap();
    let id = stdout
        .trim_start_matches("Added rule ")
        .split(':')
        .next()
        .unwrap()
        .to_string();

    kharcha(home.path())
        .args(["rules", "delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 transactions recategorized)"));
    kharcha(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("transfers"))
        .stdout(predicate::str::contains("groceries").not());
}
