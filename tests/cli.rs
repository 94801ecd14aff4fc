use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("changelog").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?}");
}

/// A workspace with one git project `demo` and a config pointing at it.
fn workspace(sendmail: &str) -> TempDir {
    let tmp = TempDir::new().expect("create temp dir");
    let demo = tmp.path().join("demo");
    fs::create_dir_all(&demo).expect("create project dir");
    git(&demo, &["init", "-q"]);
    git(&demo, &["commit", "-q", "--allow-empty", "-m", "first commit"]);

    fs::write(
        tmp.path().join("changelog.toml"),
        format!(
            r#"
from = "build@example.com"
subject = "Demo changes for {{revisions}}"
link_base = "https://example.com"
sendmail = ["sh", "-c", {sendmail:?}]

[[project]]
name = "platform/demo"
path = "demo"
"#
        ),
    )
    .expect("write config");
    tmp
}

#[test]
fn malformed_subscribers_fail_the_run() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("subscribers.json"), r#"{"a@x.com": "demo"}"#).unwrap();

    cmd(tmp.path())
        .args(["--list", "subscribers.json"])
        .assert()
        .failure()
        .stderr(contains("malformed subscription data"));
}

#[test]
fn unknown_project_is_reported() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("external/zlib")
        .assert()
        .failure()
        .stderr(contains("project 'external/zlib' not found"));
}

#[test]
fn nothing_to_do_exits_cleanly() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("subscribers.json"), r#"{"a@x.com": ["all"]}"#).unwrap();

    cmd(tmp.path())
        .args(["--list", "subscribers.json"])
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn without_subscribers_changes_are_printed() {
    let tmp = workspace("exit 1");

    cmd(tmp.path())
        .assert()
        .success()
        .stdout(contains(
            "<h2>Project: <a href='https://example.com/platform/demo'>demo</a></h2>",
        ))
        .stdout(contains("first commit</li>"))
        .stdout(contains("Sending email").not());
}

#[cfg(unix)]
#[test]
fn digests_are_mailed_to_subscribers() {
    let tmp = workspace(r#"cat > "$MAIL_DIR/$1.eml""#);
    let mail_dir = tmp.path().join("mail");
    fs::create_dir_all(&mail_dir).unwrap();
    fs::write(
        tmp.path().join("subscribers.json"),
        r#"{"a@example.com": ["demo"], "b@example.com": ["all"], "c@example.com": ["other"]}"#,
    )
    .unwrap();

    cmd(tmp.path())
        .env("MAIL_DIR", &mail_dir)
        .args(["--list", "subscribers.json"])
        .assert()
        .success()
        .stdout(contains(
            "<h2>Project: <a href='https://example.com/platform/demo'>demo</a></h2>",
        ))
        .stdout(contains("Sending email to a@example.com ..."))
        .stdout(contains("Sending email to b@example.com ..."));

    for to in ["a@example.com", "b@example.com"] {
        let mail = fs::read_to_string(mail_dir.join(format!("{to}.eml"))).unwrap();
        assert!(mail.contains(&format!("To: {to}\n")));
        assert!(mail.contains("Subject: Demo changes for HEAD\n"));
        assert!(mail.contains("Content-Type: text/html"));
        assert!(mail.contains("first commit</li></br>\n"));
    }
    assert!(!mail_dir.join("c@example.com.eml").exists());
}

#[cfg(unix)]
#[test]
fn rejected_mail_sets_exit_status() {
    let tmp = workspace("cat > /dev/null; exit 75");
    fs::write(
        tmp.path().join("subscribers.json"),
        r#"{"a@example.com": ["demo"], "b@example.com": ["all"]}"#,
    )
    .unwrap();

    cmd(tmp.path())
        .args(["--list", "subscribers.json"])
        .assert()
        .code(2)
        .stdout(contains("FAILED"));
}

#[cfg(unix)]
#[test]
fn bad_revision_is_not_fatal() {
    let tmp = workspace("cat > /dev/null");
    fs::write(tmp.path().join("subscribers.json"), r#"{"a@example.com": ["all"]}"#).unwrap();

    cmd(tmp.path())
        .args(["--list", "subscribers.json", "--revisions", "no-such-ref"])
        .assert()
        .success()
        .stderr(contains("no-such-ref"))
        .stdout(contains("Sending email").not());
}
