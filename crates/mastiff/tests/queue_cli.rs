//! End-to-end runs of the `mastiff` binary.
//!
//! `/bin/sh` stands in for the analysis engine. It appends its arguments to
//! the file named by `MASTIFF_CALLS` and fails for files ending in `.bad`.
#![cfg(unix)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use shared::JobQueue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const ENGINE_SCRIPT: &str = r#"printf "%s\n" "$*" >> "$MASTIFF_CALLS"
for f; do :; done
case "$f" in *.bad) exit 3;; esac"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self::with_policy("continue")
    }

    fn with_policy(policy: &str) -> Self {
        Self::with_queue_settings(&format!("on_failure = \"{}\"", policy))
    }

    fn with_queue_settings(queue: &str) -> Self {
        let ws = Self {
            dir: TempDir::new().unwrap(),
        };
        ws.write_config("mastiff.toml", queue);
        ws
    }

    /// Write a config whose `[queue]` table holds `queue`
    fn write_config(&self, name: &str, queue: &str) -> PathBuf {
        let config = format!(
            r#"[queue]
{queue}

[logging]
console = false

[engine]
program = "/bin/sh"
args = ['-c', '''{script}''', 'engine']
"#,
            queue = queue,
            script = ENGINE_SCRIPT
        );
        let path = self.dir.path().join(name);
        std::fs::write(&path, config).unwrap();
        path
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("mastiff.toml")
    }

    fn queue_db(&self) -> PathBuf {
        self.dir.path().join("mastiff.queue.db")
    }

    fn calls_log(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        let path = self.dir.path().join("samples").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"MZ").unwrap();
        path
    }

    fn cmd_with(&self, config: &Path) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("mastiff");
        cmd.env("MASTIFF_CALLS", self.calls_log())
            .env_remove("RUST_LOG")
            .arg("--conf")
            .arg(config);
        cmd
    }

    fn cmd(&self) -> assert_cmd::Command {
        self.cmd_with(&self.config())
    }

    /// Argument lines the fake engine received, in order
    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.calls_log())
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Files the fake engine was asked to analyze, in order
    fn analyzed(&self) -> Vec<PathBuf> {
        self.calls()
            .iter()
            .filter_map(|line| line.rsplit(' ').next().map(PathBuf::from))
            .collect()
    }

    fn queued(&self) -> Vec<PathBuf> {
        JobQueue::open(self.queue_db(), Duration::from_secs(1))
            .unwrap()
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect()
    }
}

#[test]
fn no_submission_and_no_mode_is_usage_error() {
    let ws = Workspace::new();

    ws.cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("FILE or DIRECTORY"))
        .stdout(predicate::str::contains("Queue Options"));

    assert!(!ws.queue_db().exists());
    assert!(ws.calls().is_empty());
}

#[test]
fn append_only_without_submission_is_usage_error() {
    let ws = Workspace::new();

    ws.cmd().arg("--append-queue").assert().code(1);
    assert!(!ws.queue_db().exists());
}

#[test]
fn invalid_submission_exits_one_without_queue_change() {
    let ws = Workspace::new();
    let f = ws.file("first.exe");

    ws.cmd().arg("--append-queue").arg(&f).assert().success();
    assert_eq!(ws.queued().len(), 1);

    ws.cmd()
        .arg(ws.dir.path().join("does-not-exist"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("neither a file nor a directory"));

    assert_eq!(ws.queued(), vec![f]);
    assert!(ws.calls().is_empty());
}

#[test]
fn append_only_then_list_then_resume() {
    let ws = Workspace::new();
    let f = ws.file("sample.exe");

    ws.cmd().arg("--append-queue").arg(&f).assert().success();
    assert!(ws.calls().is_empty());

    ws.cmd()
        .arg("--list-queue")
        .assert()
        .success()
        .stdout(predicate::str::contains(f.display().to_string()));

    ws.cmd().arg("--resume-queue").assert().success();
    assert_eq!(ws.analyzed(), vec![f]);
    assert!(ws.queued().is_empty());

    ws.cmd()
        .arg("--list-queue")
        .assert()
        .success()
        .stdout(predicate::str::contains("Job queue is empty."));
}

#[test]
fn fifo_order_across_invocations() {
    let ws = Workspace::new();
    let a = ws.file("a.exe");
    let b = ws.file("b.exe");
    let c = ws.file("c.exe");

    for f in [&c, &a, &b] {
        ws.cmd().arg("--append-queue").arg(f).assert().success();
    }
    ws.cmd().arg("--resume-queue").assert().success();

    assert_eq!(ws.analyzed(), vec![c, a, b]);
}

#[test]
fn directory_submission_is_drained_with_directives() {
    let ws = Workspace::new();
    let files = vec![ws.file("a"), ws.file("b/c"), ws.file("b/d")];

    ws.cmd()
        .args(["--type", "PDF", "--plugin", "pdf-id", "-o", "Dir.log_dir=/tmp/out"])
        .arg(ws.dir.path().join("samples"))
        .assert()
        .success();

    let mut analyzed = ws.analyzed();
    analyzed.sort();
    assert_eq!(analyzed, files);

    for call in ws.calls() {
        assert!(call.contains("--type PDF"), "{}", call);
        assert!(call.contains("--plugin pdf-id"), "{}", call);
        assert!(call.contains("--option Dir.log_dir=/tmp/out"), "{}", call);
        assert!(call.contains(&format!("--conf {}", ws.config().display())), "{}", call);
    }
    assert!(ws.queued().is_empty());
}

#[test]
fn ignore_queue_bypasses_the_store() {
    let ws = Workspace::new();
    let queued = ws.file("queued.exe");
    let direct = ws.file("direct.exe");

    ws.cmd().arg("--append-queue").arg(&queued).assert().success();

    ws.cmd().arg("--ignore-queue").arg(&direct).assert().success();

    assert_eq!(ws.analyzed(), vec![direct]);
    assert_eq!(ws.queued(), vec![queued]);
}

#[test]
fn ignore_queue_without_submission_is_usage_error() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["--ignore-queue", "--resume-queue"])
        .assert()
        .code(1);
    assert!(ws.calls().is_empty());
}

#[test]
fn clear_queue_is_idempotent_and_ignores_submission() {
    let ws = Workspace::new();
    let f = ws.file("sample.exe");

    ws.cmd().arg("--append-queue").arg(&f).assert().success();
    ws.cmd().arg("--clear-queue").arg(&f).assert().success();
    assert!(ws.queued().is_empty());

    ws.cmd().arg("--clear-queue").assert().success();
    assert!(ws.queued().is_empty());
    assert!(ws.calls().is_empty());
}

#[test]
fn list_plugins_does_not_touch_queue() {
    let ws = Workspace::new();
    let f = ws.file("sample.exe");

    ws.cmd()
        .args(["--list", "cat", "--clear-queue"])
        .arg(&f)
        .assert()
        .success();

    let calls = ws.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].ends_with("--list cat"), "{}", calls[0]);
    assert!(!ws.queue_db().exists());
}

#[test]
fn failed_analysis_continues_by_default() {
    let ws = Workspace::new();
    let good = ws.file("1-good.exe");
    let bad = ws.file("2-broken.bad");
    let later = ws.file("3-later.exe");

    for f in [&good, &bad, &later] {
        ws.cmd().arg("--append-queue").arg(f).assert().success();
    }
    ws.cmd().arg("--resume-queue").assert().success();

    assert_eq!(ws.analyzed(), vec![good, bad, later]);
    assert!(ws.queued().is_empty());
}

#[test]
fn failed_analysis_aborts_when_configured() {
    let ws = Workspace::with_policy("abort");
    let good = ws.file("1-good.exe");
    let bad = ws.file("2-broken.bad");
    let later = ws.file("3-later.exe");

    for f in [&good, &bad, &later] {
        ws.cmd().arg("--append-queue").arg(f).assert().success();
    }
    ws.cmd()
        .arg("--resume-queue")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 jobs left"));

    assert_eq!(ws.analyzed(), vec![good, bad]);
    assert_eq!(ws.queued(), vec![later]);
}

#[test]
fn queue_lock_fails_the_run_without_dispatch() {
    let ws = Workspace::with_queue_settings("busy_timeout_ms = 50");
    let queued = ws.file("a.exe");
    ws.cmd().arg("--append-queue").arg(&queued).assert().success();

    let lock = rusqlite::Connection::open(ws.queue_db()).unwrap();
    lock.execute_batch("BEGIN EXCLUSIVE").unwrap();

    ws.cmd()
        .arg("--append-queue")
        .arg(ws.file("b.exe"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("job queue"));
    ws.cmd().arg("--resume-queue").assert().code(1);
    assert!(ws.calls().is_empty());

    lock.execute_batch("ROLLBACK").unwrap();
    drop(lock);

    assert_eq!(ws.queued(), vec![queued]);
}

#[test]
fn non_utf8_file_names_are_queued_and_drained() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let ws = Workspace::new();
    let latin1 = ws.file(OsStr::from_bytes(b"caf\xe9.exe"));
    let ok = ws.file("ok.exe");

    ws.cmd()
        .arg("--append-queue")
        .arg(ws.dir.path().join("samples"))
        .assert()
        .success();
    assert_eq!(ws.queued(), vec![latin1.clone(), ok.clone()]);

    ws.cmd().arg("--resume-queue").assert().success();
    assert!(ws.queued().is_empty());

    let calls = std::fs::read(ws.calls_log()).unwrap();
    let calls: Vec<&[u8]> = calls
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .collect();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].ends_with(latin1.as_os_str().as_bytes()));
    assert!(calls[1].ends_with(ok.as_os_str().as_bytes()));
}

#[test]
fn distinct_configs_have_distinct_queues() {
    let ws = Workspace::new();
    let other = ws.write_config("other.toml", "on_failure = \"continue\"");
    let f = ws.file("sample.exe");

    ws.cmd().arg("--append-queue").arg(&f).assert().success();

    ws.cmd_with(&other)
        .arg("--list-queue")
        .assert()
        .success()
        .stdout(predicate::str::contains("Job queue is empty."));

    assert!(ws.dir.path().join("other.queue.db").exists());
    assert_eq!(ws.queued(), vec![f]);
}

#[test]
fn malformed_override_is_rejected_by_parser() {
    let ws = Workspace::new();
    let f = ws.file("sample.exe");

    ws.cmd()
        .args(["-o", "no-section"])
        .arg(&f)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Section.Key=Value"));

    assert!(!ws.queue_db().exists());
}

#[test]
fn help_lists_queue_options() {
    cargo_bin_cmd!("mastiff")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--append-queue"))
        .stdout(predicate::str::contains("--resume-queue"))
        .stdout(predicate::str::contains("--conf"));
}
