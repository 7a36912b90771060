//! Binary-level tests: argument handling, exit codes, files on disk.

mod support;

use std::path::Path;
use std::process::Output;

use assert_cmd::Command;
use camera_pdfs::Period;
use predicates::prelude::*;
use support::fixtures::{bulletin_path, index_page, month_page};
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

struct IndexPage;

impl Match for IndexPage {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "annomese")
    }
}

/// Command isolated from the user's config and log settings.
fn camera_pdfs(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("camera-pdfs").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// One month with one good bulletin and one that answers 404.
async fn mount_archive(server: &MockServer) -> (String, String) {
    let june = Period::new(2023, 6);
    let good = bulletin_path(2023, 6, 29, 136);
    let missing = bulletin_path(2023, 6, 30, 137);

    Mock::given(method("GET"))
        .and(path("/leg19/210"))
        .and(IndexPage)
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&[june])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/leg19/210"))
        .and(query_param("annomese", june.annomese()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(month_page(&[good.clone(), missing.clone()])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(good.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(missing.as_str()))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    (good, missing)
}

/// Runs the binary off the async runtime so the mock server keeps serving.
async fn run_archiver(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

#[test]
fn test_help_describes_the_tool() {
    let config_home = TempDir::new().unwrap();
    camera_pdfs(config_home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("camera.it commission"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--fail-on-errors"));
}

#[test]
fn test_version_flag() {
    let config_home = TempDir::new().unwrap();
    camera_pdfs(config_home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_flag_is_rejected() {
    let config_home = TempDir::new().unwrap();
    camera_pdfs(config_home.path())
        .arg("--no-such-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--no-such-flag"));
}

#[test]
fn test_out_of_range_concurrency_is_rejected() {
    let config_home = TempDir::new().unwrap();
    camera_pdfs(config_home.path())
        .args(["-c", "64"])
        .assert()
        .failure();
}

#[test]
fn test_missing_explicit_config_fails() {
    let config_home = TempDir::new().unwrap();
    let missing = config_home.path().join("absent.toml");
    camera_pdfs(config_home.path())
        .arg("--config")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_with_failed_document_exits_zero_and_logs() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, missing) = mount_archive(&server).await;
    let config_home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = camera_pdfs(config_home.path());
    cmd.args(["--base-url", &server.uri(), "--max-retries", "0", "-q"])
        .arg("-o")
        .arg(out.path());
    let output = run_archiver(cmd).await;

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let saved = out
        .path()
        .join("leg19/bollettini/2023/2023-06-29_commissione-21_leg-19-bol0136-data20230629-com21.pdf");
    assert!(saved.is_file());

    let log = std::fs::read_to_string(out.path().join("errors.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains(&missing));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fail_on_errors_exits_one() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_archive(&server).await;
    let config_home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = camera_pdfs(config_home.path());
    cmd.args(["--base-url", &server.uri(), "--max-retries", "0", "-q", "--fail-on-errors"])
        .arg("-o")
        .arg(out.path());
    let output = run_archiver(cmd).await;

    assert_eq!(output.status.code(), Some(1), "{output:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_run_lists_jobs_without_downloading() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (good, missing) = mount_archive(&server).await;
    let config_home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = camera_pdfs(config_home.path());
    cmd.args(["--base-url", &server.uri(), "--dry-run", "-q"])
        .arg("-o")
        .arg(out.path());
    let output = run_archiver(cmd).await;

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&good));
    assert!(stdout.contains(&missing));
    assert!(stdout.contains("bollettini\t"));
    assert!(!stdout.contains("2023-06: "), "quiet run prints no period lines");
    assert!(!out.path().join("leg19").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_prints_a_line_per_scanned_month() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_archive(&server).await;
    let config_home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = camera_pdfs(config_home.path());
    cmd.args(["--base-url", &server.uri(), "--dry-run"])
        .arg("-o")
        .arg(out.path());
    let output = run_archiver(cmd).await;

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line == "leg19 2023-06: 2 links"), "{stdout}");
}
