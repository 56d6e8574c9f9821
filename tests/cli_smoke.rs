//! Smoke tests for the itinera binary.
//!
//! Nothing here reaches the network: the chat endpoint points at a closed
//! local port and image providers have no credentials.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const OFFLINE_CONFIG: &str = r#"
[llm]
base_url = "http://127.0.0.1:9/v1/chat/completions"
api_key_env = "ITINERA_SMOKE_LLM_KEY"
timeout_secs = 5

[retry]
max_attempts = 1
jitter_min_ms = 0
jitter_max_ms = 0

[images]
providers = ["pixabay"]
attempts = 1
inter_provider_delay_ms = 0
pixabay_key_env = "ITINERA_SMOKE_NO_PIXABAY_KEY"

[search]
provider = "none"
"#;

const TRAVEL_INFO: &str = r#"{
    "city": "Chengdu",
    "days": 2,
    "attractions": [
        {"name": "Jinli", "describe": "Old street"},
        {"name": "Wuhou Shrine", "describe": "Three Kingdoms temple"}
    ],
    "foods": [{"name": "Hotpot", "describe": "Spicy"}]
}"#;

fn itinera_cmd(work_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("itinera"));
    cmd.current_dir(work_dir);
    cmd.env("ITINERA_HOME", work_dir.join("home"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn offline_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("offline.toml"), OFFLINE_CONFIG).unwrap();
    fs::write(dir.path().join("chengdu.json"), TRAVEL_INFO).unwrap();
    dir
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    itinera_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("itinera"));
}

#[test]
fn cache_key_prints_hex_digest() {
    let dir = TempDir::new().unwrap();
    let digest = predicate::str::is_match(r"^[0-9a-f]{64}\n$").unwrap();
    itinera_cmd(dir.path())
        .args(["cache-key", "--city", "Chengdu", "--days", "3"])
        .assert()
        .success()
        .stdout(digest);
}

#[test]
fn cache_key_ignores_surrounding_whitespace() {
    let dir = TempDir::new().unwrap();
    let plain = itinera_cmd(dir.path())
        .args(["cache-key", "--city", "Chengdu", "--days", "3"])
        .output()
        .unwrap();
    let padded = itinera_cmd(dir.path())
        .args(["cache-key", "--city", "  Chengdu ", "--days", "3"])
        .output()
        .unwrap();
    let longer = itinera_cmd(dir.path())
        .args(["cache-key", "--city", "Chengdu", "--days", "4"])
        .output()
        .unwrap();

    assert_eq!(plain.stdout, padded.stdout);
    assert_ne!(plain.stdout, longer.stdout);
}

#[test]
fn config_reports_sources() {
    let dir = offline_workspace();
    itinera_cmd(dir.path())
        .args(["--config", "offline.toml", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("retry.max_attempts = 1"))
        .stdout(predicate::str::contains("refinement.acceptance_threshold = 6  (default)"));
}

#[test]
fn invalid_config_exits_with_cli_args_code() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bad.toml"),
        "[refinement]\nacceptance_threshold = 11\n",
    )
    .unwrap();

    itinera_cmd(dir.path())
        .args(["--config", "bad.toml", "config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("acceptance_threshold"));
}

#[test]
fn plan_without_api_key_is_a_provider_failure() {
    let dir = offline_workspace();
    itinera_cmd(dir.path())
        .env_remove("ITINERA_SMOKE_LLM_KEY")
        .args(["--config", "offline.toml", "plan", "--info", "chengdu.json"])
        .assert()
        .code(70)
        .stderr(predicate::str::contains("ITINERA_SMOKE_LLM_KEY"));
}

#[test]
fn plan_with_missing_info_file_is_rejected() {
    let dir = offline_workspace();
    itinera_cmd(dir.path())
        .env("ITINERA_SMOKE_LLM_KEY", "sk-smoke")
        .args(["--config", "offline.toml", "plan", "--info", "nowhere.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nowhere.json"));
}

#[test]
fn plan_by_destination_gathers_and_falls_back_offline() {
    let dir = offline_workspace();

    let output = itinera_cmd(dir.path())
        .env("ITINERA_SMOKE_LLM_KEY", "sk-smoke")
        .args(["--config", "offline.toml", "--cache-dir"])
        .arg(dir.path().join("cache"))
        .args(["plan", "--city", "Lhasa", "--days", "2"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["itinerary_source"], "fallback");
    assert_eq!(outcome["report"]["title"], "Lhasa 2-day travel guide");
    assert_eq!(outcome["report"]["sections"], serde_json::json!([]));
}

#[test]
fn plan_without_info_requires_city_and_days() {
    let dir = offline_workspace();
    itinera_cmd(dir.path())
        .args(["--config", "offline.toml", "plan", "--city", "Lhasa"])
        .assert()
        .code(2);
}

#[test]
fn plan_falls_back_when_backend_is_unreachable() {
    let dir = offline_workspace();
    let cache_dir = dir.path().join("cache");

    let output = itinera_cmd(dir.path())
        .env("ITINERA_SMOKE_LLM_KEY", "sk-smoke")
        .args(["--config", "offline.toml", "--cache-dir"])
        .arg(&cache_dir)
        .args(["plan", "--info", "chengdu.json"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["cache_hit"], false);
    assert_eq!(outcome["itinerary_source"], "fallback");
    let itinerary = outcome["report"]["itinerary"].as_str().unwrap();
    assert!(itinerary.starts_with("# Chengdu 2-day itinerary"));
    assert_eq!(
        outcome["report"]["sections"][0]["items"][0]["asset_ref"],
        "https://via.placeholder.com/400x300/4CAF50/white?text=Attraction"
    );

    let entries = fs::read_dir(cache_dir.join("itinerary")).unwrap().count();
    assert_eq!(entries, 1);

    let again = itinera_cmd(dir.path())
        .env("ITINERA_SMOKE_LLM_KEY", "sk-smoke")
        .args(["--config", "offline.toml", "--cache-dir"])
        .arg(&cache_dir)
        .args(["plan", "--info", "chengdu.json"])
        .output()
        .unwrap();
    assert!(again.status.success());
    let cached: serde_json::Value = serde_json::from_slice(&again.stdout).unwrap();
    assert_eq!(cached["cache_hit"], true);
    assert_eq!(cached["itinerary_source"], "fallback");
    assert_eq!(cached["report"], outcome["report"]);
}
