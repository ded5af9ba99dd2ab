//! Replays the fixture scripts through the headless runner

use live_polls::run_script;
use polls_app::config::{init_config_dir, load_settings};
use polls_app::Settings;
use serde_json::Value;
use tempfile::tempdir;
use tokio_test::assert_ok;

async fn replay(script: &str, settings: Settings) -> Vec<Value> {
    let mut out = Vec::new();
    assert_ok!(run_script(script.as_bytes(), &mut out, settings).await);
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).expect("invalid JSON line"))
        .collect()
}

fn snapshots(lines: &[Value]) -> Vec<&Value> {
    lines.iter().filter(|v| v["event"] == "snapshot").collect()
}

#[tokio::test]
async fn test_console_vote_script() {
    let script = include_str!("fixtures/scripts/console_vote.ndjson");
    let lines = replay(script, Settings::default()).await;

    let snapshot = snapshots(&lines)[0];
    let poll = &snapshot["polls"][0];
    assert_eq!(poll["name"], "Console");
    assert_eq!(poll["total_count"], 3);
    assert_eq!(poll["options"][0]["count"], 1);
    assert_eq!(poll["options"][1]["count"], 2);
    assert_eq!(poll["last_updated_option"], "Switch");
    assert_eq!(snapshot["view_state"], "success");

    assert_eq!(
        lines
            .iter()
            .filter(|v| v["event"] == "option_updated")
            .count(),
        3
    );
    assert!(lines.iter().all(|v| v["event"] != "failure"));
    assert_eq!(lines.last().unwrap()["event"], "shutdown");
}

#[tokio::test]
async fn test_changes_missed_in_background_need_refresh() {
    let script = include_str!("fixtures/scripts/background_gap.ndjson");
    let lines = replay(script, Settings::default()).await;

    let snaps = snapshots(&lines);
    assert_eq!(snaps.len(), 2);

    // Reconnect alone does not recover the poll created while backgrounded
    assert_eq!(snaps[0]["connection"], "connected");
    assert_eq!(snaps[0]["polls"].as_array().unwrap().len(), 0);

    // An explicit refresh does
    let poll = &snaps[1]["polls"][0];
    assert_eq!(poll["name"], "Language");
    assert_eq!(poll["options"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_refresh_on_reconnect_from_config() {
    let temp = tempdir().unwrap();
    init_config_dir(temp.path()).unwrap();
    std::fs::write(
        temp.path().join(".livepolls/config.toml"),
        "[behavior]\nrefresh_on_reconnect = true\n",
    )
    .unwrap();
    let settings = load_settings(temp.path());

    let script = include_str!("fixtures/scripts/background_gap.ndjson");
    let lines = replay(script, settings).await;

    let snaps = snapshots(&lines);
    assert_eq!(snaps[0]["polls"][0]["name"], "Language");
}

#[tokio::test]
async fn test_bad_payloads_are_dropped_without_failures() {
    let script = include_str!("fixtures/scripts/bad_payloads.ndjson");
    let lines = replay(script, Settings::default()).await;

    let dropped: Vec<_> = lines
        .iter()
        .filter(|v| v["event"] == "change_dropped")
        .collect();
    // DELETE, negative count, orphan insert
    assert_eq!(dropped.len(), 3);
    assert_eq!(dropped[2]["reason"], "missing_poll");

    let snapshot = snapshots(&lines)[0];
    let poll = &snapshot["polls"][0];
    assert_eq!(poll["options"].as_array().unwrap().len(), 1);
    assert_eq!(poll["options"][0]["count"], 4);
    assert_eq!(poll["total_count"], 4);
    assert_eq!(snapshot["view_state"], "success");
    assert!(lines.iter().all(|v| v["event"] != "failure"));
}

#[tokio::test]
async fn test_custom_tables_from_config() {
    let temp = tempdir().unwrap();
    std::fs::create_dir_all(temp.path().join(".livepolls")).unwrap();
    std::fs::write(
        temp.path().join(".livepolls/config.toml"),
        "[realtime]\nschema = \"voting\"\npolls_table = \"surveys\"\n",
    )
    .unwrap();
    let settings = load_settings(temp.path());

    let script = include_str!("fixtures/scripts/console_vote.ndjson");
    let lines = replay(script, settings).await;

    assert_eq!(snapshots(&lines)[0]["polls"][0]["total_count"], 3);
}
