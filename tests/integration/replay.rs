#[path = "common/mod.rs"]
mod common;

use common::FakeUnit;
use predicates::str::contains;

#[test]
fn replay_full_lifecycle_ends_active() {
    let unit = FakeUnit::new();
    unit.relate_node();

    unit.command()
        .args(["replay", "install", "config-changed", "start"])
        .assert()
        .success();

    assert_eq!(
        unit.statuses(),
        vec![
            "status-set maintenance -- installing parca",
            "status-set maintenance -- reconfiguring parca",
            "status-set active",
            "status-set active",
        ]
    );
    assert!(unit.calls().contains(&"open-port 7070/TCP".to_string()));
}

#[test]
fn replay_stops_lifecycle_after_failed_install() {
    let unit = FakeUnit::new();
    unit.failing_tool("tar", 2, "gzip: stdin: not in gzip format");

    unit.command()
        .args(["replay", "install", "config-changed", "start"])
        .assert()
        .success();

    let calls = unit.calls();
    assert!(!calls.iter().any(|call| call.starts_with("systemctl")));
    assert!(!calls.iter().any(|call| call.starts_with("open-port")));
    assert_eq!(
        unit.statuses().last().map(String::as_str),
        Some("status-set blocked -- failed to extract parca: gzip: stdin: not in gzip format")
    );
}

#[test]
fn replay_discards_events_after_remove() {
    let unit = FakeUnit::new();

    unit.command()
        .args(["replay", "remove", "start"])
        .assert()
        .success();

    assert!(!unit.calls().contains(&"systemctl enable --now parca".to_string()));
}

#[test]
fn replay_rejects_unknown_events() {
    let unit = FakeUnit::new();

    unit.command()
        .args(["replay", "install", "reboot"])
        .assert()
        .failure()
        .stderr(contains("Unknown event 'reboot'"));

    assert!(unit.calls().is_empty());
}
