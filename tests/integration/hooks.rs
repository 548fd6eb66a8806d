#[path = "common/mod.rs"]
mod common;

use std::fs;

use common::FakeUnit;

#[test]
fn install_hook_lays_down_parca_and_publishes_version() {
    let unit = FakeUnit::new();

    unit.command()
        .args(["dispatch", "--hook", "install"])
        .assert()
        .success();

    let calls = unit.calls();
    assert_eq!(calls[0], "status-set maintenance -- installing parca");
    assert!(
        calls
            .iter()
            .any(|call| call.starts_with("tar -xzf ") && call.ends_with(" parca")),
        "{calls:?}"
    );
    assert!(calls.contains(&"systemctl daemon-reload".to_string()));
    assert!(calls.contains(&"application-version-set v0.12.1".to_string()));
    assert_eq!(unit.statuses().len(), 1);

    assert!(unit.path().join("bin/parca").exists());
    let config = fs::read_to_string(unit.config_path()).unwrap();
    assert!(config.contains("scrape_configs: []"));
    let service = fs::read_to_string(unit.unit_path()).unwrap();
    assert!(service.contains(&format!(
        "ExecStart={}/bin/parca --config-path={}/etc/parca.yaml",
        unit.path().display(),
        unit.path().display()
    )));
}

#[test]
fn install_with_bad_checksum_blocks_unit() {
    let unit = FakeUnit::new();
    unit.write_settings(&format!("  sha256: \"{}\"\n", "ab".repeat(32)));

    unit.command()
        .args(["dispatch", "--hook", "install"])
        .assert()
        .success();

    let statuses = unit.statuses();
    assert_eq!(statuses.len(), 2);
    assert!(
        statuses[1].starts_with("status-set blocked -- parca archive checksum mismatch"),
        "{statuses:?}"
    );
    assert!(!unit.calls().iter().any(|call| call.starts_with("tar ")));
}

#[test]
fn failed_install_keeps_later_hooks_blocked() {
    let unit = FakeUnit::new();
    unit.write_settings(&format!("  sha256: \"{}\"\n", "ab".repeat(32)));

    unit.dispatch_all(&["install", "config-changed", "start"]);

    let calls = unit.calls();
    assert!(
        !calls
            .iter()
            .any(|call| call.starts_with("systemctl") || call.starts_with("open-port")),
        "{calls:?}"
    );
    let statuses = unit.statuses();
    assert_eq!(statuses.len(), 2, "{statuses:?}");
    assert!(statuses[1].starts_with("status-set blocked -- parca archive checksum mismatch"));
    assert!(unit.marker_path().exists());
}

#[test]
fn reinstall_after_failure_unblocks_unit() {
    let unit = FakeUnit::new();
    unit.write_settings(&format!("  sha256: \"{}\"\n", "ab".repeat(32)));
    unit.dispatch_all(&["install"]);
    assert!(unit.marker_path().exists());

    unit.write_settings("");
    unit.dispatch_all(&["install", "start"]);

    assert!(!unit.marker_path().exists());
    assert!(unit.calls().contains(&"systemctl enable --now parca".to_string()));
    assert_eq!(unit.statuses().last().map(String::as_str), Some("status-set active"));
}

#[test]
fn start_hook_enables_service_and_opens_port() {
    let unit = FakeUnit::new();

    unit.command()
        .args(["dispatch", "--hook", "start"])
        .assert()
        .success();

    assert_eq!(
        unit.calls(),
        vec![
            "systemctl enable --now parca",
            "open-port 7070/TCP",
            "status-set active",
        ]
    );
}

#[test]
fn start_hook_stays_active_when_port_cannot_be_opened() {
    let unit = FakeUnit::new();
    unit.failing_tool("open-port", 1, "ERROR port range conflicts");

    unit.command()
        .args(["dispatch", "--hook", "start"])
        .assert()
        .success();

    assert_eq!(unit.statuses(), vec!["status-set active"]);
}

#[test]
fn start_hook_fails_when_service_manager_fails() {
    let unit = FakeUnit::new();
    unit.failing_tool("systemctl", 1, "Unit parca.service not found.");

    unit.command()
        .args(["dispatch", "--hook", "start"])
        .assert()
        .failure();

    assert!(unit.statuses().is_empty());
}

#[test]
fn config_changed_renders_scrape_jobs_from_relation() {
    let unit = FakeUnit::new();
    unit.json_tool(
        "config-get",
        r#"{"storage-persist": false, "memory-storage-limit": 512}"#,
    );
    unit.relate_node();

    unit.command()
        .args(["dispatch", "--hook", "config-changed"])
        .assert()
        .success();

    let config = fs::read_to_string(unit.config_path()).unwrap();
    assert!(config.contains("juju_lma_0123456_node_prometheus_scrape_profiles"));
    assert!(config.contains("10.0.0.5:6060"));
    assert!(config.contains("juju_unit: node/0"));

    let service = fs::read_to_string(unit.unit_path()).unwrap();
    assert!(service.contains("--storage-active-memory=536870912"));

    let calls = unit.calls();
    assert!(calls.contains(&"systemctl restart parca".to_string()));
    assert_eq!(
        unit.statuses(),
        vec!["status-set maintenance -- reconfiguring parca", "status-set active"]
    );
}

#[test]
fn relation_hook_from_dispatch_path_reconfigures() {
    let unit = FakeUnit::new();
    unit.relate_node();

    unit.command()
        .env("JUJU_DISPATCH_PATH", "hooks/metrics-endpoint-relation-changed")
        .arg("dispatch")
        .assert()
        .success();

    let config = fs::read_to_string(unit.config_path()).unwrap();
    assert!(config.contains("10.0.0.5:6060"));
    assert_eq!(unit.statuses().last().map(String::as_str), Some("status-set active"));
}

#[test]
fn reconfiguring_twice_writes_identical_files() {
    let unit = FakeUnit::new();
    unit.relate_node();

    unit.command()
        .args(["dispatch", "--hook", "config-changed"])
        .assert()
        .success();
    let first = (
        fs::read_to_string(unit.config_path()).unwrap(),
        fs::read_to_string(unit.unit_path()).unwrap(),
    );

    unit.command()
        .args(["dispatch", "--hook", "metrics-endpoint-relation-changed"])
        .assert()
        .success();
    let second = (
        fs::read_to_string(unit.config_path()).unwrap(),
        fs::read_to_string(unit.unit_path()).unwrap(),
    );

    assert_eq!(first, second);
}

#[test]
fn remove_hook_disables_service_and_deletes_files() {
    let unit = FakeUnit::new();
    unit.command()
        .args(["dispatch", "--hook", "config-changed"])
        .assert()
        .success();
    assert!(unit.unit_path().exists());

    unit.command()
        .args(["dispatch", "--hook", "remove"])
        .assert()
        .success();

    assert!(!unit.unit_path().exists());
    assert!(!unit.config_path().exists());
    let calls = unit.calls();
    assert_eq!(
        calls.iter().filter(|call| *call == "systemctl disable --now parca").count(),
        1
    );
    assert_eq!(
        unit.statuses().last().map(String::as_str),
        Some("status-set maintenance -- removing parca")
    );
}

#[test]
fn unobserved_hook_is_ignored() {
    let unit = FakeUnit::new();

    unit.command()
        .args(["dispatch", "--hook", "upgrade-charm"])
        .assert()
        .success();

    assert!(unit.calls().is_empty());
}
