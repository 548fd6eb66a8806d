#![allow(dead_code)]

use std::{
    env, fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tempfile::{TempDir, tempdir};

/// Hook tools that only record their invocation unless overridden.
const RECORDING_TOOLS: [&str; 10] = [
    "status-set",
    "open-port",
    "application-version-set",
    "config-get",
    "relation-ids",
    "relation-list",
    "relation-get",
    "systemctl",
    "tar",
    "juju-log",
];

/// Parca binary laid down by the fake `tar`.
pub const FAKE_TAR_BODY: &str = r#"cat > "$4/parca" <<'PARCA'
#!/bin/sh
echo "parca, version v0.12.1 (commit: 0123456789ab)"
PARCA
chmod +x "$4/parca""#;

/// A throwaway unit: fake hook tools on `PATH` and settings rooted in a tempdir.
pub struct FakeUnit {
    root: TempDir,
}

impl FakeUnit {
    pub fn new() -> Self {
        let root = tempdir().expect("failed to create tempdir");
        fs::create_dir_all(root.path().join("tools")).expect("failed to create tools dir");
        fs::write(root.path().join("parca.tar.gz"), b"not really an archive")
            .expect("failed to write archive");

        let unit = Self { root };
        for tool in RECORDING_TOOLS {
            unit.tool(tool, "");
        }
        unit.tool("tar", FAKE_TAR_BODY);
        unit.write_settings("");
        unit
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Installs a fake tool that logs its arguments, then runs `body`.
    pub fn tool(&self, name: &str, body: &str) {
        let path = self.path().join("tools").join(name);
        let script = format!(
            "#!/bin/sh\necho \"{name} $*\" >> \"{log}\"\n{body}\n",
            log = self.log_path().display()
        );
        fs::write(&path, script).expect("failed to write fake tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to mark fake tool executable");
    }

    /// Installs a fake tool that prints `json` on stdout.
    pub fn json_tool(&self, name: &str, json: &str) {
        self.tool(name, &format!("cat <<'JSON'\n{json}\nJSON"));
    }

    /// Installs a fake tool that fails with `code`.
    pub fn failing_tool(&self, name: &str, code: i32, stderr: &str) {
        self.tool(name, &format!("echo '{stderr}' >&2\nexit {code}"));
    }

    /// Writes the operator settings, appending `extra` to the `parca` block.
    pub fn write_settings(&self, extra: &str) {
        let root = self.path();
        let settings = format!(
            r#"lock_path: "{root}/operator.lock"
install_marker_path: "{root}/state/install-failed"
command_timeout: "10s"
parca:
  archive: "{root}/parca.tar.gz"
  bin_path: "{root}/bin/parca"
  config_path: "{root}/etc/parca.yaml"
  profile_path: "{root}/profiles"
  unit_path: "{root}/systemd/parca.service"
{extra}"#,
            root = root.display()
        );
        fs::write(self.settings_path(), settings).expect("failed to write settings");
    }

    pub fn settings_path(&self) -> PathBuf {
        self.path().join("parca-operator.yaml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.path().join("calls.log")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("etc/parca.yaml")
    }

    pub fn unit_path(&self) -> PathBuf {
        self.path().join("systemd/parca.service")
    }

    pub fn marker_path(&self) -> PathBuf {
        self.path().join("state/install-failed")
    }

    /// Runs `dispatch` for each hook in turn, each as its own process.
    pub fn dispatch_all(&self, hooks: &[&str]) {
        for hook in hooks {
            self.command()
                .args(["dispatch", "--hook", hook])
                .assert()
                .success();
        }
    }

    /// Operator command with the fake tools first on `PATH`.
    pub fn command(&self) -> assert_cmd::Command {
        let path = format!(
            "{}:{}",
            self.path().join("tools").display(),
            env::var("PATH").unwrap_or_default()
        );
        let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("parca-operator"));
        cmd.env("PATH", path)
            .env_remove("JUJU_DISPATCH_PATH")
            .env_remove("JUJU_HOOK_NAME")
            .arg("--settings")
            .arg(self.settings_path());
        cmd
    }

    /// Every recorded tool invocation, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("status-set "))
            .collect()
    }

    /// Publishes one remote `node/0` unit exposing a profiling job on `*:6060`.
    pub fn relate_node(&self) {
        self.json_tool("relation-ids", r#"["metrics-endpoint:4"]"#);
        self.json_tool("relation-list", r#"["node/0"]"#);
        self.tool(
            "relation-get",
            r##"case "$*" in
  *--app*) cat <<'JSON'
{"scrape_jobs": "[{\"job_name\": \"profiles\", \"static_configs\": [{\"targets\": [\"*:6060\"]}]}]", "scrape_metadata": "{\"model\": \"lma\", \"model_uuid\": \"0123456789abcdef\", \"application\": \"node\"}"}
JSON
  ;;
  *) cat <<'JSON'
{"prometheus_scrape_unit_address": "10.0.0.5", "prometheus_scrape_unit_name": "node/0"}
JSON
  ;;
esac"##,
        );
    }
}
