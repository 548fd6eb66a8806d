//! Execution of external programs (hook tools, `systemctl`, `tar`).
use std::{
    io::Read,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    constants::{COMMAND_POLL_INTERVAL, DEFAULT_COMMAND_TIMEOUT},
    error::CharmError,
};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs on behalf of the operator.
pub trait CommandRunner {
    /// Runs `program` to completion and returns its output regardless of exit code.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CharmError>;

    /// Runs `program` and returns its stdout, failing on a non-zero exit.
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<String, CharmError> {
        let output = self.run(program, args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(CharmError::CommandFailed {
                program: program.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CharmError> {
        (**self).run(program, args)
    }
}

/// Production runner that spawns processes and kills them on timeout.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CharmError> {
        debug!("Running `{} {}`", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CharmError::CommandSpawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_timeout(&mut child, self.timeout)? {
            Some(status) => status,
            None => {
                warn!(
                    "`{}` did not finish within {:?}; terminating",
                    program, self.timeout
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(CharmError::CommandTimeout {
                    program: program.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

/// Reads a child pipe to the end on a helper thread so the child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Wait for a child process with a timeout, returning `Ok(None)` on timeout.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<ExitStatus>, CharmError> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(COMMAND_POLL_INTERVAL);
    }
}
