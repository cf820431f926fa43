use crate::error::{GuardianError, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs external programs with discrete arguments (never through a shell)
/// and a hard wall-clock limit.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `program args...` and wait for it, killing it once the timeout elapses.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let rendered = render(program, args);
        log::debug!("Running: {rendered}");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GuardianError::Backend(format!("Failed to spawn '{rendered}': {e}")))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, &rendered)?;

        Ok(CommandOutput {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }

    /// Like [`run`](Self::run) but a non-zero exit becomes a backend error.
    pub fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(program, args)?;
        Self::ensure_success(&output, &render(program, args))?;
        Ok(output)
    }

    fn wait_with_deadline(&self, child: &mut Child, rendered: &str) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if started.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        log::warn!(
                            "Command timed out after {}s: {rendered}",
                            self.timeout.as_secs()
                        );
                        return Err(GuardianError::TimedOut {
                            command: rendered.to_string(),
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(GuardianError::Backend(format!(
                        "Failed to wait for '{rendered}': {e}"
                    )));
                }
            }
        }
    }

    fn ensure_success(output: &CommandOutput, command: &str) -> Result<()> {
        if output.success() {
            return Ok(());
        }

        let stderr = output.stderr.trim();
        log::warn!("{command} failed: {stderr}");
        Err(GuardianError::Backend(format!(
            "{} exited with code {}: {}",
            command,
            output.status.code().unwrap_or(-1),
            stderr
        )))
    }
}

fn render(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

// Pipes are drained on their own threads so a chatty child cannot block on a
// full pipe while we poll for its exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
