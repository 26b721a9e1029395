//! Process runner
//!
//! Spawns one external program, waits for it to exit, and hands back what it
//! printed. The captured text is never interpreted here.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::RunError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which streams end up in the captured text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// stdout and stderr share one pipe, interleaved as written
    Merged,
    /// Only stdout is the payload; stderr is kept for failure reports
    StdoutOnly,
}

/// One planned execution of an external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory of the child; inherited when `None`
    pub cwd: Option<PathBuf>,
    pub capture: CaptureMode,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, capture: CaptureMode) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit status zero
    Success { text: String },
    /// Nonzero exit, or killed by a signal (`exit_code` is `None`)
    Failure { exit_code: Option<i32>, text: String },
}

impl Outcome {
    pub fn success(text: impl Into<String>) -> Self {
        Outcome::Success { text: text.into() }
    }

    pub fn failure(exit_code: Option<i32>, text: impl Into<String>) -> Self {
        Outcome::Failure {
            exit_code,
            text: text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn text(&self) -> &str {
        match self {
            Outcome::Success { text } | Outcome::Failure { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Success { text } | Outcome::Failure { text, .. } => text,
        }
    }
}

/// Anything that can execute an [`Invocation`]
pub trait Runner {
    fn run(&self, invocation: &Invocation) -> Result<Outcome, RunError>;
}

impl<R: Runner + ?Sized> Runner for &R {
    fn run(&self, invocation: &Invocation) -> Result<Outcome, RunError> {
        (**self).run(invocation)
    }
}

/// Runs invocations as real child processes
///
/// Each child leads its own process group. Anything it leaves running is
/// killed once it exits, and the whole group is killed on timeout, so no
/// descendant outlives the call or holds a capture pipe open.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn command(invocation: &Invocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    fn run_merged(&self, invocation: &Invocation) -> Result<Outcome, RunError> {
        let program = &invocation.program;
        let spawn_err = |source| RunError::Spawn {
            program: program.clone(),
            source,
        };

        let (reader, writer) = io::pipe().map_err(spawn_err)?;
        let writer_err = writer.try_clone().map_err(spawn_err)?;

        let mut child = {
            // The command holds the parent's copies of the write end; it must
            // be dropped before reading or the pipe never reaches EOF.
            let mut command = Self::command(invocation);
            command.stdout(writer).stderr(writer_err);
            command.spawn().map_err(spawn_err)?
        };

        let deadline = self.deadline();
        let output = drain(reader);
        let status = self.wait(&mut child, program, deadline)?;
        let text = self.collect(&output, &child, program, deadline)?;

        Ok(outcome(status, text))
    }

    fn run_stdout_only(&self, invocation: &Invocation) -> Result<Outcome, RunError> {
        let program = &invocation.program;
        let mut child = Self::command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.clone(),
                source,
            })?;

        let deadline = self.deadline();
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let status = self.wait(&mut child, program, deadline)?;

        let stdout = match &stdout {
            Some(output) => self.collect(output, &child, program, deadline)?,
            None => String::new(),
        };
        let stderr = match &stderr {
            Some(output) => self.collect(output, &child, program, deadline)?,
            None => String::new(),
        };

        if status.success() {
            if !stderr.is_empty() {
                tracing::debug!(program = %program.display(), %stderr, "discarding stderr");
            }
            Ok(Outcome::success(stdout))
        } else {
            Ok(outcome(status, stdout + &stderr))
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| Instant::now() + timeout)
    }

    fn timed_out(&self, program: &Path) -> RunError {
        let timeout = self.timeout.unwrap_or_default();
        tracing::warn!(
            program = %program.display(),
            timeout_secs = timeout.as_secs_f64(),
            "killing process after timeout"
        );
        RunError::TimedOut {
            program: program.to_path_buf(),
            timeout,
        }
    }

    /// Wait for exit, killing the child's group if the deadline passes.
    fn wait(
        &self,
        child: &mut Child,
        program: &Path,
        deadline: Option<Instant>,
    ) -> Result<ExitStatus, RunError> {
        let wait_err = |source| RunError::Wait {
            program: program.to_path_buf(),
            source,
        };

        let status = match deadline {
            None => child.wait().map_err(wait_err)?,
            Some(deadline) => loop {
                if let Some(status) = child.try_wait().map_err(wait_err)? {
                    break status;
                }
                if Instant::now() >= deadline {
                    kill_group(child);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.timed_out(program));
                }
                thread::sleep(POLL_INTERVAL);
            },
        };

        // Background jobs the child left behind would keep the pipes open.
        kill_group(child);
        Ok(status)
    }

    /// Wait for a reader to hit EOF, bounded by the same deadline as the child.
    fn collect(
        &self,
        output: &Receiver<io::Result<Vec<u8>>>,
        child: &Child,
        program: &Path,
        deadline: Option<Instant>,
    ) -> Result<String, RunError> {
        let received = match deadline {
            None => output.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => output.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        };
        let bytes = match received {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                kill_group(child);
                return Err(self.timed_out(program));
            }
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::other("output reader panicked")),
        }
        .map_err(|source| RunError::Wait {
            program: program.to_path_buf(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Runner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<Outcome, RunError> {
        tracing::debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            capture = ?invocation.capture,
            "spawning"
        );
        let outcome = match invocation.capture {
            CaptureMode::Merged => self.run_merged(invocation)?,
            CaptureMode::StdoutOnly => self.run_stdout_only(invocation)?,
        };
        if let Outcome::Failure { exit_code, .. } = &outcome {
            tracing::debug!(program = %invocation.program.display(), ?exit_code, "process failed");
        }
        Ok(outcome)
    }
}

fn outcome(status: ExitStatus, text: String) -> Outcome {
    if status.success() {
        Outcome::Success { text }
    } else {
        Outcome::Failure {
            exit_code: status.code(),
            text,
        }
    }
}

/// SIGKILL every process in the child's group. The group id is the child's
/// pid, and it stays valid after the child is reaped while any member lives.
#[cfg(unix)]
fn kill_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Read a stream to EOF on its own thread so neither pipe can fill and block
/// the child.
fn drain<R: Read + Send + 'static>(mut source: R) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = source.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });
    rx
}
