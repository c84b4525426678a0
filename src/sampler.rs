//! Running the benchmarked program and reading its self-reported time.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{HarnessError, Result};

/// How often a running child is polled while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Something that can produce one timing sample for an argument vector.
///
/// The sweep driver is generic over this so enumeration and reduction can be
/// exercised without spawning processes.
pub trait Measure {
    /// Takes one sample, in seconds.
    fn measure(&mut self, args: &[String]) -> Result<f64>;
}

impl<F> Measure for F
where
    F: FnMut(&[String]) -> Result<f64>,
{
    fn measure(&mut self, args: &[String]) -> Result<f64> {
        self(args)
    }
}

/// Runs an external program once per sample.
#[derive(Debug, Clone)]
pub struct Sampler {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Option<Duration>,
}

impl Sampler {
    /// Sampler for `program` with no timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed before the configuration arguments on every call.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kill the child and fail the sample once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program this sampler runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Current per-sample timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn execution_error(&self, args: &[String], reason: impl Into<String>) -> HarnessError {
        HarnessError::Execution {
            program: self.program.display().to_string(),
            args: args.to_vec(),
            reason: reason.into(),
        }
    }

    /// Runs the program to completion and returns its standard output.
    ///
    /// On unix the program leads its own process group, so a terminal Ctrl+C
    /// reaches only the harness and the sample in flight runs to completion.
    pub fn run(&self, args: &[String]) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| self.execution_error(args, format!("failed to start: {}", e)))?;

        // Drained on its own thread so a chatty child never blocks on a full pipe.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.execution_error(args, "stdout was not captured"))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let status = self.wait(&mut child, args)?;

        let output = reader
            .join()
            .map_err(|_| self.execution_error(args, "stdout reader panicked"))?
            .map_err(|e| self.execution_error(args, format!("failed to read stdout: {}", e)))?;

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(self.execution_error(args, reason));
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn wait(&self, child: &mut Child, args: &[String]) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map_err(|e| self.execution_error(args, format!("wait failed: {}", e)));
        };

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if start.elapsed() > timeout {
                        kill_tree(child);
                        let _ = child.wait();
                        return Err(self.execution_error(
                            args,
                            format!("timed out after {:.1}s", timeout.as_secs_f64()),
                        ));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(self.execution_error(args, format!("wait failed: {}", e))),
            }
        }
    }
}

/// Kills the child and everything it spawned into its process group.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree(child: &mut Child) {
    match libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg only sends a signal; the group was created at spawn.
        Ok(pgid) => unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        },
        Err(_) => {
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

impl Measure for Sampler {
    fn measure(&mut self, args: &[String]) -> Result<f64> {
        let output = self.run(args)?;
        let seconds = extract_duration(&output).map_err(|reason| HarnessError::Extraction {
            args: args.to_vec(),
            reason,
        })?;
        debug!(program = %self.program.display(), ?args, seconds, "sample taken");
        Ok(seconds)
    }
}

/// Pulls the duration out of a program's output.
///
/// The value is whatever follows the first `": "` up to the end of that line,
/// with a trailing `s` unit and whitespace removed.
pub fn extract_duration(output: &str) -> std::result::Result<f64, String> {
    let (_, rest) = output
        .split_once(": ")
        .ok_or_else(|| "output has no \": \" separator".to_string())?;

    let line = rest.lines().next().unwrap_or("");
    let payload = line
        .trim_end_matches(|c: char| c == 's' || c.is_whitespace())
        .trim_start();

    let seconds: f64 = payload
        .parse()
        .map_err(|_| format!("{:?} is not a number", payload))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("{} is not a valid duration", seconds));
    }

    Ok(seconds)
}
