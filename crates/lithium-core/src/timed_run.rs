use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;
use wait_timeout::ChildExt;

/// Exit code used by sanitizers to report an error; counted as a crash.
pub const SANITIZER_ERROR_CODE: i32 = 77;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Normal,
    Abnormal,
    Crash,
    Timeout,
}

#[derive(Debug)]
pub struct RunData {
    pub status: RunStatus,
    pub return_code: Option<i32>,
    pub elapsed: Duration,
    /// Captured output; empty when a log prefix routes output to files.
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub fn stdout_log_path(prefix: &Path) -> PathBuf {
    PathBuf::from(format!("{}-out.txt", prefix.display()))
}

pub fn stderr_log_path(prefix: &Path) -> PathBuf {
    PathBuf::from(format!("{}-err.txt", prefix.display()))
}

/// Run a command to completion or `timeout`, whichever comes first. With a
/// log prefix the child's output goes to `<prefix>-out.txt` and
/// `<prefix>-err.txt`, otherwise it is captured in the result.
pub fn timed_run(
    cmd_with_args: &[String],
    timeout: Duration,
    log_prefix: Option<&Path>,
) -> io::Result<RunData> {
    let Some((program, args)) = cmd_with_args.split_first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "command not specified",
        ));
    };

    let mut command = Command::new(program);
    command.args(args);
    command.stdin(Stdio::null());
    match log_prefix {
        Some(prefix) => {
            command.stdout(File::create(stdout_log_path(prefix))?);
            command.stderr(File::create(stderr_log_path(prefix))?);
        }
        None => {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
        }
    }

    debug!("running: {}", cmd_with_args.join(" "));
    let start = Instant::now();
    let mut child = command.spawn()?;
    let exit = match child.wait_timeout(timeout)? {
        Some(status) => Some(status),
        None => {
            child.kill().ok();
            let _ = child.wait();
            None
        }
    };
    let elapsed = start.elapsed();

    let mut stdout = Vec::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_end(&mut stdout)?;
    }
    let mut stderr = Vec::new();
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_end(&mut stderr)?;
    }

    let (status, return_code) = match exit {
        None => (RunStatus::Timeout, None),
        Some(exit) => match exit.code() {
            Some(0) => (RunStatus::Normal, Some(0)),
            Some(SANITIZER_ERROR_CODE) => (RunStatus::Crash, Some(SANITIZER_ERROR_CODE)),
            Some(code) => (RunStatus::Abnormal, Some(code)),
            // terminated by a signal
            None => (RunStatus::Crash, None),
        },
    };

    Ok(RunData {
        status,
        return_code,
        elapsed,
        stdout,
        stderr,
    })
}
