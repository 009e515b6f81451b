//! Built-in interestingness tests. An oracle spec names one of these, or a
//! path to an executable that exits 0 when the testcase is interesting.

use crate::error::LithiumError;
use crate::oracle::Oracle;
use crate::timed_run::{stderr_log_path, stdout_log_path, timed_run, RunStatus};
use crate::util::contains_bytes;
use regex::bytes::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const ORACLE_NAMES: &[&str] = &["outputs", "hangs", "crashes"];

pub fn resolve_oracle(spec: &str) -> Box<dyn Oracle> {
    match spec {
        "outputs" => Box::new(OutputsOracle::default()),
        "hangs" => Box::new(HangsOracle::default()),
        "crashes" => Box::new(CrashesOracle::default()),
        path => Box::new(CommandOracle::new(path)),
    }
}

fn config(message: impl Into<String>) -> LithiumError {
    LithiumError::Config(message.into())
}

fn parse_timeout(value: &str) -> Result<Duration, LithiumError> {
    let secs: u64 = value
        .parse()
        .map_err(|_| config(format!("invalid timeout: {value}")))?;
    Ok(Duration::from_secs(secs))
}

/// Shared option scan: flags are recognized until the first plain argument,
/// which starts the command to run.
#[derive(Debug, Default)]
struct TimedCommand {
    timeout: Option<Duration>,
    search: Option<String>,
    use_regex: bool,
    command: Vec<String>,
}

impl TimedCommand {
    fn parse(args: &[String], accept_search: bool) -> Result<Self, LithiumError> {
        let mut parsed = TimedCommand::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if !parsed.command.is_empty() {
                parsed.command.push(arg.clone());
                continue;
            }
            if arg == "-t" || arg == "--timeout" {
                let value = iter.next().ok_or_else(|| config("--timeout needs a value"))?;
                parsed.timeout = Some(parse_timeout(value)?);
            } else if let Some(value) = arg.strip_prefix("--timeout=") {
                parsed.timeout = Some(parse_timeout(value)?);
            } else if accept_search && (arg == "-s" || arg == "--search") {
                let value = iter.next().ok_or_else(|| config("--search needs a value"))?;
                parsed.search = Some(value.clone());
            } else if accept_search && arg.starts_with("--search=") {
                parsed.search = Some(arg["--search=".len()..].to_string());
            } else if accept_search && (arg == "-r" || arg == "--regex") {
                parsed.use_regex = true;
            } else {
                parsed.command.push(arg.clone());
            }
        }
        if parsed.command.is_empty() {
            return Err(config("must specify a command to evaluate"));
        }
        Ok(parsed)
    }

    fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Interesting iff an intended message shows up on stdout/stderr.
#[derive(Default)]
pub struct OutputsOracle {
    timeout: Duration,
    search: Vec<u8>,
    pattern: Option<Regex>,
    command: Vec<String>,
}

impl Oracle for OutputsOracle {
    fn init(&mut self, args: &[String]) -> Result<(), LithiumError> {
        let parsed = TimedCommand::parse(args, true)?;
        let search = parsed
            .search
            .as_deref()
            .ok_or_else(|| config("outputs: --search is required"))?;
        if parsed.use_regex {
            self.pattern = Some(
                Regex::new(search)
                    .map_err(|err| config(format!("outputs: bad --search regex: {err}")))?,
            );
        }
        self.timeout = parsed.timeout();
        self.search = search.as_bytes().to_vec();
        self.command = parsed.command;
        Ok(())
    }

    fn interesting(&mut self, _args: &[String], temp_prefix: &Path) -> io::Result<bool> {
        timed_run(&self.command, self.timeout, Some(temp_prefix))?;
        for path in [stdout_log_path(temp_prefix), stderr_log_path(temp_prefix)] {
            let data = fs::read(&path)?;
            let found = match &self.pattern {
                Some(pattern) => pattern.is_match(&data),
                None => contains_bytes(&data, &self.search),
            };
            if found {
                info!("[Interesting] Match detected!");
                return Ok(true);
            }
        }
        info!("[Uninteresting] No match detected!");
        Ok(false)
    }
}

/// Interesting iff the command runs past the timeout.
#[derive(Default)]
pub struct HangsOracle {
    timeout: Duration,
    command: Vec<String>,
}

impl Oracle for HangsOracle {
    fn init(&mut self, args: &[String]) -> Result<(), LithiumError> {
        let parsed = TimedCommand::parse(args, false)?;
        self.timeout = parsed.timeout();
        self.command = parsed.command;
        Ok(())
    }

    fn interesting(&mut self, _args: &[String], temp_prefix: &Path) -> io::Result<bool> {
        let run = timed_run(&self.command, self.timeout, Some(temp_prefix))?;
        if run.status == RunStatus::Timeout {
            info!("[Interesting] Timeout detected ({} s)", self.timeout.as_secs());
            Ok(true)
        } else {
            info!(
                "[Uninteresting] Exited in {:.3} seconds",
                run.elapsed.as_secs_f64()
            );
            Ok(false)
        }
    }
}

/// Interesting iff the command crashes.
#[derive(Default)]
pub struct CrashesOracle {
    timeout: Duration,
    command: Vec<String>,
}

impl Oracle for CrashesOracle {
    fn init(&mut self, args: &[String]) -> Result<(), LithiumError> {
        let parsed = TimedCommand::parse(args, false)?;
        self.timeout = parsed.timeout();
        self.command = parsed.command;
        Ok(())
    }

    fn interesting(&mut self, _args: &[String], temp_prefix: &Path) -> io::Result<bool> {
        let run = timed_run(&self.command, self.timeout, Some(temp_prefix))?;
        if run.status == RunStatus::Crash {
            info!("[Interesting] Crash detected");
            Ok(true)
        } else {
            info!("[Uninteresting] No crash detected");
            Ok(false)
        }
    }
}

/// Run an arbitrary executable with the oracle args; exit 0 is interesting.
pub struct CommandOracle {
    program: String,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(program: &str) -> Self {
        CommandOracle {
            program: program.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Oracle for CommandOracle {
    fn interesting(&mut self, args: &[String], temp_prefix: &Path) -> io::Result<bool> {
        let mut command = Vec::with_capacity(args.len() + 1);
        command.push(self.program.clone());
        command.extend(args.iter().cloned());
        let run = timed_run(&command, self.timeout, Some(temp_prefix))?;
        Ok(run.status == RunStatus::Normal)
    }
}
