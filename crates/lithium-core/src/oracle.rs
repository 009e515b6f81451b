use crate::error::LithiumError;
use crate::testcase::Testcase;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVerdict {
    Interesting,
    Uninteresting,
}

impl OracleVerdict {
    pub fn is_interesting(self) -> bool {
        matches!(self, OracleVerdict::Interesting)
    }

    fn label(self) -> &'static str {
        match self {
            OracleVerdict::Interesting => "interesting",
            OracleVerdict::Uninteresting => "uninteresting",
        }
    }
}

/// The user-supplied interestingness predicate.
///
/// `interesting` is handed the unchanged oracle args from the command line
/// and a fresh temp prefix per call; the testcase path is conventionally the
/// last arg. Errors are treated as `Uninteresting` by the driver unless they
/// persist.
pub trait Oracle {
    fn init(&mut self, _args: &[String]) -> Result<(), LithiumError> {
        Ok(())
    }

    fn interesting(&mut self, args: &[String], temp_prefix: &Path) -> io::Result<bool>;

    fn cleanup(&mut self, _args: &[String]) {}
}

const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Invokes the oracle on the current on-disk testcase and caches verdicts by
/// content hash. Owns the temp workspace and the per-call prefix counter.
pub struct OracleDriver {
    oracle: Box<dyn Oracle>,
    args: Vec<String>,
    temp_dir: PathBuf,
    file_count: u64,
    calls: u64,
    cache_hits: u64,
    atoms_tested: u64,
    consecutive_failures: u32,
    cache: HashMap<Vec<u8>, OracleVerdict>,
}

fn create_temp_dir() -> io::Result<PathBuf> {
    // try/create instead of exists/create to avoid racing other instances
    let mut index = 1;
    loop {
        let dir = PathBuf::from(format!("tmp{index}"));
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => index += 1,
            Err(err) => return Err(err),
        }
    }
}

impl OracleDriver {
    pub fn new(
        oracle: Box<dyn Oracle>,
        args: Vec<String>,
        temp_dir: Option<PathBuf>,
    ) -> io::Result<Self> {
        let temp_dir = match temp_dir {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                dir
            }
            None => create_temp_dir()?,
        };
        Ok(OracleDriver {
            oracle,
            args,
            temp_dir,
            file_count: 1,
            calls: 0,
            cache_hits: 0,
            atoms_tested: 0,
            consecutive_failures: 0,
            cache: HashMap::new(),
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn atoms_tested(&self) -> u64 {
        self.atoms_tested
    }

    pub fn init(&mut self) -> Result<(), LithiumError> {
        self.oracle.init(&self.args)
    }

    pub fn cleanup(&mut self) {
        self.oracle.cleanup(&self.args);
    }

    /// Ask the oracle about the current on-disk testcase. The caller must
    /// have saved `testcase` already; the file stays untouched for the
    /// duration of the call.
    pub fn test(&mut self, testcase: &Testcase) -> Result<OracleVerdict, LithiumError> {
        let digest = Sha512::digest(testcase.serialize()).to_vec();
        if let Some(verdict) = self.cache.get(&digest) {
            self.cache_hits += 1;
            debug!("cached verdict: {}", verdict.label());
            return Ok(*verdict);
        }

        let number = self.file_count;
        self.file_count += 1;
        let prefix = self.temp_dir.join(number.to_string());

        self.calls += 1;
        self.atoms_tested += testcase.len() as u64;

        let verdict = match self.oracle.interesting(&self.args, &prefix) {
            Ok(true) => {
                self.consecutive_failures = 0;
                OracleVerdict::Interesting
            }
            Ok(false) => {
                self.consecutive_failures = 0;
                OracleVerdict::Uninteresting
            }
            Err(err) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(LithiumError::OracleFatal(format!(
                        "{} consecutive oracle failures, last: {err}",
                        self.consecutive_failures
                    )));
                }
                warn!("oracle call failed, treating as uninteresting: {err}");
                OracleVerdict::Uninteresting
            }
        };

        // keep a copy next to the call's logs, for reproducing by hand later
        let tag = if verdict.is_interesting() {
            "interesting"
        } else {
            "boring"
        };
        let copy = self
            .temp_dir
            .join(format!("{number}-{tag}{}", testcase.extension()));
        if let Err(err) = testcase.save_to(&copy) {
            warn!("failed to copy testcase to {}: {err}", copy.display());
        }

        self.cache.insert(digest, verdict);
        Ok(verdict)
    }

    /// Record a copy of the unreduced input in the temp workspace.
    pub fn save_original_copy(&self, testcase: &Testcase) {
        let path = self
            .temp_dir
            .join(format!("original{}", testcase.extension()));
        if let Err(err) = testcase.save_to(&path) {
            warn!("failed to copy original testcase to {}: {err}", path.display());
        }
    }
}
