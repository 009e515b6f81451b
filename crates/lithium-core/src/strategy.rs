use crate::collapse_braces;
use crate::error::LithiumError;
use crate::minimize::Minimize;
use crate::minimize_around::MinimizeSurroundingPairs;
use crate::minimize_balanced::MinimizeBalancedPairs;
use crate::oracle::{OracleDriver, OracleVerdict};
use crate::replace_globals::{ReplaceArgumentsByGlobals, ReplacePropertiesByGlobals};
use crate::testcase::Testcase;
use crate::util::{default_chunk_max, is_power_of_two, quantity};
use serde::Serialize;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Set from a SIGINT handler; strategies poll it between oracle calls and
/// unwind with the last accepted testcase on disk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    Always,
    Last,
    Never,
}

#[derive(Debug, Clone)]
pub struct MinimizeOptions {
    pub chunk_min: u64,
    pub chunk_max: u64,
    pub repeat: RepeatPolicy,
    pub repeat_first_round: bool,
    pub max_run_time: Option<Duration>,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        MinimizeOptions {
            chunk_min: 1,
            chunk_max: 1 << 30,
            repeat: RepeatPolicy::Last,
            repeat_first_round: false,
            max_run_time: None,
        }
    }
}

impl MinimizeOptions {
    /// Shorthand for a single pass at one fixed chunk size.
    pub fn fixed_chunk_size(size: u64) -> Self {
        MinimizeOptions {
            chunk_min: size,
            chunk_max: size,
            repeat: RepeatPolicy::Never,
            ..MinimizeOptions::default()
        }
    }

    pub fn validated(self) -> Result<Self, LithiumError> {
        if !is_power_of_two(self.chunk_min) {
            return Err(LithiumError::Config("min must be a power of two".into()));
        }
        if !is_power_of_two(self.chunk_max) {
            return Err(LithiumError::Config("max must be a power of two".into()));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStatus {
    /// Whether any speculative change was accepted.
    pub reduced: bool,
    pub interrupted: bool,
    pub hit_time_limit: bool,
}

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Reduce `testcase` in place. On return the on-disk file matches the
    /// testcase and is interesting (or untouched if nothing was accepted).
    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError>;
}

pub const STRATEGY_NAMES: &[&str] = &[
    "check-only",
    "minimize",
    "minimize-around",
    "minimize-balanced",
    "minimize-collapse-brace",
    "replace-properties-by-globals",
    "replace-arguments-by-globals",
];

pub fn resolve_strategy(
    name: &str,
    options: MinimizeOptions,
) -> Result<Box<dyn Strategy>, LithiumError> {
    let options = options.validated()?;
    Ok(match name {
        "check-only" => Box::new(CheckOnly),
        "minimize" => Box::new(Minimize::new(options)),
        "minimize-around" => Box::new(MinimizeSurroundingPairs::new(options)),
        "minimize-balanced" => Box::new(MinimizeBalancedPairs::new(options)),
        "minimize-collapse-brace" => Box::new(collapse_braces::CollapseEmptyBraces::new(options)),
        "replace-properties-by-globals" => Box::new(ReplacePropertiesByGlobals::new(options)),
        "replace-arguments-by-globals" => Box::new(ReplaceArgumentsByGlobals::new(options)),
        other => {
            return Err(LithiumError::Config(format!("unknown strategy: {other}")));
        }
    })
}

/// Only check whether the testcase reproduces; never modifies the file.
pub struct CheckOnly;

impl Strategy for CheckOnly {
    fn name(&self) -> &'static str {
        "check-only"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        _cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        let verdict = driver.test(testcase)?;
        if !verdict.is_interesting() {
            return Err(LithiumError::NotInteresting);
        }
        info!("Lithium result: interesting.");
        Ok(StrategyStatus::default())
    }
}

/// Speculatively apply `mutate`, save, ask the oracle, and either keep the
/// change or restore and re-save the previous state.
pub(crate) fn speculate(
    testcase: &mut Testcase,
    driver: &mut OracleDriver,
    mutate: impl FnOnce(&mut Testcase),
) -> Result<bool, LithiumError> {
    let snapshot = testcase.snapshot();
    mutate(testcase);
    testcase.save().map_err(LithiumError::Save)?;
    match driver.test(testcase)? {
        OracleVerdict::Interesting => Ok(true),
        OracleVerdict::Uninteresting => {
            testcase.restore(snapshot);
            testcase.save().map_err(LithiumError::Save)?;
            Ok(false)
        }
    }
}

pub(crate) fn attempt_remove(
    testcase: &mut Testcase,
    range: Range<usize>,
    driver: &mut OracleDriver,
) -> Result<bool, LithiumError> {
    speculate(testcase, driver, |testcase| testcase.remove(range))
}

/// Verify the unreduced input is interesting before any removal.
pub(crate) fn ensure_interesting(
    testcase: &mut Testcase,
    driver: &mut OracleDriver,
) -> Result<(), LithiumError> {
    info!(
        "The original testcase has {}.",
        quantity(testcase.len(), testcase.atom())
    );
    info!("Checking that the original testcase is 'interesting'...");
    if !driver.test(testcase)?.is_interesting() {
        return Err(LithiumError::NotInteresting);
    }
    Ok(())
}

pub(crate) struct RoundContext<'a> {
    pub driver: &'a mut OracleDriver,
    pub status: StrategyStatus,
    cancel: &'a CancelFlag,
    deadline: Option<Instant>,
}

impl<'a> RoundContext<'a> {
    pub fn new(
        driver: &'a mut OracleDriver,
        cancel: &'a CancelFlag,
        max_run_time: Option<Duration>,
    ) -> Self {
        RoundContext {
            driver,
            status: StrategyStatus::default(),
            cancel,
            deadline: max_run_time.map(|limit| Instant::now() + limit),
        }
    }
}

impl RoundContext<'_> {
    /// True when the strategy must stop now, with the reason recorded.
    pub fn should_stop(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            warn!("interrupted, leaving the last accepted testcase on disk");
            self.status.interrupted = true;
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                warn!(
                    "Lithium result: run time elapsed, please perform another pass \
                     using the same arguments"
                );
                self.status.hit_time_limit = true;
                return true;
            }
        }
        false
    }
}

/// The round/repeat/halving scaffold shared by the chunk strategies: verify
/// the input is interesting, then run rounds of `round` over halving chunk
/// sizes, repeating a size according to the repeat policy.
pub(crate) fn run_chunk_rounds<F>(
    testcase: &mut Testcase,
    driver: &mut OracleDriver,
    cancel: &CancelFlag,
    options: &MinimizeOptions,
    mut round: F,
) -> Result<StrategyStatus, LithiumError>
where
    F: FnMut(&mut Testcase, &mut RoundContext<'_>, u64) -> Result<bool, LithiumError>,
{
    ensure_interesting(testcase, driver)?;

    let mut chunk_size = options.chunk_max.min(default_chunk_max(testcase.len()));
    // the user's floor is fixed; a smaller starting size only makes `last`
    // true from the first round
    let chunk_min = options.chunk_min.max(1);
    let mut context = RoundContext::new(driver, cancel, options.max_run_time);

    let mut first_round = true;
    let mut removed_last_round = false;
    loop {
        info!(
            "Starting a round with chunks of {}.",
            quantity(chunk_size as usize, testcase.atom())
        );
        let mut removed = round(testcase, &mut context, chunk_size)?;
        if context.status.interrupted || context.status.hit_time_limit {
            return Ok(context.status);
        }
        if first_round {
            removed = removed || options.repeat_first_round;
            first_round = false;
        }
        removed_last_round = removed;

        let last = chunk_size <= chunk_min;
        let repeat = removed
            && match options.repeat {
                RepeatPolicy::Always => true,
                RepeatPolicy::Last => last,
                RepeatPolicy::Never => false,
            };
        if repeat {
            info!("Starting another round of chunk size {chunk_size}");
            continue;
        }
        if last {
            break;
        }
        chunk_size = (chunk_size >> 1).max(chunk_min);
        info!("Reducing chunk size to {chunk_size}");
    }

    info!(
        "Lithium result: succeeded, reduced to: {}",
        quantity(testcase.len(), testcase.atom())
    );
    if chunk_min == 1 && !removed_last_round && options.repeat != RepeatPolicy::Never {
        info!(
            "  Removing any single {} from the final file makes it uninteresting!",
            testcase.atom()
        );
    }
    Ok(context.status)
}
