//! The default reduction strategy: a greedy chunk-halving minimizer derived
//! from ddmin. Chunks are removed left to right; an accepted removal keeps
//! the cursor in place because the remaining atoms shift down.

use crate::error::LithiumError;
use crate::oracle::OracleDriver;
use crate::strategy::{
    attempt_remove, run_chunk_rounds, CancelFlag, MinimizeOptions, RoundContext, Strategy,
    StrategyStatus,
};
use crate::testcase::Testcase;
use tracing::debug;

pub struct Minimize {
    options: MinimizeOptions,
}

impl Minimize {
    pub fn new(options: MinimizeOptions) -> Self {
        Minimize { options }
    }
}

/// One left-to-right sweep at a fixed chunk size. Returns whether anything
/// was removed this round.
pub(crate) fn sweep_round(
    testcase: &mut Testcase,
    context: &mut RoundContext<'_>,
    chunk_size: u64,
) -> Result<bool, LithiumError> {
    let chunk = chunk_size as usize;
    let mut removed = false;
    let mut cursor = 0;
    while cursor < testcase.len() {
        if context.should_stop() {
            return Ok(removed);
        }
        let total = testcase.len();
        let end = (cursor + chunk).min(total);
        let accepted = attempt_remove(testcase, cursor..end, context.driver)?;
        debug!(
            "chunk size {chunk}: removing [{cursor}, {end}) of {total}: {}",
            if accepted { "interesting" } else { "uninteresting" }
        );
        if accepted {
            removed = true;
            context.status.reduced = true;
        } else {
            cursor += chunk;
        }
    }
    Ok(removed)
}

impl Strategy for Minimize {
    fn name(&self) -> &'static str {
        "minimize"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        run_chunk_rounds(testcase, driver, cancel, &self.options, sweep_round)
    }
}
