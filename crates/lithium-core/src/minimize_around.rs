//! Paired-chunk reduction: each attempt removes the chunk at the cursor and
//! its mirror chunk from the opposite end of the sequence in a single
//! speculation. Useful when the interesting region is wrapped in prefix and
//! suffix material that only disappears together.

use crate::error::LithiumError;
use crate::oracle::OracleDriver;
use crate::strategy::{
    run_chunk_rounds, speculate, CancelFlag, MinimizeOptions, RoundContext, Strategy,
    StrategyStatus,
};
use crate::testcase::Testcase;
use tracing::debug;

pub struct MinimizeSurroundingPairs {
    options: MinimizeOptions,
}

impl MinimizeSurroundingPairs {
    pub fn new(options: MinimizeOptions) -> Self {
        MinimizeSurroundingPairs { options }
    }
}

fn pair_round(
    testcase: &mut Testcase,
    context: &mut RoundContext<'_>,
    chunk_size: u64,
) -> Result<bool, LithiumError> {
    let chunk = chunk_size as usize;
    let mut removed = false;
    let mut cursor = 0;
    loop {
        if context.should_stop() {
            return Ok(removed);
        }
        let total = testcase.len();
        // the cursor chunk must end at or before its mirror starts
        if 2 * (cursor + chunk) > total {
            break;
        }
        let front = cursor..cursor + chunk;
        let mirror = total - cursor - chunk..total - cursor;
        let accepted = speculate(testcase, context.driver, |testcase| {
            testcase.remove(mirror.clone());
            testcase.remove(front.clone());
        })?;
        debug!(
            "chunk size {chunk}: removing [{}, {}) and [{}, {}) of {total}: {}",
            front.start,
            front.end,
            mirror.start,
            mirror.end,
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

impl Strategy for MinimizeSurroundingPairs {
    fn name(&self) -> &'static str {
        "minimize-around"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        run_chunk_rounds(testcase, driver, cancel, &self.options, pair_round)
    }
}
