//! Balanced-pair reduction for bracketed languages. A chunk whose bracket
//! counts balance is attempted alone; a net-opening chunk is attempted
//! together with the later chunk where the cumulative count returns to zero,
//! so speculative removals do not orphan brackets. Positions with no
//! balanced match are skipped without consulting the oracle.

use crate::error::LithiumError;
use crate::oracle::OracleDriver;
use crate::strategy::{
    attempt_remove, run_chunk_rounds, speculate, CancelFlag, MinimizeOptions, RoundContext,
    Strategy, StrategyStatus,
};
use crate::testcase::Testcase;
use tracing::debug;

const BRACKETS: [(u8, u8); 4] = [(b'(', b')'), (b'{', b'}'), (b'[', b']'), (b'<', b'>')];

type Deltas = [i64; 4];

/// Net open-minus-close count per bracket kind over the atoms in `range`
/// (reducible index space).
fn chunk_deltas(testcase: &Testcase, range: std::ops::Range<usize>) -> Deltas {
    let mut deltas = [0i64; 4];
    let mut rank = 0;
    for (part, flag) in testcase.parts().iter().zip(testcase.reducible()) {
        if !flag {
            continue;
        }
        if rank >= range.end {
            break;
        }
        if rank >= range.start {
            for byte in part {
                for (kind, (open, close)) in BRACKETS.iter().enumerate() {
                    if byte == open {
                        deltas[kind] += 1;
                    } else if byte == close {
                        deltas[kind] -= 1;
                    }
                }
            }
        }
        rank += 1;
    }
    deltas
}

fn add(total: &mut Deltas, other: &Deltas) {
    for (slot, value) in total.iter_mut().zip(other) {
        *slot += value;
    }
}

pub struct MinimizeBalancedPairs {
    options: MinimizeOptions,
}

impl MinimizeBalancedPairs {
    pub fn new(options: MinimizeOptions) -> Self {
        MinimizeBalancedPairs { options }
    }
}

fn balanced_round(
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
        let deltas = chunk_deltas(testcase, cursor..end);

        if deltas == [0; 4] {
            let accepted = attempt_remove(testcase, cursor..end, context.driver)?;
            debug!(
                "chunk size {chunk}: removing balanced [{cursor}, {end}) of {total}: {}",
                if accepted { "interesting" } else { "uninteresting" }
            );
            if accepted {
                removed = true;
                context.status.reduced = true;
            } else {
                cursor += chunk;
            }
            continue;
        }

        // look for the chunk where the cumulative count closes this one
        let mut cumulative = deltas;
        let mut probe = end;
        let mut matched = None;
        while probe < total {
            let probe_end = (probe + chunk).min(total);
            add(&mut cumulative, &chunk_deltas(testcase, probe..probe_end));
            if cumulative.iter().any(|delta| *delta < 0) {
                break;
            }
            if cumulative == [0; 4] {
                matched = Some(probe..probe_end);
                break;
            }
            probe = probe_end;
        }

        let Some(closing) = matched else {
            debug!("chunk size {chunk}: skipping unmatched [{cursor}, {end}) of {total}");
            cursor += chunk;
            continue;
        };

        let opening = cursor..end;
        let accepted = speculate(testcase, context.driver, |testcase| {
            testcase.remove(closing.clone());
            testcase.remove(opening.clone());
        })?;
        debug!(
            "chunk size {chunk}: removing pair [{}, {}) and [{}, {}) of {total}: {}",
            opening.start,
            opening.end,
            closing.start,
            closing.end,
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

impl Strategy for MinimizeBalancedPairs {
    fn name(&self) -> &'static str {
        "minimize-balanced"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        run_chunk_rounds(testcase, driver, cancel, &self.options, balanced_round)
    }
}
