//! Line reduction with a post-round pass that collapses whitespace-only
//! brace interiors, so `foo() {\n}` becomes `foo() { }` in the same run
//! instead of surviving as two unremovable atoms.

use crate::error::LithiumError;
use crate::minimize::sweep_round;
use crate::oracle::OracleDriver;
use crate::strategy::{
    run_chunk_rounds, speculate, CancelFlag, MinimizeOptions, RoundContext, Strategy,
    StrategyStatus,
};
use crate::testcase::Testcase;
use regex::bytes::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn empty_braces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u)\{\s+\}").expect("static regex"))
}

pub struct CollapseEmptyBraces {
    options: MinimizeOptions,
}

impl CollapseEmptyBraces {
    pub fn new(options: MinimizeOptions) -> Self {
        CollapseEmptyBraces { options }
    }
}

fn collapse(testcase: &mut Testcase, context: &mut RoundContext<'_>) -> Result<(), LithiumError> {
    let raw = testcase.parts().concat();
    let collapsed = empty_braces_re().replace_all(&raw, &b"{ }"[..]);
    if collapsed.as_ref() == raw.as_slice() {
        return Ok(());
    }
    let collapsed = collapsed.into_owned();
    let accepted = speculate(testcase, context.driver, |testcase| {
        testcase.reatomize(&collapsed)
    })?;
    debug!(
        "collapsing empty braces: {}",
        if accepted { "interesting" } else { "uninteresting" }
    );
    if accepted {
        context.status.reduced = true;
    }
    Ok(())
}

impl Strategy for CollapseEmptyBraces {
    fn name(&self) -> &'static str {
        "minimize-collapse-brace"
    }

    fn run(
        &self,
        testcase: &mut Testcase,
        driver: &mut OracleDriver,
        cancel: &CancelFlag,
    ) -> Result<StrategyStatus, LithiumError> {
        run_chunk_rounds(
            testcase,
            driver,
            cancel,
            &self.options,
            |testcase, context, chunk_size| {
                let removed = sweep_round(testcase, context, chunk_size)?;
                if context.status.interrupted || context.status.hit_time_limit {
                    return Ok(removed);
                }
                collapse(testcase, context)?;
                Ok(removed)
            },
        )
    }
}
