use crate::error::LithiumError;
use crate::oracle::OracleDriver;
use crate::strategy::{CancelFlag, Strategy};
use crate::testcase::Testcase;
use crate::util::quantity;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ReductionReport {
    pub strategy: String,
    pub atom: String,
    pub testcase: String,
    pub init_atoms: usize,
    pub final_atoms: usize,
    pub oracle_calls: u64,
    pub cache_hits: u64,
    pub atoms_tested: u64,
    pub reduced: bool,
    pub interrupted: bool,
    pub hit_time_limit: bool,
    pub duration_ms: u64,
}

/// Orchestrates one reduction: oracle init, strategy execution, unconditional
/// oracle cleanup, and a final write of the last accepted testcase.
pub struct Reducer {
    testcase: Testcase,
    driver: OracleDriver,
    strategy: Box<dyn Strategy>,
    cancel: CancelFlag,
}

impl Reducer {
    pub fn new(
        testcase: Testcase,
        driver: OracleDriver,
        strategy: Box<dyn Strategy>,
        cancel: CancelFlag,
    ) -> Self {
        Reducer {
            testcase,
            driver,
            strategy,
            cancel,
        }
    }

    pub fn run(mut self) -> Result<ReductionReport, LithiumError> {
        let start = Instant::now();
        let init_atoms = self.testcase.len();

        info!("Testcase type: {}", self.testcase.atom());
        info!(
            "Intermediate files will be stored in {}.",
            self.driver.temp_dir().display()
        );
        self.driver.save_original_copy(&self.testcase);

        self.driver.init()?;
        let outcome = self
            .strategy
            .run(&mut self.testcase, &mut self.driver, &self.cancel);
        self.driver.cleanup();

        // make sure we exit with the last accepted testcase on disk
        let final_save = self.testcase.save();
        let status = outcome?;
        final_save.map_err(LithiumError::Save)?;

        let final_atoms = self.testcase.len();
        let report = ReductionReport {
            strategy: self.strategy.name().to_string(),
            atom: self.testcase.atom().to_string(),
            testcase: self.testcase.path().display().to_string(),
            init_atoms,
            final_atoms,
            oracle_calls: self.driver.calls(),
            cache_hits: self.driver.cache_hits(),
            atoms_tested: self.driver.atoms_tested(),
            reduced: status.reduced,
            interrupted: status.interrupted,
            hit_time_limit: status.hit_time_limit,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!("=== LITHIUM SUMMARY ===");
        info!("  Initial size: {}", quantity(init_atoms, &report.atom));
        info!("  Final size: {}", quantity(final_atoms, &report.atom));
        info!("  Tests performed: {}", report.oracle_calls);
        info!(
            "  Test total: {}",
            quantity(report.atoms_tested as usize, &report.atom)
        );
        Ok(report)
    }
}
