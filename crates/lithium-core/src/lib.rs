pub mod collapse_braces;
pub mod error;
pub mod interestingness;
pub mod minimize;
pub mod minimize_around;
pub mod minimize_balanced;
pub mod oracle;
pub mod reducer;
pub mod replace_globals;
pub mod split;
mod split_attrs;
mod split_jsstr;
mod split_symbol;
pub mod strategy;
pub mod testcase;
pub mod timed_run;
pub mod util;

pub use error::{LithiumError, LoadError};
pub use interestingness::{resolve_oracle, CommandOracle, ORACLE_NAMES};
pub use oracle::{Oracle, OracleDriver, OracleVerdict};
pub use reducer::{Reducer, ReductionReport};
pub use split::SplitKind;
pub use strategy::{
    resolve_strategy, CancelFlag, CheckOnly, MinimizeOptions, RepeatPolicy, Strategy,
    StrategyStatus, STRATEGY_NAMES,
};
pub use testcase::{Snapshot, Testcase};
pub use timed_run::{timed_run, RunData, RunStatus};
