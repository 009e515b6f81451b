use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "The testcase ({path}) has a line containing 'DDBEGIN' but no line containing 'DDEND'.",
        path = .0.display()
    )]
    MissingDdend(PathBuf),
    #[error(
        "The testcase ({path}) has a line containing 'DDEND' without a line containing 'DDBEGIN' before it.",
        path = .0.display()
    )]
    StrayDdend(PathBuf),
    #[error("The testcase ({path}) has no reducible atoms.", path = .0.display())]
    EmptyReducibleRegion(PathBuf),
    #[error("failed to read testcase: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum LithiumError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("the original testcase is not 'interesting'")]
    NotInteresting,
    #[error("oracle failure: {0}")]
    OracleFatal(String),
    #[error("failed to save testcase: {0}")]
    Save(io::Error),
}

impl LithiumError {
    /// Process exit code for this error: 1 initial-uninteresting, 2 bad
    /// configuration or load, 3 oracle or save failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            LithiumError::Config(_) | LithiumError::Load(_) => 2,
            LithiumError::NotInteresting => 1,
            LithiumError::OracleFatal(_) | LithiumError::Save(_) => 3,
        }
    }
}
