use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the executors.
///
/// All of these are per-task: the scheduler routes them to its error
/// callback and the test is skipped, the batch keeps going.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("executor unavailable for `{command}`: {reason}")]
    ExecutorUnavailable { command: String, reason: String },

    #[error("probe timed out after {attempts} polling attempts")]
    ProbeTimeout { attempts: u32 },

    #[error("probe exceeded its {timeout_ms}ms deadline")]
    ProbeDeadline { timeout_ms: u64 },

    #[error("probe cancelled")]
    ProbeCancelled,

    #[error("command `{command}` did not finish within {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("no oracle file found for test {}", path.display())]
    MissingOracle { path: PathBuf },

    #[error("browser host error: {0}")]
    Browser(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
