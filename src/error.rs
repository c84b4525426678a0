//! Error types for sweep, parsing and metric operations.

use std::fmt;

/// Result type for parsweep operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while measuring, parsing or analysing benchmarks.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessError {
    /// The benchmarked program could not be run to a successful exit.
    Execution {
        /// Program that was invoked
        program: String,
        /// Arguments of the configuration being measured
        args: Vec<String>,
        /// What went wrong (spawn failure, exit status, timeout)
        reason: String,
    },

    /// The program ran, but its output carried no usable duration.
    Extraction {
        /// Arguments of the configuration being measured
        args: Vec<String>,
        /// What was wrong with the output
        reason: String,
    },

    /// A report block could not be parsed.
    Parse {
        /// 1-based index of the offending block
        block: usize,
        /// What was wrong with the block
        reason: String,
    },

    /// A metric would divide by a zero, negative or non-finite value.
    DegenerateDivision {
        /// Which quantity was being computed
        context: String,
        /// The offending denominator
        value: f64,
    },

    /// The sweep plan cannot be enumerated.
    InvalidPlan(String),

    /// Two records share the same (offset, threads, batch size) key.
    DuplicateRecord {
        /// Problem size
        offset: u64,
        /// Thread count, if any
        threads: Option<u32>,
        /// Batch size, if any
        batch_size: Option<u64>,
    },

    /// Two non-sequential records of one size group share a thread count.
    DuplicateThreadCount {
        /// The repeated thread count
        threads: u32,
    },

    /// Reading or writing a stored dataset failed.
    Persistence(String),
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Execution {
                program,
                args,
                reason,
            } => write!(
                f,
                "Execution failed: {} [{}]: {}",
                program,
                args.join(" "),
                reason
            ),
            HarnessError::Extraction { args, reason } => {
                write!(f, "Extraction failed for [{}]: {}", args.join(" "), reason)
            }
            HarnessError::Parse { block, reason } => {
                write!(f, "Parse failed in block {}: {}", block, reason)
            }
            HarnessError::DegenerateDivision { context, value } => {
                write!(f, "Degenerate division in {}: denominator {}", context, value)
            }
            HarnessError::InvalidPlan(msg) => write!(f, "Invalid sweep plan: {}", msg),
            HarnessError::DuplicateRecord {
                offset,
                threads,
                batch_size,
            } => write!(
                f,
                "Duplicate record: offset {}, threads {:?}, batch size {:?}",
                offset, threads, batch_size
            ),
            HarnessError::DuplicateThreadCount { threads } => write!(
                f,
                "Duplicate record: {} thread(s) appears more than once in one group",
                threads
            ),
            HarnessError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
        }
    }
}

impl std::error::Error for HarnessError {}

impl HarnessError {
    /// True for failures raised while measuring a configuration.
    pub fn is_measurement(&self) -> bool {
        matches!(
            self,
            HarnessError::Execution { .. } | HarnessError::Extraction { .. }
        )
    }
}
