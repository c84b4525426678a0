//! # parsweep
//!
//! A benchmark harness that drives an external program across a grid of
//! parameters and turns its self-reported timings into scaling metrics.
//!
//! The program under test is invoked as `<program> <offset> [threads] [batch]`
//! and must print a line such as `Total Exec. Time: 0.12345s`.
//!
//! ## Quick Start
//!
//! ```
//! use parsweep::{Sweep, SweepPlan, Result};
//! use std::time::Duration;
//!
//! // Any `FnMut(&[String]) -> Result<f64>` can stand in for the program.
//! let plan = SweepPlan::offsets([10, 100])
//!     .with_threads([1, 4])
//!     .with_repetitions(3)
//!     .with_pause(Duration::ZERO);
//! let fake = |args: &[String]| -> Result<f64> {
//!     let threads: f64 = args[1].parse().unwrap();
//!     Ok(8.0 / threads)
//! };
//!
//! let records: Vec<_> = Sweep::new(&plan, fake)?.collect::<Result<_>>()?;
//! let groups = parsweep::Dataset::new(records).group_by_offset();
//! let speedup = parsweep::metrics::speedup(&groups[0].records)?.unwrap();
//! assert_eq!(speedup[&4], 4.0);
//! # Ok::<(), parsweep::HarnessError>(())
//! ```
//!
//! ## Pieces
//!
//! - [`Sampler`] runs the program once and extracts the duration.
//! - [`Sweep`] enumerates offset × threads × batch size, averages repeated
//!   samples and yields one [`SweepRecord`] per grid point.
//! - [`parse_report`] rebuilds records from a blank-line separated text report.
//! - [`metrics`] computes speedup, efficiency and improvement per size group.
//! - [`store`] persists datasets as flat JSON arrays.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod metrics;
mod record;
mod report;
mod sampler;
pub mod store;
mod sweep;

pub use error::{HarnessError, Result};
pub use metrics::{GroupAnalysis, PairComparison, ScalingInsights};
pub use record::{
    BenchmarkRecord, Dataset, OffsetGroup, ReportRecord, RunKind, SamplePoint, ScalingGroup,
    SweepRecord, Timed, TimingBreakdown, round_timing,
};
pub use report::{Report, SizeGroup, parse_block, parse_report};
pub use sampler::{Measure, Sampler, extract_duration};
pub use sweep::{
    BatchAxis, CancelToken, Checkpoint, DEFAULT_PAUSE, DEFAULT_REPETITIONS, Sweep, SweepPlan,
    batch_sizes, mean_of_samples,
};
