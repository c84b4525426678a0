//! Enumerating the sweep grid and reducing repeated samples.
//!
//! A [`Sweep`] is an iterator: it measures one grid point per `next()` call,
//! so callers can persist after every record and stop between points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::record::{SamplePoint, SweepRecord, round_timing};
use crate::sampler::Measure;

/// Default number of samples per grid point.
pub const DEFAULT_REPETITIONS: usize = 3;

/// Default pause after every sample.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Whether the batch-size axis is swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchAxis {
    /// No batch-size argument is passed.
    #[default]
    Disabled,
    /// 1, 10, 100, ... up to and including the offset.
    Geometric,
}

/// What to sweep and how often to sample each point.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Problem sizes, outermost axis
    pub offsets: Vec<u64>,
    /// Thread counts; `None` sweeps offsets alone
    pub threads: Option<Vec<u32>>,
    /// Batch-size axis, innermost
    pub batch: BatchAxis,
    /// Samples taken per grid point
    pub repetitions: usize,
    /// Pause after every sample
    pub pause: Duration,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            offsets: Vec::new(),
            threads: None,
            batch: BatchAxis::Disabled,
            repetitions: DEFAULT_REPETITIONS,
            pause: DEFAULT_PAUSE,
        }
    }
}

impl SweepPlan {
    /// Plan sweeping only the given offsets.
    pub fn offsets(offsets: impl Into<Vec<u64>>) -> Self {
        Self {
            offsets: offsets.into(),
            ..Self::default()
        }
    }

    /// Adds a thread-count axis.
    pub fn with_threads(mut self, threads: impl Into<Vec<u32>>) -> Self {
        self.threads = Some(threads.into());
        self
    }

    /// Sets the batch-size axis.
    pub fn with_batch(mut self, batch: BatchAxis) -> Self {
        self.batch = batch;
        self
    }

    /// Sets how many samples are averaged per point.
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Sets the pause after every sample.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Checks that the plan describes a non-empty, well-formed grid.
    pub fn validate(&self) -> Result<()> {
        if self.repetitions == 0 {
            return Err(HarnessError::InvalidPlan(
                "repetitions must be at least 1".to_string(),
            ));
        }
        if self.offsets.is_empty() {
            return Err(HarnessError::InvalidPlan("no offsets given".to_string()));
        }
        if self.offsets.contains(&0) {
            return Err(HarnessError::InvalidPlan(
                "offsets must be at least 1".to_string(),
            ));
        }
        match &self.threads {
            Some(threads) if threads.is_empty() => {
                return Err(HarnessError::InvalidPlan(
                    "thread axis is empty".to_string(),
                ));
            }
            Some(threads) if threads.contains(&0) => {
                return Err(HarnessError::InvalidPlan(
                    "thread counts must be at least 1".to_string(),
                ));
            }
            None if self.batch == BatchAxis::Geometric => {
                return Err(HarnessError::InvalidPlan(
                    "batch sizes need a thread axis".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Every grid point, outer axis first.
    pub fn points(&self) -> Vec<SamplePoint> {
        let mut points = Vec::new();
        for &offset in &self.offsets {
            let Some(threads) = &self.threads else {
                points.push(SamplePoint {
                    offset,
                    threads: None,
                    batch_size: None,
                });
                continue;
            };
            for &thread_count in threads {
                match self.batch {
                    BatchAxis::Disabled => points.push(SamplePoint {
                        offset,
                        threads: Some(thread_count),
                        batch_size: None,
                    }),
                    BatchAxis::Geometric => {
                        points.extend(batch_sizes(offset).into_iter().map(|batch| {
                            SamplePoint {
                                offset,
                                threads: Some(thread_count),
                                batch_size: Some(batch),
                            }
                        }))
                    }
                }
            }
        }
        points
    }
}

/// Batch sizes for one offset: powers of ten not exceeding it.
pub fn batch_sizes(offset: u64) -> Vec<u64> {
    let mut sizes = Vec::new();
    let mut batch = 1u64;
    while batch <= offset {
        sizes.push(batch);
        match batch.checked_mul(10) {
            Some(next) => batch = next,
            None => break,
        }
    }
    sizes
}

/// Reduces samples to the value stored in a record's `median` field.
///
/// This is the arithmetic mean rounded to six decimals, not a statistical
/// median; stored datasets and the comparisons built on them assume it.
pub fn mean_of_samples(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().sum();
    Some(round_timing(sum / samples.len() as f64))
}

/// Shared flag for stopping a sweep between grid points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the sweep stops before its next point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelToken::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Side effect run after every record a sweep yields.
pub trait Checkpoint {
    /// Receives every record yielded so far, in order.
    fn save(&mut self, records: &[SweepRecord]) -> Result<()>;
}

/// Lazily measures every point of a [`SweepPlan`].
pub struct Sweep<M> {
    measure: M,
    points: std::vec::IntoIter<SamplePoint>,
    repetitions: usize,
    pause: Duration,
    cancel: CancelToken,
    cancelled: bool,
    failed: bool,
    total: usize,
    completed: usize,
}

impl<M: Measure> Sweep<M> {
    /// Validates `plan` and prepares the sweep; nothing runs until iterated.
    pub fn new(plan: &SweepPlan, measure: M) -> Result<Self> {
        plan.validate()?;
        let points = plan.points();
        Ok(Self {
            measure,
            total: points.len(),
            points: points.into_iter(),
            repetitions: plan.repetitions,
            pause: plan.pause,
            cancel: CancelToken::new(),
            cancelled: false,
            failed: false,
            completed: 0,
        })
    }

    /// Checks `cancel` before every grid point.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Number of grid points in the plan.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Grid points measured so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// True once the sweep stopped because its token was cancelled.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns the measuring backend.
    pub fn into_inner(self) -> M {
        self.measure
    }

    fn measure_point(&mut self, point: &SamplePoint) -> Result<SweepRecord> {
        let args = point.args();
        let mut samples = Vec::with_capacity(self.repetitions);
        for run in 0..self.repetitions {
            let seconds = self.measure.measure(&args)?;
            debug!(%point, run, seconds, "sample");
            samples.push(seconds);
            if !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
        }

        let median = mean_of_samples(&samples).ok_or_else(|| {
            HarnessError::InvalidPlan("repetitions must be at least 1".to_string())
        })?;

        Ok(SweepRecord {
            median,
            offset: point.offset,
            threads: point.threads,
            batch_size: point.batch_size,
        })
    }

    /// Drives the sweep to the end, checkpointing after every record.
    ///
    /// Stops at the first failure; everything measured before it has already
    /// been handed to `checkpoint`.
    pub fn run_with_checkpoint(
        &mut self,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<Vec<SweepRecord>> {
        let mut records = Vec::with_capacity(self.total);
        while let Some(record) = self.next() {
            records.push(record?);
            checkpoint.save(&records)?;
        }
        Ok(records)
    }
}

impl<M: Measure> Iterator for Sweep<M> {
    type Item = Result<SweepRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cancelled {
            return None;
        }
        if self.cancel.is_cancelled() {
            info!(
                completed = self.completed,
                total = self.total,
                "sweep cancelled"
            );
            self.cancelled = true;
            return None;
        }

        let point = self.points.next()?;
        match self.measure_point(&point) {
            Ok(record) => {
                self.completed += 1;
                info!(%point, median = record.median, "configuration measured");
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
