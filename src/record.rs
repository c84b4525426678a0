//! Benchmark records and the dataset they are collected into.
//!
//! Records come from two sources: a live sweep ([`SweepRecord`]) or a parsed
//! text report ([`ReportRecord`]). Both expose the same [`Timed`] view, which
//! is all the metric calculator needs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{HarnessError, Result};

/// Digits kept after the decimal point for reduced timings.
pub const TIMING_DECIMALS: i32 = 6;

/// Rounds seconds to [`TIMING_DECIMALS`] places.
pub fn round_timing(seconds: f64) -> f64 {
    let scale = 10f64.powi(TIMING_DECIMALS);
    (seconds * scale).round() / scale
}

/// One point of the sweep grid.
///
/// Renders to the positional arguments of the benchmarked program, in the
/// order offset, threads, batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplePoint {
    /// Problem size
    pub offset: u64,
    /// Thread count passed to the program
    pub threads: Option<u32>,
    /// Batch size passed to the program
    pub batch_size: Option<u64>,
}

impl SamplePoint {
    /// Argument vector for this point.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.offset.to_string()];
        if let Some(threads) = self.threads {
            args.push(threads.to_string());
        }
        if let Some(batch) = self.batch_size {
            args.push(batch.to_string());
        }
        args
    }
}

impl fmt::Display for SamplePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.offset)?;
        if let Some(threads) = self.threads {
            write!(f, ", {} thread(s)", threads)?;
        }
        if let Some(batch) = self.batch_size {
            write!(f, ", batch {}", batch)?;
        }
        Ok(())
    }
}

/// A record produced by the sweep driver.
///
/// `median` keeps its historical name but holds the mean of the samples,
/// rounded to six decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    /// Mean of the measured samples, in seconds
    pub median: f64,
    /// Problem size
    pub offset: u64,
    /// Thread count, absent for single-axis sweeps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    /// Batch size, absent unless the batch axis was swept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
}

impl SweepRecord {
    /// The grid point this record measured.
    pub fn point(&self) -> SamplePoint {
        SamplePoint {
            offset: self.offset,
            threads: self.threads,
            batch_size: self.batch_size,
        }
    }
}

/// Execution type of a report block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunKind {
    /// `seq` blocks: no explicit thread parallelism.
    Sequential,
    /// Any other descriptor, e.g. `parallel`.
    Concurrent(String),
}

impl RunKind {
    /// Label as it appears in report text.
    pub fn label(&self) -> &str {
        match self {
            RunKind::Sequential => "seq",
            RunKind::Concurrent(name) => name,
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-phase timings of a report block, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingBreakdown {
    /// Input phase
    pub read: f64,
    /// Output phase
    pub write: f64,
    /// Compute phase
    pub mult: f64,
    /// Whole run; the value speedup is computed from
    pub total_time: f64,
}

/// A record recovered from one block of a text report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    /// `seq` or the concurrent run type
    pub kind: RunKind,
    /// Value printed in the block header before `Median Values`
    pub median: f64,
    /// Thread count, 0 for sequential blocks
    pub threads: u32,
    /// Per-phase timings
    pub timings: TimingBreakdown,
}

/// Either kind of record, with the problem size as the shared key.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchmarkRecord {
    /// Measured by a sweep; keyed by its offset.
    Sweep(SweepRecord),
    /// Parsed from a text report.
    Report {
        /// Matrix size the block was grouped under
        size: String,
        /// The parsed record
        record: ReportRecord,
    },
}

impl BenchmarkRecord {
    /// Grouping key shared by both variants.
    pub fn size_key(&self) -> String {
        match self {
            BenchmarkRecord::Sweep(r) => r.offset.to_string(),
            BenchmarkRecord::Report { size, .. } => size.clone(),
        }
    }
}

/// The view of a record the metric calculator works on.
pub trait Timed {
    /// Thread count; `None` when the record carries none.
    fn threads(&self) -> Option<u32>;
    /// Seconds the speedup is computed from.
    fn elapsed(&self) -> f64;
    /// Sequential records are never given a speedup entry.
    fn is_sequential(&self) -> bool;
}

impl Timed for SweepRecord {
    fn threads(&self) -> Option<u32> {
        self.threads
    }

    fn elapsed(&self) -> f64 {
        self.median
    }

    fn is_sequential(&self) -> bool {
        self.threads.is_none()
    }
}

impl Timed for ReportRecord {
    fn threads(&self) -> Option<u32> {
        Some(self.threads)
    }

    fn elapsed(&self) -> f64 {
        self.timings.total_time
    }

    fn is_sequential(&self) -> bool {
        self.kind == RunKind::Sequential
    }
}

impl Timed for BenchmarkRecord {
    fn threads(&self) -> Option<u32> {
        match self {
            BenchmarkRecord::Sweep(r) => r.threads(),
            BenchmarkRecord::Report { record, .. } => record.threads(),
        }
    }

    fn elapsed(&self) -> f64 {
        match self {
            BenchmarkRecord::Sweep(r) => r.elapsed(),
            BenchmarkRecord::Report { record, .. } => record.elapsed(),
        }
    }

    fn is_sequential(&self) -> bool {
        match self {
            BenchmarkRecord::Sweep(r) => r.is_sequential(),
            BenchmarkRecord::Report { record, .. } => record.is_sequential(),
        }
    }
}

/// An ordered collection of sweep records, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    /// Records in measurement order
    pub records: Vec<SweepRecord>,
}

/// Records sharing one offset, in dataset order.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetGroup {
    /// Shared problem size
    pub offset: u64,
    /// Members of the group
    pub records: Vec<SweepRecord>,
}

/// Records sharing one offset and one batch size.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingGroup {
    /// Shared problem size
    pub offset: u64,
    /// Shared batch size
    pub batch_size: Option<u64>,
    /// Members of the group
    pub records: Vec<SweepRecord>,
}

impl Dataset {
    /// Wraps records without validating them.
    pub fn new(records: Vec<SweepRecord>) -> Self {
        Self { records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rejects datasets where two records share a grid point.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !seen.insert(record.point()) {
                return Err(HarnessError::DuplicateRecord {
                    offset: record.offset,
                    threads: record.threads,
                    batch_size: record.batch_size,
                });
            }
        }
        Ok(())
    }

    /// Groups records by offset, groups in first-seen order.
    pub fn group_by_offset(&self) -> Vec<OffsetGroup> {
        let mut groups: Vec<OffsetGroup> = Vec::new();
        for record in &self.records {
            match groups.iter_mut().find(|g| g.offset == record.offset) {
                Some(group) => group.records.push(record.clone()),
                None => groups.push(OffsetGroup {
                    offset: record.offset,
                    records: vec![record.clone()],
                }),
            }
        }
        groups
    }

    /// Splits every offset group further by batch size.
    ///
    /// Within one of these groups each thread count appears at most once, so
    /// speedup is well defined per group.
    pub fn scaling_groups(&self) -> Vec<ScalingGroup> {
        let mut groups: Vec<ScalingGroup> = Vec::new();
        for record in &self.records {
            match groups
                .iter_mut()
                .find(|g| g.offset == record.offset && g.batch_size == record.batch_size)
            {
                Some(group) => group.records.push(record.clone()),
                None => groups.push(ScalingGroup {
                    offset: record.offset,
                    batch_size: record.batch_size,
                    records: vec![record.clone()],
                }),
            }
        }
        groups
    }
}

impl From<Vec<SweepRecord>> for Dataset {
    fn from(records: Vec<SweepRecord>) -> Self {
        Self::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(median: f64, offset: u64, threads: Option<u32>, batch_size: Option<u64>) -> SweepRecord {
        SweepRecord {
            median,
            offset,
            threads,
            batch_size,
        }
    }

    #[test]
    fn test_round_timing_six_decimals() {
        assert_eq!(round_timing(0.123_456_789), 0.123457);
        assert_eq!(round_timing(2.0), 2.0);
        assert_eq!(round_timing(1.000_000_4), 1.0);
    }

    #[test]
    fn test_point_args_order() {
        let point = SamplePoint {
            offset: 1000,
            threads: Some(4),
            batch_size: Some(10),
        };
        assert_eq!(point.args(), vec!["1000", "4", "10"]);

        let single = SamplePoint {
            offset: 7,
            threads: None,
            batch_size: None,
        };
        assert_eq!(single.args(), vec!["7"]);
    }

    #[test]
    fn test_sweep_record_json_shape() {
        let plain = rec(0.5, 10, None, None);
        assert_eq!(
            serde_json::to_string(&plain).unwrap(),
            r#"{"median":0.5,"offset":10}"#
        );

        let full = rec(0.25, 100, Some(2), Some(10));
        assert_eq!(
            serde_json::to_string(&full).unwrap(),
            r#"{"median":0.25,"offset":100,"threads":2,"batch_size":10}"#
        );
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let dataset = Dataset::new(vec![
            rec(1.0, 10, Some(1), None),
            rec(0.6, 10, Some(2), None),
            rec(0.9, 10, Some(1), None),
        ]);
        assert_eq!(
            dataset.validate(),
            Err(HarnessError::DuplicateRecord {
                offset: 10,
                threads: Some(1),
                batch_size: None
            })
        );
    }

    #[test]
    fn test_grouping_preserves_order() {
        let dataset = Dataset::new(vec![
            rec(1.0, 100, Some(1), Some(1)),
            rec(0.9, 100, Some(1), Some(10)),
            rec(0.5, 100, Some(2), Some(1)),
            rec(3.0, 5, Some(1), Some(1)),
        ]);

        let by_offset = dataset.group_by_offset();
        assert_eq!(by_offset.len(), 2);
        assert_eq!(by_offset[0].offset, 100);
        assert_eq!(by_offset[0].records.len(), 3);
        assert_eq!(by_offset[1].offset, 5);

        let scaling = dataset.scaling_groups();
        assert_eq!(scaling.len(), 3);
        assert_eq!(scaling[0].batch_size, Some(1));
        assert_eq!(scaling[0].records.len(), 2);
        assert_eq!(scaling[0].records[1].threads, Some(2));
    }

    #[test]
    fn test_timed_view() {
        let seq = ReportRecord {
            kind: RunKind::Sequential,
            median: 3.0,
            threads: 0,
            timings: TimingBreakdown {
                total_time: 8.0,
                ..Default::default()
            },
        };
        assert!(seq.is_sequential());
        assert_eq!(seq.elapsed(), 8.0);

        let wrapped = BenchmarkRecord::Sweep(rec(0.4, 10, Some(2), None));
        assert_eq!(wrapped.threads(), Some(2));
        assert_eq!(wrapped.elapsed(), 0.4);
        assert_eq!(wrapped.size_key(), "10");
    }
}
