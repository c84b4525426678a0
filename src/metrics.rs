//! Speedup, efficiency and improvement over grouped records.
//!
//! Metrics are computed per problem-size group and never across groups.
//! A group without a single-thread record has no baseline; that is reported
//! as `None` / [`GroupAnalysis::BaselineUnavailable`], not as an error.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{HarnessError, Result};
use crate::record::{SweepRecord, Timed};

/// Thread count → speedup relative to the single-thread run.
pub type Speedup = BTreeMap<u32, f64>;

/// Thread count → parallel efficiency in percent.
pub type Efficiency = BTreeMap<u32, f64>;

fn check_denominator(context: impl FnOnce() -> String, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(HarnessError::DegenerateDivision {
            context: context(),
            value,
        })
    }
}

/// Speedup of every non-sequential record over the `threads == 1` baseline.
///
/// Returns `Ok(None)` when the group has no baseline. The baseline itself is
/// included with a speedup of 1 if it is not sequential. Two records with the
/// same thread count make the group ambiguous and fail with
/// [`HarnessError::DuplicateThreadCount`].
pub fn speedup<R: Timed>(group: &[R]) -> Result<Option<Speedup>> {
    let Some(baseline) = group.iter().find(|r| r.threads() == Some(1)) else {
        return Ok(None);
    };
    let base_time = baseline.elapsed();
    if !base_time.is_finite() || base_time < 0.0 {
        return Err(HarnessError::DegenerateDivision {
            context: "speedup baseline".to_string(),
            value: base_time,
        });
    }

    let mut result = Speedup::new();
    for record in group.iter().filter(|r| !r.is_sequential()) {
        let Some(threads) = record.threads() else {
            continue;
        };
        let elapsed = record.elapsed();
        check_denominator(|| format!("speedup for {} thread(s)", threads), elapsed)?;
        if result.insert(threads, base_time / elapsed).is_some() {
            return Err(HarnessError::DuplicateThreadCount { threads });
        }
    }
    Ok(Some(result))
}

/// Speedup divided by thread count, in percent.
///
/// Not clamped: measurement noise can push it above 100.
pub fn efficiency(speedup: &Speedup) -> Result<Efficiency> {
    speedup
        .iter()
        .map(|(&threads, &ratio)| {
            check_denominator(
                || "efficiency thread count".to_string(),
                f64::from(threads),
            )?;
            Ok((threads, ratio / f64::from(threads) * 100.0))
        })
        .collect()
}

/// Relative gap between the faster and slower of two timings, in percent.
pub fn improvement(sequential: f64, concurrent: f64) -> Result<f64> {
    let best = sequential.min(concurrent);
    let worst = sequential.max(concurrent);
    check_denominator(|| "improvement".to_string(), worst)?;
    if best < 0.0 {
        return Err(HarnessError::DegenerateDivision {
            context: "improvement".to_string(),
            value: best,
        });
    }
    Ok((worst - best) / worst * 100.0)
}

/// Outcome of analysing one size group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupAnalysis {
    /// The group has a baseline and both metrics could be computed.
    Available {
        /// Speedup per thread count
        speedup: Speedup,
        /// Efficiency per thread count
        efficiency: Efficiency,
    },
    /// No single-thread record in the group.
    BaselineUnavailable,
}

impl GroupAnalysis {
    /// True when a baseline was found.
    pub fn is_available(&self) -> bool {
        matches!(self, GroupAnalysis::Available { .. })
    }
}

/// Speedup and efficiency for one group.
pub fn analyze_group<R: Timed>(group: &[R]) -> Result<GroupAnalysis> {
    match speedup(group)? {
        Some(speedup) => {
            let efficiency = efficiency(&speedup)?;
            Ok(GroupAnalysis::Available {
                speedup,
                efficiency,
            })
        }
        None => Ok(GroupAnalysis::BaselineUnavailable),
    }
}

/// Analyses every `(key, records)` group, preserving order.
pub fn analyze_groups<'a, K, R, I>(groups: I) -> Result<Vec<(K, GroupAnalysis)>>
where
    I: IntoIterator<Item = (K, &'a [R])>,
    K: std::fmt::Display,
    R: Timed + 'a,
{
    groups
        .into_iter()
        .map(|(key, records)| {
            let analysis = analyze_group(records)?;
            if !analysis.is_available() {
                warn!(group = %key, "no single-thread baseline; speedup unavailable");
            }
            Ok((key, analysis))
        })
        .collect()
}

/// Improvement of one sequential/concurrent pair at a shared offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairComparison {
    /// Shared offset
    pub offset: u64,
    /// Sequential timing, seconds
    pub sequential: f64,
    /// Concurrent timing, seconds
    pub concurrent: f64,
    /// Percent gap between the faster and slower run
    pub improvement: f64,
}

/// Pairs sequential and concurrent runs by offset and computes improvement.
///
/// Pairs follow the order of `sequential`; offsets missing from either side
/// are skipped with a warning.
pub fn compare_runs(
    sequential: &[SweepRecord],
    concurrent: &[SweepRecord],
) -> Result<Vec<PairComparison>> {
    let mut pairs = Vec::new();
    for seq in sequential {
        let Some(conc) = concurrent.iter().find(|c| c.offset == seq.offset) else {
            warn!(offset = seq.offset, "no concurrent run for offset; skipped");
            continue;
        };
        pairs.push(PairComparison {
            offset: seq.offset,
            sequential: seq.median,
            concurrent: conc.median,
            improvement: improvement(seq.median, conc.median)?,
        });
    }
    for conc in concurrent {
        if !sequential.iter().any(|s| s.offset == conc.offset) {
            warn!(offset = conc.offset, "no sequential run for offset; skipped");
        }
    }
    Ok(pairs)
}

/// Best configuration and thread scaling of one offset's sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingInsights {
    /// Offset summarised
    pub offset: u64,
    /// Fastest record of the offset
    pub best: SweepRecord,
    /// Percent gap between the slowest and the fastest record
    pub max_improvement: f64,
    /// Per batch size: highest thread count and its speedup over 1 thread
    pub batch_speedups: Vec<BatchSpeedup>,
}

/// Speedup at the highest thread count of one batch size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSpeedup {
    /// Batch size of the runs
    pub batch_size: Option<u64>,
    /// Highest thread count measured for it
    pub max_threads: u32,
    /// `None` when the batch size has no single-thread run
    pub speedup: Option<f64>,
}

/// Summarises the records of one offset.
///
/// Returns `Ok(None)` for an empty slice.
pub fn scaling_insights(offset: u64, records: &[SweepRecord]) -> Result<Option<ScalingInsights>> {
    let Some(best) = records
        .iter()
        .min_by(|a, b| a.median.total_cmp(&b.median))
        .cloned()
    else {
        return Ok(None);
    };
    let worst = records
        .iter()
        .map(|r| r.median)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_improvement = improvement(worst, best.median)?;

    let mut batches: Vec<Option<u64>> = Vec::new();
    for record in records {
        if !batches.contains(&record.batch_size) {
            batches.push(record.batch_size);
        }
    }

    let mut batch_speedups = Vec::with_capacity(batches.len());
    for batch_size in batches {
        let runs: Vec<&SweepRecord> = records
            .iter()
            .filter(|r| r.batch_size == batch_size)
            .collect();
        let Some(top) = runs
            .iter()
            .filter_map(|r| r.threads.map(|t| (t, r.median)))
            .max_by_key(|&(t, _)| t)
        else {
            continue;
        };
        let single = runs.iter().find(|r| r.threads == Some(1)).map(|r| r.median);
        let speedup = match single {
            Some(single) => {
                check_denominator(|| format!("speedup for {} thread(s)", top.0), top.1)?;
                Some(single / top.1)
            }
            None => None,
        };
        batch_speedups.push(BatchSpeedup {
            batch_size,
            max_threads: top.0,
            speedup,
        });
    }

    Ok(Some(ScalingInsights {
        offset,
        best,
        max_improvement,
        batch_speedups,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ReportRecord, RunKind, TimingBreakdown};

    fn report(kind: RunKind, threads: u32, total_time: f64) -> ReportRecord {
        ReportRecord {
            kind,
            median: 0.0,
            threads,
            timings: TimingBreakdown {
                total_time,
                ..Default::default()
            },
        }
    }

    fn parallel(threads: u32, total_time: f64) -> ReportRecord {
        report(RunKind::Concurrent("parallel".to_string()), threads, total_time)
    }

    fn sweep(median: f64, offset: u64, threads: Option<u32>, batch_size: Option<u64>) -> SweepRecord {
        SweepRecord {
            median,
            offset,
            threads,
            batch_size,
        }
    }

    #[test]
    fn test_speedup_and_efficiency() {
        let group = vec![parallel(1, 10.0), parallel(4, 4.0)];
        let speedup = speedup(&group).unwrap().unwrap();
        assert_eq!(speedup[&4], 2.5);
        assert_eq!(speedup[&1], 1.0);

        let efficiency = efficiency(&speedup).unwrap();
        assert_eq!(efficiency[&4], 62.5);
        assert_eq!(efficiency[&1], 100.0);
    }

    #[test]
    fn test_sequential_records_are_skipped() {
        let group = vec![
            report(RunKind::Sequential, 0, 12.0),
            parallel(1, 10.0),
            parallel(2, 5.0),
        ];
        let speedup = speedup(&group).unwrap().unwrap();
        assert_eq!(speedup.len(), 2);
        assert!(!speedup.contains_key(&0));
        assert_eq!(speedup[&2], 2.0);
    }

    #[test]
    fn test_missing_baseline_is_unavailable() {
        let group = vec![report(RunKind::Sequential, 0, 12.0), parallel(2, 5.0)];
        assert_eq!(speedup(&group).unwrap(), None);
        assert_eq!(
            analyze_group(&group).unwrap(),
            GroupAnalysis::BaselineUnavailable
        );
    }

    #[test]
    fn test_shared_thread_count_is_rejected() {
        let group = vec![
            parallel(1, 10.0),
            parallel(4, 4.0),
            report(RunKind::Concurrent("tiled".to_string()), 4, 2.0),
        ];
        assert_eq!(
            speedup(&group).unwrap_err(),
            HarnessError::DuplicateThreadCount { threads: 4 }
        );
        assert!(analyze_group(&group).is_err());
    }

    #[test]
    fn test_zero_time_fails_loudly() {
        let group = vec![parallel(1, 10.0), parallel(8, 0.0)];
        let err = speedup(&group).unwrap_err();
        assert!(matches!(err, HarnessError::DegenerateDivision { value, .. } if value == 0.0));

        let negative = vec![parallel(1, 10.0), parallel(2, -1.0)];
        assert!(speedup(&negative).is_err());
    }

    #[test]
    fn test_superlinear_efficiency_not_clamped() {
        let group = vec![parallel(1, 10.0), parallel(2, 4.0)];
        let efficiency = efficiency(&speedup(&group).unwrap().unwrap()).unwrap();
        assert_eq!(efficiency[&2], 125.0);
    }

    #[test]
    fn test_efficiency_rejects_zero_threads() {
        let mut bogus = Speedup::new();
        bogus.insert(0, 1.0);
        assert!(efficiency(&bogus).is_err());
    }

    #[test]
    fn test_improvement() {
        assert_eq!(improvement(5.0, 2.0).unwrap(), 60.0);
        assert_eq!(improvement(2.0, 5.0).unwrap(), 60.0);
        assert_eq!(improvement(3.0, 3.0).unwrap(), 0.0);
        assert!(improvement(0.0, 0.0).is_err());
    }

    #[test]
    fn test_analyze_groups_keeps_order() {
        let with_base = vec![parallel(1, 9.0), parallel(3, 3.0)];
        let without = vec![parallel(2, 1.0)];
        let groups = vec![("big", with_base.as_slice()), ("small", without.as_slice())];
        let results = analyze_groups(groups).unwrap();
        assert_eq!(results[0].0, "big");
        assert!(results[0].1.is_available());
        assert_eq!(results[1].1, GroupAnalysis::BaselineUnavailable);
    }

    #[test]
    fn test_compare_runs_pairs_by_offset() {
        let seq = vec![sweep(5.0, 10, None, None), sweep(8.0, 100, None, None)];
        let conc = vec![sweep(4.0, 100, None, None), sweep(2.0, 10, None, None)];
        let pairs = compare_runs(&seq, &conc).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].offset, 10);
        assert_eq!(pairs[0].improvement, 60.0);
        assert_eq!(pairs[1].improvement, 50.0);
    }

    #[test]
    fn test_compare_runs_skips_unmatched() {
        let seq = vec![sweep(5.0, 10, None, None), sweep(8.0, 100, None, None)];
        let conc = vec![sweep(2.0, 10, None, None)];
        assert_eq!(compare_runs(&seq, &conc).unwrap().len(), 1);
    }

    #[test]
    fn test_sweep_records_use_median() {
        let group = vec![
            sweep(8.0, 100, Some(1), None),
            sweep(2.0, 100, Some(4), None),
        ];
        let speedup = speedup(&group).unwrap().unwrap();
        assert_eq!(speedup[&4], 4.0);
    }

    #[test]
    fn test_scaling_insights() {
        let records = vec![
            sweep(10.0, 1000, Some(1), Some(1)),
            sweep(8.0, 1000, Some(1), Some(10)),
            sweep(4.0, 1000, Some(4), Some(1)),
            sweep(2.0, 1000, Some(4), Some(10)),
        ];
        let insights = scaling_insights(1000, &records).unwrap().unwrap();
        assert_eq!(insights.best.threads, Some(4));
        assert_eq!(insights.best.batch_size, Some(10));
        assert_eq!(insights.max_improvement, 80.0);
        assert_eq!(insights.batch_speedups.len(), 2);
        assert_eq!(insights.batch_speedups[0].max_threads, 4);
        assert_eq!(insights.batch_speedups[0].speedup, Some(2.5));
        assert_eq!(insights.batch_speedups[1].speedup, Some(4.0));
    }

    #[test]
    fn test_scaling_insights_empty() {
        assert_eq!(scaling_insights(1, &[]).unwrap(), None);
    }
}
