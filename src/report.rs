//! Parsing free-text benchmark reports back into records.
//!
//! A report is a sequence of blank-line separated blocks:
//!
//! ```text
//! 1000 - 42 Median Values (parallel 4 Threads)
//! Read: 1.0
//! Write: 2.0
//! Mult.: 3.0
//! Total Time: 10.0
//! ```
//!
//! The header's descriptor is either `seq` or `<type> <threads> Threads`
//! (`<type> - <threads> Threads` is accepted too). A malformed block fails the
//! whole parse.

use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::record::{BenchmarkRecord, ReportRecord, RunKind, TimingBreakdown};

const MEDIAN_MARKER: &str = "Median Values";
const THREADS_SUFFIX: &str = " Threads";
const BLOCK_LINES: usize = 5;

/// Records of one matrix size, in report order.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeGroup {
    /// Matrix size exactly as written in the headers
    pub size: String,
    /// Records in block order
    pub records: Vec<ReportRecord>,
}

/// A parsed report: groups in the order their size first appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Size groups
    pub groups: Vec<SizeGroup>,
}

impl Report {
    /// Records grouped under `size`, if any.
    pub fn get(&self, size: &str) -> Option<&[ReportRecord]> {
        self.groups
            .iter()
            .find(|g| g.size == size)
            .map(|g| g.records.as_slice())
    }

    /// Total number of records across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    /// True when the report held no blocks.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn push(&mut self, size: String, record: ReportRecord) {
        match self.groups.iter_mut().find(|g| g.size == size) {
            Some(group) => group.records.push(record),
            None => self.groups.push(SizeGroup {
                size,
                records: vec![record],
            }),
        }
    }

    /// Flattens the report into tagged records, group by group.
    pub fn into_records(self) -> Vec<BenchmarkRecord> {
        self.groups
            .into_iter()
            .flat_map(|group| {
                let size = group.size;
                group
                    .records
                    .into_iter()
                    .map(move |record| BenchmarkRecord::Report {
                        size: size.clone(),
                        record,
                    })
            })
            .collect()
    }
}

/// Parses a whole report.
pub fn parse_report(text: &str) -> Result<Report> {
    let text = text.replace("\r\n", "\n");
    let mut report = Report::default();

    let blocks = text.split("\n\n").filter(|block| !block.trim().is_empty());
    for (index, block) in blocks.enumerate() {
        let (size, record) = parse_block(block).map_err(|reason| HarnessError::Parse {
            block: index + 1,
            reason,
        })?;
        debug!(block = index + 1, %size, kind = %record.kind, threads = record.threads, "parsed block");
        report.push(size, record);
    }

    Ok(report)
}

/// Parses one block into its matrix size and record.
pub fn parse_block(block: &str) -> std::result::Result<(String, ReportRecord), String> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() != BLOCK_LINES {
        return Err(format!(
            "expected {} lines, found {}",
            BLOCK_LINES,
            lines.len()
        ));
    }

    let (size, median, kind, threads) = parse_header(lines[0])?;
    let timings = TimingBreakdown {
        read: labeled_value(lines[1], "Read: ")?,
        write: labeled_value(lines[2], "Write: ")?,
        mult: labeled_value(lines[3], "Mult.: ")?,
        total_time: labeled_value(lines[4], "Total Time: ")?,
    };

    Ok((
        size,
        ReportRecord {
            kind,
            median,
            threads,
            timings,
        },
    ))
}

fn parse_header(line: &str) -> std::result::Result<(String, f64, RunKind, u32), String> {
    let (size, rest) = line
        .split_once('-')
        .ok_or_else(|| format!("header {:?} has no \"-\" separator", line))?;
    let size = size.trim();
    if size.is_empty() {
        return Err(format!("header {:?} has no matrix size", line));
    }

    let rest = rest.trim().replace(MEDIAN_MARKER, "");
    let (median, descriptor) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| format!("header {:?} has no run descriptor", line))?;
    let median: f64 = median
        .parse()
        .map_err(|_| format!("median {:?} is not a number", median))?;
    if !median.is_finite() || median < 0.0 {
        return Err(format!("median {} is out of range", median));
    }

    let descriptor = descriptor.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
    let (kind, threads) = parse_descriptor(descriptor)?;

    Ok((size.to_string(), median, kind, threads))
}

fn parse_descriptor(descriptor: &str) -> std::result::Result<(RunKind, u32), String> {
    if descriptor == RunKind::Sequential.label() {
        return Ok((RunKind::Sequential, 0));
    }

    let body = descriptor
        .strip_suffix(THREADS_SUFFIX)
        .unwrap_or(descriptor)
        .trim();
    let (label, count) = body
        .split_once(" - ")
        .or_else(|| body.rsplit_once(char::is_whitespace))
        .ok_or_else(|| format!("descriptor {:?} has no thread count", descriptor))?;

    let label = label.trim();
    if label.is_empty() {
        return Err(format!("descriptor {:?} has no run type", descriptor));
    }
    let threads: u32 = count
        .trim()
        .parse()
        .map_err(|_| format!("thread count {:?} is not a number", count.trim()))?;
    if threads == 0 {
        return Err(format!(
            "descriptor {:?} has a zero thread count",
            descriptor
        ));
    }

    Ok((RunKind::Concurrent(label.to_string()), threads))
}

fn labeled_value(line: &str, label: &str) -> std::result::Result<f64, String> {
    let value = line
        .strip_prefix(label)
        .ok_or_else(|| format!("expected {:?} line, found {:?}", label.trim_end(), line))?;
    let value = value.trim().trim_end_matches('s').trim_end();
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("{} value {:?} is not a number", label.trim_end(), value))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("{} value {} is out of range", label.trim_end(), seconds));
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARALLEL_BLOCK: &str = "1000 - 42 Median Values (parallel 4 Threads)\n\
                                  Read: 1.0\n\
                                  Write: 2.0\n\
                                  Mult.: 3.0\n\
                                  Total Time: 10.0";

    #[test]
    fn test_parse_parallel_block() {
        let report = parse_report(PARALLEL_BLOCK).unwrap();
        let group = report.get("1000").unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(
            group[0],
            ReportRecord {
                kind: RunKind::Concurrent("parallel".to_string()),
                median: 42.0,
                threads: 4,
                timings: TimingBreakdown {
                    read: 1.0,
                    write: 2.0,
                    mult: 3.0,
                    total_time: 10.0,
                },
            }
        );
    }

    #[test]
    fn test_parse_seq_block() {
        let text = "500 - 7 Median Values (seq)\nRead: 0.5\nWrite: 0.25\nMult.: 4.0\nTotal Time: 4.75\n";
        let report = parse_report(text).unwrap();
        let record = &report.get("500").unwrap()[0];
        assert_eq!(record.kind, RunKind::Sequential);
        assert_eq!(record.kind.label(), "seq");
        assert_eq!(record.threads, 0);
        assert_eq!(record.timings.total_time, 4.75);
    }

    #[test]
    fn test_parse_dashed_descriptor() {
        let (kind, threads) = parse_descriptor("conc - 8 Threads").unwrap();
        assert_eq!(kind, RunKind::Concurrent("conc".to_string()));
        assert_eq!(threads, 8);
    }

    #[test]
    fn test_parse_bare_descriptor_and_units() {
        let text = "2000 - 3 Median Values parallel 2 Threads\nRead: 1.5s\nWrite: 0.5s\nMult.: 2s\nTotal Time: 4.0s";
        let report = parse_report(text).unwrap();
        let record = &report.get("2000").unwrap()[0];
        assert_eq!(record.threads, 2);
        assert_eq!(record.timings.mult, 2.0);
    }

    #[test]
    fn test_multi_word_type_label() {
        let (kind, threads) = parse_descriptor("parallel tiled 12 Threads").unwrap();
        assert_eq!(kind, RunKind::Concurrent("parallel tiled".to_string()));
        assert_eq!(threads, 12);
    }

    #[test]
    fn test_groups_keep_order() {
        let text = "\
1000 - 1 Median Values (seq)
Read: 1
Write: 1
Mult.: 8
Total Time: 10

500 - 1 Median Values (seq)
Read: 1
Write: 1
Mult.: 2
Total Time: 4

1000 - 1 Median Values (parallel 2 Threads)
Read: 1
Write: 1
Mult.: 3
Total Time: 5


";
        let report = parse_report(text).unwrap();
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].size, "1000");
        assert_eq!(report.groups[1].size, "500");
        assert_eq!(report.len(), 3);
        let thousand = report.get("1000").unwrap();
        assert_eq!(thousand[0].kind, RunKind::Sequential);
        assert_eq!(thousand[1].threads, 2);
    }

    #[test]
    fn test_crlf_input() {
        let text = PARALLEL_BLOCK.replace('\n', "\r\n");
        assert_eq!(parse_report(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_short_block_names_its_index() {
        let text = format!("{}\n\n1000 - 1 Median Values (seq)\nRead: 1.0\n", PARALLEL_BLOCK);
        let err = parse_report(&text).unwrap_err();
        match err {
            HarnessError::Parse { block, reason } => {
                assert_eq!(block, 2);
                assert!(reason.contains("expected 5 lines"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_block_index_ignores_blank_runs() {
        let text = format!("\n\n\n\n{}\n\n\n\n\n10 - 1 Median Values (seq)\nRead: 1\n", PARALLEL_BLOCK);
        match parse_report(&text).unwrap_err() {
            HarnessError::Parse { block, .. } => assert_eq!(block, 2),
            other => panic!("unexpected error: {other:?}"),
        }

        let leading = "\n\n10 - 1 Median Values (seq)\nRead: 1\n";
        match parse_report(leading).unwrap_err() {
            HarnessError::Parse { block, .. } => assert_eq!(block, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_header_fails() {
        assert!(parse_block("garbage\nRead: 1\nWrite: 1\nMult.: 1\nTotal Time: 1").is_err());
        assert!(parse_block("10 - x Median Values (seq)\nRead: 1\nWrite: 1\nMult.: 1\nTotal Time: 1").is_err());
        assert!(parse_block("10 - 1 Median Values (parallel Threads)\nRead: 1\nWrite: 1\nMult.: 1\nTotal Time: 1").is_err());
        assert!(parse_block("10 - 1 Median Values (parallel 0 Threads)\nRead: 1\nWrite: 1\nMult.: 1\nTotal Time: 1").is_err());
    }

    #[test]
    fn test_misplaced_label_fails() {
        let err = parse_block("10 - 1 Median Values (seq)\nWrite: 1\nRead: 1\nMult.: 1\nTotal Time: 1")
            .unwrap_err();
        assert!(err.contains("Read:"));
    }

    #[test]
    fn test_empty_report() {
        assert!(parse_report("").unwrap().is_empty());
        assert!(parse_report("\n\n\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_into_records_tags_size() {
        let records = parse_report(PARALLEL_BLOCK).unwrap().into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size_key(), "1000");
    }
}
