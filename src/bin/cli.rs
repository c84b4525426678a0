//! parsweep CLI - benchmark sweeps and scaling analysis
//!
//! Usage:
//!   parsweep sweep [PROGRAM] --offsets 1,10,100 [--threads 1,2,4] [--batch] [OPTIONS]
//!   parsweep analyze <REPORT> [--markdown <FILE>]
//!   parsweep scaling <DATASET> [--markdown <FILE>]
//!   parsweep compare <SEQUENTIAL> <CONCURRENT> [--markdown <FILE>]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use parsweep::metrics::{self, GroupAnalysis};
use parsweep::store::{self, JsonCheckpoint};
use parsweep::{
    BatchAxis, CancelToken, Checkpoint, HarnessError, Sampler, Sweep, SweepPlan, SweepRecord,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing_subscriber::EnvFilter;

/// Benchmark sweep harness and scaling analyser
#[derive(Parser)]
#[command(name = "parsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program across a parameter grid and store mean timings
    Sweep {
        /// Benchmarked program
        #[arg(env = "PARSWEEP_PROGRAM", default_value = "./bench")]
        program: PathBuf,

        /// Argument passed before the grid arguments (repeatable)
        #[arg(long = "program-arg", allow_hyphen_values = true)]
        program_args: Vec<String>,

        /// Start from a predefined grid
        #[arg(short, long, value_enum, env = "PARSWEEP_PRESET")]
        preset: Option<Preset>,

        /// Problem sizes, comma separated
        #[arg(long, value_delimiter = ',', env = "PARSWEEP_OFFSETS")]
        offsets: Vec<u64>,

        /// Thread counts, comma separated
        #[arg(long, value_delimiter = ',', env = "PARSWEEP_THREADS")]
        threads: Vec<u32>,

        /// Also sweep batch sizes 1, 10, 100, ... up to each offset
        #[arg(long)]
        batch: bool,

        /// Samples averaged per configuration
        #[arg(short, long, env = "PARSWEEP_REPETITIONS")]
        repetitions: Option<usize>,

        /// Pause after every sample, in milliseconds
        #[arg(long, env = "PARSWEEP_PAUSE_MS")]
        pause_ms: Option<u64>,

        /// Kill a sample after this many seconds (0 waits forever)
        #[arg(long, env = "PARSWEEP_TIMEOUT_SECS", default_value_t = 3600)]
        timeout_secs: u64,

        /// Dataset file, rewritten after every configuration
        #[arg(short, long, default_value = "out.json")]
        output: PathBuf,

        /// Overwrite output file if it exists
        #[arg(short, long)]
        force: bool,

        /// Suppress output except errors
        #[arg(short, long)]
        quiet: bool,
    },
    /// Parse a text report and print speedup and efficiency per size
    Analyze {
        /// Report with blank-line separated blocks
        report: PathBuf,

        /// Also write a Markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },
    /// Speedup, efficiency and best configuration of a stored sweep
    Scaling {
        /// Dataset written by `sweep`
        dataset: PathBuf,

        /// Also write a Markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },
    /// Improvement between a sequential and a concurrent sweep
    Compare {
        /// Dataset of the sequential program
        sequential: PathBuf,

        /// Dataset of the concurrent program
        concurrent: PathBuf,

        /// Also write a Markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Preset {
    /// Offsets 1 to 10^7, offset axis only, 3 samples, 1s pause
    Digits,
    /// Offset 10^8, threads 1-12, batch sizes, 5 samples
    Scaling,
}

impl Preset {
    fn plan(self) -> SweepPlan {
        match self {
            Preset::Digits => SweepPlan::offsets([1, 10, 10_000, 1_000_000, 10_000_000])
                .with_repetitions(3)
                .with_pause(Duration::from_secs(1)),
            Preset::Scaling => SweepPlan::offsets([100_000_000])
                .with_threads([1, 2, 4, 8, 12])
                .with_batch(BatchAxis::Geometric)
                .with_repetitions(5)
                .with_pause(Duration::ZERO),
        }
    }
}

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_MEASUREMENT_FAILED: i32 = 2;
const EXIT_PARSE_FAILED: i32 = 3;
const EXIT_USER_CANCELLED: i32 = 5;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sweep {
            program,
            program_args,
            preset,
            offsets,
            threads,
            batch,
            repetitions,
            pause_ms,
            timeout_secs,
            output,
            force,
            quiet,
        } => {
            let plan = build_plan(preset, offsets, threads, batch, repetitions, pause_ms);
            let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
            let sampler = Sampler::new(program)
                .with_leading_args(program_args)
                .with_timeout(timeout);
            handle_sweep(sampler, &plan, &output, force, quiet)
        }
        Commands::Analyze { report, markdown } => handle_analyze(&report, markdown.as_deref()),
        Commands::Scaling { dataset, markdown } => handle_scaling(&dataset, markdown.as_deref()),
        Commands::Compare {
            sequential,
            concurrent,
            markdown,
        } => handle_compare(&sequential, &concurrent, markdown.as_deref()),
    };

    match result {
        Ok(()) => process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red().bold(), e);

            let exit_code = match e.downcast_ref::<HarnessError>() {
                Some(err) if err.is_measurement() => EXIT_MEASUREMENT_FAILED,
                Some(HarnessError::Parse { .. }) => EXIT_PARSE_FAILED,
                _ if e.to_string().contains("cancelled") => EXIT_USER_CANCELLED,
                _ => EXIT_ERROR,
            };

            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_plan(
    preset: Option<Preset>,
    offsets: Vec<u64>,
    threads: Vec<u32>,
    batch: bool,
    repetitions: Option<usize>,
    pause_ms: Option<u64>,
) -> SweepPlan {
    let mut plan = preset.map(Preset::plan).unwrap_or_default();
    if !offsets.is_empty() {
        plan.offsets = offsets;
    }
    if !threads.is_empty() {
        plan.threads = Some(threads);
    }
    if batch {
        plan.batch = BatchAxis::Geometric;
    }
    if let Some(repetitions) = repetitions {
        plan.repetitions = repetitions;
    }
    if let Some(pause_ms) = pause_ms {
        plan.pause = Duration::from_millis(pause_ms);
    }
    plan
}

// ============================================================================
// Sweep
// ============================================================================

/// Saves to disk, then reports progress.
struct ProgressCheckpoint {
    inner: JsonCheckpoint,
    total: usize,
    quiet: bool,
}

impl Checkpoint for ProgressCheckpoint {
    fn save(&mut self, records: &[SweepRecord]) -> parsweep::Result<()> {
        self.inner.save(records)?;
        if !self.quiet {
            if let Some(record) = records.last() {
                println!(
                    "{} {}: {}",
                    format!("[{}/{}]", records.len(), self.total).bright_cyan(),
                    record.point(),
                    format_seconds(record.median)
                );
            }
        }
        Ok(())
    }
}

fn handle_sweep(
    sampler: Sampler,
    plan: &SweepPlan,
    output_path: &Path,
    force: bool,
    quiet: bool,
) -> Result<()> {
    if plan.offsets.is_empty() {
        bail!("No offsets to sweep\n   Pass --offsets or --preset");
    }

    if output_path.exists() && !force {
        bail!(
            "Output file already exists: {}\n   Use --force to overwrite",
            output_path.display()
        );
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!(
            "\n{} finishing current configuration, keeping results so far...",
            "Received Ctrl+C:".bright_yellow().bold()
        );
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let program = sampler.program().display().to_string();
    let mut sweep = Sweep::new(plan, sampler)?.with_cancel(cancel);

    if !quiet {
        print_hardware(&collect_hardware_info());
        println!(
            "{} {} configurations x {} samples of {}",
            "Sweep:".bright_cyan(),
            sweep.total(),
            plan.repetitions,
            program
        );
        println!("{} Press Ctrl+C to stop after the current configuration", "Info:".bright_cyan());
        println!();
    }

    let mut checkpoint = ProgressCheckpoint {
        inner: JsonCheckpoint::new(output_path),
        total: sweep.total(),
        quiet,
    };

    let start = Instant::now();
    let records = sweep.run_with_checkpoint(&mut checkpoint).with_context(|| {
        format!(
            "Sweep stopped; completed configurations are in {}",
            output_path.display()
        )
    })?;

    if sweep.was_cancelled() {
        bail!(
            "Sweep cancelled after {}/{} configurations; partial results kept in {}",
            records.len(),
            sweep.total(),
            output_path.display()
        );
    }

    if !quiet {
        println!();
        println!(
            "{} Wrote {} records to {} in {}",
            "Success:".bright_green().bold(),
            records.len(),
            output_path.display(),
            format_seconds(start.elapsed().as_secs_f64())
        );
    }

    Ok(())
}

// ============================================================================
// Analysis
// ============================================================================

fn handle_analyze(report_path: &Path, markdown: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(report_path)
        .with_context(|| format!("Failed to read report: {}", report_path.display()))?;
    let report = parsweep::parse_report(&text)
        .with_context(|| format!("Failed to parse report: {}", report_path.display()))?;

    if report.is_empty() {
        bail!("Report contains no blocks: {}", report_path.display());
    }

    let analyses = metrics::analyze_groups(
        report
            .groups
            .iter()
            .map(|g| (format!("Matrix size {}", g.size), g.records.as_slice())),
    )?;

    let mut md = String::new();
    for (title, analysis) in &analyses {
        print_analysis(title, analysis);
        push_analysis_markdown(&mut md, title, analysis);
    }

    if let Some(path) = markdown {
        write_markdown(path, "Report Scaling Analysis", &md)?;
    }
    Ok(())
}

fn handle_scaling(dataset_path: &Path, markdown: Option<&Path>) -> Result<()> {
    let dataset = store::load_dataset(dataset_path)?;
    dataset
        .validate()
        .with_context(|| format!("Inconsistent dataset: {}", dataset_path.display()))?;

    if dataset.is_empty() {
        bail!("Dataset is empty: {}", dataset_path.display());
    }

    let groups = dataset.scaling_groups();
    let analyses = metrics::analyze_groups(groups.iter().map(|g| {
        let title = match g.batch_size {
            Some(batch) => format!("Offset {}, batch size {}", g.offset, batch),
            None => format!("Offset {}", g.offset),
        };
        (title, g.records.as_slice())
    }))?;

    let mut md = String::new();
    for (title, analysis) in &analyses {
        print_analysis(title, analysis);
        push_analysis_markdown(&mut md, title, analysis);
    }

    for group in dataset.group_by_offset() {
        let Some(insights) = metrics::scaling_insights(group.offset, &group.records)? else {
            continue;
        };

        println!(
            "{} offset {}",
            "Performance insights:".bright_cyan().bold(),
            insights.offset
        );
        println!(
            "   Best configuration: {} ({})",
            insights.best.point(),
            format_seconds(insights.best.median)
        );
        println!(
            "   Maximum improvement: {:.2}% from worst to best case",
            insights.max_improvement
        );

        let _ = writeln!(md, "## Insights: offset {}\n", insights.offset);
        let _ = writeln!(
            md,
            "- **Best configuration:** {} ({:.6}s)",
            insights.best.point(),
            insights.best.median
        );
        let _ = writeln!(
            md,
            "- **Maximum improvement:** {:.2}%\n",
            insights.max_improvement
        );

        for entry in &insights.batch_speedups {
            let label = match entry.batch_size {
                Some(batch) => format!("Batch size {}", batch),
                None => "All runs".to_string(),
            };
            let speedup = match entry.speedup {
                Some(s) => format!("{:.2}x", s),
                None => "n/a (no 1-thread run)".to_string(),
            };
            println!(
                "   {}: speedup at {} threads: {}",
                label, entry.max_threads, speedup
            );
            let _ = writeln!(
                md,
                "- {}: speedup at {} threads: {}",
                label, entry.max_threads, speedup
            );
        }
        println!();
        md.push('\n');
    }

    if let Some(path) = markdown {
        write_markdown(path, "Sweep Scaling Analysis", &md)?;
    }
    Ok(())
}

fn handle_compare(sequential: &Path, concurrent: &Path, markdown: Option<&Path>) -> Result<()> {
    let seq = store::load_dataset(sequential)?;
    let conc = store::load_dataset(concurrent)?;

    let pairs = metrics::compare_runs(&seq.records, &conc.records)?;
    if pairs.is_empty() {
        bail!("The two datasets share no offsets");
    }

    let mut md = String::new();
    md.push_str("| Offset | Sequential (s) | Concurrent (s) | Improvement |\n");
    md.push_str("|--------|----------------|----------------|-------------|\n");

    for pair in &pairs {
        println!("{} {}", "Improvement for offset:".bright_cyan().bold(), pair.offset);
        println!("{}", "-".repeat(43));
        println!("Sequential median time: {:.6}", pair.sequential);
        println!("Concurrent median time: {:.6}", pair.concurrent);
        println!(
            "Improvement best to worst: {}\n",
            format!("{:.2}%", pair.improvement).bright_green()
        );

        let _ = writeln!(
            md,
            "| {} | {:.6} | {:.6} | {:.2}% |",
            pair.offset, pair.sequential, pair.concurrent, pair.improvement
        );
    }

    if let Some(path) = markdown {
        write_markdown(path, "Sequential vs Concurrent", &md)?;
    }
    Ok(())
}

fn print_analysis(title: &str, analysis: &GroupAnalysis) {
    println!("{}", title.bright_cyan().bold());
    match analysis {
        GroupAnalysis::Available {
            speedup,
            efficiency,
        } => {
            println!("   {:>8}  {:>10}  {:>11}", "Threads", "Speedup", "Efficiency");
            for (threads, ratio) in speedup {
                let eff = efficiency.get(threads).copied().unwrap_or(f64::NAN);
                println!("   {:>8}  {:>9.3}x  {:>10.1}%", threads, ratio, eff);
            }
        }
        GroupAnalysis::BaselineUnavailable => {
            println!(
                "   {}",
                "Baseline unavailable: no single-thread run".bright_yellow()
            );
        }
    }
    println!();
}

fn push_analysis_markdown(md: &mut String, title: &str, analysis: &GroupAnalysis) {
    let _ = writeln!(md, "## {}\n", title);
    match analysis {
        GroupAnalysis::Available {
            speedup,
            efficiency,
        } => {
            md.push_str("| Threads | Speedup | Efficiency |\n");
            md.push_str("|---------|---------|------------|\n");
            for (threads, ratio) in speedup {
                let eff = efficiency.get(threads).copied().unwrap_or(f64::NAN);
                let _ = writeln!(md, "| {} | {:.3} | {:.1}% |", threads, ratio, eff);
            }
        }
        GroupAnalysis::BaselineUnavailable => {
            md.push_str("*Baseline unavailable: no single-thread run.*\n");
        }
    }
    md.push('\n');
}

// ============================================================================
// Reports
// ============================================================================

struct HardwareInfo {
    cpu_brand: String,
    cpu_cores: usize,
    total_memory_mb: u64,
    os: String,
}

fn collect_hardware_info() -> HardwareInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    let cpu_brand = sys
        .cpus()
        .first()
        .map(|cpu| cpu.brand().to_string())
        .unwrap_or_else(|| "Unknown CPU".to_string());

    HardwareInfo {
        cpu_brand,
        cpu_cores: sys.cpus().len(),
        total_memory_mb: sys.total_memory() / 1024 / 1024,
        os: format!(
            "{} {}",
            System::name().unwrap_or_else(|| "Unknown".to_string()),
            System::os_version().unwrap_or_else(|| "Unknown".to_string())
        ),
    }
}

fn print_hardware(hardware: &HardwareInfo) {
    println!(
        "{} {} ({} cores), {} MB RAM, {}",
        "Host:".bright_cyan(),
        hardware.cpu_brand,
        hardware.cpu_cores,
        hardware.total_memory_mb,
        hardware.os
    );
}

fn write_markdown(path: &Path, title: &str, body: &str) -> Result<()> {
    let hardware = collect_hardware_info();
    let mut report = String::new();

    let _ = writeln!(report, "# {}\n", title);
    let _ = writeln!(
        report,
        "**Generated:** {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    report.push_str("## Hardware Configuration\n\n");
    report.push_str("````\n");
    let _ = writeln!(report, "CPU:    {}", hardware.cpu_brand);
    let _ = writeln!(report, "Cores:  {}", hardware.cpu_cores);
    let _ = writeln!(report, "RAM:    {} MB", hardware.total_memory_mb);
    let _ = writeln!(report, "OS:     {}", hardware.os);
    report.push_str("````\n\n");

    report.push_str(body);

    report.push_str("---\n\n");
    report.push_str("*generated by parsweep*\n");

    fs::write(path, report)
        .with_context(|| format!("Failed to write Markdown report: {}", path.display()))?;
    println!(
        "{} Markdown report written to {}",
        "Success:".bright_green().bold(),
        path.display()
    );
    Ok(())
}

// ============================================================================
// Utilities
// ============================================================================

fn format_seconds(seconds: f64) -> String {
    if seconds < 1e-6 {
        format!("{:.0}ns", seconds * 1e9)
    } else if seconds < 1e-3 {
        format!("{:.1}μs", seconds * 1e6)
    } else if seconds < 1.0 {
        format!("{:.2}ms", seconds * 1e3)
    } else {
        format!("{:.3}s", seconds)
    }
}
