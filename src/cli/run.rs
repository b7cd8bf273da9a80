use crate::cli::args::{Cli, Commands, FormatArg, RunArgs};
use crate::core::engine::{self, RunConfig, WellInput};
use crate::core::io::is_stdin;
use crate::core::model::InputFormat;
use crate::core::timing::{fmt_dur, stage, stage_done, stats_enabled};
use crate::report;
use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

const HIFI_READS_DIR: &str = "hifi_reads";

// Compound suffixes before their tails, so `.readstats.gz` is not cut at `.gz` only.
const KNOWN_SUFFIXES: [&str; 11] = [
    ".hifi_reads.sam.gz",
    ".hifi_reads.sam",
    ".readstats.gz",
    ".readstats",
    ".sam.gz",
    ".sam.bgz",
    ".tsv.gz",
    ".txt.gz",
    ".sam",
    ".tsv",
    ".txt",
];

pub fn entry() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let stats = stats_enabled();
    let t0 = Instant::now();

    stage(stats, "preflight", || {
        if args.threads == 0 {
            bail!("--threads must be >= 1");
        }
        let stdin_inputs = args.inputs.iter().filter(|p| is_stdin(p)).count();
        if stdin_inputs > 1 {
            bail!("stdin (-) can only be given once");
        }
        for p in args.inputs.iter().filter(|p| !is_stdin(p)) {
            if !p.is_file() {
                bail!("input file not found: {}", p.display());
            }
        }
        Ok(())
    })?;

    info!("threads={} out={}", args.threads, args.out.display());

    let wells = stage(stats, "group-wells", || {
        group_wells(&args.inputs, args.well.as_deref(), args.group_by_parent)
    })?;

    let t_out = Instant::now();
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output dir {}", args.out.display()))?;
    stage_done(stats, "mkdir", t_out);

    let format = match args.format {
        FormatArg::Auto => InputFormat::Auto,
        FormatArg::ReadStats => InputFormat::ReadStats,
        FormatArg::Sam => InputFormat::Sam,
    };

    let config = RunConfig {
        wells,
        out_dir: args.out.clone(),
        threads: args.threads,
        format,
        exclude_flags: args.exclude_flags,
        per_read: !args.summary_only,
        zip: args.zip,
    };

    let t_engine = Instant::now();
    let output = engine::run(config)?;
    stage_done(stats, "engine", t_engine);

    for w in &output.wells {
        info!(
            "well {}: reads={} bases={} n50={} Q{} (skipped {})",
            w.name,
            w.summary.read_count,
            w.summary.total_bases,
            w.summary.n50,
            w.summary.median_quality,
            w.skipped
        );
        for path in &w.artifacts {
            info!("  wrote {}", path.display());
        }
    }

    if let Some(path) = &args.combined {
        let t_combined = Instant::now();
        let rows: Vec<(String, _)> = output
            .wells
            .iter()
            .map(|w| (w.name.clone(), w.summary))
            .collect();
        report::stat_txt::write_combined(path, &rows)
            .with_context(|| format!("failed to write {}", path.display()))?;
        stage_done(stats, "combined", t_combined);
    }

    if stats {
        eprintln!("KIRA_STATS output_dir={}", args.out.display());
        eprintln!("KIRA_STATS total={}", fmt_dur(t0.elapsed()));
    }

    if !output.failed.is_empty() {
        let names: Vec<&str> = output.failed.iter().map(|(n, _)| n.as_str()).collect();
        bail!(
            "{} of {} wells failed: {}",
            output.failed.len(),
            output.failed.len() + output.wells.len(),
            names.join(", ")
        );
    }
    info!("done, per-well files are under {}/", args.out.display());
    Ok(())
}

// Wells come out ordered by name; inputs of one well keep their command-line order.
fn group_wells(inputs: &[PathBuf], well: Option<&str>, by_parent: bool) -> Result<Vec<WellInput>> {
    if let Some(name) = well {
        validate_well_name(name)?;
        return Ok(vec![WellInput {
            name: name.to_string(),
            paths: inputs.to_vec(),
        }]);
    }
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in inputs {
        let name = well_name_for(path, by_parent)?;
        groups.entry(name).or_default().push(path.clone());
    }
    Ok(groups
        .into_iter()
        .map(|(name, paths)| WellInput { name, paths })
        .collect())
}

fn well_name_for(path: &Path, by_parent: bool) -> Result<String> {
    if is_stdin(path) {
        return Ok("stdin".to_string());
    }
    if by_parent && let Some(name) = parent_well_name(path)? {
        validate_well_name(&name)?;
        return Ok(name);
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("failed to determine well name from {}", path.display()))?;
    let name = strip_known_suffix(file_name);
    validate_well_name(name)?;
    Ok(name.to_string())
}

// `<WELL>/hifi_reads/<file>` names the well; without a `hifi_reads` directory
// the directory holding the file does.
fn parent_well_name(path: &Path) -> Result<Option<String>> {
    let dirs = dir_names(path);
    let Some(i) = dirs.iter().rposition(|d| *d == HIFI_READS_DIR) else {
        return Ok(dirs.last().map(|d| d.to_string()));
    };
    if i > 0 {
        return Ok(Some(dirs[i - 1].to_string()));
    }
    let full = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let dirs = dir_names(&full);
    Ok(dirs
        .iter()
        .rposition(|d| *d == HIFI_READS_DIR)
        .and_then(|i| i.checked_sub(1))
        .map(|i| dirs[i].to_string()))
}

fn dir_names(path: &Path) -> Vec<&str> {
    let mut names: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    names.pop();
    names
}

fn strip_known_suffix(file_name: &str) -> &str {
    let lower = file_name.to_ascii_lowercase();
    for suffix in KNOWN_SUFFIXES {
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            return &file_name[..file_name.len() - suffix.len()];
        }
    }
    match file_name.rfind('.') {
        Some(i) if i > 0 => &file_name[..i],
        _ => file_name,
    }
}

fn validate_well_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("invalid well name '{}'", name);
    }
    Ok(())
}
