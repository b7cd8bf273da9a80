use crate::core::io::{InputKind, open_input};
use crate::core::metrics::WellAgg;
use crate::core::model::{InputFormat, WellSummary};
use crate::core::records::{RecordReader, detect_format};
use crate::core::timing::{fmt_dur, stage_done, stats_enabled};
use crate::report;
use crate::report::per_read::PerReadSink;
use anyhow::{Context, Result, anyhow};
use crossbeam_channel as channel;
use log::{error, info};
use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct WellInput {
    pub name: String,
    pub paths: Vec<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct WellSettings {
    pub out_dir: PathBuf,
    pub format: InputFormat,
    pub exclude_flags: u16,
    pub per_read: bool,
    pub zip: bool,
    pub decompress_threads: usize,
}

pub struct RunConfig {
    pub wells: Vec<WellInput>,
    pub out_dir: PathBuf,
    pub threads: usize,
    pub format: InputFormat,
    pub exclude_flags: u16,
    pub per_read: bool,
    pub zip: bool,
}

#[derive(Clone, Debug)]
pub struct WellOutput {
    pub name: String,
    pub summary: WellSummary,
    pub skipped: u64,
    pub artifacts: Vec<PathBuf>,
}

pub struct RunOutput {
    pub wells: Vec<WellOutput>,
    pub failed: Vec<(String, anyhow::Error)>,
}

struct Streamed {
    agg: WellAgg,
    lines: u64,
    skipped: u64,
}

// `min(threads, wells)` workers; leftover threads decompress inside each well.
pub fn run(cfg: RunConfig) -> Result<RunOutput> {
    let stats = stats_enabled();
    let t_total = Instant::now();
    if cfg.wells.is_empty() {
        return Err(anyhow!("no wells to process"));
    }

    let workers = cfg.threads.min(cfg.wells.len()).max(1);
    let settings = Arc::new(WellSettings {
        out_dir: cfg.out_dir.clone(),
        format: cfg.format,
        exclude_flags: cfg.exclude_flags,
        per_read: cfg.per_read,
        zip: cfg.zip,
        decompress_threads: (cfg.threads / workers).max(1),
    });
    let total_wells = cfg.wells.len();

    let (job_tx, job_rx) = channel::bounded::<WellInput>(workers * 2);
    let (result_tx, result_rx) = channel::unbounded::<(String, Result<WellOutput>)>();

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let rx = job_rx.clone();
        let tx = result_tx.clone();
        let settings = Arc::clone(&settings);
        handles.push(thread::spawn(move || {
            for well in rx.iter() {
                let name = well.name.clone();
                let res = process_well(&well, &settings);
                if tx.send((name, res)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(job_rx);
    drop(result_tx);

    let feeder = thread::spawn(move || {
        for well in cfg.wells {
            if job_tx.send(well).is_err() {
                return;
            }
        }
    });

    let mut wells = Vec::with_capacity(total_wells);
    let mut failed = Vec::new();
    for (name, res) in result_rx.iter() {
        match res {
            Ok(out) => wells.push(out),
            Err(e) => {
                error!("well {} failed: {:#}", name, e);
                failed.push((name, e));
            }
        }
    }

    feeder
        .join()
        .map_err(|_| anyhow!("well feeder thread panicked"))?;
    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("well worker thread panicked"))?;
    }
    if wells.len() + failed.len() != total_wells {
        return Err(anyhow!(
            "lost wells: {} of {} reported",
            wells.len() + failed.len(),
            total_wells
        ));
    }

    wells.sort_by(|a, b| a.name.cmp(&b.name));
    failed.sort_by(|a, b| a.0.cmp(&b.0));
    stage_done(stats, "engine.total", t_total);
    Ok(RunOutput { wells, failed })
}

// Nothing of a well becomes visible until its reads were all consumed and
// every file is staged; a failure at any step leaves no artifacts behind.
pub fn process_well(well: &WellInput, settings: &WellSettings) -> Result<WellOutput> {
    let stats = stats_enabled();
    let t_well = Instant::now();
    info!(
        "processing well {} ({} input{})",
        well.name,
        well.paths.len(),
        if well.paths.len() == 1 { "" } else { "s" }
    );

    let mut sink = if settings.per_read {
        Some(
            PerReadSink::create(&settings.out_dir, &well.name)
                .with_context(|| format!("well {}", well.name))?,
        )
    } else {
        None
    };
    let streamed = match stream_well(well, settings, sink.as_mut()) {
        Ok(s) => s,
        Err(e) => {
            if let Some(sink) = sink {
                sink.discard();
            }
            return Err(e.context(format!("well {}", well.name)));
        }
    };

    if stats {
        eprintln!(
            "KIRA_STATS well={} lines={} reads={} bases={} skipped={} distinct_lengths={}",
            well.name,
            streamed.lines,
            streamed.agg.read_count(),
            streamed.agg.total_bases(),
            streamed.skipped,
            streamed.agg.distinct_lengths()
        );
    }
    let summary = streamed.agg.finalize();

    let mut staged = sink.map(PerReadSink::into_staged).unwrap_or_default();
    let stat_name = report::stat_txt::stat_file_name(&well.name);
    let written = staged
        .create(&settings.out_dir, &stat_name)
        .and_then(|f| report::stat_txt::write_to(f.writer(), &summary));
    if let Err(e) = written {
        staged.discard();
        return Err(e.context(format!("well {}: failed to write {}", well.name, stat_name)));
    }
    let mut artifacts = staged
        .commit()
        .with_context(|| format!("well {}", well.name))?;

    if settings.zip {
        match report::zip::write_zip(&settings.out_dir, &well.name, &artifacts) {
            Ok(zip_path) => artifacts.push(zip_path),
            Err(e) => {
                for path in &artifacts {
                    let _ = fs::remove_file(path);
                }
                return Err(e.context(format!("failed to zip well {}", well.name)));
            }
        }
    }

    if stats {
        eprintln!(
            "KIRA_STATS well={} time={}",
            well.name,
            fmt_dur(t_well.elapsed())
        );
    }
    Ok(WellOutput {
        name: well.name.clone(),
        summary,
        skipped: streamed.skipped,
        artifacts,
    })
}

fn stream_well(
    well: &WellInput,
    settings: &WellSettings,
    mut sink: Option<&mut PerReadSink>,
) -> Result<Streamed> {
    let mut agg = WellAgg::new();
    let mut lines = 0u64;
    let mut skipped = 0u64;
    for path in &well.paths {
        let (mut reader, kind) = open_input(path, settings.decompress_threads)?;
        let format = match settings.format {
            InputFormat::Auto => {
                let head = reader
                    .fill_buf()
                    .with_context(|| format!("failed to read {}", path.display()))?;
                detect_format(path, head)
            }
            fixed => fixed,
        };
        info!(
            "  {} ({}, {})",
            path.display(),
            format.as_str(),
            match kind {
                InputKind::Plain => "plain",
                InputKind::Gzip => "gzip",
                InputKind::Stdin => "stdin",
            }
        );

        let mut records = RecordReader::new(reader, format, settings.exclude_flags);
        for rec in records.by_ref() {
            let rec = rec.with_context(|| format!("malformed record in {}", path.display()))?;
            if let Some(sink) = sink.as_deref_mut() {
                sink.write(&rec)?;
            }
            agg.observe(&rec).with_context(|| format!("in {}", path.display()))?;
        }
        lines += records.lines();
        skipped += records.skipped();
    }
    Ok(Streamed {
        agg,
        lines,
        skipped,
    })
}
