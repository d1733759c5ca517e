use anyhow::Context;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use rasterkit_core::{
    export_image_with, import_image_with, DecodeOptions, EncodeOptions, ImageFormat,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug)]
pub enum BatchEvent {
    Converted { input: PathBuf, bytes: u64 },
    Failed { input: PathBuf, error: String },
    WorkerDone,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub from: Option<ImageFormat>,
    pub to: ImageFormat,
    pub workers: usize,
    pub decode: DecodeOptions,
    pub encode: EncodeOptions,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: Vec<(PathBuf, String)>,
    pub bytes_written: u64,
    pub cancelled: bool,
}

pub type EngineResult<T> = anyhow::Result<T>;

/// Lists the files of `input_dir` whose extension maps to `from`, or to any
/// decodable format when `from` is `None`. Sorted for stable output.
pub fn collect_inputs(input_dir: &Path, from: Option<ImageFormat>) -> EngineResult<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read directory {}", input_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = match (ImageFormat::from_path(&path), from) {
            (Some(format), Some(wanted)) => format == wanted,
            (Some(format), None) => format.can_decode(),
            (None, _) => false,
        };
        if matches {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Maps every input to a distinct output path.
///
/// `a.pnm` becomes `a.ppm`; a later input with the same stem keeps its
/// full file name (`a.ppm.ppm`). Inputs that still collide are returned
/// as failures instead of overwriting an earlier output.
fn plan_jobs(
    inputs: Vec<PathBuf>,
    output_dir: &Path,
    to: ImageFormat,
) -> (Vec<BatchJob>, Vec<(PathBuf, String)>) {
    let mut taken = HashSet::new();
    let mut jobs = Vec::with_capacity(inputs.len());
    let mut conflicts = Vec::new();

    for input in inputs {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let file_name = input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());

        let candidates = [
            output_dir.join(format!("{stem}.{}", to.extension())),
            output_dir.join(format!("{file_name}.{}", to.extension())),
        ];
        match candidates.into_iter().find(|path| !taken.contains(path)) {
            Some(output) => {
                taken.insert(output.clone());
                jobs.push(BatchJob { input, output });
            }
            None => {
                let error = format!("output name for {file_name} is already in use");
                conflicts.push((input, error));
            }
        }
    }
    (jobs, conflicts)
}

fn same_directory(a: &Path, b: &Path) -> EngineResult<bool> {
    let a = a
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", a.display()))?;
    let b = b
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", b.display()))?;
    Ok(a == b)
}

fn convert_one(job: &BatchJob, config: &BatchConfig) -> EngineResult<u64> {
    let format = match config.from {
        Some(format) => format,
        None => ImageFormat::from_path(&job.input)
            .with_context(|| format!("Unknown format for {}", job.input.display()))?,
    };
    let image = import_image_with(&job.input, format, &config.decode)?;
    export_image_with(&image, config.to, &job.output, &config.encode)?;
    Ok(std::fs::metadata(&job.output)?.len())
}

fn worker_thread(
    jobs: Receiver<BatchJob>,
    events: Sender<BatchEvent>,
    config: Arc<BatchConfig>,
    running: Arc<AtomicBool>,
) {
    while let Ok(job) = jobs.recv() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let event = match convert_one(&job, &config) {
            Ok(bytes) => BatchEvent::Converted {
                input: job.input,
                bytes,
            },
            Err(e) => BatchEvent::Failed {
                input: job.input,
                error: format!("{e:#}"),
            },
        };
        if events.send(event).is_err() {
            return;
        }
    }
    let _ = events.send(BatchEvent::WorkerDone);
}

/// Converts every matching file of `input_dir` into `output_dir`.
///
/// Images are independent, so they are spread over `config.workers`
/// threads; each individual decode stays single-threaded.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    config: BatchConfig,
    running: Arc<AtomicBool>,
) -> EngineResult<BatchSummary> {
    let start_time = Instant::now();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    if same_directory(input_dir, output_dir)? {
        anyhow::bail!(
            "Output directory {} is the input directory",
            output_dir.display()
        );
    }

    let inputs = collect_inputs(input_dir, config.from)?;
    let total = inputs.len();
    let (jobs, conflicts) = plan_jobs(inputs, output_dir, config.to);
    let num_workers = config.workers.clamp(1, jobs.len().max(1));

    println!("[Batch] {} file(s) from {}", total, input_dir.display());
    println!("[Batch] Using {} worker threads", num_workers);

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:50.cyan/blue}] {pos}/{len} ({eta})")
            .context("invalid progress bar template")?
            .progress_chars("##-"),
    );

    let (job_tx, job_rx): (Sender<BatchJob>, Receiver<BatchJob>) = unbounded();
    for job in jobs {
        job_tx.send(job)?;
    }
    drop(job_tx);

    let (event_tx, event_rx): (Sender<BatchEvent>, Receiver<BatchEvent>) =
        bounded(EVENT_CHANNEL_CAPACITY);
    let config = Arc::new(config);

    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let rx = job_rx.clone();
        let tx = event_tx.clone();
        let config = Arc::clone(&config);
        let running = Arc::clone(&running);
        handles.push(thread::spawn(move || worker_thread(rx, tx, config, running)));
    }
    drop(job_rx);
    drop(event_tx);

    let mut summary = BatchSummary {
        failed: conflicts,
        ..BatchSummary::default()
    };
    let mut workers_done = 0usize;

    loop {
        match event_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(BatchEvent::Converted { input, bytes }) => {
                tracing::debug!("converted {}", input.display());
                summary.converted += 1;
                summary.bytes_written += bytes;
                pb.inc(1);
            }
            Ok(BatchEvent::Failed { input, error }) => {
                tracing::warn!("failed to convert {}: {}", input.display(), error);
                summary.failed.push((input, error));
                pb.inc(1);
            }
            Ok(BatchEvent::WorkerDone) => {
                workers_done += 1;
                if workers_done == num_workers {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    summary.cancelled = true;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for (i, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.join() {
            eprintln!("[FATAL] Worker thread {} panicked: {:?}", i, e);
        }
    }
    pb.finish_and_clear();

    if !running.load(Ordering::SeqCst) {
        summary.cancelled = true;
        println!("\n[Batch] Stopped early.");
    }

    println!(
        "[Batch] Converted {} of {} file(s), wrote {} in {:.2?}",
        summary.converted,
        total,
        format_size(summary.bytes_written, BINARY),
        start_time.elapsed()
    );
    for (input, error) in &summary.failed {
        println!("[Batch]   {}: {}", input.display(), error);
    }

    Ok(summary)
}
