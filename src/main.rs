use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use variant_pool::dispatcher::clamp_concurrency;
use variant_pool::imaging::rust_backend::{
    RustBackend, media_type_for_extension, supported_input_extensions,
};
use variant_pool::{
    Dispatcher, DispatcherConfig, JobOptions, JobTicket, Priority, ProcessedImage, SizeLabel,
    SourceMetadata, config, output,
};

#[derive(Parser)]
#[command(name = "variant-pool")]
#[command(about = "Batch image variant generator (AVIF + progressive JPEG)")]
#[command(long_about = "\
Batch image variant generator (AVIF + progressive JPEG)

Every input image is decoded once and written at up to three sizes, each as
AVIF and as progressive JPEG, next to a manifest.json describing the results:

  variants/
  ├── manifest.json          # dimensions, placeholder data URL, timings
  ├── dawn-small.avif
  ├── dawn-small.jpg
  ├── dawn-medium.avif
  └── ...

Inputs that share a file stem get numbered names (dawn-1-small.avif,
dawn-2-small.avif) so no variant overwrites another.

Jobs run through a priority queue with a concurrency ceiling of 1-5.

Run 'variant-pool gen-config' to generate a documented variant-pool.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults apply when it does not exist)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Image files or directories to process
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "variants")]
    out: PathBuf,

    /// Only produce these sizes, e.g. `small,large` (skips the placeholder)
    #[arg(long, value_delimiter = ',')]
    sizes: Vec<SizeLabel>,

    /// Queue priority for every submitted image
    #[arg(long, default_value = "normal")]
    priority: Priority,

    /// Override pool.concurrency (clamped to 1-5)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Hide per-job scheduling lines
    #[arg(long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate variants for images and write them with a manifest
    Process(ProcessArgs),
    /// Load and validate the config file, then print the effective values
    Check,
    /// Print a stock variant-pool.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "variant_pool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Process(args) => {
            let pipeline_config = config::load_config(&cli.config)?;
            let failed = process(&args, &pipeline_config)?;
            if failed > 0 {
                return Err(format!("{} image(s) failed", failed).into());
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let pipeline_config = config::load_config(&cli.config)?;
            output::print_config_summary(&pipeline_config);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct Manifest {
    images: Vec<ManifestEntry>,
}

#[derive(Serialize)]
struct ManifestEntry {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placeholder: Option<String>,
    variants: Vec<ManifestVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ManifestVariant {
    label: SizeLabel,
    width: u32,
    height: u32,
    avif: String,
    jpeg: String,
}

struct Pending {
    position: usize,
    path: PathBuf,
    stem: String,
    ticket: JobTicket,
}

/// Run every input through one dispatcher. Returns the number of failed images.
fn process(
    args: &ProcessArgs,
    pipeline_config: &config::PipelineConfig,
) -> Result<usize, Box<dyn std::error::Error>> {
    let inputs = collect_inputs(&args.inputs)?;
    if inputs.is_empty() {
        println!("No supported images found");
        return Ok(0);
    }
    std::fs::create_dir_all(&args.out)?;

    let mut dispatcher_config = DispatcherConfig::from_pipeline_config(pipeline_config);
    if let Some(concurrency) = args.concurrency {
        dispatcher_config.concurrency = concurrency;
    }
    let limit = clamp_concurrency(dispatcher_config.concurrency);
    let max_pending = dispatcher_config.max_queue_depth;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_dispatch_event(&event, limit);
        }
    });
    let events = (!args.quiet).then_some(tx);

    let dispatcher = Dispatcher::start(RustBackend::new(), dispatcher_config, events)?;
    let options = JobOptions::default()
        .with_priority(args.priority)
        .with_sizes(args.sizes.iter().copied());

    println!(
        "==> Processing {} images → {}",
        inputs.len(),
        args.out.display()
    );

    let total = inputs.len();
    let stems = output_stems(&inputs);
    let mut pending: VecDeque<Pending> = VecDeque::new();
    let mut entries = Vec::with_capacity(inputs.len());
    let mut failed = 0;

    for (idx, (path, stem)) in inputs.into_iter().zip(stems).enumerate() {
        // Outstanding tickets bound the queue length, so this keeps submits
        // from ever hitting the queue-depth limit.
        if pending.len() >= max_pending {
            if let Some(done) = pending.pop_front() {
                entries.push(finish(done, &args.out, &mut failed)?);
            }
        }

        let bytes = std::fs::read(&path)?;
        let metadata = source_metadata(&path, bytes.len());
        let ticket = dispatcher.submit(bytes, metadata, options.clone())?;
        pending.push_back(Pending {
            position: idx + 1,
            path,
            stem,
            ticket,
        });
    }
    while let Some(done) = pending.pop_front() {
        entries.push(finish(done, &args.out, &mut failed)?);
    }

    drop(dispatcher);
    if printer.join().is_err() {
        tracing::warn!("Progress printer thread panicked");
    }

    let manifest_path = args.out.join("manifest.json");
    let json = serde_json::to_string_pretty(&Manifest { images: entries })?;
    std::fs::write(&manifest_path, json)?;

    output::print_run_summary(total - failed, failed);
    println!("==> Manifest: {}", manifest_path.display());
    Ok(failed)
}

/// Wait for one job, write its files, and build its manifest entry.
fn finish(
    pending: Pending,
    out_dir: &Path,
    failed: &mut usize,
) -> Result<ManifestEntry, std::io::Error> {
    let Pending {
        position,
        path,
        stem,
        ticket,
    } = pending;
    let source = path.display().to_string();

    match ticket.wait() {
        Ok(result) => {
            output::print_job_summary(position, &source, &result);
            let variants = write_variants(&result, &stem, out_dir)?;
            Ok(ManifestEntry {
                source,
                duration_ms: Some(result.duration.as_millis() as u64),
                placeholder: result.placeholder,
                variants,
                error: None,
            })
        }
        Err(e) => {
            *failed += 1;
            output::print_job_failure(position, &source, &e);
            Ok(ManifestEntry {
                source,
                duration_ms: None,
                placeholder: None,
                variants: Vec::new(),
                error: Some(e.to_string()),
            })
        }
    }
}

fn write_variants(
    result: &ProcessedImage,
    stem: &str,
    out_dir: &Path,
) -> Result<Vec<ManifestVariant>, std::io::Error> {
    let mut written = Vec::with_capacity(result.variants.len());
    for (label, variant) in &result.variants {
        let avif = variant_file_name(stem, *label, "avif");
        let jpeg = variant_file_name(stem, *label, "jpg");
        std::fs::write(out_dir.join(&avif), &variant.avif)?;
        std::fs::write(out_dir.join(&jpeg), &variant.jpeg)?;
        written.push(ManifestVariant {
            label: *label,
            width: variant.width,
            height: variant.height,
            avif,
            jpeg,
        });
    }
    Ok(written)
}

fn variant_file_name(stem: &str, label: SizeLabel, extension: &str) -> String {
    format!("{}-{}.{}", stem, label, extension)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// One output stem per input, unique across the batch.
///
/// Inputs whose stems clash (compared case-insensitively, since variants
/// share one output directory) all get a numeric suffix: `dawn-1`, `dawn-2`.
/// Suffixes skip names already taken by another input.
fn output_stems(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| file_stem(p)).collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.to_lowercase()).or_default() += 1;
    }
    let mut taken: HashSet<String> = counts
        .iter()
        .filter(|(_, count)| **count == 1)
        .map(|(key, _)| key.clone())
        .collect();

    stems
        .into_iter()
        .map(|stem| {
            if counts[&stem.to_lowercase()] == 1 {
                return stem;
            }
            let unique = (1..)
                .map(|n| format!("{}-{}", stem, n))
                .find(|candidate| !taken.contains(&candidate.to_lowercase()))
                .unwrap_or_else(|| stem.clone());
            taken.insert(unique.to_lowercase());
            unique
        })
        .collect()
}

fn source_metadata(path: &Path, byte_size: usize) -> SourceMetadata {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    SourceMetadata {
        filename: path.file_name().map(|f| f.to_string_lossy().into_owned()),
        byte_size: Some(byte_size as u64),
        media_type: extension
            .as_deref()
            .and_then(media_type_for_extension)
            .map(str::to_string),
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| supported_input_extensions().contains(&ext.as_str()))
}

/// Expand inputs into image files. Directories are walked recursively in
/// name order; explicitly named files are kept even with an unknown extension.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        for entry in walkdir::WalkDir::new(input).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}
