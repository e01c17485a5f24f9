use std::{path::PathBuf, time::Instant};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{SeedableRng, rngs::StdRng};
use serde_json::json;
use vidbatch::{
    DecodedVideo, FfmpegLogLevel, FfmpegVideo, FrameSampler, Manifest, MinibatchReader,
    ReaderOptions, SamplingMode,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidbatch inspect VideoDataset/train_map.csv --labels 11 --json\n  vidbatch probe clip.avi --training --seed 3\n  vidbatch epoch VideoDataset/test_map.csv --labels 11 --batch-size 2 --progress\n  vidbatch completions zsh > _vidbatch";

#[derive(Debug, Parser)]
#[command(
    name = "vidbatch",
    version,
    about = "Inspect video manifests and dry-run minibatch epochs",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show per-batch details.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Desired worker thread count for parallel decoding.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Summarize a manifest.
    #[command(
        about = "Summarize a manifest",
        after_help = "Examples:\n  vidbatch inspect train_map.csv --labels 11\n  vidbatch inspect train_map.csv --labels 11 --json"
    )]
    Inspect {
        /// Manifest path.
        manifest: PathBuf,
        /// Number of classes.
        #[arg(long)]
        labels: usize,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a video's metadata and the frames a clip would use.
    #[command(
        about = "Show video metadata and sampled frame indices",
        after_help = "Examples:\n  vidbatch probe clip.avi\n  vidbatch probe clip.avi --training --seed 7 --json"
    )]
    Probe {
        /// Video path.
        input: PathBuf,
        /// Sample like a training reader (random window).
        #[arg(long)]
        training: bool,
        /// Seed for the training window.
        #[arg(long)]
        seed: Option<u64>,
        /// Frames per clip.
        #[arg(long, default_value_t = vidbatch::DEFAULT_SEQUENCE_LENGTH)]
        sequence_length: usize,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run one epoch through the reader without a model.
    #[command(
        about = "Dry-run one epoch",
        after_help = "Examples:\n  vidbatch epoch test_map.csv --labels 11\n  vidbatch epoch train_map.csv --labels 11 --training --batch-size 4 --limit 40 --progress"
    )]
    Epoch {
        /// Manifest path.
        manifest: PathBuf,
        /// Number of classes.
        #[arg(long)]
        labels: usize,
        /// Clips per minibatch.
        #[arg(long, default_value_t = 2)]
        batch_size: usize,
        /// Shuffle and jitter as a training reader does.
        #[arg(long)]
        training: bool,
        /// Cap on videos per epoch.
        #[arg(long)]
        limit: Option<usize>,
        /// Seed for shuffling and jitter.
        #[arg(long)]
        seed: Option<u64>,
        /// Decode the videos of a batch in parallel (requires the `rayon` feature).
        #[arg(long)]
        parallel: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = FfmpegLogLevel::from_name(level)
            .ok_or(format!("unsupported --log-level: {level}"))?;
        vidbatch::set_ffmpeg_log_level(parsed);
    }

    if let Some(threads) = global.threads {
        if threads > 0 {
            unsafe {
                std::env::set_var("RAYON_NUM_THREADS", threads.to_string());
            }
        }
    }

    Ok(())
}

/// Per-batch pixel statistics: `(min, max, mean)`.
fn batch_statistics<'a>(values: impl Iterator<Item = &'a f32>) -> (f32, f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0_f64;
    let mut count = 0_u64;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
        sum += f64::from(value);
        count += 1;
    }
    let mean = if count > 0 { (sum / count as f64) as f32 } else { 0.0 };
    (min, max, mean)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Inspect {
            manifest,
            labels,
            json,
        } => {
            let manifest = Manifest::load(&manifest, labels)?;
            let histogram = manifest.class_histogram();
            let missing: Vec<String> = manifest
                .entries()
                .iter()
                .filter(|entry| !entry.path.exists())
                .map(|entry| entry.path.display().to_string())
                .collect();

            if json {
                let payload = json!({
                    "manifest": manifest.source().display().to_string(),
                    "videos": manifest.len(),
                    "label_count": manifest.label_count(),
                    "class_counts": histogram,
                    "missing_files": missing,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Manifest: {}", manifest.source().display());
                println!("Videos: {}", manifest.len());
                for (label, count) in histogram.iter().enumerate() {
                    println!("  class {label:>3}: {count}");
                }
                if !missing.is_empty() {
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("{} listed file(s) do not exist", missing.len()).yellow()
                    );
                    if cli.global.verbose {
                        for path in &missing {
                            eprintln!("  {path}");
                        }
                    }
                }
            }
        }
        Commands::Probe {
            input,
            training,
            seed,
            sequence_length,
            json,
        } => {
            let video = FfmpegVideo::open(&input)?;
            let metadata = video.metadata().clone();
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let indices = FrameSampler::new(sequence_length).select(
                video.frame_count(),
                SamplingMode::from_training(training),
                &mut rng,
            );

            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "width": metadata.width,
                    "height": metadata.height,
                    "frames_per_second": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "codec": metadata.codec,
                    "sampled_frames": indices,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Path: {}", input.display());
                println!("Dimensions: {}x{}", metadata.width, metadata.height);
                println!("Frame rate: {:.3} fps", metadata.frames_per_second);
                println!("Frames: {}", metadata.frame_count);
                println!("Codec: {}", metadata.codec);
                match indices {
                    Some(indices) => println!("Sampled frames: {indices:?}"),
                    None => eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("video is shorter than {sequence_length} frames").yellow()
                    ),
                }
            }
        }
        Commands::Epoch {
            manifest,
            labels,
            batch_size,
            training,
            limit,
            seed,
            parallel,
        } => {
            if batch_size == 0 {
                return Err("--batch-size must be greater than zero".into());
            }

            let mut options = ReaderOptions::new().with_parallel(parallel);
            if let Some(limit) = limit {
                options = options.with_epoch_size_limit(limit);
            }
            if let Some(seed) = seed {
                options = options.with_seed(seed);
            }
            if parallel && !cfg!(feature = "rayon") {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    "--parallel requires building with the `rayon` feature".yellow()
                );
            }

            let mut reader = MinibatchReader::open_with_options(&manifest, labels, training, options)?;

            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new(reader.size() as u64);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let started = Instant::now();
            let mut batches = 0_usize;
            let mut clips = 0_usize;

            reader.reset();
            while reader.has_more() {
                let batch = reader.next_minibatch(batch_size)?;
                batches += 1;
                clips += batch.len();

                if cli.global.verbose {
                    let (min, max, mean) = batch_statistics(batch.inputs().iter());
                    let message = format!(
                        "batch {batches}: {} clip(s) {:?} min={min:.3} max={max:.3} mean={mean:.3}",
                        batch.len(),
                        batch.dataset_indices()
                    );
                    match &progress_bar {
                        Some(pb) => pb.println(message),
                        None => eprintln!("{message}"),
                    }
                }

                if let Some(pb) = &progress_bar {
                    pb.inc(batch.len() as u64);
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Minibatch[1-{batches}]: {clips} clip(s) in {:.2}s",
                    started.elapsed().as_secs_f64()
                )
                .green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidbatch", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
