use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use vidfit::{
    FfmpegLogLevel, PipelineConfig, PrepareOptions, ProgressCallback, SourceVideo,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidfit compress input.mov --out ready.mp4 --progress\n  vidfit compress input.mp4 --out small.mp4 --bitrate 800000 --max-width 854 --max-height 480\n  vidfit probe input.webm --json\n  vidfit completions zsh > _vidfit";

#[derive(Debug, Parser)]
#[command(
    name = "vidfit",
    version,
    about = "Recompress video files into a bounded, attachment-ready form",
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
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Recompress a video file.
    #[command(
        about = "Recompress a video file",
        after_help = "Examples:\n  vidfit compress input.mov --out ready.mp4 --progress\n  vidfit compress input.mp4 --out small.mp4 --fps 30 --bitrate 2000000"
    )]
    Compress {
        /// Input video path.
        input: PathBuf,

        /// Output file path.
        #[arg(long)]
        out: PathBuf,

        /// Target video bitrate in bits per second.
        #[arg(long, default_value_t = vidfit::DEFAULT_TARGET_BITRATE)]
        bitrate: usize,

        /// Target output frame rate.
        #[arg(long, default_value_t = vidfit::DEFAULT_TARGET_FRAME_RATE)]
        fps: u32,

        /// Maximum output width in pixels.
        #[arg(long, default_value_t = vidfit::DEFAULT_MAX_DIMENSIONS.0)]
        max_width: u32,

        /// Maximum output height in pixels.
        #[arg(long, default_value_t = vidfit::DEFAULT_MAX_DIMENSIONS.1)]
        max_height: u32,

        /// Maximum accepted input size in bytes.
        #[arg(long, default_value_t = vidfit::DEFAULT_MAX_INPUT_BYTES)]
        max_input_bytes: u64,

        /// Show a progress bar.
        #[arg(long)]
        progress: bool,

        /// Print the result summary as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print source metadata (alias: info).
    #[command(
        about = "Probe a video file",
        visible_alias = "info",
        after_help = "Examples:\n  vidfit probe input.mp4\n  vidfit probe input.webm --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        vidfit::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn ensure_writable_path(
    path: &std::path::Path,
    overwrite: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

/// Drives an indicatif bar from the pipeline's completion fraction.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(100);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}% {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, fraction: f64) {
        self.bar.set_position((fraction * 100.0).round() as u64);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Compress {
            input,
            out,
            bitrate,
            fps,
            max_width,
            max_height,
            max_input_bytes,
            progress,
            json,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;

            let source = SourceVideo::from_path(&input)?;
            let config = PipelineConfig::default()
                .with_target_bitrate(bitrate)
                .with_target_frame_rate(fps)
                .with_max_dimensions(max_width, max_height)
                .with_max_input_bytes(max_input_bytes);

            let mut options = PrepareOptions::new();
            let bar = if progress {
                let terminal = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(terminal.clone());
                Some(terminal)
            } else {
                None
            };

            let result = vidfit::prepare_attachment(&source, &config, &options)?;

            if let Some(terminal) = bar {
                terminal.bar.finish_with_message("done");
            }

            std::fs::write(&out, result.payload())?;

            if json {
                let summary = json!({
                    "input": input.display().to_string(),
                    "output": out.display().to_string(),
                    "input_bytes": source.len(),
                    "output_bytes": result.payload_len(),
                    "duration_seconds": result.duration_seconds(),
                    "encoding": result.encoding(),
                    "passthrough": result.is_passthrough(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else if result.is_passthrough() {
                println!(
                    "{} {}",
                    "note:".yellow().bold(),
                    format!(
                        "wrote original file unchanged to {} ({} bytes)",
                        out.display(),
                        result.payload_len()
                    )
                    .yellow()
                );
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "compressed {} -> {} bytes as {} ({})",
                        source.len(),
                        result.payload_len(),
                        result.encoding().unwrap_or("?"),
                        out.display()
                    )
                    .green()
                );
            }

            if cli.global.verbose {
                eprintln!("duration: {}s", result.duration_seconds());
            }
        }
        Commands::Probe { input, json } => {
            let source = SourceVideo::from_path(&input)?;
            let metadata = vidfit::probe_source(&source)?;

            if json {
                let summary = json!({
                    "input": input.display().to_string(),
                    "bytes": source.len(),
                    "media_type": source.media_type(),
                    "width": metadata.width,
                    "height": metadata.height,
                    "duration_seconds": metadata.duration_seconds,
                    "has_audio": metadata.has_audio,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Input: {}", input.display());
                println!("Size: {} bytes", source.len());
                println!("Declared type: {}", source.media_type());
                println!("Dimensions: {}x{}", metadata.width, metadata.height);
                println!("Duration: {:.2}s", metadata.duration_seconds);
                println!("Audio: {}", if metadata.has_audio { "yes" } else { "no" });
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidfit", &mut std::io::stdout());
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

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands, parse_log_level};

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("quiet").is_some());
        assert!(parse_log_level("WARN").is_some());
        assert!(parse_log_level("trace").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn compress_defaults() {
        let cli = Cli::parse_from(["vidfit", "compress", "in.mp4", "--out", "out.mp4"]);
        match cli.command {
            Commands::Compress {
                bitrate,
                fps,
                max_width,
                max_height,
                progress,
                json,
                ..
            } => {
                assert_eq!(bitrate, 1_200_000);
                assert_eq!(fps, 24);
                assert_eq!((max_width, max_height), (1280, 720));
                assert!(!progress);
                assert!(!json);
            }
            _ => panic!("expected compress subcommand"),
        }
    }

    #[test]
    fn compress_accepts_overrides() {
        let cli = Cli::parse_from([
            "vidfit", "compress", "in.mov", "--out", "out.mp4", "--bitrate", "800000", "--fps",
            "30", "--max-width", "854", "--max-height", "480", "--progress",
        ]);
        match cli.command {
            Commands::Compress {
                bitrate,
                fps,
                max_width,
                max_height,
                progress,
                ..
            } => {
                assert_eq!(bitrate, 800_000);
                assert_eq!(fps, 30);
                assert_eq!((max_width, max_height), (854, 480));
                assert!(progress);
            }
            _ => panic!("expected compress subcommand"),
        }
    }

    #[test]
    fn probe_alias() {
        let cli = Cli::parse_from(["vidfit", "info", "in.mp4", "--json"]);
        assert!(matches!(cli.command, Commands::Probe { json: true, .. }));
    }
}
