use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framegrab::{
    AcceptedFormat, DEFAULT_FRAME_COUNT, ExtractionOptions, ExtractionReport, FfmpegLogLevel,
    GrabSession, ProgressCallback, ProgressInfo, Subtype,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::filter::LevelFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  framegrab grab input.mp4\n  framegrab grab input.mp4 --frames 20 --format gray8 --progress\n  framegrab info input.mp4 --json\n  framegrab completions zsh > _framegrab";

#[derive(Debug, Parser)]
#[command(
    name = "framegrab",
    version,
    about = "Capture evenly spaced frames from a video through a seek-pause-wait pipeline",
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
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while capturing.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Capture frames at evenly spaced positions and report throughput.
    #[command(
        about = "Capture evenly spaced frames",
        after_help = "Examples:\n  framegrab grab input.mp4 --frames 100\n  framegrab grab input.mp4 --format rgba32 --timeout 0 --json"
    )]
    Grab {
        /// Input media path.
        input: PathBuf,
        /// Number of equally spaced positions to capture.
        #[arg(long, default_value_t = DEFAULT_FRAME_COUNT)]
        frames: u64,
        /// Accepted pixel format (rgb24, rgba32, gray8, any).
        #[arg(long, default_value = "rgb24")]
        format: String,
        /// Seconds to wait for each frame; 0 waits forever.
        #[arg(long, default_value_t = 10.0)]
        timeout: f64,
        /// Output the session report as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the duration and negotiated frame format of a file.
    #[command(about = "Print timeline duration and frame format")]
    Info {
        /// Input media path.
        input: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn parse_accepted_format(value: &str) -> Result<AcceptedFormat, String> {
    if value.eq_ignore_ascii_case("any") {
        return Ok(AcceptedFormat::any_video());
    }
    value.parse::<Subtype>().map(AcceptedFormat::video)
}

fn parse_timeout(seconds: f64) -> Result<Option<Duration>, String> {
    if seconds == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|_| format!("--timeout must be a non-negative number, got {seconds}"))
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(global.verbose);

    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|error: String| format!("unsupported --log-level: {error}"))?;
        framegrab::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.current);
        if let Some(position) = info.current_position {
            self.bar.set_message(position.to_string());
        }
    }
}

fn report_json(report: &ExtractionReport, session: &GrabSession) -> serde_json::Value {
    let format = session.format();
    json!({
        "frames_captured": report.frames_captured(),
        "duration_seconds": report.duration.as_secs_f64(),
        "elapsed_seconds": report.elapsed.as_secs_f64(),
        "frames_per_second": report.frames_per_second(),
        "format": {
            "subtype": format.subtype.to_string(),
            "width": format.width,
            "height": format.height,
        },
        "positions": report
            .positions
            .iter()
            .map(|position| position.units())
            .collect::<Vec<_>>(),
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Grab {
            input,
            frames,
            format,
            timeout,
            json,
        } => {
            apply_global_options(&cli.global)?;
            let accepted = parse_accepted_format(&format)?;
            let mut options = ExtractionOptions::new()
                .with_frame_count(frames)
                .with_wait_timeout(parse_timeout(timeout)?);

            let progress = if cli.global.progress && !json {
                let progress = Arc::new(BarProgress::new(frames)?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let mut session = GrabSession::open(&input, accepted)?;
            let report = session.run(&options)?;

            if let Some(progress) = progress {
                progress.bar.finish_with_message("done");
            }

            if json {
                let payload = report_json(&report, &session);
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                let rate = report
                    .frames_per_second()
                    .map(|rate| format!("{rate:.4}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Captured {} frame(s) from {} in {:.3}s",
                        report.frames_captured(),
                        input.display(),
                        report.elapsed.as_secs_f64()
                    )
                    .green()
                );
                println!("Frames grabbed per sec: {}", rate.bold());
            }
        }
        Commands::Info { input, json } => {
            apply_global_options(&cli.global)?;
            let mut session = GrabSession::open(&input, AcceptedFormat::any_video())?;
            let duration = session.duration()?;
            let format = session.format();
            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "duration_seconds": duration.as_secs_f64(),
                    "duration_units": duration.units(),
                    "width": format.width,
                    "height": format.height,
                    "frames_per_second": format.frames_per_second,
                    "subtype": format.subtype.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} {}", "file:".cyan().bold(), input.display());
                println!("Duration: {duration}");
                println!("Format: {format}");
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framegrab", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use framegrab::{AcceptedFormat, Subtype};

    use super::{Cli, Commands, parse_accepted_format, parse_timeout};

    #[test]
    fn parse_accepted_format_aliases() {
        assert_eq!(
            parse_accepted_format("rgb24").unwrap(),
            AcceptedFormat::video(Subtype::Rgb24)
        );
        assert_eq!(
            parse_accepted_format("GRAY").unwrap(),
            AcceptedFormat::video(Subtype::Gray8)
        );
        assert_eq!(parse_accepted_format("any").unwrap(), AcceptedFormat::any_video());
        assert!(parse_accepted_format("yuv420p").is_err());
    }

    #[test]
    fn parse_timeout_zero_is_unbounded() {
        assert_eq!(parse_timeout(0.0).unwrap(), None);
        assert_eq!(parse_timeout(2.5).unwrap(), Some(Duration::from_millis(2500)));
        assert!(parse_timeout(-1.0).is_err());
    }

    #[test]
    fn parse_timeout_rejects_unrepresentable_values() {
        assert!(parse_timeout(1e30).is_err());
        assert!(parse_timeout(f64::INFINITY).is_err());
        assert!(parse_timeout(f64::NAN).is_err());
    }

    #[test]
    fn grab_defaults() {
        let cli = Cli::parse_from(["framegrab", "grab", "input.mp4"]);
        match cli.command {
            Commands::Grab {
                frames,
                format,
                timeout,
                json,
                ..
            } => {
                assert_eq!(frames, 100);
                assert_eq!(format, "rgb24");
                assert_eq!(timeout, 10.0);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "framegrab",
            "info",
            "input.mp4",
            "--verbose",
            "--log-level",
            "quiet",
        ]);
        assert!(cli.global.verbose);
        assert_eq!(cli.global.log_level.as_deref(), Some("quiet"));
        assert!(matches!(cli.command, Commands::Info { json: false, .. }));
    }
}
