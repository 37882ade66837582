//! FFmpeg log level configuration.
//!
//! FFmpeg prints its own diagnostics to stderr, separately from the Rust
//! [`log`](https://crates.io/crates/log) records this crate emits. Use
//! [`set_ffmpeg_log_level`] to quiet or tune that output without depending
//! on `ffmpeg-next` directly.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::FfmpegLogLevel;
//!
//! framegrab::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! let level: FfmpegLogLevel = "quiet".parse().unwrap();
//! framegrab::set_ffmpeg_log_level(level);
//! ```

use std::str::FromStr;

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity, from quietest to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Only unrecoverable errors that abort the process.
    Panic,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Everything.
    Trace,
}

const LEVELS: [(FfmpegLogLevel, Level); 9] = [
    (FfmpegLogLevel::Quiet, Level::Quiet),
    (FfmpegLogLevel::Panic, Level::Panic),
    (FfmpegLogLevel::Fatal, Level::Fatal),
    (FfmpegLogLevel::Error, Level::Error),
    (FfmpegLogLevel::Warning, Level::Warning),
    (FfmpegLogLevel::Info, Level::Info),
    (FfmpegLogLevel::Verbose, Level::Verbose),
    (FfmpegLogLevel::Debug, Level::Debug),
    (FfmpegLogLevel::Trace, Level::Trace),
];

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "panic" => Ok(FfmpegLogLevel::Panic),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            "trace" => Ok(FfmpegLogLevel::Trace),
            other => Err(format!("unsupported FFmpeg log level: {other}")),
        }
    }
}

/// Set FFmpeg's own log verbosity. Does not affect `log` crate output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    if let Some((_, ffmpeg_level)) = LEVELS.iter().find(|(ours, _)| *ours == level) {
        ffmpeg_next::util::log::set_level(*ffmpeg_level);
    }
}

/// Read FFmpeg's current log verbosity.
///
/// Returns `None` if FFmpeg reports a level with no matching variant.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    let current = ffmpeg_next::util::log::get_level().ok()?;
    LEVELS
        .iter()
        .find(|(_, ffmpeg_level)| *ffmpeg_level == current)
        .map(|(ours, _)| *ours)
}
