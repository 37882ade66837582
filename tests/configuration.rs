//! Extraction options, cancellation tokens, and FFmpeg log levels.

use std::time::Duration;

use framegrab::{
    CancellationToken, DEFAULT_FRAME_COUNT, DEFAULT_WAIT_TIMEOUT, ExtractionOptions,
    FfmpegLogLevel,
};

// ── ExtractionOptions ──────────────────────────────────────────────

#[test]
fn defaults() {
    let options = ExtractionOptions::new();
    assert_eq!(options.frame_count(), DEFAULT_FRAME_COUNT);
    assert_eq!(options.frame_count(), 100);
    assert_eq!(options.wait_timeout(), Some(DEFAULT_WAIT_TIMEOUT));
    assert_eq!(options.wait_timeout(), Some(Duration::from_secs(10)));
}

#[test]
fn default_trait_matches_new() {
    let options = ExtractionOptions::default();
    assert_eq!(options.frame_count(), ExtractionOptions::new().frame_count());
}

#[test]
fn builder_chain() {
    let options = ExtractionOptions::new()
        .with_frame_count(12)
        .with_wait_timeout(None)
        .with_batch_size(0)
        .with_cancellation(CancellationToken::new());

    assert_eq!(options.frame_count(), 12);
    assert_eq!(options.wait_timeout(), None);

    let debug = format!("{options:?}");
    assert!(debug.contains("frame_count: 12"));
    assert!(debug.contains("has_cancellation: true"));
    assert!(debug.contains("batch_size: 1"));
}

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    assert!(!CancellationToken::new().is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();

    token.cancel();

    assert!(clone.is_cancelled());
}

// ── FFmpeg log level ───────────────────────────────────────────────

#[test]
fn log_level_parses_names() {
    assert_eq!("quiet".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Quiet);
    assert_eq!("WARN".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Warning);
    assert_eq!("trace".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Trace);
    assert!("loud".parse::<FfmpegLogLevel>().is_err());
}

#[test]
fn log_level_round_trip() {
    framegrab::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    assert_eq!(framegrab::get_ffmpeg_log_level(), Some(FfmpegLogLevel::Error));

    framegrab::set_ffmpeg_log_level(FfmpegLogLevel::Quiet);
    assert_eq!(framegrab::get_ffmpeg_log_level(), Some(FfmpegLogLevel::Quiet));
}
