//! # framegrab
//!
//! Pull evenly spaced still frames out of a video by seeking a media
//! pipeline and waiting for exactly one frame per position.
//!
//! A capture stage sits inside an FFmpeg-backed pipeline between the decoder
//! and a discarding sink. The [`ExtractionDriver`] seeks the pipeline to
//! `duration * i / n` for `i` in `0..n`, pauses it once, and blocks until
//! the stage's observer reports a frame. The observer answers
//! [`CaptureControl::Stop`], so a paused pipeline delivers one frame per
//! seek.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framegrab::{AcceptedFormat, ExtractionOptions, GrabSession, Subtype};
//!
//! let mut session = GrabSession::open("input.mp4", AcceptedFormat::video(Subtype::Rgb24))?;
//! let report = session.run(&ExtractionOptions::new())?;
//! println!(
//!     "{} frames, {:.2} frames/s",
//!     report.frames_captured(),
//!     report.frames_per_second().unwrap_or_default()
//! );
//! # Ok::<(), framegrab::GrabError>(())
//! ```
//!
//! ### Inspect Each Frame
//!
//! ```no_run
//! use framegrab::{AcceptedFormat, ExtractionOptions, GrabSession};
//!
//! let mut session = GrabSession::open("input.mp4", AcceptedFormat::default())?;
//! let options = ExtractionOptions::new().with_frame_count(8);
//! session.run_with(&options, |sample| {
//!     let image = sample.to_image()?;
//!     println!("{}x{} at {}", image.width(), image.height(), sample.start());
//!     Ok(())
//! })?;
//! # Ok::<(), framegrab::GrabError>(())
//! ```
//!
//! ### Custom Pipelines
//!
//! Anything implementing [`MediaControl`] can be driven, and any
//! [`PipelineStage`] can be chained after the capture stage. See
//! [`driver`] for wiring the pieces by hand.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `capture_stream` yields frames through a Tokio stream |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod control;
pub mod driver;
pub mod error;
pub mod ffmpeg;
pub mod format;
pub mod options;
pub mod pipeline;
pub mod progress;
pub mod sample;
pub mod session;
pub mod signal;
pub mod stage;
#[cfg(feature = "async")]
pub mod stream;
pub mod time;

pub use control::{MediaControl, RunState};
pub use driver::{ExtractionDriver, ExtractionReport, SignalObserver};
pub use error::GrabError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use format::{AcceptedFormat, MajorType, MediaFormat, Subtype};
pub use options::{DEFAULT_FRAME_COUNT, DEFAULT_WAIT_TIMEOUT, ExtractionOptions};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use sample::Sample;
pub use session::{GRABBER_NAME, GrabSession, RENDERER_NAME};
pub use signal::{DeliverySignal, FrameStamp, WaitOutcome};
pub use stage::{
    CaptureControl, CaptureStage, DiscardSink, FlowControl, PipelineStage, SampleObserver,
};
#[cfg(feature = "async")]
pub use stream::{CaptureStream, capture_stream};
pub use time::{ReferenceTime, TimelinePositions, timeline_positions};
