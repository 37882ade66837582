//! Error types for the `framegrab` crate.
//!
//! This module defines [`GrabError`], the unified error type returned by every
//! fallible operation in the crate. None of these errors are recovered
//! locally: each one aborts the current extraction session and reports the
//! failing operation together with its cause.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

use crate::{control::RunState, time::ReferenceTime};

/// The unified error type for all `framegrab` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GrabError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was handed to the pipeline source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A stage was reconfigured after its input format was fixed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No format satisfying a stage's accepted format could be negotiated.
    #[error("Format negotiation failed at stage '{stage}': {reason}")]
    Negotiation {
        /// Name of the stage that refused every offered format.
        stage: String,
        /// What was offered and why it was refused.
        reason: String,
    },

    /// The pipeline could not answer a query (e.g. an unseekable source has
    /// no duration).
    #[error("Pipeline query failed: {0}")]
    PipelineQuery(String),

    /// A seek request failed mid-session.
    #[error("Seek to {position} failed: {reason}")]
    Seek {
        /// The absolute position that was requested.
        position: ReferenceTime,
        /// Underlying reason reported by the pipeline.
        reason: String,
    },

    /// The pipeline refused a run-state transition.
    #[error("Failed to transition pipeline to {state}: {reason}")]
    RunState {
        /// The state that was requested.
        state: RunState,
        /// Underlying reason reported by the pipeline.
        reason: String,
    },

    /// An observer failed while a frame was being delivered.
    #[error("Frame delivery failed: {0}")]
    Delivery(String),

    /// No frame arrived for a requested position within the wait timeout.
    #[error("Session stalled waiting {waited:?} for a frame at {position}")]
    SessionStalled {
        /// The position the driver was waiting on.
        position: ReferenceTime,
        /// How long the driver waited before giving up.
        waited: Duration,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// A session was asked to capture zero frames.
    #[error("Frame count must be greater than zero")]
    InvalidFrameCount,

    /// The pipeline's delivery thread is gone.
    #[error("Pipeline delivery thread is no longer running")]
    PipelineClosed,

    /// A decoded frame could not be converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error, e.g. while spawning the delivery thread.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for GrabError {
    fn from(error: FfmpegError) -> Self {
        GrabError::FfmpegError(error.to_string())
    }
}
