//! The seek-pause-wait extraction driver.
//!
//! [`ExtractionDriver`] walks a timeline in equally spaced steps. For every
//! position it seeks the pipeline, pauses it the first time round, and then
//! blocks on its [`DeliverySignal`] until the capture stage's observer
//! reports that a frame arrived. The observer returned by
//! [`ExtractionDriver::observer`] answers `Stop`, so with a paused pipeline
//! exactly one frame is delivered per seek.
//!
//! The wait only ends on a frame that reaches the requested position. A
//! frame still in flight from the previous segment, which a running pipeline
//! can push between the signal reset and the seek acknowledgement, is
//! skipped.
//!
//! # Example
//!
//! ```no_run
//! use framegrab::{
//!     AcceptedFormat, CaptureStage, DiscardSink, ExtractionDriver, ExtractionOptions,
//!     GrabError, PipelineBuilder, Subtype,
//! };
//!
//! let stage = CaptureStage::new("Grabber");
//! stage.set_accepted_format(AcceptedFormat::video(Subtype::Rgb24))?;
//!
//! let driver = ExtractionDriver::new();
//! stage.register_observer(driver.observer());
//!
//! let mut pipeline = PipelineBuilder::new("input.mp4")
//!     .stage(stage.clone())
//!     .stage(DiscardSink::default())
//!     .build()?;
//!
//! let report = driver.run(&mut pipeline, &ExtractionOptions::new())?;
//! println!("{:.2} frames/s", report.frames_per_second().unwrap_or_default());
//! # Ok::<(), GrabError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::{Duration, Instant},
};

use crate::{
    control::{MediaControl, RunState},
    error::GrabError,
    options::ExtractionOptions,
    progress::ProgressTracker,
    sample::Sample,
    signal::{DeliverySignal, FrameStamp, WaitOutcome},
    stage::{CaptureControl, SampleObserver},
    time::{ReferenceTime, timeline_positions},
};

/// Longest single block on the signal before the driver rechecks
/// cancellation and delivery failures.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Outcome of a completed capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    /// Every position that was requested and satisfied, in order.
    pub positions: Vec<ReferenceTime>,
    /// Span of the frame that satisfied each position, parallel to
    /// `positions`. `None` where the observer set the signal unstamped.
    pub frames: Vec<Option<FrameStamp>>,
    /// Timeline duration reported by the pipeline.
    pub duration: ReferenceTime,
    /// Wall-clock time spent in the seek-wait loop.
    pub elapsed: Duration,
}

impl ExtractionReport {
    /// Number of frames captured (one per satisfied position).
    pub fn frames_captured(&self) -> u64 {
        self.positions.len() as u64
    }

    /// Capture throughput, or `None` if no time elapsed.
    pub fn frames_per_second(&self) -> Option<f64> {
        let seconds = self.elapsed.as_secs_f64();
        (seconds > 0.0).then(|| self.positions.len() as f64 / seconds)
    }
}

type Inspector = Box<dyn FnMut(&Sample) -> Result<(), GrabError> + Send>;

/// Observer that sets a [`DeliverySignal`] and stops the stage.
///
/// Obtained from [`ExtractionDriver::observer`]. The signal is stamped with
/// the frame's span so the driver can tell a late frame from an earlier
/// segment apart from the one it asked for. An optional inspector sees each
/// frame before the signal is set; an inspector error is surfaced as a
/// delivery failure and the signal is left untouched.
pub struct SignalObserver {
    signal: DeliverySignal,
    inspector: Option<Inspector>,
}

impl Debug for SignalObserver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SignalObserver")
            .field("signal", &self.signal)
            .field("has_inspector", &self.inspector.is_some())
            .finish()
    }
}

impl SignalObserver {
    /// Signal `signal` on every frame.
    pub fn new(signal: DeliverySignal) -> Self {
        Self {
            signal,
            inspector: None,
        }
    }

    /// Run `inspector` on each frame before signalling, e.g. to copy it.
    #[must_use]
    pub fn with_inspector<F>(mut self, inspector: F) -> Self
    where
        F: FnMut(&Sample) -> Result<(), GrabError> + Send + 'static,
    {
        self.inspector = Some(Box::new(inspector));
        self
    }
}

impl SampleObserver for SignalObserver {
    fn on_sample(
        &mut self,
        sample: &Sample,
        _format_changed: bool,
    ) -> Result<CaptureControl, GrabError> {
        log::trace!(
            "Captured frame {}..{} ({})",
            sample.start(),
            sample.stop(),
            sample.format()
        );
        if let Some(inspector) = self.inspector.as_mut() {
            inspector(sample)?;
        }
        self.signal.set_stamped(FrameStamp {
            start: sample.start(),
            stop: sample.stop(),
        });
        Ok(CaptureControl::Stop)
    }
}

/// Walks a pipeline's timeline and waits for one frame per position.
///
/// The driver owns its [`DeliverySignal`]; hand it to the capture stage with
/// [`observer`](ExtractionDriver::observer) or [`signal`](ExtractionDriver::signal).
/// Separate drivers never share a signal, so sessions can run concurrently
/// on separate pipelines.
#[derive(Debug, Clone, Default)]
pub struct ExtractionDriver {
    signal: DeliverySignal,
}

impl ExtractionDriver {
    /// Create a driver with a fresh signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the driver's signal, for custom observers.
    pub fn signal(&self) -> DeliverySignal {
        self.signal.clone()
    }

    /// An observer that signals this driver and stops the stage.
    pub fn observer(&self) -> SignalObserver {
        SignalObserver::new(self.signal.clone())
    }

    /// Capture one frame at each of `options.frame_count()` equally spaced
    /// positions.
    ///
    /// The pipeline is paused exactly once, after the first seek. Every
    /// failure aborts the session; nothing is retried.
    ///
    /// # Errors
    ///
    /// - [`GrabError::InvalidFrameCount`] if the frame count is zero.
    /// - [`GrabError::PipelineQuery`] if the duration is unavailable; no
    ///   seek is issued.
    /// - [`GrabError::Seek`] if a seek fails.
    /// - [`GrabError::RunState`] if the pipeline refuses to pause.
    /// - [`GrabError::Delivery`] if the pipeline reports a delivery failure
    ///   while the driver waits.
    /// - [`GrabError::SessionStalled`] if a frame does not arrive within the
    ///   wait timeout.
    /// - [`GrabError::Cancelled`] if the cancellation token fires.
    pub fn run<C>(
        &self,
        control: &mut C,
        options: &ExtractionOptions,
    ) -> Result<ExtractionReport, GrabError>
    where
        C: MediaControl + ?Sized,
    {
        let count = options.frame_count;
        if count == 0 {
            return Err(GrabError::InvalidFrameCount);
        }

        let duration = control.duration().map_err(query_error)?;
        if duration.is_negative() {
            return Err(GrabError::PipelineQuery(format!(
                "pipeline reported a negative duration ({duration})"
            )));
        }

        log::debug!("Capturing {count} frames across {duration}");

        let mut tracker =
            ProgressTracker::new(options.progress.clone(), Some(count), options.batch_size);
        let mut positions = Vec::new();
        let mut frames = Vec::new();
        let mut paused = false;
        let started = Instant::now();

        for position in timeline_positions(duration, count) {
            if options.is_cancelled() {
                return Err(GrabError::Cancelled);
            }

            self.signal.reset();
            log::trace!("Seeking to {position}");
            control
                .seek(position)
                .map_err(|error| seek_error(position, error))?;

            if !paused {
                control.pause().map_err(|error| GrabError::RunState {
                    state: RunState::Paused,
                    reason: error.to_string(),
                })?;
                paused = true;
            }

            let frame = self.await_frame(control, options, position)?;
            positions.push(position);
            frames.push(frame);
            tracker.advance(position);
        }

        tracker.finish();

        let report = ExtractionReport {
            positions,
            frames,
            duration,
            elapsed: started.elapsed(),
        };
        match report.frames_per_second() {
            Some(rate) => log::info!(
                "Captured {} frames in {:?} ({rate:.4} frames/s)",
                report.frames_captured(),
                report.elapsed
            ),
            None => log::info!("Captured {} frames", report.frames_captured()),
        }
        Ok(report)
    }

    fn await_frame<C>(
        &self,
        control: &mut C,
        options: &ExtractionOptions,
        position: ReferenceTime,
    ) -> Result<Option<FrameStamp>, GrabError>
    where
        C: MediaControl + ?Sized,
    {
        let started = Instant::now();
        loop {
            let slice = match options.wait_timeout {
                Some(timeout) => {
                    let remaining = timeout.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        log::warn!("No frame for {position} after {timeout:?}");
                        return Err(GrabError::SessionStalled {
                            position,
                            waited: started.elapsed(),
                        });
                    }
                    remaining.min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };

            if let WaitOutcome::Signalled(frame) = self.signal.wait_reaching(position, slice) {
                return Ok(frame);
            }
            if let Some(failure) = control.take_delivery_failure() {
                return Err(failure);
            }
            if options.is_cancelled() {
                return Err(GrabError::Cancelled);
            }
        }
    }
}

fn query_error(error: GrabError) -> GrabError {
    match error {
        GrabError::PipelineQuery(_) => error,
        other => GrabError::PipelineQuery(other.to_string()),
    }
}

fn seek_error(position: ReferenceTime, error: GrabError) -> GrabError {
    match error {
        GrabError::Seek { .. } | GrabError::Delivery(_) | GrabError::PipelineClosed => error,
        other => GrabError::Seek {
            position,
            reason: other.to_string(),
        },
    }
}
