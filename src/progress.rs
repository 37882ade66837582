//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a capture
//! session, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framegrab::{
//!     AcceptedFormat, ExtractionOptions, GrabError, GrabSession, ProgressCallback, ProgressInfo,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% complete");
//!         }
//!     }
//! }
//!
//! let mut session = GrabSession::open("input.mp4", AcceptedFormat::default())?;
//! let options = ExtractionOptions::new().with_progress(Arc::new(PrintProgress));
//! session.run(&options)?;
//! # Ok::<(), GrabError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::time::ReferenceTime;

/// A snapshot of session progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`ExtractionOptions::with_batch_size`](crate::ExtractionOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// How many frames have been captured so far.
    pub current: u64,
    /// Total frames requested, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 to 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the session started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The timeline position of the most recent capture.
    pub current_position: Option<ReferenceTime>,
}

/// Trait for receiving progress updates during a capture session.
///
/// Implementations must be [`Send`] and [`Sync`] because sessions may run on
/// a worker thread.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the session. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during a session.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated session. The driver checks the token before every seek and
/// while it waits for a frame.
///
/// # Example
///
/// ```
/// use framegrab::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks session timing and emits callbacks in batches.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
    last_position: Option<ReferenceTime>,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
            last_position: None,
        }
    }

    /// Record one captured frame and report if the batch is full.
    pub(crate) fn advance(&mut self, position: ReferenceTime) {
        self.current += 1;
        self.items_since_last_report += 1;
        self.last_position = Some(position);

        if self.items_since_last_report >= self.batch_size {
            self.report();
            self.items_since_last_report = 0;
        }
    }

    /// Emit a final report unless the last advance already did.
    pub(crate) fn finish(&mut self) {
        if self.items_since_last_report > 0 || self.current == 0 {
            self.report();
            self.items_since_last_report = 0;
        }
    }

    fn report(&self) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                elapsed.mul_f64(remaining as f64 / self.current as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_position: self.last_position,
        });
    }
}
