//! Session configuration.
//!
//! [`ExtractionOptions`] is a builder that carries the frame count, the wait
//! timeout, progress callbacks, and cancellation tokens into
//! [`ExtractionDriver::run`](crate::ExtractionDriver::run).
//!
//! # Example
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use framegrab::{CancellationToken, ExtractionOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} captured", info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractionOptions::new()
//!     .with_frame_count(50)
//!     .with_wait_timeout(Some(Duration::from_secs(2)))
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(10);
//! assert_eq!(options.frame_count(), 50);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Number of positions sampled when no frame count is configured.
pub const DEFAULT_FRAME_COUNT: u64 = 100;

/// How long the driver waits for one frame before declaring the session
/// stalled, unless configured otherwise.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a capture session.
#[derive(Clone)]
pub struct ExtractionOptions {
    pub(crate) frame_count: u64,
    pub(crate) wait_timeout: Option<Duration>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
}

impl Debug for ExtractionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractionOptions")
            .field("frame_count", &self.frame_count)
            .field("wait_timeout", &self.wait_timeout)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionOptions {
    /// Create options with default settings.
    ///
    /// Defaults: 100 frames, 10 second wait timeout, no progress callback,
    /// no cancellation, batch size 1.
    pub fn new() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            wait_timeout: Some(DEFAULT_WAIT_TIMEOUT),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set how many equally spaced positions to capture.
    #[must_use]
    pub fn with_frame_count(mut self, count: u64) -> Self {
        self.frame_count = count;
        self
    }

    /// Bound the wait for each frame. `None` waits forever.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the session stops and returns
    /// [`GrabError::Cancelled`](crate::GrabError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires (every N frames).
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured frame count.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The configured wait timeout.
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
