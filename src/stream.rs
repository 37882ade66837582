//! Async frame capture.
//!
//! [`capture_stream`] runs a [`GrabSession`] on a Tokio blocking thread and
//! streams a copy of each captured [`Sample`] back through a bounded channel.
//! The stream implements [`tokio_stream::Stream`].
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use framegrab::{AcceptedFormat, ExtractionOptions, GrabError, capture_stream};
//!
//! # async fn example() -> Result<(), GrabError> {
//! let options = ExtractionOptions::new().with_frame_count(10);
//! let mut stream = capture_stream("input.mp4", AcceptedFormat::default(), options);
//!
//! while let Some(result) = stream.next().await {
//!     let sample = result?;
//!     println!("frame at {}", sample.start());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::{
    error::GrabError,
    format::AcceptedFormat,
    options::ExtractionOptions,
    progress::CancellationToken,
    sample::Sample,
    session::GrabSession,
};

/// Bounded-channel capacity. Kept small because frames are large.
const CHANNEL_CAPACITY: usize = 4;

/// A stream of captured frames produced by a background session.
///
/// Errors arrive as the final item. Dropping the stream cancels the session
/// at its next checkpoint.
pub struct CaptureStream {
    receiver: Receiver<Result<Sample, GrabError>>,
    cancellation: CancellationToken,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl Stream for CaptureStream {
    type Item = Result<Sample, GrabError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Capture frames from `path` in the background.
///
/// Must be called from within a Tokio runtime. Any cancellation token
/// already set on `options` is replaced by one tied to the stream.
pub fn capture_stream<P: AsRef<Path>>(
    path: P,
    accepted: AcceptedFormat,
    options: ExtractionOptions,
) -> CaptureStream {
    let path = path.as_ref().to_path_buf();
    let cancellation = CancellationToken::new();
    let options = options.with_cancellation(cancellation.clone());
    let (sender, receiver) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::task::spawn_blocking(move || {
        if let Err(error) = capture_blocking(&path, accepted, &options, &sender) {
            // The receiver may already be gone.
            let _ = sender.blocking_send(Err(error));
        }
    });

    CaptureStream {
        receiver,
        cancellation,
        handle,
    }
}

fn capture_blocking(
    path: &Path,
    accepted: AcceptedFormat,
    options: &ExtractionOptions,
    sender: &Sender<Result<Sample, GrabError>>,
) -> Result<(), GrabError> {
    let mut session = GrabSession::open(path, accepted)?;
    let frames = sender.clone();
    session.run_with(options, move |sample| {
        frames
            .blocking_send(Ok(sample.clone()))
            .map_err(|_| GrabError::Cancelled)
    })?;
    Ok(())
}
