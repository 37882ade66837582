//! Pipeline control surface consumed by the extraction driver.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{error::GrabError, time::ReferenceTime};

/// Execution mode of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    /// No data flows. Seeks are recorded but nothing is delivered.
    #[default]
    Stopped,
    /// Schedulable but not streaming: each seek delivers one preroll frame.
    Paused,
    /// Streaming continuously.
    Running,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            RunState::Stopped => "stopped",
            RunState::Paused => "paused",
            RunState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Seeking and run-state control over a pipeline.
///
/// [`Pipeline`](crate::Pipeline) is the FFmpeg-backed implementation. Frames
/// triggered by these calls are delivered asynchronously on a thread the
/// implementation owns, never on the caller's thread.
pub trait MediaControl {
    /// Total timeline duration.
    ///
    /// Fails with [`GrabError::PipelineQuery`] when the source has no finite
    /// duration.
    fn duration(&mut self) -> Result<ReferenceTime, GrabError>;

    /// Reposition to an absolute timeline position with no stop constraint.
    fn seek(&mut self, position: ReferenceTime) -> Result<(), GrabError>;

    /// Transition to [`RunState::Paused`].
    fn pause(&mut self) -> Result<(), GrabError>;

    /// Transition to [`RunState::Running`].
    fn run(&mut self) -> Result<(), GrabError>;

    /// Transition to [`RunState::Stopped`].
    fn stop(&mut self) -> Result<(), GrabError>;

    /// The last state this pipeline was transitioned to.
    fn run_state(&self) -> RunState;

    /// Take the most recent delivery-thread failure, if any.
    fn take_delivery_failure(&mut self) -> Option<GrabError> {
        None
    }
}
