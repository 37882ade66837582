//! Pipeline stages: the capture stage and the discard sink.
//!
//! A pipeline drives its stages through the [`PipelineStage`] trait: it
//! connects them once at assembly time, pushes each decoded [`Sample`]
//! through them in order from its delivery thread, and flushes them on every
//! seek. [`CaptureStage`] sits between the source and the sink, surfaces
//! frames matching its [`AcceptedFormat`] to a single [`SampleObserver`], and
//! declines further samples once the observer asks it to stop.
//!
//! # Example
//!
//! ```
//! use framegrab::{AcceptedFormat, CaptureControl, CaptureStage, GrabError, Sample, Subtype};
//!
//! let stage = CaptureStage::new("Grabber");
//! stage.set_accepted_format(AcceptedFormat::video(Subtype::Rgb24))?;
//! stage.register_observer(
//!     |sample: &Sample, _format_changed: bool| -> Result<CaptureControl, GrabError> {
//!         println!("frame at {}", sample.start());
//!         Ok(CaptureControl::Stop)
//!     },
//! );
//! # Ok::<(), framegrab::GrabError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    error::GrabError,
    format::{AcceptedFormat, MediaFormat},
    sample::Sample,
};

/// What a stage tells its upstream after receiving a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    /// The sample was consumed; upstream may keep pushing.
    Accept,
    /// The sample was declined; upstream stops pushing until the next seek.
    Decline,
}

/// An observer's instruction to the capture stage.
///
/// Because a declined sample stops the upstream source, this value is the
/// pipeline's backpressure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureControl {
    /// Keep accepting frames.
    Continue,
    /// Decline this and every further frame until the next seek.
    Stop,
}

/// Receives every frame the capture stage surfaces.
///
/// Called on the pipeline's delivery thread with the stage locked, so an
/// observer must not call back into its own stage. Implemented for any
/// `FnMut(&Sample, bool) -> Result<CaptureControl, GrabError> + Send`.
pub trait SampleObserver: Send {
    /// Inspect one frame. `format_changed` is `true` when the frame's format
    /// differs from the previous frame's.
    fn on_sample(&mut self, sample: &Sample, format_changed: bool)
    -> Result<CaptureControl, GrabError>;
}

impl<F> SampleObserver for F
where
    F: FnMut(&Sample, bool) -> Result<CaptureControl, GrabError> + Send,
{
    fn on_sample(
        &mut self,
        sample: &Sample,
        format_changed: bool,
    ) -> Result<CaptureControl, GrabError> {
        self(sample, format_changed)
    }
}

/// A node on the pipeline's data path.
pub trait PipelineStage: Send {
    /// Element name used in logs and errors.
    fn name(&self) -> &str;

    /// Fix the stage's input format.
    ///
    /// Returns the format the stage will emit downstream, or
    /// [`GrabError::Negotiation`] if `offered` is unacceptable.
    fn connect(&mut self, offered: &MediaFormat) -> Result<MediaFormat, GrabError>;

    /// Take one sample from upstream.
    fn receive(&mut self, sample: &Sample) -> Result<FlowControl, GrabError>;

    /// Discard per-segment state. Called on every seek.
    fn flush(&mut self) {}
}

struct CaptureState {
    accepted: Option<AcceptedFormat>,
    connected: Option<MediaFormat>,
    last_format: Option<MediaFormat>,
    observer: Option<Box<dyn SampleObserver>>,
    halted: bool,
    rejected: Option<String>,
    observed: u64,
}

/// The frame-capture stage.
///
/// A cheap, cloneable handle: keep one clone to configure and query the
/// stage while another is owned by the pipeline.
#[derive(Clone)]
pub struct CaptureStage {
    name: Arc<str>,
    state: Arc<Mutex<CaptureState>>,
}

impl Debug for CaptureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.lock();
        f.debug_struct("CaptureStage")
            .field("name", &self.name)
            .field("accepted", &state.accepted)
            .field("connected", &state.connected)
            .field("has_observer", &state.observer.is_some())
            .field("halted", &state.halted)
            .field("rejected", &state.rejected.is_some())
            .field("observed", &state.observed)
            .finish()
    }
}

impl CaptureStage {
    /// Create an unconnected stage with no accepted format and no observer.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(Mutex::new(CaptureState {
                accepted: None,
                connected: None,
                last_format: None,
                observer: None,
                halted: false,
                rejected: None,
                observed: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restrict which formats the stage will connect with.
    ///
    /// # Errors
    ///
    /// Returns [`GrabError::Configuration`] once the stage is connected; the
    /// input format is fixed at connection time. A rejected call also
    /// disables the stage: every later sample fails delivery with the same
    /// error and never reaches the observer.
    pub fn set_accepted_format(&self, accepted: AcceptedFormat) -> Result<(), GrabError> {
        let mut state = self.lock();
        if let Some(connected) = state.connected {
            let message = format!(
                "stage '{}' is already connected with {connected}; cannot accept {accepted}",
                self.name
            );
            log::error!("{message}");
            state.rejected = Some(message.clone());
            return Err(GrabError::Configuration(message));
        }
        state.accepted = Some(accepted);
        Ok(())
    }

    /// The configured accepted format, if any.
    pub fn accepted_format(&self) -> Option<AcceptedFormat> {
        self.lock().accepted
    }

    /// The negotiated input format, once connected.
    pub fn connected_format(&self) -> Option<MediaFormat> {
        self.lock().connected
    }

    /// Install the observer, replacing any previous one.
    pub fn register_observer<O>(&self, observer: O)
    where
        O: SampleObserver + 'static,
    {
        self.lock().observer = Some(Box::new(observer));
    }

    /// Remove the observer. Frames then pass straight through.
    pub fn clear_observer(&self) {
        self.lock().observer = None;
    }

    /// Returns `true` while the stage is declining samples after a `Stop`.
    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    /// Resume accepting samples without waiting for a seek.
    pub fn release(&self) {
        self.lock().halted = false;
    }

    /// How many times the observer has been invoked.
    pub fn samples_observed(&self) -> u64 {
        self.lock().observed
    }
}

impl PipelineStage for CaptureStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self, offered: &MediaFormat) -> Result<MediaFormat, GrabError> {
        let mut state = self.lock();
        if let Some(accepted) = state.accepted {
            if !accepted.accepts(offered) {
                return Err(GrabError::Negotiation {
                    stage: self.name.to_string(),
                    reason: format!("offered {offered}, accepts {accepted}"),
                });
            }
        }
        log::debug!("Stage '{}' connected with {offered}", self.name);
        state.connected = Some(*offered);
        state.last_format = None;
        Ok(*offered)
    }

    fn receive(&mut self, sample: &Sample) -> Result<FlowControl, GrabError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if let Some(message) = &state.rejected {
            return Err(GrabError::Configuration(message.clone()));
        }

        if state.halted {
            return Ok(FlowControl::Decline);
        }

        if state
            .accepted
            .is_some_and(|accepted| !accepted.accepts(sample.format()))
        {
            log::trace!(
                "Stage '{}' passing through {} frame",
                self.name,
                sample.format()
            );
            return Ok(FlowControl::Accept);
        }

        let format_changed = state
            .last_format
            .is_some_and(|last| last != *sample.format());
        state.last_format = Some(*sample.format());

        let Some(observer) = state.observer.as_mut() else {
            return Ok(FlowControl::Accept);
        };

        log::trace!(
            "Stage '{}' observed frame {}..{}",
            self.name,
            sample.start(),
            sample.stop()
        );
        state.observed += 1;
        match observer.on_sample(sample, format_changed) {
            Ok(CaptureControl::Continue) => Ok(FlowControl::Accept),
            Ok(CaptureControl::Stop) => {
                state.halted = true;
                Ok(FlowControl::Decline)
            }
            Err(error) => Err(GrabError::Delivery(format!(
                "observer on stage '{}' failed: {error}",
                self.name
            ))),
        }
    }

    fn flush(&mut self) {
        self.lock().halted = false;
    }
}

/// Terminal stage that accepts and drops every sample.
#[derive(Debug)]
pub struct DiscardSink {
    name: String,
    received: u64,
}

impl DiscardSink {
    /// Create a sink with the given element name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            received: 0,
        }
    }
}

impl Default for DiscardSink {
    fn default() -> Self {
        Self::new("Renderer")
    }
}

impl PipelineStage for DiscardSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self, offered: &MediaFormat) -> Result<MediaFormat, GrabError> {
        Ok(*offered)
    }

    fn receive(&mut self, _sample: &Sample) -> Result<FlowControl, GrabError> {
        self.received += 1;
        Ok(FlowControl::Accept)
    }

    fn flush(&mut self) {
        log::trace!("Sink '{}' flushed after {} frames", self.name, self.received);
    }
}
