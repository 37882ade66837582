//! One-call session assembly.
//!
//! [`GrabSession`] wires the standard graph (file source → `"Grabber"`
//! capture stage → `"Renderer"` discard sink) and owns the driver, so a
//! caller only picks a file, a format, and options.

use std::path::Path;

use crate::{
    control::MediaControl,
    driver::{ExtractionDriver, ExtractionReport},
    error::GrabError,
    format::{AcceptedFormat, MediaFormat},
    options::ExtractionOptions,
    pipeline::{Pipeline, PipelineBuilder},
    sample::Sample,
    stage::{CaptureStage, DiscardSink},
    time::ReferenceTime,
};

/// Element name of the capture stage in a session's pipeline.
pub const GRABBER_NAME: &str = "Grabber";

/// Element name of the discard sink in a session's pipeline.
pub const RENDERER_NAME: &str = "Renderer";

/// A pipeline, its capture stage, and the driver that walks it.
///
/// # Example
///
/// ```no_run
/// use framegrab::{AcceptedFormat, ExtractionOptions, GrabError, GrabSession, Subtype};
///
/// let mut session = GrabSession::open("input.mp4", AcceptedFormat::video(Subtype::Rgb24))?;
/// let options = ExtractionOptions::new().with_frame_count(10);
/// let report = session.run_with(&options, |sample| {
///     println!("frame {}..{}", sample.start(), sample.stop());
///     Ok(())
/// })?;
/// assert_eq!(report.frames_captured(), 10);
/// # Ok::<(), GrabError>(())
/// ```
#[derive(Debug)]
pub struct GrabSession {
    stage: CaptureStage,
    pipeline: Pipeline,
    driver: ExtractionDriver,
}

impl GrabSession {
    /// Open `path` and connect a capture stage restricted to `accepted`.
    ///
    /// # Errors
    ///
    /// Any error from [`PipelineBuilder::build`].
    pub fn open<P: AsRef<Path>>(path: P, accepted: AcceptedFormat) -> Result<Self, GrabError> {
        let stage = CaptureStage::new(GRABBER_NAME);
        stage.set_accepted_format(accepted)?;

        let driver = ExtractionDriver::new();
        stage.register_observer(driver.observer());

        let pipeline = PipelineBuilder::new(path)
            .stage(stage.clone())
            .stage(DiscardSink::new(RENDERER_NAME))
            .build()?;

        Ok(Self {
            stage,
            pipeline,
            driver,
        })
    }

    /// Total timeline duration.
    ///
    /// # Errors
    ///
    /// Returns [`GrabError::PipelineQuery`] for sources without a duration.
    pub fn duration(&mut self) -> Result<ReferenceTime, GrabError> {
        self.pipeline.duration()
    }

    /// The negotiated frame format.
    pub fn format(&self) -> MediaFormat {
        self.pipeline.format()
    }

    /// The session's capture stage.
    pub fn stage(&self) -> &CaptureStage {
        &self.stage
    }

    /// Direct access to the pipeline, e.g. to seek manually.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// Capture frames without inspecting them.
    ///
    /// # Errors
    ///
    /// Any error from [`ExtractionDriver::run`].
    pub fn run(&mut self, options: &ExtractionOptions) -> Result<ExtractionReport, GrabError> {
        self.stage.register_observer(self.driver.observer());
        self.driver.run(&mut self.pipeline, options)
    }

    /// Capture frames, calling `inspector` on each one from the delivery
    /// thread.
    ///
    /// # Errors
    ///
    /// Any error from [`ExtractionDriver::run`]; an inspector error ends the
    /// session as a [`GrabError::Delivery`].
    pub fn run_with<F>(
        &mut self,
        options: &ExtractionOptions,
        inspector: F,
    ) -> Result<ExtractionReport, GrabError>
    where
        F: FnMut(&Sample) -> Result<(), GrabError> + Send + 'static,
    {
        self.stage
            .register_observer(self.driver.observer().with_inspector(inspector));
        let result = self.driver.run(&mut self.pipeline, options);
        self.stage.register_observer(self.driver.observer());
        result
    }
}
