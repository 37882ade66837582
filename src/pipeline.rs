//! FFmpeg-backed pipeline.
//!
//! [`PipelineBuilder`] assembles a file source, a chain of
//! [`PipelineStage`]s, and a delivery thread that owns them. The delivery
//! thread demuxes and decodes with FFmpeg, converts frames to the format the
//! first stage negotiated, and pushes them downstream according to the
//! pipeline's [`RunState`]:
//!
//! - **Stopped**: nothing is delivered; seeks only move the read position.
//! - **Paused**: each seek delivers exactly one preroll frame, the first
//!   frame whose span reaches the seek target.
//! - **Running**: frames keep flowing until a stage declines one, the stream
//!   ends, or a new command arrives.
//!
//! [`Pipeline`] implements [`MediaControl`]; every control call is a
//! request/acknowledge round trip with the delivery thread.
//!
//! Positions and sample times are measured from the first timestamp of the
//! video stream, so a file whose stream starts late still spans
//! `0..duration`.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, Receiver, Sender, SyncSender, TryRecvError},
    },
    thread::{self, JoinHandle},
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    control::{MediaControl, RunState},
    error::GrabError,
    format::{MediaFormat, Subtype},
    sample::Sample,
    stage::{FlowControl, PipelineStage},
    time::ReferenceTime,
};

type Ack = SyncSender<Result<(), GrabError>>;
type FailureSlot = Arc<Mutex<Option<GrabError>>>;

enum Command {
    Seek(ReferenceTime, Ack),
    SetState(RunState, Ack),
    Shutdown,
}

/// What the delivery thread reports once the source is open and connected.
struct SourceInfo {
    duration: Option<ReferenceTime>,
    format: MediaFormat,
}

/// Assembles a [`Pipeline`] from a file source and a chain of stages.
///
/// Stages are connected in the order they are added. The source offers
/// RGB24, RGBA32 and GRAY8 (in that order) to the first stage and uses the
/// first one it accepts; every later stage is connected with the format the
/// stage before it emits.
///
/// # Example
///
/// ```no_run
/// use framegrab::{CaptureStage, DiscardSink, GrabError, MediaControl, PipelineBuilder};
///
/// let mut pipeline = PipelineBuilder::new("input.mp4")
///     .stage(CaptureStage::new("Grabber"))
///     .stage(DiscardSink::default())
///     .build()?;
/// println!("{} long, {}", pipeline.duration()?, pipeline.format());
/// # Ok::<(), GrabError>(())
/// ```
pub struct PipelineBuilder {
    path: PathBuf,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Debug for PipelineBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let names: Vec<&str> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("PipelineBuilder")
            .field("path", &self.path)
            .field("stages", &names)
            .finish()
    }
}

impl PipelineBuilder {
    /// Start a pipeline reading from `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stages: Vec::new(),
        }
    }

    /// Append a stage to the data path.
    #[must_use]
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: PipelineStage + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Open the source, negotiate formats, and start the delivery thread.
    ///
    /// The pipeline starts in [`RunState::Stopped`].
    ///
    /// # Errors
    ///
    /// - [`GrabError::FileOpen`] if FFmpeg cannot open the file.
    /// - [`GrabError::NoVideoStream`] if the file has no video.
    /// - [`GrabError::Negotiation`] if a stage refuses every offered format.
    /// - [`GrabError::IoError`] if the delivery thread cannot be spawned.
    pub fn build(self) -> Result<Pipeline, GrabError> {
        let PipelineBuilder { path, stages } = self;
        log::debug!(
            "Assembling pipeline for {} with {} stage(s)",
            path.display(),
            stages.len()
        );

        let (command_sender, command_receiver) = mpsc::channel();
        let (ready_sender, ready_receiver) = mpsc::sync_channel(1);
        let failure: FailureSlot = Arc::new(Mutex::new(None));

        let worker_path = path.clone();
        let worker_failure = Arc::clone(&failure);
        let worker = thread::Builder::new()
            .name("framegrab-delivery".to_string())
            .spawn(move || {
                let delivery = match DeliveryWorker::open(&worker_path, stages) {
                    Ok(delivery) => delivery,
                    Err(error) => {
                        let _ = ready_sender.send(Err(error));
                        return;
                    }
                };
                let _ = ready_sender.send(Ok(delivery.info()));
                delivery.run(&command_receiver, &worker_failure);
            })?;

        let info = ready_receiver
            .recv()
            .unwrap_or(Err(GrabError::PipelineClosed));
        let info = match info {
            Ok(info) => info,
            Err(error) => {
                let _ = worker.join();
                return Err(error);
            }
        };

        log::debug!(
            "Pipeline ready: {} ({})",
            info.format,
            info.duration
                .map_or_else(|| "unknown duration".to_string(), |d| d.to_string())
        );

        Ok(Pipeline {
            source: path,
            commands: command_sender,
            worker: Some(worker),
            duration: info.duration,
            format: info.format,
            state: RunState::Stopped,
            failure,
        })
    }
}

/// A running FFmpeg pipeline. See the [module docs](self) for delivery rules.
///
/// Dropping the pipeline stops and joins its delivery thread.
pub struct Pipeline {
    source: PathBuf,
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    duration: Option<ReferenceTime>,
    format: MediaFormat,
    state: RunState,
    failure: FailureSlot,
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("source", &self.source)
            .field("duration", &self.duration)
            .field("format", &self.format)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Shorthand for [`PipelineBuilder::new`].
    pub fn builder<P: AsRef<Path>>(path: P) -> PipelineBuilder {
        PipelineBuilder::new(path)
    }

    /// The path the source reads from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The format the source delivers to the first stage.
    pub fn format(&self) -> MediaFormat {
        self.format
    }

    fn request<F>(&self, command: F) -> Result<(), GrabError>
    where
        F: FnOnce(Ack) -> Command,
    {
        let (ack, acknowledged) = mpsc::sync_channel(1);
        self.commands
            .send(command(ack))
            .map_err(|_| GrabError::PipelineClosed)?;
        acknowledged.recv().map_err(|_| GrabError::PipelineClosed)?
    }

    fn transition(&mut self, state: RunState) -> Result<(), GrabError> {
        self.request(|ack| Command::SetState(state, ack))
            .map_err(|error| GrabError::RunState {
                state,
                reason: error.to_string(),
            })?;
        self.state = state;
        Ok(())
    }
}

impl MediaControl for Pipeline {
    fn duration(&mut self) -> Result<ReferenceTime, GrabError> {
        self.duration.ok_or_else(|| {
            GrabError::PipelineQuery(format!(
                "{} has no finite duration",
                self.source.display()
            ))
        })
    }

    fn seek(&mut self, position: ReferenceTime) -> Result<(), GrabError> {
        self.request(|ack| Command::Seek(position, ack))
            .map_err(|error| match error {
                GrabError::PipelineClosed => error,
                other => GrabError::Seek {
                    position,
                    reason: other.to_string(),
                },
            })
    }

    fn pause(&mut self) -> Result<(), GrabError> {
        self.transition(RunState::Paused)
    }

    fn run(&mut self) -> Result<(), GrabError> {
        self.transition(RunState::Running)
    }

    fn stop(&mut self) -> Result<(), GrabError> {
        self.transition(RunState::Stopped)
    }

    fn run_state(&self) -> RunState {
        self.state
    }

    fn take_delivery_failure(&mut self) -> Option<GrabError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Delivery thread for {} panicked", self.source.display());
            }
        }
    }
}

/// Delivery progress since the last seek.
#[derive(Debug, Clone, Copy)]
struct Segment {
    target: ReferenceTime,
    prerolled: bool,
    active: bool,
}

impl Segment {
    fn starting_at(target: ReferenceTime) -> Self {
        Self {
            target,
            prerolled: false,
            active: true,
        }
    }
}

/// Source, decoder, converter and stages, all owned by the delivery thread.
struct DeliveryWorker {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stages: Vec<Box<dyn PipelineStage>>,
    stream_index: usize,
    time_base: Rational,
    origin: ReferenceTime,
    frame_span: ReferenceTime,
    format: MediaFormat,
    duration: Option<ReferenceTime>,
    decoded: VideoFrame,
    converted: VideoFrame,
    end_of_stream: bool,
}

impl DeliveryWorker {
    fn open(path: &Path, mut stages: Vec<Box<dyn PipelineStage>>) -> Result<Self, GrabError> {
        ffmpeg_next::init().map_err(|error| GrabError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| GrabError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let (stream_index, time_base, origin, frames_per_second, decoder) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or(GrabError::NoVideoStream)?;
            let rate = stream.avg_frame_rate();
            let frames_per_second = if rate.numerator() > 0 && rate.denominator() > 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            };
            let decoder = CodecContext::from_parameters(stream.parameters())?
                .decoder()
                .video()?;
            // AV_NOPTS_VALUE marks an unknown start time.
            let origin = match stream.start_time() {
                i64::MIN => ReferenceTime::ZERO,
                start => ReferenceTime::from_stream_timestamp(start, stream.time_base()),
            };
            (stream.index(), stream.time_base(), origin, frames_per_second, decoder)
        };
        if origin != ReferenceTime::ZERO {
            log::debug!("Video stream starts at {origin}; timeline is rebased to zero");
        }

        let duration =
            (input.duration() > 0).then(|| ReferenceTime::from_micros(input.duration()));
        let frame_span = if frames_per_second > 0.0 {
            let units = ReferenceTime::UNITS_PER_SECOND as f64 / frames_per_second;
            ReferenceTime::from_units(units as i64)
        } else {
            ReferenceTime::ZERO
        };

        let format = negotiate(
            &mut stages,
            decoder.width(),
            decoder.height(),
            frames_per_second,
        )?;

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            format.subtype.to_ffmpeg_pixel(),
            format.width,
            format.height,
            ScalingFlags::BILINEAR,
        )?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stages,
            stream_index,
            time_base,
            origin,
            frame_span,
            format,
            duration,
            decoded: VideoFrame::empty(),
            converted: VideoFrame::empty(),
            end_of_stream: false,
        })
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            duration: self.duration,
            format: self.format,
        }
    }

    fn run(mut self, commands: &Receiver<Command>, failure: &Mutex<Option<GrabError>>) {
        let mut state = RunState::Stopped;
        let mut segment = Segment::starting_at(ReferenceTime::ZERO);

        loop {
            let has_work = state != RunState::Stopped
                && segment.active
                && (!segment.prerolled || state == RunState::Running);

            let command = if has_work {
                match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            match command {
                Some(Command::Seek(position, ack)) => {
                    let result = self.seek(position);
                    segment = Segment::starting_at(position);
                    segment.active = result.is_ok();
                    let _ = ack.send(result);
                    continue;
                }
                Some(Command::SetState(next, ack)) => {
                    log::debug!("Pipeline {state} -> {next}");
                    state = next;
                    let _ = ack.send(Ok(()));
                    continue;
                }
                Some(Command::Shutdown) => break,
                None => {}
            }

            let next = if segment.prerolled {
                self.next_sample()
            } else {
                self.preroll(segment.target)
            };

            match next {
                Ok(Some(sample)) => {
                    segment.prerolled = true;
                    match self.push(&sample) {
                        Ok(FlowControl::Accept) => {}
                        Ok(FlowControl::Decline) => segment.active = false,
                        Err(error) => {
                            log::error!("Delivery of frame at {} failed: {error}", sample.start());
                            *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
                            segment.active = false;
                        }
                    }
                }
                Ok(None) => {
                    if !segment.prerolled {
                        log::warn!("End of stream reached before a frame at {}", segment.target);
                    }
                    segment.active = false;
                }
                Err(error) => {
                    log::error!("Decoding failed after seek to {}: {error}", segment.target);
                    *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
                    segment.active = false;
                }
            }
        }

        log::debug!("Delivery thread exiting");
    }

    fn seek(&mut self, position: ReferenceTime) -> Result<(), GrabError> {
        let timestamp = (position + self.origin).to_micros();
        self.input.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        self.end_of_stream = false;
        for stage in &mut self.stages {
            stage.flush();
        }
        Ok(())
    }

    /// Decode until a frame is available. Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool, GrabError> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                return Ok(true);
            }
            if self.end_of_stream {
                return Ok(false);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder.send_packet(&packet)?;
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof()?;
                    self.end_of_stream = true;
                }
            }
        }
    }

    fn current_span(&self) -> (ReferenceTime, ReferenceTime) {
        let timestamp = self
            .decoded
            .timestamp()
            .or_else(|| self.decoded.pts())
            .unwrap_or(0);
        let start = ReferenceTime::from_stream_timestamp(timestamp, self.time_base) - self.origin;
        (start, start + self.frame_span)
    }

    fn current_sample(&mut self) -> Result<Sample, GrabError> {
        let (start, stop) = self.current_span();
        self.scaler.run(&self.decoded, &mut self.converted)?;
        let data = packed_plane(
            &self.converted,
            self.format.width,
            self.format.height,
            self.format.subtype.bytes_per_pixel(),
        );
        Ok(Sample::new(self.format, start, stop, data))
    }

    /// The first frame whose span reaches `target`.
    fn preroll(&mut self, target: ReferenceTime) -> Result<Option<Sample>, GrabError> {
        while self.decode_next()? {
            let (start, stop) = self.current_span();
            if stop > target || start >= target {
                return self.current_sample().map(Some);
            }
        }
        Ok(None)
    }

    fn next_sample(&mut self) -> Result<Option<Sample>, GrabError> {
        if self.decode_next()? {
            self.current_sample().map(Some)
        } else {
            Ok(None)
        }
    }

    fn push(&mut self, sample: &Sample) -> Result<FlowControl, GrabError> {
        for stage in &mut self.stages {
            if stage.receive(sample)? == FlowControl::Decline {
                return Ok(FlowControl::Decline);
            }
        }
        Ok(FlowControl::Accept)
    }
}

/// Offer every supported subtype to the first stage, then chain the result
/// through the rest. Returns the format the source must produce.
fn negotiate(
    stages: &mut [Box<dyn PipelineStage>],
    width: u32,
    height: u32,
    frames_per_second: f64,
) -> Result<MediaFormat, GrabError> {
    let Some((first, rest)) = stages.split_first_mut() else {
        return Ok(MediaFormat::video(
            Subtype::default(),
            width,
            height,
            frames_per_second,
        ));
    };

    let mut refusals = Vec::new();
    let mut connected = None;
    for subtype in Subtype::ALL {
        let offered = MediaFormat::video(subtype, width, height, frames_per_second);
        match first.connect(&offered) {
            Ok(output) => {
                connected = Some((offered, output));
                break;
            }
            Err(GrabError::Negotiation { reason, .. }) => refusals.push(reason),
            Err(other) => return Err(other),
        }
    }

    let Some((source_format, mut downstream)) = connected else {
        return Err(GrabError::Negotiation {
            stage: first.name().to_string(),
            reason: format!("no offered format was accepted ({})", refusals.join("; ")),
        });
    };

    for stage in rest {
        downstream = stage.connect(&downstream)?;
    }
    Ok(source_format)
}

/// Copy the first plane of a packed frame, dropping FFmpeg's row padding.
fn packed_plane(frame: &VideoFrame, width: u32, height: u32, bytes_per_pixel: usize) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * bytes_per_pixel;
    let rows = height as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * rows].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * rows);
        for row in 0..rows {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}
