//! Shared helpers for integration tests.
//!
//! [`ScriptedPipeline`] is an in-memory [`MediaControl`] that pushes
//! synthetic frames through a [`CaptureStage`] from a separate thread, so
//! the driver can be exercised without FFmpeg or fixture files.

#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use framegrab::{
    CaptureStage, FlowControl, GrabError, MediaControl, MediaFormat, PipelineStage, ReferenceTime,
    RunState, Sample, Subtype,
};

pub const FRAME_SPAN: i64 = 400_000;

pub fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

pub fn offset_video_path() -> &'static str {
    "tests/fixtures/sample_offset.ts"
}

pub fn test_format() -> MediaFormat {
    MediaFormat::video(Subtype::Rgb24, 4, 2, 25.0)
}

pub fn test_sample(start: i64) -> Sample {
    let format = test_format();
    Sample::new(
        format,
        ReferenceTime::from_units(start),
        ReferenceTime::from_units(start + FRAME_SPAN),
        vec![0x7f; format.frame_size()],
    )
}

/// Scripted pipeline.
///
/// Stopped records seeks without delivering; the first `pause` delivers
/// the pending position. Paused and Running deliver on every seek, up to
/// `frames_per_seek` frames, stopping early when the stage declines.
///
/// By default each delivery runs on its own thread and completes before the
/// control call returns. With `asynchronous` set, the control call returns
/// first and the thread keeps pushing after `delivery_delay`, one frame per
/// millisecond, until a later seek supersedes it. A superseded thread still
/// pushes `stale_frames` frames from its old segment before it exits.
pub struct ScriptedPipeline {
    stage: CaptureStage,
    format: MediaFormat,
    duration: Option<ReferenceTime>,
    state: RunState,
    pending: Option<ReferenceTime>,
    failure: Arc<Mutex<Option<GrabError>>>,
    generation: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
    late: Arc<AtomicU64>,
    workers: Vec<JoinHandle<()>>,
    pub frames_per_seek: u32,
    pub deliver: bool,
    pub asynchronous: bool,
    pub delivery_delay: Duration,
    pub stale_frames: u32,
    pub fail_seek_at: Option<usize>,
    pub fail_pause: bool,
    pub seeks: Vec<ReferenceTime>,
    pub pauses: u32,
}

impl ScriptedPipeline {
    /// Connect `stage` and script a timeline of `duration` units.
    pub fn new(stage: &CaptureStage, duration: Option<i64>) -> Self {
        let format = test_format();
        stage
            .clone()
            .connect(&format)
            .expect("stage refused the scripted format");
        Self {
            stage: stage.clone(),
            format,
            duration: duration.map(ReferenceTime::from_units),
            state: RunState::Stopped,
            pending: None,
            failure: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
            late: Arc::new(AtomicU64::new(0)),
            workers: Vec::new(),
            frames_per_seek: 1,
            deliver: true,
            asynchronous: false,
            delivery_delay: Duration::from_millis(20),
            stale_frames: 0,
            fail_seek_at: None,
            fail_pause: false,
            seeks: Vec::new(),
            pauses: 0,
        }
    }

    pub fn seek_units(&self) -> Vec<i64> {
        self.seeks.iter().map(|position| position.units()).collect()
    }

    /// Frames pushed into the stage so far, stale ones included.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Frames pushed after their segment had been superseded by a seek.
    pub fn late_frames(&self) -> u64 {
        self.late.load(Ordering::SeqCst)
    }

    fn deliver_from(&mut self, position: ReferenceTime) {
        if !self.deliver {
            return;
        }
        let ticket = self.generation.load(Ordering::SeqCst);
        let generation = Arc::clone(&self.generation);
        let delivered = Arc::clone(&self.delivered);
        let late = Arc::clone(&self.late);
        let failure = Arc::clone(&self.failure);
        let mut stage = self.stage.clone();
        let frames = self.frames_per_seek;
        let format = self.format;
        let asynchronous = self.asynchronous;
        let delay = self.delivery_delay;
        let stale_frames = self.stale_frames;

        let worker = thread::spawn(move || {
            if asynchronous {
                thread::sleep(delay);
            }
            let mut stale = 0;
            for index in 0..frames {
                if generation.load(Ordering::SeqCst) != ticket {
                    if stale == stale_frames {
                        break;
                    }
                    stale += 1;
                    late.fetch_add(1, Ordering::SeqCst);
                }
                let start = position.units() + i64::from(index) * FRAME_SPAN;
                let sample = Sample::new(
                    format,
                    ReferenceTime::from_units(start),
                    ReferenceTime::from_units(start + FRAME_SPAN),
                    vec![0; format.frame_size()],
                );
                delivered.fetch_add(1, Ordering::SeqCst);
                match stage.receive(&sample) {
                    Ok(FlowControl::Accept) => {}
                    Ok(FlowControl::Decline) => break,
                    Err(error) => {
                        *failure.lock().unwrap() = Some(error);
                        break;
                    }
                }
                if asynchronous {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });

        if asynchronous {
            self.workers.push(worker);
        } else {
            worker.join().expect("delivery thread panicked");
        }
    }
}

impl Drop for ScriptedPipeline {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl MediaControl for ScriptedPipeline {
    fn duration(&mut self) -> Result<ReferenceTime, GrabError> {
        self.duration
            .ok_or_else(|| GrabError::PipelineQuery("scripted source is unseekable".to_string()))
    }

    fn seek(&mut self, position: ReferenceTime) -> Result<(), GrabError> {
        if self.fail_seek_at == Some(self.seeks.len()) {
            return Err(GrabError::Seek {
                position,
                reason: "scripted seek failure".to_string(),
            });
        }
        self.seeks.push(position);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.stage.clone().flush();
        match self.state {
            RunState::Stopped => self.pending = Some(position),
            RunState::Paused | RunState::Running => self.deliver_from(position),
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), GrabError> {
        self.pauses += 1;
        if self.fail_pause {
            return Err(GrabError::Configuration("scripted pause failure".to_string()));
        }
        let previous = self.state;
        self.state = RunState::Paused;
        if previous == RunState::Stopped {
            if let Some(position) = self.pending.take() {
                self.deliver_from(position);
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), GrabError> {
        self.state = RunState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GrabError> {
        self.state = RunState::Stopped;
        Ok(())
    }

    fn run_state(&self) -> RunState {
        self.state
    }

    fn take_delivery_failure(&mut self) -> Option<GrabError> {
        self.failure.lock().unwrap().take()
    }
}
