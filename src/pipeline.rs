//! Read → extract → decode → estimate → synthesize → present.
//!
//! Each iteration walks one frame through `Stage`:
//!
//! ```text
//! FrameReady → Decoding ─┬─ DecodeOk → EstimatingDepth → Synthesizing → Done
//!                        └─ DecodeFail ───────────────────────────────→ Done
//! ```
//!
//! Link timeouts and decode failures are logged and absorbed here. Only a
//! transport fault leaves `run`, as `LinkError::Transport`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::decode::ImageDecoder;
use crate::depth::{self, DepthEstimator, DepthMap};
use crate::error::{DecodeError, LinkError};
use crate::frame::{Frame, Image, DIAGNOSTIC_PEEK_BYTES};
use crate::ingest::{ByteStreamReader, FrameExtractor};
use crate::sink::{DiagnosticSink, FrameSink, NullDiagnostics, Presentation};
use crate::stereo::DisparitySynthesizer;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Cooperative stop flag, checked between iterations.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a single iteration ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Presented,
    DecodeFailed,
    DepthFailed,
    TimedOut,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub presented: u64,
    pub decode_failures: u64,
    pub depth_failures: u64,
    pub sink_failures: u64,
    pub timeouts: u64,
}

enum Stage {
    FrameReady(Frame),
    Decoding(Frame),
    DecodeOk(Image),
    DecodeFail(Frame, DecodeError),
    EstimatingDepth(Image),
    Synthesizing(Image, DepthMap),
    Done(StepOutcome),
}

/// Depth estimator plus the synthesizer that consumes its output.
pub struct DepthStage {
    pub estimator: Box<dyn DepthEstimator>,
    pub synthesizer: DisparitySynthesizer,
}

/// Everything downstream of the extractor.
struct Stages {
    decoder: Box<dyn ImageDecoder>,
    depth: Option<DepthStage>,
    sink: Box<dyn FrameSink>,
    diagnostics: Box<dyn DiagnosticSink>,
    stats: PipelineStats,
    last_health_log: Instant,
}

pub struct Pipeline {
    extractor: FrameExtractor,
    stages: Stages,
    stop: StopSignal,
}

impl Pipeline {
    /// Depth-less pipeline: decoded frames go straight to `sink`.
    pub fn new(
        extractor: FrameExtractor,
        decoder: Box<dyn ImageDecoder>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            extractor,
            stages: Stages {
                decoder,
                depth: None,
                sink,
                diagnostics: Box::new(NullDiagnostics),
                stats: PipelineStats::default(),
                last_health_log: Instant::now(),
            },
            stop: StopSignal::new(),
        }
    }

    pub fn with_depth(
        mut self,
        estimator: Box<dyn DepthEstimator>,
        synthesizer: DisparitySynthesizer,
    ) -> Self {
        self.stages.depth = Some(DepthStage {
            estimator,
            synthesizer,
        });
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Box<dyn DiagnosticSink>) -> Self {
        self.stages.diagnostics = diagnostics;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stages.stats
    }

    pub fn extractor(&self) -> &FrameExtractor {
        &self.extractor
    }

    /// One iteration: wait for a frame and carry it through to presentation.
    ///
    /// Only transport faults are returned as errors.
    pub fn step<R>(&mut self, reader: &mut R) -> Result<StepOutcome, LinkError>
    where
        R: ByteStreamReader + ?Sized,
    {
        match self.extractor.extract_next_frame(reader) {
            Ok(frame) => Ok(self.stages.process(frame)),
            Err(LinkError::Timeout { idle_reads }) => {
                self.stages.on_timeout(idle_reads);
                Ok(StepOutcome::TimedOut)
            }
            Err(err) => Err(err),
        }
    }

    /// Run until stopped or the transport fails.
    pub fn run<R>(&mut self, reader: &mut R) -> Result<PipelineStats, LinkError>
    where
        R: ByteStreamReader + ?Sized,
    {
        log::info!("pipeline running (inline)");
        while !self.stop.is_stopped() {
            if let Err(err) = self.step(reader) {
                log::error!("link transport failed: {}", err);
                return Err(err);
            }
            self.stages.log_health(&self.extractor);
        }
        log::info!("pipeline stopped");
        Ok(self.stages.stats.clone())
    }

    /// Like `run`, but extraction happens on its own thread and hands frames
    /// over a bounded channel. A full channel blocks the reader; nothing is
    /// dropped and frames are processed in arrival order.
    pub fn run_decoupled<R>(
        &mut self,
        reader: &mut R,
        capacity: usize,
    ) -> Result<PipelineStats, LinkError>
    where
        R: ByteStreamReader + Send + ?Sized,
    {
        log::info!("pipeline running (decoupled, capacity {})", capacity.max(1));
        let stop = self.stop.clone();
        let extractor = &mut self.extractor;
        let stages = &mut self.stages;

        let result = std::thread::scope(|scope| {
            let (tx, rx) = mpsc::sync_channel::<LinkEvent>(capacity.max(1));
            let producer_stop = stop.clone();
            let producer = scope.spawn(move || {
                while !producer_stop.is_stopped() {
                    let event = match extractor.extract_next_frame(reader) {
                        Ok(frame) => LinkEvent::Frame(frame),
                        Err(LinkError::Timeout { idle_reads }) => LinkEvent::Timeout(idle_reads),
                        Err(err) => {
                            let _ = tx.send(LinkEvent::Fault(err));
                            return;
                        }
                    };
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            });

            let outcome = loop {
                if stop.is_stopped() {
                    break Ok(());
                }
                match rx.recv() {
                    Ok(LinkEvent::Frame(frame)) => {
                        stages.process(frame);
                    }
                    Ok(LinkEvent::Timeout(idle_reads)) => stages.on_timeout(idle_reads),
                    Ok(LinkEvent::Fault(err)) => break Err(err),
                    Err(_) => break Ok(()),
                }
            };
            drop(rx);

            if producer.join().is_err() {
                log::error!("frame reader thread panicked");
            }
            outcome
        });

        match result {
            Ok(()) => {
                self.stages.log_health(&self.extractor);
                log::info!("pipeline stopped");
                Ok(self.stages.stats.clone())
            }
            Err(err) => {
                log::error!("link transport failed: {}", err);
                Err(err)
            }
        }
    }
}

enum LinkEvent {
    Frame(Frame),
    Timeout(u32),
    Fault(LinkError),
}

impl Stages {
    fn on_timeout(&mut self, idle_reads: u32) {
        self.stats.timeouts += 1;
        log::warn!(
            "timeout: no frame after {} empty reads; retrying",
            idle_reads
        );
    }

    fn process(&mut self, frame: Frame) -> StepOutcome {
        self.stats.frames += 1;
        let sequence = self.stats.frames;
        let mut stage = Stage::FrameReady(frame);
        loop {
            stage = match stage {
                Stage::FrameReady(frame) => {
                    log::debug!("frame {} ready ({} bytes)", sequence, frame.len());
                    Stage::Decoding(frame)
                }
                Stage::Decoding(frame) => match self.decoder.decode(frame.as_bytes()) {
                    Ok(image) => Stage::DecodeOk(image),
                    Err(err) => Stage::DecodeFail(frame, err),
                },
                Stage::DecodeFail(frame, err) => {
                    self.on_decode_failure(sequence, &frame, &err);
                    Stage::Done(StepOutcome::DecodeFailed)
                }
                Stage::DecodeOk(image) => {
                    log::debug!(
                        "decoded frame {}: {}x{}",
                        sequence,
                        image.width(),
                        image.height()
                    );
                    if self.depth.is_some() {
                        Stage::EstimatingDepth(image)
                    } else {
                        self.present(sequence, Presentation::Mono(image));
                        Stage::Done(StepOutcome::Presented)
                    }
                }
                Stage::EstimatingDepth(image) => {
                    let Some(depth_stage) = self.depth.as_mut() else {
                        return StepOutcome::DepthFailed;
                    };
                    match depth::estimate_at(depth_stage.estimator.as_mut(), &image) {
                        Ok(depth) => Stage::Synthesizing(image, depth),
                        Err(err) => {
                            self.stats.depth_failures += 1;
                            log::warn!("depth estimation failed for frame {}: {:#}", sequence, err);
                            Stage::Done(StepOutcome::DepthFailed)
                        }
                    }
                }
                Stage::Synthesizing(image, depth) => {
                    let Some(depth_stage) = self.depth.as_ref() else {
                        return StepOutcome::DepthFailed;
                    };
                    match depth_stage.synthesizer.synthesize(&image, &depth) {
                        Ok(pair) => {
                            self.present(
                                sequence,
                                Presentation::Stereo {
                                    source: image,
                                    pair,
                                },
                            );
                            Stage::Done(StepOutcome::Presented)
                        }
                        Err(err) => {
                            self.stats.depth_failures += 1;
                            log::warn!("stereo synthesis failed for frame {}: {:#}", sequence, err);
                            Stage::Done(StepOutcome::DepthFailed)
                        }
                    }
                }
                Stage::Done(outcome) => return outcome,
            };
        }
    }

    fn on_decode_failure(&mut self, sequence: u64, frame: &Frame, err: &DecodeError) {
        self.stats.decode_failures += 1;
        log::warn!(
            "decode failed for frame {} ({} bytes): {}",
            sequence,
            frame.len(),
            err
        );
        log::debug!(
            "payload head: {} tail: {}",
            frame.head_hex(DIAGNOSTIC_PEEK_BYTES),
            frame.tail_hex(DIAGNOSTIC_PEEK_BYTES)
        );
        if let Err(diag_err) = self.diagnostics.capture(sequence, frame, err) {
            log::warn!("diagnostic capture failed: {:#}", diag_err);
        }
    }

    fn present(&mut self, sequence: u64, presentation: Presentation) {
        match self.sink.present(sequence, &presentation) {
            Ok(()) => self.stats.presented += 1,
            Err(err) => {
                self.stats.sink_failures += 1;
                log::warn!("presentation failed for frame {}: {:#}", sequence, err);
            }
        }
    }

    fn log_health(&mut self, extractor: &FrameExtractor) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        let link = extractor.stats();
        log::info!(
            "link frames={} garbage_bytes={} timeouts={} | presented={} decode_failures={} depth_failures={}",
            link.frames_extracted,
            link.garbage_bytes,
            link.timeouts,
            self.stats.presented,
            self.stats.decode_failures,
            self.stats.depth_failures
        );
        self.last_health_log = Instant::now();
    }
}
