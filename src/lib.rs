//! Stereo Link
//!
//! Turns a JPEG stream arriving over a serial link into stereo image pairs.
//!
//! # Architecture
//!
//! - `ingest`: byte readers and the marker-based frame extractor
//! - `decode`: JPEG payload to RGB image
//! - `depth`: depth estimators and the depth map type
//! - `stereo`: depth to disparity, disparity to a left/right pair
//! - `sink`: presentation and diagnostic outputs
//! - `pipeline`: the read, decode, estimate, synthesize, present loop
//! - `config`: file and environment configuration
//!
//! Link timeouts and undecodable frames are recoverable; the pipeline logs
//! them and keeps going. A transport fault ends the run.

pub mod config;
pub mod decode;
pub mod depth;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod sink;
pub mod stereo;

pub use config::StereoLinkConfig;
pub use decode::{ImageDecoder, JpegDecoder, SolidDecoder};
pub use depth::{build_estimator, DepthBackendKind, DepthEstimator, DepthMap};
pub use error::{DecodeError, LinkError};
pub use frame::{Frame, Image};
pub use ingest::{
    ByteStreamReader, ExtractorConfig, FrameExtractor, PortReader, PortSettings, ResyncPolicy,
    ScriptStep, ScriptedReader,
};
pub use pipeline::{Pipeline, PipelineStats, StepOutcome, StopSignal};
pub use sink::{
    DiagnosticSink, DirectoryDiagnostics, DirectorySink, FrameSink, LogSink, NullDiagnostics,
    Presentation,
};
pub use stereo::{synthesize, DepthRange, DisparityMap, DisparitySynthesizer, StereoPair};
