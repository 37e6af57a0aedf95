//! Presentation and diagnostic hand-off.
//!
//! Sinks sit at the edge of the pipeline. A failing sink is logged by the
//! pipeline and never changes what happens to the next frame.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::ImageFormat;

use crate::error::DecodeError;
use crate::frame::{Frame, Image};
use crate::stereo::StereoPair;

/// What the pipeline produced for one frame.
#[derive(Clone, Debug)]
pub enum Presentation {
    /// Depth stage ran; `source` is the decoded frame for previews.
    Stereo { source: Image, pair: StereoPair },
    /// Depth-less variant: the decoded frame as-is.
    Mono(Image),
}

impl Presentation {
    /// Single image for display: side-by-side for stereo, the frame otherwise.
    pub fn composed(&self) -> Image {
        match self {
            Presentation::Stereo { pair, .. } => pair.side_by_side(),
            Presentation::Mono(image) => image.clone(),
        }
    }

    pub fn source(&self) -> &Image {
        match self {
            Presentation::Stereo { source, .. } => source,
            Presentation::Mono(image) => image,
        }
    }
}

/// Receives finished frames in arrival order.
pub trait FrameSink {
    fn present(&mut self, sequence: u64, presentation: &Presentation) -> Result<()>;
}

/// Receives payloads that failed to decode.
pub trait DiagnosticSink {
    fn capture(&mut self, sequence: u64, frame: &Frame, error: &DecodeError) -> Result<()>;
}

/// Logs each presented frame's shape.
#[derive(Default)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn present(&mut self, sequence: u64, presentation: &Presentation) -> Result<()> {
        match presentation {
            Presentation::Stereo { source, .. } => log::info!(
                "frame {}: stereo pair from {}x{} source",
                sequence,
                source.width(),
                source.height()
            ),
            Presentation::Mono(image) => log::info!(
                "frame {}: {}x{} (no depth stage)",
                sequence,
                image.width(),
                image.height()
            ),
        }
        Ok(())
    }
}

/// Writes composed frames as JPEG files, scaled to a fixed output size.
pub struct DirectorySink {
    dir: PathBuf,
    size: (u32, u32),
    every_nth: u64,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;
        Ok(Self {
            dir,
            size: (width, height),
            every_nth: 1,
        })
    }

    pub fn with_every_nth(mut self, every_nth: u64) -> Self {
        self.every_nth = every_nth.max(1);
        self
    }

    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.jpg", sequence))
    }
}

impl FrameSink for DirectorySink {
    fn present(&mut self, sequence: u64, presentation: &Presentation) -> Result<()> {
        if sequence % self.every_nth != 0 {
            return Ok(());
        }
        let composed = presentation.composed();
        let scaled = if composed.dimensions() == self.size {
            composed
        } else {
            imageops::resize(&composed, self.size.0, self.size.1, FilterType::Triangle)
        };
        let path = self.path_for(sequence);
        scaled
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Drops failed payloads.
#[derive(Default)]
pub struct NullDiagnostics;

impl DiagnosticSink for NullDiagnostics {
    fn capture(&mut self, _sequence: u64, _frame: &Frame, _error: &DecodeError) -> Result<()> {
        Ok(())
    }
}

/// Writes failed payloads verbatim for offline inspection.
pub struct DirectoryDiagnostics {
    dir: PathBuf,
}

impl DirectoryDiagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create diagnostics dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(format!("received_frame_error_{}.jpg", sequence))
    }
}

impl DiagnosticSink for DirectoryDiagnostics {
    fn capture(&mut self, sequence: u64, frame: &Frame, error: &DecodeError) -> Result<()> {
        let path = self.path_for(sequence);
        fs::write(&path, frame.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("saved undecodable frame to {} ({})", path.display(), error);
        Ok(())
    }
}
