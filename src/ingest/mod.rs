//! Link ingestion.
//!
//! This module turns a raw byte transport into complete frames:
//! - `ByteStreamReader`: the transport seam (serial device, replay file, script)
//! - `PortReader`: adapter over any `io::Read`, mapping timeouts to idle reads
//! - `ScriptedReader`: deterministic chunk sequence for tests and demos
//! - `FrameExtractor`: stateful de-framer with resynchronization and idle timeout
//!
//! The ingestion layer MUST NOT:
//! - Modify frame payload bytes
//! - Retain a frame after returning it
//! - Treat an idle read as a transport fault

mod buffer;
pub mod extractor;
pub mod port;
pub mod scripted;

use std::io;

pub use buffer::ByteBuffer;
pub use extractor::{
    ExtractorConfig, ExtractorStats, FrameExtractor, ResyncPolicy, FRAME_END, FRAME_START,
};
pub use port::{PortReader, PortSettings};
pub use scripted::{ScriptStep, ScriptedReader};

/// Source of raw link bytes.
///
/// `Ok(0)` is an idle read: no data arrived before the transport's own read
/// timeout. Any `Err` is a transport fault and ends the run.
pub trait ByteStreamReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: ByteStreamReader + ?Sized> ByteStreamReader for &mut T {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_chunk(buf)
    }
}

impl<T: ByteStreamReader + ?Sized> ByteStreamReader for Box<T> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_chunk(buf)
    }
}
