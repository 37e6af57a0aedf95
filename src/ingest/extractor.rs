//! Marker-delimited frame extraction.
//!
//! The extractor owns a persistent `ByteBuffer`. Each call to
//! `extract_next_frame` first tries to carve a frame out of what is already
//! buffered (the tail of the previous read often holds the start of the next
//! frame) and only then pulls more bytes from the reader.
//!
//! Resynchronization: everything before a start marker is garbage. A frame
//! truncated on the wire therefore costs at most itself; the next start marker
//! puts the stream back in step.

use serde::Deserialize;

use super::buffer::{find, rfind, ByteBuffer};
use super::ByteStreamReader;
use crate::error::LinkError;
use crate::frame::Frame;

/// JPEG start-of-image marker.
pub const FRAME_START: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const FRAME_END: [u8; 2] = [0xFF, 0xD9];

pub const DEFAULT_MAX_IDLE_READS: u32 = 100;
pub const DEFAULT_READ_CHUNK_BYTES: usize = 4096;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 5 * 1024 * 1024;

/// Which start marker a frame begins at when several precede the first end marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// The first start marker wins; stray starts end up inside the frame.
    FirstStart,
    /// The last start marker before the end marker wins; earlier bytes are a
    /// truncated frame and are discarded.
    #[default]
    LastStart,
}

#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Consecutive empty reads tolerated before `LinkError::Timeout`.
    pub max_idle_reads: u32,
    /// Size of each read request.
    pub read_chunk_bytes: usize,
    /// Candidate frames larger than this are abandoned.
    pub max_frame_bytes: usize,
    pub resync: ResyncPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_idle_reads: DEFAULT_MAX_IDLE_READS,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            resync: ResyncPolicy::default(),
        }
    }
}

/// Running counters for an extractor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractorStats {
    pub frames_extracted: u64,
    pub garbage_bytes: u64,
    pub oversize_resets: u64,
    pub timeouts: u64,
}

/// Stateful de-framer over a byte stream.
pub struct FrameExtractor {
    config: ExtractorConfig,
    buffer: ByteBuffer,
    chunk: Vec<u8>,
    /// Offset (from the buffered start marker) where the end-marker scan resumes.
    end_scan_from: usize,
    stats: ExtractorStats,
}

impl FrameExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_bytes.max(1)];
        Self {
            config,
            buffer: ByteBuffer::default(),
            chunk,
            end_scan_from: FRAME_START.len(),
            stats: ExtractorStats::default(),
        }
    }

    /// Pull the next complete frame from `reader`.
    ///
    /// Fails with `LinkError::Timeout` once `max_idle_reads` consecutive reads
    /// return nothing. The buffer is left untouched by a timeout, so calling
    /// again simply resumes. Reader errors surface as `LinkError::Transport`.
    pub fn extract_next_frame<R>(&mut self, reader: &mut R) -> Result<Frame, LinkError>
    where
        R: ByteStreamReader + ?Sized,
    {
        let mut idle_reads = 0u32;
        loop {
            if let Some(frame) = self.try_extract() {
                return Ok(frame);
            }

            let read = reader.read_chunk(&mut self.chunk)?;
            if read == 0 {
                idle_reads += 1;
                if idle_reads >= self.config.max_idle_reads {
                    self.stats.timeouts += 1;
                    return Err(LinkError::Timeout { idle_reads });
                }
                continue;
            }

            idle_reads = 0;
            self.buffer.extend(&self.chunk[..read]);
        }
    }

    /// Carve one frame out of the buffered bytes, if a complete one is present.
    fn try_extract(&mut self) -> Option<Frame> {
        loop {
            let Some(start) = find(self.buffer.as_slice(), &FRAME_START, 0) else {
                self.discard_unmarked();
                return None;
            };
            if start > 0 {
                log::debug!("discarding {} bytes before start marker", start);
                self.discard(start);
            }

            let data = self.buffer.as_slice();
            let Some(end) = find(data, &FRAME_END, self.end_scan_from) else {
                if data.len() > self.config.max_frame_bytes {
                    log::warn!(
                        "no end marker within {} bytes; abandoning start marker",
                        self.config.max_frame_bytes
                    );
                    self.stats.oversize_resets += 1;
                    self.discard(FRAME_START.len());
                    continue;
                }
                // A split end marker may straddle the next read.
                self.end_scan_from = (data.len() - 1).max(FRAME_START.len());
                log::trace!(
                    "start marker buffered, waiting for end marker (buffered={})",
                    data.len()
                );
                return None;
            };

            let begin = match self.config.resync {
                ResyncPolicy::FirstStart => 0,
                ResyncPolicy::LastStart => rfind(&data[..end], &FRAME_START).unwrap_or(0),
            };
            if begin > 0 {
                log::warn!(
                    "restart marker inside frame; dropping {} bytes of truncated frame",
                    begin
                );
                self.discard(begin);
            }

            let len = end - begin + FRAME_END.len();
            let frame = Frame::new(self.buffer.take(len));
            self.end_scan_from = FRAME_START.len();
            self.stats.frames_extracted += 1;
            log::debug!(
                "found frame: length={}, residual={}",
                frame.len(),
                self.buffer.len()
            );
            return Some(frame);
        }
    }

    /// No start marker anywhere: drop everything except a trailing byte that
    /// could be the first half of a split marker.
    fn discard_unmarked(&mut self) {
        let data = self.buffer.as_slice();
        let keep = usize::from(data.last() == Some(&FRAME_START[0]));
        let drop = data.len() - keep;
        if drop > 0 {
            self.discard(drop);
        }
    }

    fn discard(&mut self, n: usize) {
        self.buffer.consume(n);
        self.stats.garbage_bytes += n as u64;
        self.end_scan_from = FRAME_START.len();
    }

    /// Bytes buffered but not yet attributed to a frame or discarded.
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn stats(&self) -> &ExtractorStats {
        &self.stats
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Drop all buffered bytes, e.g. after reopening the transport.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.end_scan_from = FRAME_START.len();
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}
