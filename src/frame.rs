//! Per-cycle media values.
//!
//! - `Frame`: one marker-delimited payload pulled off the link.
//! - `Image`: decoded RGB8 pixel grid.
//!
//! Neither type is retained by the pipeline once handed off.

use image::RgbImage;

/// Decoded pixel grid: row-major, 3 channels, 8 bits per channel.
pub type Image = RgbImage;

/// Number of leading/trailing bytes shown when a payload is logged.
pub const DIAGNOSTIC_PEEK_BYTES: usize = 20;

/// A complete frame, from the start marker through the end marker inclusive.
///
/// The extractor keeps nothing of a frame once it has been returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Hex of the first `n` bytes.
    pub fn head_hex(&self, n: usize) -> String {
        hex::encode(&self.data[..n.min(self.data.len())])
    }

    /// Hex of the last `n` bytes.
    pub fn tail_hex(&self, n: usize) -> String {
        let start = self.data.len().saturating_sub(n);
        hex::encode(&self.data[start..])
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_peeks_clamp_to_length() {
        let frame = Frame::new(vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9]);
        assert_eq!(frame.head_hex(2), "ffd8");
        assert_eq!(frame.tail_hex(2), "ffd9");
        assert_eq!(frame.head_hex(DIAGNOSTIC_PEEK_BYTES), "ffd801ffd9");
        assert_eq!(frame.tail_hex(DIAGNOSTIC_PEEK_BYTES), "ffd801ffd9");
    }
}
