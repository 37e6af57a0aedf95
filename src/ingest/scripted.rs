use std::collections::VecDeque;
use std::io;

use super::ByteStreamReader;

/// One scripted transport read.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Deliver these bytes (split across reads if larger than the request).
    Data(Vec<u8>),
    /// An empty read.
    Idle,
    /// A transport failure of this kind.
    Fault(io::ErrorKind),
}

/// Deterministic reader for tests and offline replays.
///
/// Plays its steps in order, then idles forever.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    steps: VecDeque<ScriptStep>,
    reads: u64,
}

impl ScriptedReader {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            reads: 0,
        }
    }

    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self::new(chunks.into_iter().map(ScriptStep::Data).collect())
    }

    /// A reader that never delivers anything.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ScriptStep) {
        self.steps.push_back(step);
    }

    /// Number of `read_chunk` calls served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ByteStreamReader for ScriptedReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        match self.steps.pop_front() {
            None | Some(ScriptStep::Idle) => Ok(0),
            Some(ScriptStep::Fault(kind)) => Err(io::Error::new(kind, "scripted transport fault")),
            Some(ScriptStep::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.steps.push_front(ScriptStep::Data(rest));
                }
                Ok(n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_chunks_are_split_to_request_size() {
        let mut reader = ScriptedReader::from_chunks(vec![b"abcdef".to_vec()]);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 0);
        assert_eq!(reader.reads(), 3);
    }
}
