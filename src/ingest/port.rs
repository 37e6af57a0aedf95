//! Serial link source.
//!
//! Line settings (baud rate, parity, VMIN/VTIME) belong to whoever prepares the
//! device node; this adapter only opens it and reads. `PortReader` wraps any
//! `io::Read` so a recorded capture file replays through the same path.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use super::ByteStreamReader;

pub const DEFAULT_BAUD_RATE: u32 = 460_800;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Where and how the link is reached.
#[derive(Clone, Debug)]
pub struct PortSettings {
    /// Device node or capture file.
    pub device: PathBuf,
    /// Expected line rate; reported, applied by the device owner.
    pub baud_rate: u32,
    /// Pause after an idle read so a non-blocking handle does not spin.
    pub read_timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Byte source over an `io::Read`.
///
/// `Ok(0)`, `TimedOut`, `WouldBlock` and `Interrupted` become idle reads; every
/// other error is passed through as a transport fault.
pub struct PortReader<R> {
    inner: R,
    idle_backoff: Duration,
    bytes_read: u64,
    idle_reads: u64,
}

impl PortReader<File> {
    /// Open the configured device read-only.
    pub fn open(settings: &PortSettings) -> Result<Self> {
        let file = File::open(&settings.device).with_context(|| {
            format!("failed to open link device {}", settings.device.display())
        })?;
        log::info!(
            "connected to {} (expected {} baud)",
            settings.device.display(),
            settings.baud_rate
        );
        Ok(Self::new(file).with_idle_backoff(settings.read_timeout))
    }
}

impl<R: Read> PortReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            idle_backoff: Duration::ZERO,
            bytes_read: 0,
            idle_reads: 0,
        }
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn idle_reads(&self) -> u64 {
        self.idle_reads
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn idle(&mut self) -> usize {
        self.idle_reads += 1;
        if !self.idle_backoff.is_zero() {
            std::thread::sleep(self.idle_backoff);
        }
        0
    }
}

impl<R: Read> ByteStreamReader for PortReader<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(0) => Ok(self.idle()),
            Ok(n) => {
                self.bytes_read += n as u64;
                Ok(n)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(self.idle())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        results: Vec<io::Result<Vec<u8>>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.results.is_empty() {
                return Ok(0);
            }
            let bytes = self.results.remove(0)?;
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }
    }

    #[test]
    fn timeouts_become_idle_reads_and_faults_pass_through() {
        let inner = Flaky {
            results: vec![
                Ok(b"ab".to_vec()),
                Err(io::Error::new(io::ErrorKind::TimedOut, "vtime")),
                Err(io::Error::new(io::ErrorKind::WouldBlock, "again")),
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "gone")),
            ],
        };
        let mut reader = PortReader::new(inner);
        let mut buf = [0u8; 8];

        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 2);
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 0);
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 0);
        let err = reader.read_chunk(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 0);

        assert_eq!(reader.bytes_read(), 2);
        assert_eq!(reader.idle_reads(), 3);
    }

    #[test]
    fn replays_a_capture_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        io::Write::write_all(&mut file, b"\xFF\xD8xyz\xFF\xD9")?;
        let settings = PortSettings {
            device: file.path().to_path_buf(),
            read_timeout: Duration::ZERO,
            ..PortSettings::default()
        };
        let mut reader = PortReader::open(&settings)?;
        let mut buf = [0u8; 64];
        assert_eq!(reader.read_chunk(&mut buf)?, 7);
        assert_eq!(reader.read_chunk(&mut buf)?, 0);
        Ok(())
    }
}
