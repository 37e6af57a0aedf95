//! Error kinds for the link and decode stages.
//!
//! Recoverable conditions (`LinkError::Timeout`, `DecodeError`) and fatal ones
//! (`LinkError::Transport`) are distinct variants so the pipeline can branch on
//! the type instead of inspecting messages.

use thiserror::Error;

/// Failure while pulling a frame off the link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No complete frame arrived within the idle-read budget.
    #[error("link timed out after {idle_reads} consecutive empty reads")]
    Timeout { idle_reads: u32 },

    /// The transport itself is unusable.
    #[error("transport fault: {0}")]
    Transport(#[from] std::io::Error),
}

impl LinkError {
    /// Returns true when the caller may simply retry extraction.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }
}

/// Failure while turning a frame payload into pixels.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("malformed image payload: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_recoverable() {
        assert!(LinkError::Timeout { idle_reads: 3 }.is_recoverable());
        let fault = LinkError::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "unplugged",
        ));
        assert!(!fault.is_recoverable());
        assert!(fault.to_string().contains("unplugged"));
    }
}
