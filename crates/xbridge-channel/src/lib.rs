//! # xbridge-channel
//!
//! The shared-memory command channel connecting the issuing (host) and
//! executing (renderer) processes. One mmap-backed byte ring per direction,
//! FIFO, bounded, with real blocking waits (futex on Linux) instead of
//! polling. The channel carries opaque, length-tagged byte records; framing
//! and meaning belong to `xbridge-proto`.

pub mod futex;
pub mod layout;
pub mod ring;
pub mod shm;

use std::path::{Path, PathBuf};

pub use layout::{CHANNEL_MAGIC, CHANNEL_VERSION};
pub use ring::Channel;
pub use shm::SharedRegion;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel region not found at {0} (counterpart not running?)")]
    NotFound(PathBuf),

    #[error("bad channel magic {0:#x}")]
    BadMagic(u32),

    #[error("channel version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("channel region corrupted: {0}")]
    Corrupted(&'static str),

    #[error("record of {size} bytes can never fit a {capacity}-byte ring")]
    RecordTooLarge { size: usize, capacity: usize },

    #[error("channel closed")]
    Closed,

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File name of the host→renderer command ring inside the channel dir.
pub const COMMAND_RING: &str = "cmd.ring";
/// File name of the renderer→host response ring.
pub const RESPONSE_RING: &str = "rsp.ring";

/// Both directions of the bridge, named from the issuing side's point of
/// view: commands go out on `to_server`, responses come back on `to_client`.
pub struct Duplex {
    pub to_server: Channel,
    pub to_client: Channel,
}

impl Duplex {
    /// Create both rings (executing side).
    pub fn create(dir: &Path, capacity: usize) -> Result<Self, ChannelError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            to_server: Channel::create(&dir.join(COMMAND_RING), capacity)?,
            to_client: Channel::create(&dir.join(RESPONSE_RING), capacity)?,
        })
    }

    /// Open both rings created by the counterpart (issuing side).
    pub fn open(dir: &Path) -> Result<Self, ChannelError> {
        Ok(Self {
            to_server: Channel::open(&dir.join(COMMAND_RING))?,
            to_client: Channel::open(&dir.join(RESPONSE_RING))?,
        })
    }

    /// Close both directions and wake every waiter.
    pub fn close(&self) {
        self.to_server.close();
        self.to_client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplex_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let server = Duplex::create(dir.path(), 4096).unwrap();
        let client = Duplex::open(dir.path()).unwrap();

        client.to_server.push(b"cmd").unwrap();
        assert_eq!(server.to_server.pop(None).unwrap().unwrap(), b"cmd");

        server.to_client.push(b"rsp").unwrap();
        assert_eq!(client.to_client.pop(None).unwrap().unwrap(), b"rsp");
    }

    #[test]
    fn open_without_counterpart_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Duplex::open(dir.path()),
            Err(ChannelError::NotFound(_))
        ));
    }
}
