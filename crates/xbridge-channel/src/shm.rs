//! Creation and mapping of the shared channel region.
//!
//! The region is a plain file (by default under the runtime directory, e.g.
//! `/dev/shm` or a temp dir) mapped read-write by both endpoints. The
//! executing side creates it; the issuing side opens it. "Counterpart not
//! found" is therefore simply the file not existing yet.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use memmap2::MmapMut;
use tracing::{debug, info, warn};

use crate::layout::{ChannelHeader, CHANNEL_HEADER_SIZE, CHANNEL_MAGIC, CHANNEL_VERSION};
use crate::ChannelError;

/// Smallest useful ring; anything below cannot hold one mesh command.
pub const MIN_CAPACITY: usize = 1024;

pub struct SharedRegion {
    mmap: MmapMut,
    path: PathBuf,
}

impl SharedRegion {
    /// Create (or re-initialize) the region with a ring of `capacity`
    /// bytes, rounded up to a power of two. Executing side only.
    pub fn create(path: &Path, capacity: usize) -> Result<Self, ChannelError> {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        let file_size = CHANNEL_HEADER_SIZE + capacity;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(file_size as u64)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };

        // A stale region from a previous run is always re-initialized: the
        // cursors and lock words of a dead counterpart are meaningless.
        let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut ChannelHeader) };
        header.magic = CHANNEL_MAGIC;
        header.version = CHANNEL_VERSION;
        header.capacity = capacity as u64;
        header.head = 0u64.into();
        header.tail = 0u64.into();
        header.closed = 0u32.into();
        header.producer_lock = 0u32.into();
        header.ready_seq = 0u32.into();
        header.space_seq = 0u32.into();
        header.producer_pid = 0u32.into();
        header.crc32 = header.compute_crc();
        mmap.flush()?;

        info!(path = %path.display(), capacity, "initialized channel region");
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Map an existing region created by the counterpart. Issuing side.
    pub fn open(path: &Path) -> Result<Self, ChannelError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ChannelError::NotFound(path.to_path_buf())
                } else {
                    ChannelError::Io(e)
                }
            })?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        if mmap.len() < CHANNEL_HEADER_SIZE {
            return Err(ChannelError::Corrupted("region smaller than header"));
        }

        let header = unsafe { &*(mmap.as_ptr() as *const ChannelHeader) };
        if header.magic != CHANNEL_MAGIC {
            return Err(ChannelError::BadMagic(header.magic));
        }
        if header.version != CHANNEL_VERSION {
            return Err(ChannelError::VersionMismatch {
                found: header.version,
                expected: CHANNEL_VERSION,
            });
        }
        if header.crc32 != header.compute_crc() {
            warn!(path = %path.display(), "channel header CRC mismatch");
            return Err(ChannelError::Corrupted("header CRC mismatch"));
        }
        let capacity = header.capacity as usize;
        if !capacity.is_power_of_two() || mmap.len() < CHANNEL_HEADER_SIZE + capacity {
            return Err(ChannelError::Corrupted("capacity inconsistent with file size"));
        }

        debug!(path = %path.display(), capacity, "opened channel region");
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ChannelHeader {
        unsafe { &*(self.mmap.as_ptr() as *const ChannelHeader) }
    }

    pub fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    /// Base pointer of the ring data, one header past the start.
    ///
    /// Safety: callers must confine accesses to ranges they own per the
    /// head/tail protocol; the producer lock and the Acquire/Release cursor
    /// handoff are what make concurrent use sound.
    pub(crate) fn data_ptr(&self) -> *mut u8 {
        unsafe { self.mmap.as_ptr().add(CHANNEL_HEADER_SIZE) as *mut u8 }
    }

    /// True once either side has closed the channel.
    pub fn is_closed(&self) -> bool {
        self.header().closed.load(Ordering::Acquire) != 0
    }
}

// The raw region pointer is only dereferenced under the cursor protocol.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmd.ring");
        let created = SharedRegion::create(&path, 5000).unwrap();
        assert_eq!(created.capacity(), 8192); // rounded to power of two

        let opened = SharedRegion::open(&path).unwrap();
        assert_eq!(opened.capacity(), 8192);
        assert!(!opened.is_closed());
    }

    #[test]
    fn open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.ring");
        assert!(matches!(
            SharedRegion::open(&path),
            Err(ChannelError::NotFound(_))
        ));
    }

    #[test]
    fn open_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.ring");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert!(matches!(
            SharedRegion::open(&path),
            Err(ChannelError::BadMagic(0))
        ));
    }

    #[test]
    fn open_rejects_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.ring");
        SharedRegion::create(&path, 1024).unwrap();

        // Corrupt the version field in place, with a recomputed CRC so the
        // version check is what fires.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let crc = crc32fast::hash(&bytes[..crate::layout::CHANNEL_CRC_PREFIX]);
        bytes[48..52].copy_from_slice(&crc.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            SharedRegion::open(&path),
            Err(ChannelError::VersionMismatch {
                found: 99,
                expected: CHANNEL_VERSION
            })
        ));
    }
}
