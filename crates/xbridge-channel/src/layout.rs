//! Shared-memory channel layout.
//!
//! The first 128 bytes of the mapped file are the header; the byte ring
//! follows immediately after. Any field change here MUST maintain
//! `#[repr(C)]` ABI stability and bump [`CHANNEL_VERSION`], because the two
//! endpoints are separate processes (possibly of different bitness) mapping
//! the same region.

use std::sync::atomic::{AtomicU32, AtomicU64};

/// Channel magic number: "XBRC" in little-endian.
pub const CHANNEL_MAGIC: u32 = 0x4352_4258;

/// Channel layout version. Bump on incompatible changes.
pub const CHANNEL_VERSION: u32 = 1;

/// Compile-time header size (ring data starts at this offset).
pub const CHANNEL_HEADER_SIZE: usize = 128;

/// Bytes covered by the header CRC (the static prefix: magic, version,
/// capacity). The mutable cursors are deliberately excluded.
pub const CHANNEL_CRC_PREFIX: usize = 16;

/// Channel header in shared memory.
///
/// Layout (128 bytes total):
/// ```text
/// offset  field          size
/// ------  -------------  ----
///  0      magic           4   (0x43524258, "XBRC")
///  4      version         4
///  8      capacity        8   (ring bytes, power of two)
/// 16      head            8   (producer cursor, total bytes enqueued)
/// 24      tail            8   (consumer cursor, total bytes dequeued)
/// 32      closed          4   (0 = open, 1 = closed)
/// 36      producer_lock   4   (futex mutex: 0 free, 1 held, 2 contended)
/// 40      ready_seq       4   (bumped per push; consumer futex word)
/// 44      space_seq       4   (bumped per pop; producer futex word)
/// 48      crc32           4   (CRC32 of the first 16 bytes)
/// 52      producer_pid    4   (pid of the current producer-lock holder)
/// 56      _pad           72
/// ```
#[repr(C)]
pub struct ChannelHeader {
    pub magic: u32,
    pub version: u32,
    pub capacity: u64,
    pub head: AtomicU64,
    pub tail: AtomicU64,
    pub closed: AtomicU32,
    pub producer_lock: AtomicU32,
    pub ready_seq: AtomicU32,
    pub space_seq: AtomicU32,
    pub crc32: u32,
    pub producer_pid: AtomicU32,
    pub _pad: [u8; 72],
}

// The ring index math relies on the header being exactly one region prefix.
const _: () = assert!(std::mem::size_of::<ChannelHeader>() == CHANNEL_HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<ChannelHeader>() <= CHANNEL_HEADER_SIZE);

impl ChannelHeader {
    /// CRC32 of the static prefix, for corruption detection on open.
    pub fn compute_crc(&self) -> u32 {
        let bytes = unsafe {
            std::slice::from_raw_parts(self as *const ChannelHeader as *const u8, CHANNEL_CRC_PREFIX)
        };
        crc32fast::hash(bytes)
    }
}
