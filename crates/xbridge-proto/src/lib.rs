//! xbridge wire protocol, shared by the issuing (32-bit host) and
//! executing (64-bit renderer) sides of the bridge.
//!
//! Everything that crosses the process boundary is defined here: primitive
//! encoding rules, the command tag set, record framing, and the typed
//! payload schemas. Both sides must agree byte-for-byte, so any layout
//! change requires bumping [`PROTOCOL_VERSION`].

pub mod handles;
pub mod record;
pub mod tags;
pub mod types;
pub mod wire;

pub use handles::{LightHandle, MaterialHandle, MeshHandle, RawHandle};
pub use record::CommandRecord;
pub use tags::CommandTag;
pub use wire::{WireError, WireReader, WireWriter};

/// Bridge protocol version. Bump on any incompatible wire change.
pub const PROTOCOL_VERSION: u32 = 1;

/// Protocol-level decode failures (above the primitive wire layer).
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("unknown command tag {0:#x}")]
    UnknownTag(u32),

    #[error("record too short: {0} bytes, need at least the fixed header")]
    ShortRecord(usize),

    #[error("record payload length {declared} does not match {actual} trailing bytes")]
    PayloadMismatch { declared: usize, actual: usize },

    #[error(transparent)]
    Wire(#[from] WireError),
}
