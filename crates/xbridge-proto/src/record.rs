//! Command record framing.
//!
//! One record is one unit transported by the channel:
//!
//! ```text
//! offset  field        size
//! ------  -----------  ----
//!  0      tag           4   (CommandTag discriminant)
//!  4      uid           8   (0 = fire-and-forget)
//! 12      payload_len   4
//! 16      payload       payload_len
//! ```
//!
//! Records are immutable once encoded and self-describing: the size is
//! derived from the record's own length prefix, never from external state.

use crate::{CommandTag, ProtoError, WireReader, WireWriter};

/// Fixed bytes before the payload.
pub const RECORD_HEADER_SIZE: usize = 4 + 8 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub tag: CommandTag,
    pub uid: u64,
    pub payload: Vec<u8>,
}

impl CommandRecord {
    /// A correlated command carrying a freshly assigned uid.
    pub fn correlated(tag: CommandTag, uid: u64, payload: Vec<u8>) -> Self {
        debug_assert_ne!(uid, 0, "correlated records need a non-zero uid");
        Self { tag, uid, payload }
    }

    /// A fire-and-forget command; uid 0 means no response is expected.
    pub fn fire_and_forget(tag: CommandTag, payload: Vec<u8>) -> Self {
        Self {
            tag,
            uid: 0,
            payload,
        }
    }

    /// A server reply echoing the originating uid.
    pub fn response(uid: u64, payload: Vec<u8>) -> Self {
        Self {
            tag: CommandTag::Response,
            uid,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(RECORD_HEADER_SIZE + self.payload.len());
        w.put_u32(self.tag as u32);
        w.put_u64(self.uid);
        w.put_bytes(&self.payload);
        w.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(ProtoError::ShortRecord(bytes.len()));
        }
        let mut r = WireReader::new(bytes);
        let tag = CommandTag::from_u32(r.get_u32()?)?;
        let uid = r.get_u64()?;
        let payload = r.get_bytes()?.to_vec();
        if !r.is_exhausted() {
            return Err(ProtoError::PayloadMismatch {
                declared: payload.len(),
                actual: payload.len() + r.remaining(),
            });
        }
        Ok(Self { tag, uid, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let rec = CommandRecord::correlated(CommandTag::CreateTriangleMesh, 7, vec![1, 2, 3]);
        let bytes = rec.encode();
        assert_eq!(CommandRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn fire_and_forget_has_uid_zero() {
        let rec = CommandRecord::fire_and_forget(CommandTag::RegisterDevice, vec![]);
        assert_eq!(rec.uid, 0);
        let bytes = rec.encode();
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE);
        assert_eq!(CommandRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn short_record_rejected() {
        assert!(matches!(
            CommandRecord::decode(&[0u8; 8]),
            Err(ProtoError::ShortRecord(8))
        ));
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut bytes = CommandRecord::response(3, vec![9]).encode();
        bytes.push(0xFF);
        assert!(matches!(
            CommandRecord::decode(&bytes),
            Err(ProtoError::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut rec = CommandRecord::response(1, vec![]).encode();
        rec[0..4].copy_from_slice(&0xABCDu32.to_le_bytes());
        assert!(matches!(
            CommandRecord::decode(&rec),
            Err(ProtoError::UnknownTag(0xABCD))
        ));
    }
}
