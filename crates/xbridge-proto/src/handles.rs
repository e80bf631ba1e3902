//! Opaque resource handles.
//!
//! A handle is an 8-byte registry-issued token, never a native pointer. The
//! issuing process may be narrower than the executor's address space, and
//! the executor is free to relocate the underlying object; the registry is
//! the sole authority over validity. Token 0 is reserved as the "no handle"
//! failure value.

use std::num::NonZeroU64;

/// The raw token as it appears on the wire.
pub type RawHandle = u64;

macro_rules! opaque_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Wrap a wire token; 0 is the failure sentinel, not a handle.
            pub fn from_raw(raw: RawHandle) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            pub fn raw(self) -> RawHandle {
                self.0.get()
            }
        }
    };
}

opaque_handle!(
    /// Server-owned material resource.
    MaterialHandle
);
opaque_handle!(
    /// Server-owned mesh resource.
    MeshHandle
);
opaque_handle!(
    /// Server-owned light resource.
    LightHandle
);
