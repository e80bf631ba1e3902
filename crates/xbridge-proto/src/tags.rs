//! The closed command tag set.
//!
//! Discriminants are part of the wire ABI: never renumber an existing tag,
//! only append. Adding a tag must not change the encoding of existing tags.

use crate::ProtoError;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    DebugMessage = 1,
    CreateOpaqueMaterial = 2,
    DestroyMaterial = 3,
    CreateTriangleMesh = 4,
    DestroyMesh = 5,
    DrawMeshInstance = 6,
    CreateSphereLight = 7,
    CreateRectLight = 8,
    CreateDiskLight = 9,
    CreateCylinderLight = 10,
    CreateDistantLight = 11,
    DestroyLight = 12,
    DrawLightInstance = 13,
    SetConfigVariable = 14,
    RegisterDevice = 15,

    /// Server → client reply. The uid, not the tag, selects the waiting
    /// call; the originating tag defines the payload layout.
    Response = 100,
}

impl CommandTag {
    pub fn from_u32(raw: u32) -> Result<Self, ProtoError> {
        use CommandTag::*;
        Ok(match raw {
            1 => DebugMessage,
            2 => CreateOpaqueMaterial,
            3 => DestroyMaterial,
            4 => CreateTriangleMesh,
            5 => DestroyMesh,
            6 => DrawMeshInstance,
            7 => CreateSphereLight,
            8 => CreateRectLight,
            9 => CreateDiskLight,
            10 => CreateCylinderLight,
            11 => CreateDistantLight,
            12 => DestroyLight,
            13 => DrawLightInstance,
            14 => SetConfigVariable,
            15 => RegisterDevice,
            100 => Response,
            other => return Err(ProtoError::UnknownTag(other)),
        })
    }

    /// True for operations the issuer blocks on (a `Response` record with
    /// the same uid comes back). Everything else is fire-and-forget.
    pub fn expects_response(self) -> bool {
        matches!(
            self,
            CommandTag::CreateOpaqueMaterial
                | CommandTag::CreateTriangleMesh
                | CommandTag::CreateSphereLight
                | CommandTag::CreateRectLight
                | CommandTag::CreateDiskLight
                | CommandTag::CreateCylinderLight
                | CommandTag::CreateDistantLight
        )
    }

    /// Stable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            CommandTag::DebugMessage => "DebugMessage",
            CommandTag::CreateOpaqueMaterial => "CreateOpaqueMaterial",
            CommandTag::DestroyMaterial => "DestroyMaterial",
            CommandTag::CreateTriangleMesh => "CreateTriangleMesh",
            CommandTag::DestroyMesh => "DestroyMesh",
            CommandTag::DrawMeshInstance => "DrawMeshInstance",
            CommandTag::CreateSphereLight => "CreateSphereLight",
            CommandTag::CreateRectLight => "CreateRectLight",
            CommandTag::CreateDiskLight => "CreateDiskLight",
            CommandTag::CreateCylinderLight => "CreateCylinderLight",
            CommandTag::CreateDistantLight => "CreateDistantLight",
            CommandTag::DestroyLight => "DestroyLight",
            CommandTag::DrawLightInstance => "DrawLightInstance",
            CommandTag::SetConfigVariable => "SetConfigVariable",
            CommandTag::RegisterDevice => "RegisterDevice",
            CommandTag::Response => "Response",
        }
    }
}
