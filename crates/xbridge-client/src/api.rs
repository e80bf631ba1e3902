//! Typed operation surface.
//!
//! One method per command tag. Each method encodes its payload with the
//! shared schema types, then either blocks for the correlated response
//! (resource creation) or returns once the record is queued (everything
//! else). Handle validity is the executing side's business; these methods
//! only refuse the null token.

use xbridge_proto::tags::CommandTag;
use xbridge_proto::types::{
    CylinderLightInfo, DiskLightInfo, DistantLightInfo, LightInfo, MaterialInfo, MeshInfo,
    OpaqueMaterialInfo, RectLightInfo, SphereLightInfo, Transform,
};
use xbridge_proto::wire::{WireReader, WireWriter};
use xbridge_proto::{LightHandle, MaterialHandle, MeshHandle, RawHandle};

use crate::{BridgeClient, ClientError};

const DEBUG_MESSAGE_MARKER: i32 = 1337;

impl BridgeClient {
    /// Forward a diagnostic line to the executing side's log.
    pub fn debug_print(&self, message: &str) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_i32(DEBUG_MESSAGE_MARKER);
        w.put_str(message);
        self.send(CommandTag::DebugMessage, w.into_vec())
    }

    /// Create an opaque material on the executing side; blocks until its
    /// handle comes back.
    pub fn create_opaque_material(
        &self,
        base: &MaterialInfo,
        opaque: &OpaqueMaterialInfo,
    ) -> Result<MaterialHandle, ClientError> {
        let mut w = WireWriter::new();
        base.encode(&mut w);
        opaque.encode(&mut w);
        let raw = self.call_for_handle(CommandTag::CreateOpaqueMaterial, w.into_vec())?;
        MaterialHandle::from_raw(raw).ok_or(ClientError::OperationFailed {
            op: CommandTag::CreateOpaqueMaterial.name(),
        })
    }

    pub fn destroy_material(&self, handle: MaterialHandle) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_u64(handle.raw());
        self.send(CommandTag::DestroyMaterial, w.into_vec())
    }

    /// Create a triangle mesh on the executing side; blocks until its
    /// handle comes back.
    pub fn create_triangle_mesh(&self, mesh: &MeshInfo) -> Result<MeshHandle, ClientError> {
        let mut w = WireWriter::new();
        mesh.encode(&mut w);
        let raw = self.call_for_handle(CommandTag::CreateTriangleMesh, w.into_vec())?;
        MeshHandle::from_raw(raw).ok_or(ClientError::OperationFailed {
            op: CommandTag::CreateTriangleMesh.name(),
        })
    }

    pub fn destroy_mesh(&self, handle: MeshHandle) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_u64(handle.raw());
        self.send(CommandTag::DestroyMesh, w.into_vec())
    }

    /// Queue one instance of a mesh for the current frame.
    pub fn draw_mesh_instance(
        &self,
        handle: MeshHandle,
        transform: &Transform,
        double_sided: bool,
    ) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_u64(handle.raw());
        transform.encode(&mut w);
        w.put_flag(double_sided);
        self.send(CommandTag::DrawMeshInstance, w.into_vec())
    }

    pub fn create_sphere_light(
        &self,
        base: &LightInfo,
        sphere: &SphereLightInfo,
    ) -> Result<LightHandle, ClientError> {
        let mut w = WireWriter::new();
        base.encode(&mut w);
        sphere.encode(&mut w);
        self.finish_create_light(CommandTag::CreateSphereLight, w)
    }

    pub fn create_rect_light(
        &self,
        base: &LightInfo,
        rect: &RectLightInfo,
    ) -> Result<LightHandle, ClientError> {
        let mut w = WireWriter::new();
        base.encode(&mut w);
        rect.encode(&mut w);
        self.finish_create_light(CommandTag::CreateRectLight, w)
    }

    pub fn create_disk_light(
        &self,
        base: &LightInfo,
        disk: &DiskLightInfo,
    ) -> Result<LightHandle, ClientError> {
        let mut w = WireWriter::new();
        base.encode(&mut w);
        disk.encode(&mut w);
        self.finish_create_light(CommandTag::CreateDiskLight, w)
    }

    pub fn create_cylinder_light(
        &self,
        base: &LightInfo,
        cylinder: &CylinderLightInfo,
    ) -> Result<LightHandle, ClientError> {
        let mut w = WireWriter::new();
        base.encode(&mut w);
        cylinder.encode(&mut w);
        self.finish_create_light(CommandTag::CreateCylinderLight, w)
    }

    pub fn create_distant_light(
        &self,
        base: &LightInfo,
        distant: &DistantLightInfo,
    ) -> Result<LightHandle, ClientError> {
        let mut w = WireWriter::new();
        base.encode(&mut w);
        distant.encode(&mut w);
        self.finish_create_light(CommandTag::CreateDistantLight, w)
    }

    pub fn destroy_light(&self, handle: LightHandle) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_u64(handle.raw());
        self.send(CommandTag::DestroyLight, w.into_vec())
    }

    /// Queue one instance of a light for the current frame.
    pub fn draw_light_instance(&self, handle: LightHandle) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_u64(handle.raw());
        self.send(CommandTag::DrawLightInstance, w.into_vec())
    }

    /// Set a named option on the executing side.
    pub fn set_config_variable(&self, name: &str, value: &str) -> Result<(), ClientError> {
        let mut w = WireWriter::new();
        w.put_str(name);
        w.put_str(value);
        self.send(CommandTag::SetConfigVariable, w.into_vec())
    }

    /// Announce the issuing device to the executing side.
    pub fn register_device(&self) -> Result<(), ClientError> {
        self.send(CommandTag::RegisterDevice, Vec::new())
    }

    fn finish_create_light(
        &self,
        tag: CommandTag,
        w: WireWriter,
    ) -> Result<LightHandle, ClientError> {
        let raw = self.call_for_handle(tag, w.into_vec())?;
        LightHandle::from_raw(raw).ok_or(ClientError::OperationFailed { op: tag.name() })
    }

    /// Issue a correlated command whose response payload is a single raw
    /// handle token.
    fn call_for_handle(&self, tag: CommandTag, payload: Vec<u8>) -> Result<RawHandle, ClientError> {
        let response = self.call(tag, payload)?;
        let mut r = WireReader::new(&response);
        let raw = r.get_u64().map_err(xbridge_proto::ProtoError::from)?;
        Ok(raw)
    }
}
