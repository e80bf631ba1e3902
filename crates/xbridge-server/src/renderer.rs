//! The renderer seam.
//!
//! The dispatch loop owns decoding, handle bookkeeping, and responses; the
//! actual rendering backend sits behind this trait. Backends choose their
//! own resource representations through the associated types; the loop
//! files them in registries and never inspects them.

use tracing::info;

use xbridge_proto::types::{
    LightInfo, LightShape, MaterialInfo, MeshInfo, OpaqueMaterialInfo, Transform,
};

pub trait Renderer: Send {
    type Material: Send;
    type Mesh: Send;
    type Light: Send;

    fn create_opaque_material(
        &mut self,
        base: &MaterialInfo,
        opaque: &OpaqueMaterialInfo,
    ) -> Self::Material;
    fn destroy_material(&mut self, material: Self::Material);

    fn create_triangle_mesh(&mut self, mesh: &MeshInfo) -> Self::Mesh;
    fn destroy_mesh(&mut self, mesh: Self::Mesh);
    fn draw_mesh_instance(&mut self, mesh: &Self::Mesh, transform: &Transform, double_sided: bool);

    fn create_light(&mut self, base: &LightInfo, shape: &LightShape) -> Self::Light;
    fn destroy_light(&mut self, light: Self::Light);
    fn draw_light_instance(&mut self, light: &Self::Light);

    fn set_config_variable(&mut self, name: &str, value: &str);
    fn register_device(&mut self);
    fn debug_message(&mut self, marker: i32, text: &str);
}

/// Backend that performs no rendering, only logs what it is asked to do.
/// Stands in for a real backend in the daemon's default mode and in tests.
#[derive(Debug, Default)]
pub struct NullRenderer {
    created: u64,
}

impl Renderer for NullRenderer {
    type Material = ();
    type Mesh = ();
    type Light = ();

    fn create_opaque_material(&mut self, base: &MaterialInfo, _opaque: &OpaqueMaterialInfo) {
        self.created += 1;
        info!(hash = base.hash, "create opaque material");
    }

    fn destroy_material(&mut self, _material: ()) {
        info!("destroy material");
    }

    fn create_triangle_mesh(&mut self, mesh: &MeshInfo) {
        self.created += 1;
        info!(
            hash = mesh.hash,
            surfaces = mesh.surfaces.len(),
            "create triangle mesh"
        );
    }

    fn destroy_mesh(&mut self, _mesh: ()) {
        info!("destroy mesh");
    }

    fn draw_mesh_instance(&mut self, _mesh: &(), _transform: &Transform, double_sided: bool) {
        info!(double_sided, "draw mesh instance");
    }

    fn create_light(&mut self, base: &LightInfo, shape: &LightShape) {
        self.created += 1;
        let kind = match shape {
            LightShape::Sphere(_) => "sphere",
            LightShape::Rect(_) => "rect",
            LightShape::Disk(_) => "disk",
            LightShape::Cylinder(_) => "cylinder",
            LightShape::Distant(_) => "distant",
        };
        info!(hash = base.hash, kind, "create light");
    }

    fn destroy_light(&mut self, _light: ()) {
        info!("destroy light");
    }

    fn draw_light_instance(&mut self, _light: &()) {
        info!("draw light instance");
    }

    fn set_config_variable(&mut self, name: &str, value: &str) {
        info!(name, value, "set config variable");
    }

    fn register_device(&mut self) {
        info!("device registered");
    }

    fn debug_message(&mut self, marker: i32, text: &str) {
        info!(marker, text, "debug message from issuing side");
    }
}
