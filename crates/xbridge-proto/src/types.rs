//! Typed payload schemas.
//!
//! Every command tag's payload layout lives here, expressed once as an
//! `encode`/`decode` pair per type instead of being repeated field-by-field
//! at each call site. Field order in `encode` IS the wire layout; keep the
//! doc comment tables in sync when anything changes.

use crate::wire::{WireError, WireReader, WireWriter};

/// Minimum encoded sizes, used to sanity-check declared element counts
/// before allocating.
const VERTEX_WIRE_SIZE: usize = 9 * 4; // 8 floats + color
const INDEX_WIRE_SIZE: usize = 4;
const SURFACE_MIN_WIRE_SIZE: usize = 8 + 8 + 4 + 8; // two counts + flag + material

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Float3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn encode(&self, w: &mut WireWriter) {
        w.put_f32(self.x);
        w.put_f32(self.y);
        w.put_f32(self.z);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            x: r.get_f32()?,
            y: r.get_f32()?,
            z: r.get_f32()?,
        })
    }
}

/// Row-major 3x4 affine transform, 12 floats on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: [[f32; 4]; 3],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        matrix: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    pub fn encode(&self, w: &mut WireWriter) {
        for row in &self.matrix {
            for v in row {
                w.put_f32(*v);
            }
        }
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        let mut matrix = [[0.0f32; 4]; 3];
        for row in &mut matrix {
            for v in row.iter_mut() {
                *v = r.get_f32()?;
            }
        }
        Ok(Self { matrix })
    }
}

/// Directional focus applied to sphere/rect/disk lights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightShaping {
    pub direction: Float3D,
    pub cone_angle_degrees: f32,
    pub cone_softness: f32,
    pub focus_exponent: f32,
}

impl LightShaping {
    pub fn encode(&self, w: &mut WireWriter) {
        self.direction.encode(w);
        w.put_f32(self.cone_angle_degrees);
        w.put_f32(self.cone_softness);
        w.put_f32(self.focus_exponent);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            direction: Float3D::decode(r)?,
            cone_angle_degrees: r.get_f32()?,
            cone_softness: r.get_f32()?,
            focus_exponent: r.get_f32()?,
        })
    }
}

fn encode_opt_shaping(shaping: &Option<LightShaping>, w: &mut WireWriter) {
    w.put_flag(shaping.is_some());
    if let Some(s) = shaping {
        s.encode(w);
    }
}

fn decode_opt_shaping(r: &mut WireReader) -> Result<Option<LightShaping>, WireError> {
    if r.get_flag()? {
        Ok(Some(LightShaping::decode(r)?))
    } else {
        Ok(None)
    }
}

/// Base material description shared by every material kind.
///
/// ```text
/// hash u64, emissive_intensity f32, emissive_color 3xf32,
/// sprite_sheet_row u8, sprite_sheet_col u8, sprite_sheet_fps u8,
/// filter_mode u8, wrap_mode_u u8, wrap_mode_v u8
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialInfo {
    pub hash: u64,
    pub emissive_intensity: f32,
    pub emissive_color: Float3D,
    pub sprite_sheet_row: u8,
    pub sprite_sheet_col: u8,
    pub sprite_sheet_fps: u8,
    pub filter_mode: u8,
    pub wrap_mode_u: u8,
    pub wrap_mode_v: u8,
}

impl MaterialInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        w.put_u64(self.hash);
        w.put_f32(self.emissive_intensity);
        self.emissive_color.encode(w);
        w.put_u8(self.sprite_sheet_row);
        w.put_u8(self.sprite_sheet_col);
        w.put_u8(self.sprite_sheet_fps);
        w.put_u8(self.filter_mode);
        w.put_u8(self.wrap_mode_u);
        w.put_u8(self.wrap_mode_v);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            hash: r.get_u64()?,
            emissive_intensity: r.get_f32()?,
            emissive_color: Float3D::decode(r)?,
            sprite_sheet_row: r.get_u8()?,
            sprite_sheet_col: r.get_u8()?,
            sprite_sheet_fps: r.get_u8()?,
            filter_mode: r.get_u8()?,
            wrap_mode_u: r.get_u8()?,
            wrap_mode_v: r.get_u8()?,
        })
    }
}

/// Opaque-material extension parameters. Optional fields use presence
/// flags; absence contributes no value bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpaqueMaterialInfo {
    pub anisotropy: f32,
    pub albedo_constant: Float3D,
    pub opacity_constant: f32,
    pub roughness_constant: f32,
    pub metallic_constant: f32,
    pub thin_film_thickness: Option<f32>,
    pub alpha_is_thin_film_thickness: bool,
    pub height_texture_strength: f32,
    pub use_draw_call_alpha_state: bool,
    pub blend_type: Option<i32>,
    pub inverted_blend: bool,
    pub alpha_test_type: i32,
    pub alpha_reference_value: u8,
}

impl OpaqueMaterialInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        w.put_f32(self.anisotropy);
        self.albedo_constant.encode(w);
        w.put_f32(self.opacity_constant);
        w.put_f32(self.roughness_constant);
        w.put_f32(self.metallic_constant);
        w.put_flag(self.thin_film_thickness.is_some());
        if let Some(t) = self.thin_film_thickness {
            w.put_f32(t);
        }
        w.put_flag(self.alpha_is_thin_film_thickness);
        w.put_f32(self.height_texture_strength);
        w.put_flag(self.use_draw_call_alpha_state);
        w.put_flag(self.blend_type.is_some());
        if let Some(b) = self.blend_type {
            w.put_i32(b);
        }
        w.put_flag(self.inverted_blend);
        w.put_i32(self.alpha_test_type);
        w.put_u8(self.alpha_reference_value);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        let anisotropy = r.get_f32()?;
        let albedo_constant = Float3D::decode(r)?;
        let opacity_constant = r.get_f32()?;
        let roughness_constant = r.get_f32()?;
        let metallic_constant = r.get_f32()?;
        let thin_film_thickness = if r.get_flag()? {
            Some(r.get_f32()?)
        } else {
            None
        };
        let alpha_is_thin_film_thickness = r.get_flag()?;
        let height_texture_strength = r.get_f32()?;
        let use_draw_call_alpha_state = r.get_flag()?;
        let blend_type = if r.get_flag()? {
            Some(r.get_i32()?)
        } else {
            None
        };
        Ok(Self {
            anisotropy,
            albedo_constant,
            opacity_constant,
            roughness_constant,
            metallic_constant,
            thin_film_thickness,
            alpha_is_thin_film_thickness,
            height_texture_strength,
            use_draw_call_alpha_state,
            blend_type,
            inverted_blend: r.get_flag()?,
            alpha_test_type: r.get_i32()?,
            alpha_reference_value: r.get_u8()?,
        })
    }
}

/// One mesh vertex: position, normal, texcoord, packed color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub color: u32,
}

impl MeshVertex {
    pub fn encode(&self, w: &mut WireWriter) {
        for v in self.position {
            w.put_f32(v);
        }
        for v in self.normal {
            w.put_f32(v);
        }
        for v in self.texcoord {
            w.put_f32(v);
        }
        w.put_u32(self.color);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        let mut v = Self::default();
        for p in &mut v.position {
            *p = r.get_f32()?;
        }
        for n in &mut v.normal {
            *n = r.get_f32()?;
        }
        for t in &mut v.texcoord {
            *t = r.get_f32()?;
        }
        v.color = r.get_u32()?;
        Ok(v)
    }
}

/// One triangle surface of a mesh.
///
/// ```text
/// vertex_count u64, vertices..., index_count u64, indices...,
/// skinned flag u32, material u64 (raw material handle, 0 = none)
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshSurface {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub skinned: bool,
    pub material: u64,
}

impl MeshSurface {
    pub fn encode(&self, w: &mut WireWriter) {
        w.put_u64(self.vertices.len() as u64);
        for v in &self.vertices {
            v.encode(w);
        }
        w.put_u64(self.indices.len() as u64);
        for i in &self.indices {
            w.put_u32(*i);
        }
        w.put_flag(self.skinned);
        w.put_u64(self.material);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        let vertex_count = r.get_u64()?;
        let vertex_count = r.check_count(vertex_count, VERTEX_WIRE_SIZE)?;
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            vertices.push(MeshVertex::decode(r)?);
        }

        let index_count = r.get_u64()?;
        let index_count = r.check_count(index_count, INDEX_WIRE_SIZE)?;
        let mut indices = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            indices.push(r.get_u32()?);
        }

        Ok(Self {
            vertices,
            indices,
            skinned: r.get_flag()?,
            material: r.get_u64()?,
        })
    }
}

/// Triangle mesh: `hash u64, surface_count u32, surfaces...`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshInfo {
    pub hash: u64,
    pub surfaces: Vec<MeshSurface>,
}

impl MeshInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        w.put_u64(self.hash);
        w.put_u32(self.surfaces.len() as u32);
        for s in &self.surfaces {
            s.encode(w);
        }
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        let hash = r.get_u64()?;
        let surface_count = r.get_u32()?;
        let surface_count = r.check_count(surface_count as u64, SURFACE_MIN_WIRE_SIZE)?;
        let mut surfaces = Vec::with_capacity(surface_count);
        for _ in 0..surface_count {
            surfaces.push(MeshSurface::decode(r)?);
        }
        Ok(Self { hash, surfaces })
    }
}

/// Base light description: `hash u64, radiance 3xf32`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightInfo {
    pub hash: u64,
    pub radiance: Float3D,
}

impl LightInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        w.put_u64(self.hash);
        self.radiance.encode(w);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            hash: r.get_u64()?,
            radiance: Float3D::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereLightInfo {
    pub position: Float3D,
    pub radius: f32,
    pub shaping: Option<LightShaping>,
}

impl SphereLightInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        self.position.encode(w);
        w.put_f32(self.radius);
        encode_opt_shaping(&self.shaping, w);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            position: Float3D::decode(r)?,
            radius: r.get_f32()?,
            shaping: decode_opt_shaping(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectLightInfo {
    pub position: Float3D,
    pub x_axis: Float3D,
    pub x_size: f32,
    pub y_axis: Float3D,
    pub y_size: f32,
    pub direction: Float3D,
    pub shaping: Option<LightShaping>,
}

impl RectLightInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        self.position.encode(w);
        self.x_axis.encode(w);
        w.put_f32(self.x_size);
        self.y_axis.encode(w);
        w.put_f32(self.y_size);
        self.direction.encode(w);
        encode_opt_shaping(&self.shaping, w);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            position: Float3D::decode(r)?,
            x_axis: Float3D::decode(r)?,
            x_size: r.get_f32()?,
            y_axis: Float3D::decode(r)?,
            y_size: r.get_f32()?,
            direction: Float3D::decode(r)?,
            shaping: decode_opt_shaping(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskLightInfo {
    pub position: Float3D,
    pub x_axis: Float3D,
    pub x_radius: f32,
    pub y_axis: Float3D,
    pub y_radius: f32,
    pub direction: Float3D,
    pub shaping: Option<LightShaping>,
}

impl DiskLightInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        self.position.encode(w);
        self.x_axis.encode(w);
        w.put_f32(self.x_radius);
        self.y_axis.encode(w);
        w.put_f32(self.y_radius);
        self.direction.encode(w);
        encode_opt_shaping(&self.shaping, w);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            position: Float3D::decode(r)?,
            x_axis: Float3D::decode(r)?,
            x_radius: r.get_f32()?,
            y_axis: Float3D::decode(r)?,
            y_radius: r.get_f32()?,
            direction: Float3D::decode(r)?,
            shaping: decode_opt_shaping(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderLightInfo {
    pub position: Float3D,
    pub radius: f32,
    pub axis: Float3D,
    pub axis_length: f32,
}

impl CylinderLightInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        self.position.encode(w);
        w.put_f32(self.radius);
        self.axis.encode(w);
        w.put_f32(self.axis_length);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            position: Float3D::decode(r)?,
            radius: r.get_f32()?,
            axis: Float3D::decode(r)?,
            axis_length: r.get_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistantLightInfo {
    pub direction: Float3D,
    pub angular_diameter_degrees: f32,
}

impl DistantLightInfo {
    pub fn encode(&self, w: &mut WireWriter) {
        self.direction.encode(w);
        w.put_f32(self.angular_diameter_degrees);
    }

    pub fn decode(r: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            direction: Float3D::decode(r)?,
            angular_diameter_degrees: r.get_f32()?,
        })
    }
}

/// The five light shapes, paired with a [`LightInfo`] on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightShape {
    Sphere(SphereLightInfo),
    Rect(RectLightInfo),
    Disk(DiskLightInfo),
    Cylinder(CylinderLightInfo),
    Distant(DistantLightInfo),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T, E, D>(value: &T, encode: E, decode: D) -> T
    where
        E: Fn(&T, &mut WireWriter),
        D: Fn(&mut WireReader) -> Result<T, WireError>,
    {
        let mut w = WireWriter::new();
        encode(value, &mut w);
        let buf = w.into_vec();
        let mut r = WireReader::new(&buf);
        let decoded = decode(&mut r).expect("decode");
        assert!(r.is_exhausted(), "decoder left {} bytes", r.remaining());
        decoded
    }

    fn sample_shaping() -> LightShaping {
        LightShaping {
            direction: Float3D::new(0.0, -1.0, 0.0),
            cone_angle_degrees: 35.5,
            cone_softness: 0.1,
            focus_exponent: 2.0,
        }
    }

    #[test]
    fn material_roundtrip() {
        let info = MaterialInfo {
            hash: 0xFEED_FACE_CAFE_BEEF,
            emissive_intensity: 1.25,
            emissive_color: Float3D::new(0.9, 0.1, 0.3),
            sprite_sheet_row: 4,
            sprite_sheet_col: 8,
            sprite_sheet_fps: 24,
            filter_mode: 1,
            wrap_mode_u: 2,
            wrap_mode_v: 3,
        };
        assert_eq!(
            roundtrip(&info, MaterialInfo::encode, MaterialInfo::decode),
            info
        );
    }

    #[test]
    fn opaque_material_roundtrip_with_and_without_optionals() {
        let mut ext = OpaqueMaterialInfo {
            anisotropy: 0.5,
            albedo_constant: Float3D::new(0.2, 0.4, 0.6),
            opacity_constant: 1.0,
            roughness_constant: 0.33,
            metallic_constant: 0.66,
            thin_film_thickness: Some(200.0),
            alpha_is_thin_film_thickness: true,
            height_texture_strength: 0.0,
            use_draw_call_alpha_state: false,
            blend_type: Some(-3),
            inverted_blend: true,
            alpha_test_type: 7,
            alpha_reference_value: 128,
        };
        assert_eq!(
            roundtrip(&ext, OpaqueMaterialInfo::encode, OpaqueMaterialInfo::decode),
            ext
        );

        ext.thin_film_thickness = None;
        ext.blend_type = None;
        let with_opts_len = {
            let mut w = WireWriter::new();
            OpaqueMaterialInfo {
                thin_film_thickness: Some(1.0),
                blend_type: Some(1),
                ..ext.clone()
            }
            .encode(&mut w);
            w.len()
        };
        let mut w = WireWriter::new();
        ext.encode(&mut w);
        // Absent optionals omit their value bytes entirely.
        assert_eq!(w.len() + 8, with_opts_len);
        assert_eq!(
            roundtrip(&ext, OpaqueMaterialInfo::encode, OpaqueMaterialInfo::decode),
            ext
        );
    }

    #[test]
    fn mesh_roundtrip() {
        let mesh = MeshInfo {
            hash: 42,
            surfaces: vec![
                MeshSurface {
                    vertices: vec![
                        MeshVertex {
                            position: [0.0, 1.0, 2.0],
                            normal: [0.0, 1.0, 0.0],
                            texcoord: [0.5, 0.5],
                            color: 0xFFFF_FFFF,
                        },
                        MeshVertex {
                            position: [-1.0, 0.25, 3.5],
                            normal: [0.577, 0.577, 0.577],
                            texcoord: [0.0, 1.0],
                            color: 0x8000_00FF,
                        },
                    ],
                    indices: vec![0, 1, 0],
                    skinned: false,
                    material: 7,
                },
                MeshSurface::default(),
            ],
        };
        assert_eq!(roundtrip(&mesh, MeshInfo::encode, MeshInfo::decode), mesh);
    }

    #[test]
    fn mesh_with_absurd_vertex_count_rejected() {
        // hash + surface_count(1) + vertex_count claiming u64::MAX
        let mut w = WireWriter::new();
        w.put_u64(1);
        w.put_u32(1);
        w.put_u64(u64::MAX);
        let buf = w.into_vec();
        let mut r = WireReader::new(&buf);
        assert!(MeshInfo::decode(&mut r).is_err());
    }

    #[test]
    fn light_shapes_roundtrip() {
        let sphere = SphereLightInfo {
            position: Float3D::new(1.0, 2.0, 3.0),
            radius: 0.25,
            shaping: Some(sample_shaping()),
        };
        assert_eq!(
            roundtrip(&sphere, SphereLightInfo::encode, SphereLightInfo::decode),
            sphere
        );

        let rect = RectLightInfo {
            position: Float3D::new(0.0, 5.0, 0.0),
            x_axis: Float3D::new(1.0, 0.0, 0.0),
            x_size: 2.0,
            y_axis: Float3D::new(0.0, 0.0, 1.0),
            y_size: 1.0,
            direction: Float3D::new(0.0, -1.0, 0.0),
            shaping: None,
        };
        assert_eq!(
            roundtrip(&rect, RectLightInfo::encode, RectLightInfo::decode),
            rect
        );

        let disk = DiskLightInfo {
            position: Float3D::new(0.0, 3.0, 0.0),
            x_axis: Float3D::new(1.0, 0.0, 0.0),
            x_radius: 0.5,
            y_axis: Float3D::new(0.0, 0.0, 1.0),
            y_radius: 0.5,
            direction: Float3D::new(0.0, -1.0, 0.0),
            shaping: Some(sample_shaping()),
        };
        assert_eq!(
            roundtrip(&disk, DiskLightInfo::encode, DiskLightInfo::decode),
            disk
        );

        let cylinder = CylinderLightInfo {
            position: Float3D::new(1.0, 1.0, 1.0),
            radius: 0.1,
            axis: Float3D::new(0.0, 1.0, 0.0),
            axis_length: 4.0,
        };
        assert_eq!(
            roundtrip(
                &cylinder,
                CylinderLightInfo::encode,
                CylinderLightInfo::decode
            ),
            cylinder
        );

        let distant = DistantLightInfo {
            direction: Float3D::new(0.0, -0.707, 0.707),
            angular_diameter_degrees: 0.53,
        };
        assert_eq!(
            roundtrip(
                &distant,
                DistantLightInfo::encode,
                DistantLightInfo::decode
            ),
            distant
        );
    }

    #[test]
    fn transform_roundtrip() {
        let t = Transform {
            matrix: [
                [1.0, 0.0, 0.0, 10.0],
                [0.0, 0.5, 0.0, -2.5],
                [0.0, 0.0, 1.0, 0.125],
            ],
        };
        assert_eq!(roundtrip(&t, Transform::encode, Transform::decode), t);
    }

    #[test]
    fn truncated_mesh_payload_fails_cleanly() {
        let mesh = MeshInfo {
            hash: 9,
            surfaces: vec![MeshSurface {
                vertices: vec![MeshVertex::default()],
                indices: vec![0],
                skinned: false,
                material: 0,
            }],
        };
        let mut w = WireWriter::new();
        mesh.encode(&mut w);
        let buf = w.into_vec();
        for cut in [buf.len() - 1, buf.len() / 2, 13] {
            let mut r = WireReader::new(&buf[..cut]);
            assert!(MeshInfo::decode(&mut r).is_err(), "cut at {cut} passed");
        }
    }
}
