//! The dispatch loop.
//!
//! Single consumer of the command ring: pop the next record, decode it,
//! invoke the renderer, and for correlated commands push the response
//! carrying the same uid. One bad command is contained to that command:
//! a malformed payload is logged and dropped with no response, so a
//! correlated issuer runs into its own deadline; a renderer panic is
//! caught and answered with the null token. Only a channel-level failure
//! stops the loop.

use std::panic::{self, AssertUnwindSafe};

use xbridge_channel::{Channel, ChannelError, Duplex};
use xbridge_config::{log_server_debug, log_server_error, log_server_info, log_server_warn};
use xbridge_proto::types::{
    CylinderLightInfo, DiskLightInfo, DistantLightInfo, LightInfo, LightShape, MaterialInfo,
    MeshInfo, OpaqueMaterialInfo, RectLightInfo, SphereLightInfo, Transform,
};
use xbridge_proto::wire::{WireReader, WireWriter};
use xbridge_proto::{CommandRecord, CommandTag, ProtoError, RawHandle};

use crate::registry::HandleRegistry;
use crate::renderer::Renderer;

/// Wire token meaning "the operation produced no resource".
const NULL_TOKEN: RawHandle = 0;

pub struct DispatchLoop<R: Renderer> {
    renderer: R,
    commands: Channel,
    responses: Channel,
    materials: HandleRegistry<R::Material>,
    meshes: HandleRegistry<R::Mesh>,
    lights: HandleRegistry<R::Light>,
}

impl<R: Renderer> DispatchLoop<R> {
    pub fn new(renderer: R, channels: Duplex) -> Self {
        Self {
            renderer,
            commands: channels.to_server,
            responses: channels.to_client,
            materials: HandleRegistry::new(),
            meshes: HandleRegistry::new(),
            lights: HandleRegistry::new(),
        }
    }

    /// Serve commands until the channel closes.
    pub fn run(&mut self) -> Result<(), ChannelError> {
        log_server_info!("dispatch loop started");
        loop {
            match self.commands.pop(None) {
                Ok(Some(bytes)) => match self.handle_record(&bytes) {
                    Ok(()) => {}
                    Err(ChannelError::Closed) => break,
                    Err(e) => return Err(e),
                },
                Ok(None) => continue,
                Err(ChannelError::Closed) => break,
                Err(e) => return Err(e),
            }
        }
        log_server_info!("command channel closed, dispatch loop exiting");
        Ok(())
    }

    /// Decode and execute one record. The only errors that escape are
    /// response-channel failures; everything command-scoped is logged here.
    fn handle_record(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let record = match CommandRecord::decode(bytes) {
            Ok(record) => record,
            Err(e) => {
                log_server_warn!("skipping undecodable command record", error = e.to_string());
                return Ok(());
            }
        };

        let correlated = record.tag.expects_response();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(record.tag, &record.payload)
        }));

        let token = match outcome {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                // Dropped without a response; a correlated issuer times out.
                log_server_warn!(
                    "malformed command payload, dropped",
                    op = record.tag.name(),
                    error = e.to_string(),
                );
                None
            }
            Err(_) => {
                log_server_error!("renderer panicked, command abandoned", op = record.tag.name());
                correlated.then_some(NULL_TOKEN)
            }
        };

        if let Some(token) = token {
            let mut w = WireWriter::with_capacity(8);
            w.put_u64(token);
            let response = CommandRecord::response(record.uid, w.into_vec());
            self.responses.push(&response.encode())?;
            log_server_debug!(
                "responded",
                op = record.tag.name(),
                uid = record.uid,
                token = token,
            );
        }
        Ok(())
    }

    /// Invoke the renderer for one decoded command. Returns the token to
    /// send back, or `None` for fire-and-forget commands.
    fn execute(
        &mut self,
        tag: CommandTag,
        payload: &[u8],
    ) -> Result<Option<RawHandle>, ProtoError> {
        let mut r = WireReader::new(payload);
        let token = match tag {
            CommandTag::DebugMessage => {
                let marker = r.get_i32()?;
                let text = r.get_str()?;
                self.renderer.debug_message(marker, &text);
                None
            }
            CommandTag::CreateOpaqueMaterial => {
                let base = MaterialInfo::decode(&mut r)?;
                let opaque = OpaqueMaterialInfo::decode(&mut r)?;
                let material = self.renderer.create_opaque_material(&base, &opaque);
                Some(self.materials.create(material))
            }
            CommandTag::DestroyMaterial => {
                let token = r.get_u64()?;
                match self.materials.destroy(token) {
                    Some(material) => self.renderer.destroy_material(material),
                    None => log_server_warn!("destroy of unknown material token", token = token),
                }
                None
            }
            CommandTag::CreateTriangleMesh => {
                let info = MeshInfo::decode(&mut r)?;
                let mesh = self.renderer.create_triangle_mesh(&info);
                Some(self.meshes.create(mesh))
            }
            CommandTag::DestroyMesh => {
                let token = r.get_u64()?;
                match self.meshes.destroy(token) {
                    Some(mesh) => self.renderer.destroy_mesh(mesh),
                    None => log_server_warn!("destroy of unknown mesh token", token = token),
                }
                None
            }
            CommandTag::DrawMeshInstance => {
                let token = r.get_u64()?;
                let transform = Transform::decode(&mut r)?;
                let double_sided = r.get_flag()?;
                match self.meshes.resolve(token) {
                    Some(mesh) => {
                        self.renderer
                            .draw_mesh_instance(mesh, &transform, double_sided)
                    }
                    None => log_server_warn!("draw of unknown mesh token", token = token),
                }
                None
            }
            CommandTag::CreateSphereLight => {
                let base = LightInfo::decode(&mut r)?;
                let shape = LightShape::Sphere(SphereLightInfo::decode(&mut r)?);
                Some(self.create_light(&base, &shape))
            }
            CommandTag::CreateRectLight => {
                let base = LightInfo::decode(&mut r)?;
                let shape = LightShape::Rect(RectLightInfo::decode(&mut r)?);
                Some(self.create_light(&base, &shape))
            }
            CommandTag::CreateDiskLight => {
                let base = LightInfo::decode(&mut r)?;
                let shape = LightShape::Disk(DiskLightInfo::decode(&mut r)?);
                Some(self.create_light(&base, &shape))
            }
            CommandTag::CreateCylinderLight => {
                let base = LightInfo::decode(&mut r)?;
                let shape = LightShape::Cylinder(CylinderLightInfo::decode(&mut r)?);
                Some(self.create_light(&base, &shape))
            }
            CommandTag::CreateDistantLight => {
                let base = LightInfo::decode(&mut r)?;
                let shape = LightShape::Distant(DistantLightInfo::decode(&mut r)?);
                Some(self.create_light(&base, &shape))
            }
            CommandTag::DestroyLight => {
                let token = r.get_u64()?;
                match self.lights.destroy(token) {
                    Some(light) => self.renderer.destroy_light(light),
                    None => log_server_warn!("destroy of unknown light token", token = token),
                }
                None
            }
            CommandTag::DrawLightInstance => {
                let token = r.get_u64()?;
                match self.lights.resolve(token) {
                    Some(light) => self.renderer.draw_light_instance(light),
                    None => log_server_warn!("draw of unknown light token", token = token),
                }
                None
            }
            CommandTag::SetConfigVariable => {
                let name = r.get_str()?;
                let value = r.get_str()?;
                self.renderer.set_config_variable(&name, &value);
                None
            }
            CommandTag::RegisterDevice => {
                self.renderer.register_device();
                None
            }
            CommandTag::Response => {
                log_server_warn!("response record on the command ring, ignored");
                None
            }
        };

        if !r.is_exhausted() {
            return Err(ProtoError::PayloadMismatch {
                declared: payload.len(),
                actual: payload.len() - r.remaining(),
            });
        }
        Ok(token)
    }

    fn create_light(&mut self, base: &LightInfo, shape: &LightShape) -> RawHandle {
        let light = self.renderer.create_light(base, shape);
        self.lights.create(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NullRenderer;
    use std::time::Duration;
    use xbridge_channel::Duplex;
    use xbridge_proto::types::Float3D;

    fn start_loop<R: Renderer + 'static>(
        renderer: R,
    ) -> (Duplex, std::thread::JoinHandle<Result<(), ChannelError>>) {
        let dir = tempfile::tempdir().unwrap();
        let server_side = Duplex::create(dir.path(), 16 * 1024).unwrap();
        let client_side = Duplex::open(dir.path()).unwrap();
        let handle = std::thread::spawn(move || {
            // Keep the mapping directory alive for the loop's lifetime.
            let _dir = dir;
            DispatchLoop::new(renderer, server_side).run()
        });
        (client_side, handle)
    }

    fn pop_response(channels: &Duplex) -> CommandRecord {
        let bytes = channels
            .to_client
            .pop(Some(Duration::from_secs(5)))
            .unwrap()
            .expect("response within deadline");
        CommandRecord::decode(&bytes).unwrap()
    }

    fn response_token(record: &CommandRecord) -> RawHandle {
        assert_eq!(record.tag, CommandTag::Response);
        let mut r = WireReader::new(&record.payload);
        let token = r.get_u64().unwrap();
        assert!(r.is_exhausted());
        token
    }

    fn encode_sphere_create(uid: u64) -> Vec<u8> {
        let mut w = WireWriter::new();
        LightInfo {
            hash: 11,
            radiance: Float3D::new(1.0, 1.0, 1.0),
        }
        .encode(&mut w);
        SphereLightInfo {
            position: Float3D::default(),
            radius: 0.5,
            shaping: None,
        }
        .encode(&mut w);
        CommandRecord::correlated(CommandTag::CreateSphereLight, uid, w.into_vec()).encode()
    }

    #[test]
    fn create_responds_with_fresh_token() {
        let (channels, handle) = start_loop(NullRenderer::default());

        channels.to_server.push(&encode_sphere_create(1)).unwrap();
        let first = pop_response(&channels);
        assert_eq!(first.uid, 1);
        let first_token = response_token(&first);
        assert_ne!(first_token, 0);

        channels.to_server.push(&encode_sphere_create(2)).unwrap();
        let second = pop_response(&channels);
        assert_eq!(second.uid, 2);
        assert_ne!(response_token(&second), first_token);

        channels.close();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn destroy_then_draw_is_contained() {
        let (channels, handle) = start_loop(NullRenderer::default());

        channels.to_server.push(&encode_sphere_create(1)).unwrap();
        let token = response_token(&pop_response(&channels));

        let mut w = WireWriter::new();
        w.put_u64(token);
        let destroy =
            CommandRecord::fire_and_forget(CommandTag::DestroyLight, w.into_vec()).encode();
        channels.to_server.push(&destroy).unwrap();

        let mut w = WireWriter::new();
        w.put_u64(token);
        let draw =
            CommandRecord::fire_and_forget(CommandTag::DrawLightInstance, w.into_vec()).encode();
        channels.to_server.push(&draw).unwrap();

        // The stale draw is logged and dropped; the loop keeps serving.
        channels.to_server.push(&encode_sphere_create(2)).unwrap();
        let next = pop_response(&channels);
        assert_eq!(next.uid, 2);
        assert_ne!(response_token(&next), 0);

        channels.close();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn malformed_correlated_payload_is_dropped_without_response() {
        let (channels, handle) = start_loop(NullRenderer::default());

        // Truncated payload for a create: dropped, never answered. The
        // issuer side's own deadline is what reports this failure.
        let bad =
            CommandRecord::correlated(CommandTag::CreateSphereLight, 9, vec![1, 2, 3]).encode();
        channels.to_server.push(&bad).unwrap();
        channels.to_server.push(&encode_sphere_create(2)).unwrap();

        // FIFO: had uid 9 been answered, its response would arrive first.
        let response = pop_response(&channels);
        assert_eq!(response.uid, 2);
        assert_ne!(response_token(&response), 0);
        assert!(channels
            .to_client
            .pop(Some(Duration::from_millis(100)))
            .unwrap()
            .is_none());

        channels.close();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn trailing_garbage_after_payload_is_rejected() {
        let (channels, handle) = start_loop(NullRenderer::default());

        let mut payload = {
            let mut w = WireWriter::new();
            LightInfo::default().encode(&mut w);
            DistantLightInfo {
                direction: Float3D::new(0.0, -1.0, 0.0),
                angular_diameter_degrees: 0.5,
            }
            .encode(&mut w);
            w.into_vec()
        };
        payload.extend_from_slice(&[0xAA; 7]);
        let record =
            CommandRecord::correlated(CommandTag::CreateDistantLight, 4, payload).encode();
        channels.to_server.push(&record).unwrap();
        channels.to_server.push(&encode_sphere_create(5)).unwrap();

        // The padded record is dropped unanswered; only uid 5 replies.
        let response = pop_response(&channels);
        assert_eq!(response.uid, 5);
        assert_ne!(response_token(&response), 0);

        channels.close();
        assert!(handle.join().unwrap().is_ok());
    }

    struct PanickyRenderer;

    impl Renderer for PanickyRenderer {
        type Material = ();
        type Mesh = ();
        type Light = ();

        fn create_opaque_material(&mut self, _: &MaterialInfo, _: &OpaqueMaterialInfo) {
            panic!("backend exploded");
        }
        fn destroy_material(&mut self, _: ()) {}
        fn create_triangle_mesh(&mut self, _: &MeshInfo) {}
        fn destroy_mesh(&mut self, _: ()) {}
        fn draw_mesh_instance(&mut self, _: &(), _: &Transform, _: bool) {}
        fn create_light(&mut self, _: &LightInfo, _: &LightShape) {}
        fn destroy_light(&mut self, _: ()) {}
        fn draw_light_instance(&mut self, _: &()) {}
        fn set_config_variable(&mut self, _: &str, _: &str) {}
        fn register_device(&mut self) {}
        fn debug_message(&mut self, _: i32, _: &str) {}
    }

    #[test]
    fn renderer_panic_contained_to_one_command() {
        let (channels, handle) = start_loop(PanickyRenderer);

        let mut w = WireWriter::new();
        MaterialInfo::default().encode(&mut w);
        OpaqueMaterialInfo::default().encode(&mut w);
        let record =
            CommandRecord::correlated(CommandTag::CreateOpaqueMaterial, 1, w.into_vec()).encode();
        channels.to_server.push(&record).unwrap();

        // The panicking create still answers, with the failure token.
        let response = pop_response(&channels);
        assert_eq!(response.uid, 1);
        assert_eq!(response_token(&response), 0);

        // And the loop is still alive for the next command.
        channels.to_server.push(&encode_sphere_create(2)).unwrap();
        assert_ne!(response_token(&pop_response(&channels)), 0);

        channels.close();
        assert!(handle.join().unwrap().is_ok());
    }
}
