pub mod camera;
mod draw_list;
mod egui_overlay;
mod pipeline;
mod resources;
mod uniforms;

use crate::app::EguiFrameOutput;
use crate::assets::EnvironmentMap;
use crate::config::ViewerConfig;
use crate::scene::SceneGraph;
use crate::session::ViewerSession;
use draw_list::DrawList;
use egui_overlay::EguiOverlay;
use pipeline::{BindLayouts, Pipelines};
use resources::{EnvironmentTextures, FrameTargets, GpuMesh, ShadowMap};
use std::sync::Arc;
use uniforms::FrameUniforms;
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window: {0}")]
    CreateWindow(#[from] winit::error::OsError),
    #[error("failed to create render surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("render surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("failed to acquire surface frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Window surface, GPU device and every GPU-side copy of the scene.
pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    clear_color: wgpu::Color,
    targets: FrameTargets,
    layouts: BindLayouts,
    pipelines: Pipelines,
    frame_buffer: wgpu::Buffer,
    shadow_map: ShadowMap,
    shadow_bind_group: wgpu::BindGroup,
    frame_bind_group: wgpu::BindGroup,
    environment: Option<EnvironmentTextures>,
    color_sampler: wgpu::Sampler,
    white_map: wgpu::TextureView,
    color_maps: Vec<Option<wgpu::TextureView>>,
    meshes: Vec<Option<GpuMesh>>,
    overlay: EguiOverlay,
}

impl RenderContext {
    pub fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;
        let info = adapter.get_info();
        log::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("drone-viewer device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("Surface configured: {}x{} {:?}", width, height, format);

        let layouts = BindLayouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, format);
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_map = ShadowMap::new(&device, viewer.lights.spot.shadow_map_size);
        let shadow_bind_group = layouts.shadow_bind_group(&device, &frame_buffer);
        let placeholder = EnvironmentTextures::placeholder(&device, &queue);
        let frame_bind_group = layouts.frame_bind_group(
            &device,
            &frame_buffer,
            &shadow_map.view,
            &shadow_map.sampler,
            &placeholder,
        );
        let [r, g, b] = viewer.window.clear_color;

        Ok(Self {
            targets: FrameTargets::new(&device, format, (width, height)),
            color_sampler: resources::color_map_sampler(&device),
            white_map: resources::white_color_map(&device, &queue),
            overlay: EguiOverlay::new(&device, format),
            surface,
            device,
            queue,
            config,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            layouts,
            pipelines,
            frame_buffer,
            shadow_map,
            shadow_bind_group,
            frame_bind_group,
            environment: None,
            color_maps: Vec::new(),
            meshes: Vec::new(),
        })
    }

    /// Current surface size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == self.size() {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.targets = FrameTargets::new(&self.device, self.config.format, (width, height));
        log::debug!("Surface resized to {}x{}", width, height);
    }

    /// Draws one frame: shadow map, scene, then the egui overlay.
    pub fn render(
        &mut self,
        session: &mut ViewerSession,
        overlay: &EguiFrameOutput,
    ) -> Result<(), RenderError> {
        if let Some(environment) = session.take_pending_environment() {
            self.install_environment(&environment);
        }
        self.sync_scene(session.graph());

        let camera = session.camera();
        let lights = &session.config().lights;
        let frame_uniforms = FrameUniforms::new(
            camera.view_projection(),
            camera.position,
            &lights.spot,
            &lights.ambient,
            self.environment.is_some(),
        );
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame_uniforms));

        let draws = DrawList::collect(session.graph(), camera.position);
        for item in draws.opaque.iter().chain(&draws.blended) {
            if let Some(mesh) = self.mesh(item.node.0) {
                mesh.write_uniforms(&self.queue, &item.uniforms);
            }
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface frame timed out; skipping");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        if lights.spot.cast_shadow {
            self.shadow_pass(&mut encoder, &draws);
        }
        self.scene_pass(&mut encoder, &target, &draws);
        let uploads = self
            .overlay
            .paint(&self.device, &self.queue, &mut encoder, &target, overlay);

        self.queue
            .submit(uploads.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();
        Ok(())
    }

    fn mesh(&self, index: usize) -> Option<&GpuMesh> {
        self.meshes.get(index).and_then(Option::as_ref)
    }

    fn install_environment(&mut self, environment: &EnvironmentMap) {
        let textures = EnvironmentTextures::upload(&self.device, &self.queue, environment);
        self.frame_bind_group = self.layouts.frame_bind_group(
            &self.device,
            &self.frame_buffer,
            &self.shadow_map.view,
            &self.shadow_map.sampler,
            &textures,
        );
        self.environment = Some(textures);
        log::info!(
            "Environment {} uploaded ({}x{})",
            environment.name,
            environment.radiance.width,
            environment.radiance.height
        );
    }

    /// Uploads textures and meshes for nodes added since the last frame.
    /// Nodes are never removed, so both lists only grow.
    fn sync_scene(&mut self, graph: &SceneGraph) {
        for index in self.color_maps.len()..graph.textures.len() {
            let label = format!("color map {}", index);
            let view =
                resources::upload_color_map(&self.device, &self.queue, &graph.textures[index], &label);
            self.color_maps.push(view);
        }

        if self.meshes.len() >= graph.len() {
            return;
        }
        let first_new = self.meshes.len();
        for id in graph.node_ids().skip(first_new) {
            let node = graph.node(id);
            let gpu_mesh = node.mesh.as_ref().and_then(|mesh| {
                let color_map = node
                    .standard_material()
                    .and_then(|material| material.map)
                    .and_then(|texture| self.color_maps.get(texture.0))
                    .and_then(Option::as_ref)
                    .unwrap_or(&self.white_map);
                GpuMesh::new(
                    &self.device,
                    &self.layouts,
                    mesh,
                    color_map,
                    &self.color_sampler,
                    &node.name,
                )
            });
            self.meshes.push(gpu_mesh);
        }
        let uploaded = self.meshes[first_new..].iter().flatten().count();
        log::info!("Uploaded {} meshes to the GPU", uploaded);
    }

    fn shadow_pass(&self, encoder: &mut wgpu::CommandEncoder, draws: &DrawList) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadow pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.shadow_bind_group, &[]);
        for item in draws.shadow_casters() {
            if let Some(mesh) = self.mesh(item.node.0) {
                pass.set_pipeline(self.pipelines.shadow(item));
                mesh.draw(&mut pass);
            }
        }
    }

    fn scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        draws: &DrawList,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.color,
                resolve_target: Some(target),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Discard,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        if self.environment.is_some() {
            pass.set_pipeline(self.pipelines.background());
            pass.draw(0..3, 0..1);
        }
        for item in draws.opaque.iter().chain(&draws.blended) {
            if let Some(mesh) = self.mesh(item.node.0) {
                pass.set_pipeline(self.pipelines.surface(item));
                mesh.draw(&mut pass);
            }
        }
    }
}
