use super::pipeline::BindLayouts;
use super::uniforms::{ObjectUniforms, Vertex};
use crate::assets::{EnvironmentMap, HdrImage};
use crate::scene::{MeshData, TextureData};
use wgpu::util::DeviceExt;

pub const SAMPLE_COUNT: u32 = 4;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const COLOR_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const ENVIRONMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Uploads tightly packed pixels into a new single-mip 2D texture.
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    (width, height): (u32, u32),
    format: wgpu::TextureFormat,
    bytes_per_pixel: u32,
    data: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Uploads a decoded base color texture. Returns `None` when the pixel
/// buffer does not match the declared size.
pub fn upload_color_map(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &TextureData,
    label: &str,
) -> Option<wgpu::TextureView> {
    let expected = texture.width as usize * texture.height as usize * 4;
    if texture.width == 0 || texture.height == 0 || texture.rgba8.len() != expected {
        log::warn!(
            "Skipping texture {}: {}x{} with {} bytes",
            label,
            texture.width,
            texture.height,
            texture.rgba8.len()
        );
        return None;
    }
    Some(upload_texture(
        device,
        queue,
        label,
        (texture.width, texture.height),
        COLOR_MAP_FORMAT,
        4,
        &texture.rgba8,
    ))
}

pub fn white_color_map(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    upload_texture(
        device,
        queue,
        "white color map",
        (1, 1),
        COLOR_MAP_FORMAT,
        4,
        &[255; 4],
    )
}

fn upload_hdr(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &HdrImage,
    label: &str,
) -> wgpu::TextureView {
    upload_texture(
        device,
        queue,
        label,
        (image.width, image.height),
        ENVIRONMENT_FORMAT,
        16,
        bytemuck::cast_slice(&image.rgba),
    )
}

/// GPU copies of the environment's background and irradiance maps.
pub struct EnvironmentTextures {
    pub radiance: wgpu::TextureView,
    pub irradiance: wgpu::TextureView,
}

impl EnvironmentTextures {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, environment: &EnvironmentMap) -> Self {
        Self {
            radiance: upload_hdr(device, queue, &environment.radiance, "environment radiance"),
            irradiance: upload_hdr(
                device,
                queue,
                &environment.irradiance,
                "environment irradiance",
            ),
        }
    }

    /// Black 1x1 maps bound until an environment arrives.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let black = HdrImage {
            width: 1,
            height: 1,
            rgba: vec![0.0, 0.0, 0.0, 1.0],
        };
        Self {
            radiance: upload_hdr(device, queue, &black, "placeholder radiance"),
            irradiance: upload_hdr(device, queue, &black, "placeholder irradiance"),
        }
    }
}

fn attachment_view(
    device: &wgpu::Device,
    label: &str,
    (width, height): (u32, u32),
    format: wgpu::TextureFormat,
    sample_count: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Multisampled color and depth attachments matching the surface size.
pub struct FrameTargets {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

impl FrameTargets {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, size: (u32, u32)) -> Self {
        Self {
            color: attachment_view(
                device,
                "msaa color",
                size,
                format,
                SAMPLE_COUNT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
            depth: attachment_view(
                device,
                "depth",
                size,
                DEPTH_FORMAT,
                SAMPLE_COUNT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
        }
    }
}

/// Depth map rendered from the spot light, sampled with hardware comparison.
pub struct ShadowMap {
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, size: u32) -> Self {
        let size = size.clamp(1, device.limits().max_texture_dimension_2d);
        let view = attachment_view(
            device,
            "spot shadow map",
            (size, size),
            SHADOW_FORMAT,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        Self { view, sampler }
    }
}

pub fn color_map_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("color map sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Geometry and per-object bindings of one renderable node.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    /// Returns `None` for meshes without triangles.
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindLayouts,
        mesh: &MeshData,
        color_map: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> Option<Self> {
        if mesh.indices.len() < 3 {
            return None;
        }
        let vertices = Vertex::interleave(mesh);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<ObjectUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group =
            layouts.object_bind_group(device, &uniform_buffer, color_map, sampler, label);
        Some(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            uniform_buffer,
            bind_group,
        })
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &ObjectUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}
