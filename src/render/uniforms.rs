use crate::config::{AmbientLightConfig, SpotLightConfig};
use crate::scene::material::color_from_hex;
use crate::scene::{MeshData, StandardMaterial};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

const SHADOW_NEAR: f32 = 0.5;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    pub fn interleave(mesh: &MeshData) -> Vec<Vertex> {
        mesh.positions
            .iter()
            .zip(&mesh.normals)
            .zip(&mesh.uvs)
            .map(|((position, normal), uv)| Vertex {
                position: *position,
                normal: *normal,
                uv: *uv,
            })
            .collect()
    }
}

/// Per-frame camera and lighting state. Layout matches `Frame` in
/// `shader.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// xyz position, w cutoff distance.
    pub light_position: [f32; 4],
    /// xyz unit vector from the target towards the light, w decay.
    pub light_direction: [f32; 4],
    /// rgb times intensity, w 1.0 when shadows are cast.
    pub light_color: [f32; 4],
    /// cos(angle), cos(angle * (1 - penumbra)), shadow bias, shadow texel.
    pub light_cone: [f32; 4],
    /// rgb times intensity, w 1.0 when an environment is bound.
    pub ambient: [f32; 4],
}

impl FrameUniforms {
    pub fn new(
        view_proj: Mat4,
        camera_position: Vec3,
        spot: &SpotLightConfig,
        ambient: &AmbientLightConfig,
        has_environment: bool,
    ) -> Self {
        let position = Vec3::from(spot.position);
        let target = Vec3::from(spot.target);
        let direction = (position - target).normalize_or_zero();
        let light = Vec3::from(color_from_hex(spot.color)) * spot.intensity;
        let ambient_color = Vec3::from(color_from_hex(ambient.color)) * ambient.intensity;
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            light_view_proj: spot_light_view_proj(spot).to_cols_array_2d(),
            camera_position: camera_position.extend(1.0).to_array(),
            light_position: position.extend(spot.distance).to_array(),
            light_direction: direction.extend(spot.decay).to_array(),
            light_color: light.extend(if spot.cast_shadow { 1.0 } else { 0.0 }).to_array(),
            light_cone: [
                spot.angle.cos(),
                (spot.angle * (1.0 - spot.penumbra)).cos(),
                spot.shadow_bias,
                1.0 / spot.shadow_map_size.max(1) as f32,
            ],
            ambient: ambient_color
                .extend(if has_environment { 1.0 } else { 0.0 })
                .to_array(),
        }
    }
}

/// Per-object transform and material. Layout matches `Object` in
/// `shader.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// rgb base color, a opacity.
    pub color: [f32; 4],
    /// rgb emissive, w 1.0 when a color map is bound.
    pub emissive: [f32; 4],
    /// metalness, roughness, receives shadow, unused.
    pub surface: [f32; 4],
}

impl ObjectUniforms {
    pub fn new(model: Mat4, material: &StandardMaterial, receive_shadow: bool) -> Self {
        let opacity = if material.transparent {
            material.opacity
        } else {
            1.0
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            color: Vec3::from(material.color).extend(opacity).to_array(),
            emissive: Vec3::from(material.emissive)
                .extend(if material.map.is_some() { 1.0 } else { 0.0 })
                .to_array(),
            surface: [
                material.metalness,
                material.roughness.clamp(0.0525, 1.0),
                if receive_shadow { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// Perspective shadow camera of a spot light: cone angle as the half field
/// of view, light distance as the far plane.
pub fn spot_light_view_proj(spot: &SpotLightConfig) -> Mat4 {
    let position = Vec3::from(spot.position);
    let target = Vec3::from(spot.target);
    let forward = (target - position).normalize_or_zero();
    let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let far = if spot.distance > 0.0 { spot.distance } else { 1000.0 };
    let fov = (spot.angle * 2.0).clamp(0.01, std::f32::consts::PI - 0.01);
    Mat4::perspective_rh(fov, 1.0, SHADOW_NEAR, far) * Mat4::look_at_rh(position, target, up)
}
