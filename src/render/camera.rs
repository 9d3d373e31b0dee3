use crate::config::{CameraConfig, OrbitConfig};
use crate::scene::raycast::Ray;
use glam::{Mat4, Vec2, Vec3};

const POLE_EPSILON: f32 = 1e-6;
const WHEEL_DOLLY_SCALE: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_y_deg: config.fov_y_deg,
            aspect,
            near: config.near,
            far: config.far,
            position: Vec3::from(config.position),
            target: Vec3::ZERO,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space ray through a point given in normalized device coordinates.
    pub fn ray(&self, ndc: Vec2) -> Ray {
        Ray::through_ndc(ndc, self.position, self.view_projection().inverse())
    }

    /// Camera-space right and up axes in world space.
    fn screen_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.position).normalize_or_zero();
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        (right, right.cross(forward))
    }
}

/// Spherical coordinates around the orbit target: `theta` is the azimuth
/// around +Y measured from +Z, `phi` the polar angle from +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    theta: f32,
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                theta: 0.0,
                phi: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Orbit-style controller: drag rotates around a target, the wheel dollies,
/// and the polar angle and distance stay inside configured limits.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl OrbitController {
    pub fn new(config: &OrbitConfig) -> Self {
        Self {
            target: Vec3::from(config.target),
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            enable_pan: config.enable_pan,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: config.min_polar_angle,
            max_polar_angle: config.max_polar_angle,
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    /// Queues a rotation for a pointer drag of `delta` pixels.
    pub fn rotate_by_pixels(&mut self, delta: Vec2, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        let full_turn = std::f32::consts::TAU * self.rotate_speed / height;
        self.theta_delta -= full_turn * delta.x;
        self.phi_delta -= full_turn * delta.y;
    }

    /// Queues a pan for a pointer drag of `delta` pixels, moving the target
    /// in the camera plane so the point under the cursor follows it at the
    /// target's depth. Ignored while panning is disabled.
    pub fn pan_by_pixels(&mut self, delta: Vec2, camera: &PerspectiveCamera, viewport_height: u32) {
        if !self.enable_pan {
            return;
        }
        let height = viewport_height.max(1) as f32;
        let target_distance =
            camera.position.distance(self.target) * (camera.fov_y_deg.to_radians() * 0.5).tan();
        let world_per_pixel = 2.0 * target_distance / height;
        let (right, up) = camera.screen_axes();
        self.pan_offset += (up * delta.y - right * delta.x) * world_per_pixel;
    }

    /// Queues a dolly for `steps` wheel notches; positive steps move closer.
    pub fn dolly(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        let factor = WHEEL_DOLLY_SCALE.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= factor;
        } else {
            self.scale /= factor;
        }
    }

    /// Integrates queued input into the camera. Returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, frame_dt: f32) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.auto_rotate {
            self.theta_delta -= std::f32::consts::TAU / 60.0 * self.auto_rotate_speed * frame_dt;
        }

        if self.enable_damping {
            spherical.theta += self.theta_delta * self.damping_factor;
            spherical.phi += self.phi_delta * self.damping_factor;
        } else {
            spherical.theta += self.theta_delta;
            spherical.phi += self.phi_delta;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(POLE_EPSILON, std::f32::consts::PI - POLE_EPSILON);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        let previous = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.target = self.target;

        if self.enable_damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > 1e-10
    }

    #[cfg(test)]
    fn distance(&self, camera: &PerspectiveCamera) -> f32 {
        camera.position.distance(self.target)
    }

    #[cfg(test)]
    fn polar_angle(&self, camera: &PerspectiveCamera) -> f32 {
        Spherical::from_offset(camera.position - self.target).phi
    }
}
