use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

use crate::config::CameraPoseConfig;

const DEFAULT_UP: Vec3 = Vec3::Y;
const MIN_POLAR: f32 = 0.01;

/// Perspective camera shared by the viewer modes.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far }
    }

    pub fn from_pose(pose: &CameraPoseConfig) -> Self {
        Self::new(pose.eye, pose.target, pose.fov_degrees.to_radians(), pose.near, pose.far)
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.position = eye;
        self.target = target;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        let aspect = if viewport.height > 0 { viewport.width as f32 / viewport.height as f32 } else { 1.0 };
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// World-space ray from the camera through a screen-space position (pixels, origin top-left).
    pub fn screen_ray(&self, screen: Vec2, viewport: PhysicalSize<u32>) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / viewport.width as f32) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / viewport.height as f32);
        let clip = Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let inv_view_proj = self.view_projection(viewport).inverse();
        let world = inv_view_proj * clip;
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        let dir = ((world.truncate() / world.w) - self.position).normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        Some((self.position, dir))
    }

    pub fn project_point(&self, point: Vec3, viewport: PhysicalSize<u32>) -> Option<Vec2> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * viewport.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * viewport.height as f32;
        Some(Vec2::new(x, y))
    }
}

/// Orbit state around a target. `polar_radians` is measured from the up axis, so zero looks
/// straight down and π/2 sits on the horizon.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub radius: f32,
    pub azimuth_radians: f32,
    pub polar_radians: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, radius: f32) -> Self {
        Self { target, radius: radius.max(0.01), azimuth_radians: 0.0, polar_radians: std::f32::consts::FRAC_PI_4 }
    }

    pub fn from_look_at(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(0.01);
        let polar = (offset.y / radius).clamp(-1.0, 1.0).acos();
        let azimuth = offset.x.atan2(offset.z);
        Self { target, radius, azimuth_radians: azimuth, polar_radians: polar }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_p, cos_p) = self.polar_radians.sin_cos();
        let (sin_a, cos_a) = self.azimuth_radians.sin_cos();
        self.target + Vec3::new(self.radius * sin_p * sin_a, self.radius * cos_p, self.radius * sin_p * cos_a)
    }

    pub fn apply_to(&self, camera: &mut Camera3D) {
        camera.look_at(self.eye(), self.target);
    }

    pub fn orbit(&mut self, delta: Vec2, max_polar: f32) {
        self.azimuth_radians -= delta.x;
        self.polar_radians = (self.polar_radians - delta.y).clamp(MIN_POLAR, max_polar.max(MIN_POLAR));
    }

    pub fn zoom(&mut self, factor: f32) {
        self.radius = (self.radius * factor).clamp(0.1, 10_000.0);
    }
}

/// Pointer-driven orbit controls: left-drag orbits, the wheel zooms.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub orbit: OrbitCamera,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_step: f32,
    pub enabled: bool,
    dragging: bool,
    last_cursor: Option<Vec2>,
}

impl OrbitControls {
    pub fn new(camera: &Camera3D, max_polar_angle: f32) -> Self {
        let mut orbit = OrbitCamera::from_look_at(camera.position, camera.target);
        orbit.polar_radians = orbit.polar_radians.min(max_polar_angle);
        Self {
            orbit,
            max_polar_angle,
            rotate_speed: 0.005,
            zoom_step: 0.9,
            enabled: true,
            dragging: false,
            last_cursor: None,
        }
    }

    pub fn set_look_at(&mut self, camera: &mut Camera3D, eye: Vec3, target: Vec3) {
        self.orbit = OrbitCamera::from_look_at(eye, target);
        self.orbit.polar_radians = self.orbit.polar_radians.min(self.max_polar_angle);
        self.orbit.apply_to(camera);
    }

    pub fn begin_drag(&mut self, cursor: Vec2) {
        self.dragging = true;
        self.last_cursor = Some(cursor);
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
        self.last_cursor = None;
    }

    /// Returns true when the camera moved.
    pub fn cursor_moved(&mut self, camera: &mut Camera3D, cursor: Vec2) -> bool {
        let previous = self.last_cursor.replace(cursor);
        if !self.enabled || !self.dragging {
            return false;
        }
        let Some(previous) = previous else {
            return false;
        };
        let delta = (cursor - previous) * self.rotate_speed;
        if delta == Vec2::ZERO {
            return false;
        }
        self.orbit.orbit(delta, self.max_polar_angle);
        self.orbit.apply_to(camera);
        true
    }

    pub fn wheel(&mut self, camera: &mut Camera3D, delta: f32) {
        if !self.enabled || delta == 0.0 {
            return;
        }
        let factor = if delta > 0.0 { self.zoom_step } else { 1.0 / self.zoom_step };
        self.orbit.zoom(factor);
        self.orbit.apply_to(camera);
    }
}
