use glam::{Vec3, Vec4};
use std::fmt;
use std::time::Instant;

use crate::config::SectionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaneId(pub(crate) u64);

impl fmt::Display for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plane#{}", self.0)
    }
}

/// A user-placed clipping plane. Points with a negative signed distance are cut away.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionPlane {
    pub id: PlaneId,
    pub origin: Vec3,
    pub normal: Vec3,
    pub size: f32,
    pub color: [f32; 3],
    pub opacity: f32,
    pub enabled: bool,
    pub created_at: Instant,
}

impl SectionPlane {
    pub fn new(id: PlaneId, origin: Vec3, normal: Vec3, style: &SectionConfig, created_at: Instant) -> Self {
        Self {
            id,
            origin,
            normal: normal.normalize_or_zero(),
            size: style.plane_size,
            color: style.color,
            opacity: style.opacity,
            enabled: true,
            created_at,
        }
    }

    /// `(n, d)` such that `n·p + d` is the signed distance of `p`.
    pub fn equation(&self) -> Vec4 {
        self.normal.extend(-self.normal.dot(self.origin))
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point - self.origin)
    }

    /// Orthonormal in-plane axes.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let helper = if self.normal.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
        let u = helper.cross(self.normal).normalize_or_zero();
        let v = self.normal.cross(u);
        (u, v)
    }

    /// Corners of the visible square, counter-clockwise seen from the normal side.
    pub fn quad_corners(&self) -> [Vec3; 4] {
        let (u, v) = self.basis();
        let half = self.size * 0.5;
        [
            self.origin - u * half - v * half,
            self.origin + u * half - v * half,
            self.origin + u * half + v * half,
            self.origin - u * half + v * half,
        ]
    }
}
