use glam::{Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

use super::{Aabb, ElementId, FragmentId, FragmentStore};
use crate::camera3d::Camera3D;

const EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub point: Vec3,
    /// Unit face normal, oriented towards the ray origin.
    pub normal: Vec3,
    pub distance: f32,
    pub fragment: FragmentId,
    pub element: ElementId,
}

/// Resolves a pointer position on the render target to the geometry under it.
pub trait PointerPicker {
    fn pick(&self, pointer: Vec2) -> Option<PickHit>;
}

/// Nearest-hit ray caster over a [`FragmentStore`]. Hidden elements are skipped, and so are hits
/// on the clipped side of any active section plane.
pub struct Raycaster<'a> {
    store: &'a FragmentStore,
    camera: &'a Camera3D,
    viewport: PhysicalSize<u32>,
    clip_planes: &'a [Vec4],
}

impl<'a> Raycaster<'a> {
    pub fn new(store: &'a FragmentStore, camera: &'a Camera3D, viewport: PhysicalSize<u32>) -> Self {
        Self { store, camera, viewport, clip_planes: &[] }
    }

    pub fn with_clip_planes(mut self, planes: &'a [Vec4]) -> Self {
        self.clip_planes = planes;
        self
    }

    pub fn cast(&self, origin: Vec3, dir: Vec3) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for (id, mesh) in self.store.meshes() {
            if mesh.validate().is_err() {
                continue;
            }
            let Some(bounds) = mesh.bounds else {
                continue;
            };
            let Some(entry) = ray_aabb_distance(origin, dir, &bounds) else {
                continue;
            };
            if best.as_ref().is_some_and(|hit| hit.distance < entry) {
                continue;
            }
            for tri in 0..mesh.triangle_count() {
                let (corners, element) = mesh.triangle(tri);
                if !self.store.is_visible(id, element) {
                    continue;
                }
                let Some(t) = ray_triangle(origin, dir, corners) else {
                    continue;
                };
                if best.as_ref().is_some_and(|hit| hit.distance <= t) {
                    continue;
                }
                let point = origin + dir * t;
                if self.is_clipped(point) {
                    continue;
                }
                let mut normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]).normalize_or_zero();
                if normal.dot(dir) > 0.0 {
                    normal = -normal;
                }
                best = Some(PickHit { point, normal, distance: t, fragment: id.clone(), element });
            }
        }
        best
    }

    fn is_clipped(&self, point: Vec3) -> bool {
        self.clip_planes.iter().any(|plane| plane.truncate().dot(point) + plane.w < 0.0)
    }
}

impl PointerPicker for Raycaster<'_> {
    fn pick(&self, pointer: Vec2) -> Option<PickHit> {
        let (origin, dir) = self.camera.screen_ray(pointer, self.viewport)?;
        self.cast(origin, dir)
    }
}

/// Slab test; returns the entry distance (zero when the origin is inside).
fn ray_aabb_distance(origin: Vec3, dir: Vec3, bounds: &Aabb) -> Option<f32> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        if d.abs() < 1e-6 {
            if o < bounds.min[axis] || o > bounds.max[axis] {
                return None;
            }
            continue;
        }
        let inv_d = 1.0 / d;
        let mut t1 = (bounds.min[axis] - o) * inv_d;
        let mut t2 = (bounds.max[axis] - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_max < t_min {
            return None;
        }
    }
    Some(t_min)
}

/// Möller–Trumbore; returns the ray parameter of a front or back face hit.
fn ray_triangle(origin: Vec3, dir: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = dir.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::test_support::box_mesh;
    use crate::geometry::FragmentIdMap;
    use std::collections::BTreeSet;

    fn two_boxes() -> FragmentStore {
        let mut store = FragmentStore::new();
        store.insert_fragment("m", FragmentId::new("m", "near"), box_mesh(Vec3::new(-1.0, -1.0, 2.0), Vec3::new(1.0, 1.0, 3.0), 1));
        store.insert_fragment("m", FragmentId::new("m", "far"), box_mesh(Vec3::new(-1.0, -1.0, -3.0), Vec3::new(1.0, 1.0, -2.0), 2));
        store
    }

    #[test]
    fn picks_nearest_face_with_normal_towards_viewer() {
        let store = two_boxes();
        let camera = Camera3D::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 45f32.to_radians(), 0.1, 100.0);
        let raycaster = Raycaster::new(&store, &camera, PhysicalSize::new(800, 600));
        let hit = raycaster.pick(Vec2::new(400.0, 300.0)).expect("hit");
        assert_eq!(hit.fragment, FragmentId::new("m", "near"));
        assert!((hit.point.z - 3.0).abs() < 1e-4);
        assert!(hit.normal.abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn hidden_elements_and_empty_space_are_not_picked() {
        let mut store = two_boxes();
        let hidden: FragmentIdMap = [(FragmentId::new("m", "near"), BTreeSet::from([1]))].into_iter().collect();
        store.set_visibility(&hidden, false);
        let camera = Camera3D::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 45f32.to_radians(), 0.1, 100.0);
        let raycaster = Raycaster::new(&store, &camera, PhysicalSize::new(800, 600));
        let hit = raycaster.pick(Vec2::new(400.0, 300.0)).expect("hit behind hidden box");
        assert_eq!(hit.fragment, FragmentId::new("m", "far"));
        assert!(raycaster.pick(Vec2::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn clipped_hits_fall_through() {
        let store = two_boxes();
        let planes = [Vec4::new(0.0, 0.0, -1.0, 0.0)];
        let hit = Raycaster::new(&store, &Camera3D::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 0.8, 0.1, 100.0), PhysicalSize::new(800, 600))
            .with_clip_planes(&planes)
            .cast(Vec3::new(0.0, 0.0, 10.0), -Vec3::Z)
            .expect("hit far box");
        assert_eq!(hit.fragment, FragmentId::new("m", "far"));
    }
}
