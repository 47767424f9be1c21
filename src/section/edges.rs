//! Cut-edge overlays derived from the live section planes.
//!
//! Every recomputation is a pure function of the bound fragments and the plane set: bindings and
//! planes are walked in key order and triangles in index order, so two passes over the same input
//! produce byte-identical buffers.

use glam::{Vec3, Vec4};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use super::plane::{PlaneId, SectionPlane};
use crate::config::{EdgeStyleConfig, MaterialConfig};
use crate::error::SectionError;
use crate::geometry::{ElementId, FragmentId, FragmentIdMap, SharedMesh};
use crate::renderer::ColorVertex;

const WELD_EPSILON: f32 = 1e-4;

fn vertex(position: Vec3, material: &MaterialConfig) -> ColorVertex {
    let [r, g, b] = material.color;
    ColorVertex::new(position, [r, g, b, material.opacity])
}

/// Generated overlay buffers. `lines` and `outlines` are line lists; `fills` is a triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeGeometry {
    pub lines: Vec<ColorVertex>,
    pub outlines: Vec<ColorVertex>,
    pub fills: Vec<ColorVertex>,
}

impl EdgeGeometry {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.outlines.is_empty() && self.fills.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.lines.len() / 2
    }

    /// Raw bytes of all three buffers, in upload order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for buffer in [&self.lines, &self.outlines, &self.fills] {
            bytes.extend_from_slice(bytemuck::cast_slice(buffer));
        }
        bytes
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.outlines.clear();
        self.fills.clear();
    }
}

#[derive(Debug, Clone)]
struct Binding {
    elements: BTreeSet<ElementId>,
    mesh: SharedMesh,
}

/// Outcome of one recomputation pass.
#[derive(Debug, Default)]
pub struct RecomputeReport {
    pub fragments: usize,
    pub segments: usize,
    pub errors: Vec<SectionError>,
}

/// A named overlay style (fill, line and outline materials) bound to fragment element subsets.
#[derive(Debug)]
pub struct EdgeOverlayStyle {
    name: String,
    fill: MaterialConfig,
    line: MaterialConfig,
    outline: MaterialConfig,
    bindings: BTreeMap<FragmentId, Binding>,
    affected: BTreeMap<PlaneId, BTreeSet<FragmentId>>,
    geometry: EdgeGeometry,
}

impl EdgeOverlayStyle {
    pub fn new(name: impl Into<String>, fill: MaterialConfig, line: MaterialConfig, outline: MaterialConfig) -> Self {
        Self {
            name: name.into(),
            fill,
            line,
            outline,
            bindings: BTreeMap::new(),
            affected: BTreeMap::new(),
            geometry: EdgeGeometry::default(),
        }
    }

    pub fn from_config(config: &EdgeStyleConfig) -> Self {
        Self::new(config.style_name.clone(), config.fill, config.line, config.outline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fill(&self) -> &MaterialConfig {
        &self.fill
    }

    /// Adds `elements` of `fragment` to the style. Repeated binds merge their element sets.
    pub fn bind(&mut self, fragment: FragmentId, mesh: SharedMesh, elements: &BTreeSet<ElementId>) {
        let binding = self.bindings.entry(fragment).or_insert_with(|| Binding { elements: BTreeSet::new(), mesh });
        binding.elements.extend(elements.iter().copied());
    }

    pub fn bound_fragments(&self) -> FragmentIdMap {
        self.bindings.iter().map(|(id, binding)| (id.clone(), binding.elements.clone())).collect()
    }

    pub fn is_bound(&self) -> bool {
        !self.bindings.is_empty()
    }

    /// Fragments each plane currently cuts.
    pub fn affected(&self) -> &BTreeMap<PlaneId, BTreeSet<FragmentId>> {
        &self.affected
    }

    pub fn geometry(&self) -> &EdgeGeometry {
        &self.geometry
    }

    /// Drops bindings and generated geometry.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.affected.clear();
        self.geometry.clear();
    }

    /// Regenerates every cut edge from scratch. A fragment whose mesh fails validation is
    /// logged and skipped; the remaining fragments are still processed.
    pub fn recompute(&mut self, planes: &BTreeMap<PlaneId, SectionPlane>) -> RecomputeReport {
        let mut report = RecomputeReport::default();
        self.geometry.clear();
        self.affected.clear();

        let enabled: Vec<&SectionPlane> = planes.values().filter(|plane| plane.enabled).collect();
        let equations: Vec<(PlaneId, Vec4)> = enabled.iter().map(|plane| (plane.id, plane.equation())).collect();

        for (fragment, binding) in &self.bindings {
            if let Err(reason) = binding.mesh.validate() {
                let err = SectionError::MalformedMesh { fragment: fragment.clone(), reason };
                tracing::warn!(style = %self.name, error = %err, "skipping fragment during edge recompute");
                report.errors.push(err);
                continue;
            }
            report.fragments += 1;
            for plane in &enabled {
                let others: Vec<Vec4> =
                    equations.iter().filter(|(id, _)| *id != plane.id).map(|(_, eq)| *eq).collect();
                let segments = slice_binding(binding, plane, &others);
                if segments.is_empty() {
                    continue;
                }
                self.affected.entry(plane.id).or_default().insert(fragment.clone());
                report.segments += segments.len();
                let materials = OverlayMaterials { line: &self.line, outline: &self.outline, fill: &self.fill };
                emit(&mut self.geometry, &materials, &segments, &others);
            }
        }

        tracing::debug!(
            style = %self.name,
            planes = enabled.len(),
            fragments = report.fragments,
            segments = report.segments,
            "edge overlay recomputed"
        );
        report
    }
}

struct OverlayMaterials<'a> {
    line: &'a MaterialConfig,
    outline: &'a MaterialConfig,
    fill: &'a MaterialConfig,
}

fn emit(geometry: &mut EdgeGeometry, materials: &OverlayMaterials<'_>, segments: &[(Vec3, Vec3)], others: &[Vec4]) {
    for (a, b) in segments {
        geometry.lines.push(vertex(*a, materials.line));
        geometry.lines.push(vertex(*b, materials.line));
    }
    for contour in chain_segments(segments) {
        let closed = contour.len() > 3 && contour[0].distance(contour[contour.len() - 1]) < WELD_EPSILON;
        for pair in contour.windows(2) {
            geometry.outlines.push(vertex(pair[0], materials.outline));
            geometry.outlines.push(vertex(pair[1], materials.outline));
        }
        if !closed {
            continue;
        }
        let ring = &contour[..contour.len() - 1];
        let centroid = ring.iter().copied().sum::<Vec3>() / ring.len() as f32;
        for i in 0..ring.len() {
            let mut polygon = vec![centroid, ring[i], ring[(i + 1) % ring.len()]];
            for eq in others {
                polygon = clip_polygon(&polygon, *eq);
                if polygon.len() < 3 {
                    break;
                }
            }
            // Re-fan the clipped polygon so the buffer stays a plain triangle list.
            for k in 1..polygon.len().saturating_sub(1) {
                for p in [polygon[0], polygon[k], polygon[k + 1]] {
                    geometry.fills.push(vertex(p, materials.fill));
                }
            }
        }
    }
}

fn slice_binding(binding: &Binding, plane: &SectionPlane, others: &[Vec4]) -> Vec<(Vec3, Vec3)> {
    let mesh = &binding.mesh;
    let mut segments = Vec::new();
    for tri in 0..mesh.triangle_count() {
        let (corners, element) = mesh.triangle(tri);
        if !binding.elements.contains(&element) {
            continue;
        }
        let Some((a, b)) = triangle_plane_segment(corners, plane) else {
            continue;
        };
        if let Some(clipped) = clip_segment(a, b, others) {
            segments.push(clipped);
        }
    }
    segments
}

/// Intersection of a triangle with the plane as a segment. Vertices on the plane count as being
/// on the kept side, so every crossing yields exactly two points.
fn triangle_plane_segment(corners: [Vec3; 3], plane: &SectionPlane) -> Option<(Vec3, Vec3)> {
    let d = corners.map(|c| plane.signed_distance(c));
    let mut points: [Vec3; 2] = [Vec3::ZERO; 2];
    let mut count = 0;
    for (i, j) in [(0, 1), (1, 2), (2, 0)] {
        let (da, db) = (d[i], d[j]);
        if (da < 0.0) == (db < 0.0) {
            continue;
        }
        let t = da / (da - db);
        if count < 2 {
            points[count] = corners[i] + (corners[j] - corners[i]) * t;
        }
        count += 1;
    }
    if count != 2 || points[0].distance_squared(points[1]) <= WELD_EPSILON * WELD_EPSILON {
        return None;
    }
    Some((points[0], points[1]))
}

fn clip_segment(mut a: Vec3, mut b: Vec3, planes: &[Vec4]) -> Option<(Vec3, Vec3)> {
    for eq in planes {
        let da = eq.truncate().dot(a) + eq.w;
        let db = eq.truncate().dot(b) + eq.w;
        match (da < 0.0, db < 0.0) {
            (true, true) => return None,
            (false, false) => {}
            (true, false) => a = a + (b - a) * (da / (da - db)),
            (false, true) => b = a + (b - a) * (da / (da - db)),
        }
    }
    Some((a, b))
}

/// Sutherland–Hodgman against the kept half-space of `eq`.
fn clip_polygon(polygon: &[Vec3], eq: Vec4) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, current) in polygon.iter().enumerate() {
        let next = polygon[(i + 1) % polygon.len()];
        let dc = eq.truncate().dot(*current) + eq.w;
        let dn = eq.truncate().dot(next) + eq.w;
        if dc >= 0.0 {
            out.push(*current);
        }
        if (dc < 0.0) != (dn < 0.0) {
            out.push(*current + (next - *current) * (dc / (dc - dn)));
        }
    }
    out
}

/// Joins segments sharing endpoints into polylines. A closed loop repeats its first point last.
fn chain_segments(segments: &[(Vec3, Vec3)]) -> Vec<Vec<Vec3>> {
    let mut remaining: Vec<(Vec3, Vec3)> = segments.to_vec();
    let mut contours = Vec::new();
    while !remaining.is_empty() {
        let first = remaining.remove(0);
        let mut contour = vec![first.0, first.1];
        loop {
            let start = contour[0];
            let end = contour[contour.len() - 1];
            let found = remaining.iter().position(|(a, b)| {
                a.distance(end) < WELD_EPSILON
                    || b.distance(end) < WELD_EPSILON
                    || a.distance(start) < WELD_EPSILON
                    || b.distance(start) < WELD_EPSILON
            });
            let Some(index) = found else {
                break;
            };
            let (a, b) = remaining.remove(index);
            if a.distance(end) < WELD_EPSILON {
                contour.push(b);
            } else if b.distance(end) < WELD_EPSILON {
                contour.push(a);
            } else if a.distance(start) < WELD_EPSILON {
                contour.insert(0, b);
            } else {
                contour.insert(0, a);
            }
        }
        contours.push(contour);
    }
    contours
}

/// Registry of named overlay styles, recomputed together.
#[derive(Debug, Default)]
pub struct EdgeOverlays {
    styles: BTreeMap<String, EdgeOverlayStyle>,
}

impl EdgeOverlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, style: EdgeOverlayStyle) -> &mut EdgeOverlayStyle {
        match self.styles.entry(style.name().to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(style);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(style),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EdgeOverlayStyle> {
        self.styles.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EdgeOverlayStyle> {
        self.styles.get_mut(name)
    }

    pub fn styles(&self) -> impl Iterator<Item = &EdgeOverlayStyle> {
        self.styles.values()
    }

    pub fn update(&mut self, planes: &BTreeMap<PlaneId, SectionPlane>) -> Vec<SectionError> {
        let mut errors = Vec::new();
        for style in self.styles.values_mut() {
            errors.extend(style.recompute(planes).errors);
        }
        errors
    }

    pub fn clear(&mut self) {
        for style in self.styles.values_mut() {
            style.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionConfig;
    use crate::geometry::test_support::box_mesh;
    use crate::geometry::FragmentMesh;
    use std::sync::Arc;
    use std::time::Instant;

    fn plane(id: u64, origin: Vec3, normal: Vec3) -> SectionPlane {
        SectionPlane::new(PlaneId(id), origin, normal, &SectionConfig::default(), Instant::now())
    }

    fn bound_style() -> EdgeOverlayStyle {
        let mut style = EdgeOverlayStyle::from_config(&EdgeStyleConfig::default());
        let mesh = Arc::new(box_mesh(Vec3::ZERO, Vec3::splat(2.0), 3));
        style.bind(FragmentId::from("m/box"), mesh, &BTreeSet::from([3]));
        style
    }

    #[test]
    fn horizontal_cut_through_box_yields_closed_square() {
        let mut style = bound_style();
        let planes: BTreeMap<_, _> = [(PlaneId(1), plane(1, Vec3::splat(1.0), Vec3::Y))].into_iter().collect();
        let report = style.recompute(&planes);
        assert!(report.errors.is_empty());
        // Four side faces, two triangles each, all crossing y = 1.
        assert_eq!(style.geometry().segment_count(), 8);
        assert!(!style.geometry().fills.is_empty(), "closed contour gets a cap");
        assert!(style.geometry().lines.iter().all(|v| (v.position[1] - 1.0).abs() < 1e-5));
        assert_eq!(style.affected().get(&PlaneId(1)).map(BTreeSet::len), Some(1));
    }

    #[test]
    fn recompute_is_byte_identical() {
        let mut style = bound_style();
        let planes: BTreeMap<_, _> = [
            (PlaneId(1), plane(1, Vec3::splat(1.0), Vec3::Y)),
            (PlaneId(2), plane(2, Vec3::splat(0.5), Vec3::new(1.0, 0.0, 1.0))),
        ]
        .into_iter()
        .collect();
        style.recompute(&planes);
        let first = style.geometry().to_bytes();
        style.recompute(&planes);
        assert_eq!(first, style.geometry().to_bytes());
        assert!(!first.is_empty());
    }

    #[test]
    fn unbound_elements_and_disabled_planes_produce_nothing() {
        let mut style = EdgeOverlayStyle::from_config(&EdgeStyleConfig::default());
        let mesh = Arc::new(box_mesh(Vec3::ZERO, Vec3::splat(2.0), 3));
        style.bind(FragmentId::from("m/box"), mesh, &BTreeSet::from([99]));
        let mut cut = plane(1, Vec3::splat(1.0), Vec3::Y);
        let planes: BTreeMap<_, _> = [(PlaneId(1), cut.clone())].into_iter().collect();
        style.recompute(&planes);
        assert!(style.geometry().is_empty());

        let mut style = bound_style();
        cut.enabled = false;
        let planes: BTreeMap<_, _> = [(PlaneId(1), cut)].into_iter().collect();
        style.recompute(&planes);
        assert!(style.geometry().is_empty());
        assert!(style.affected().is_empty());
    }

    #[test]
    fn malformed_fragment_does_not_abort_the_pass() {
        let mut style = bound_style();
        let broken = FragmentMesh::new(vec![Vec3::ZERO, Vec3::X], vec![0, 1, 5], vec![3], [1.0; 4]);
        style.bind(FragmentId::from("a/broken"), Arc::new(broken), &BTreeSet::from([3]));
        let planes: BTreeMap<_, _> = [(PlaneId(1), plane(1, Vec3::splat(1.0), Vec3::Y))].into_iter().collect();
        let report = style.recompute(&planes);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(&report.errors[0], SectionError::MalformedMesh { fragment, .. } if fragment.as_str() == "a/broken"));
        assert_eq!(style.geometry().segment_count(), 8);
    }

    #[test]
    fn second_plane_trims_first_plane_edges() {
        let mut style = bound_style();
        let single: BTreeMap<_, _> = [(PlaneId(1), plane(1, Vec3::splat(1.0), Vec3::Y))].into_iter().collect();
        style.recompute(&single);
        let full = style.geometry().lines.len();

        let mut both = single.clone();
        both.insert(PlaneId(2), plane(2, Vec3::splat(1.0), Vec3::X));
        style.recompute(&both);
        let kept_on_first: Vec<_> = style
            .geometry()
            .lines
            .iter()
            .filter(|v| (v.position[1] - 1.0).abs() < 1e-5)
            .collect();
        assert!(kept_on_first.iter().all(|v| v.position[0] >= 1.0 - 1e-4));
        assert!(full > 0);
    }
}
