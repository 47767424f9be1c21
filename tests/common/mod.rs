#![allow(dead_code)]

use glam::Vec3;
use serde_json::json;
use sitelens::config::{AppConfig, CameraPoseConfig};
use sitelens::geometry::{ElementId, FragmentMesh, MemoryModelSource};

const BOX_INDICES: [u32; 36] = [
    0, 2, 1, 0, 3, 2, 4, 5, 6, 4, 6, 7, 0, 1, 5, 0, 5, 4, 3, 7, 6, 3, 6, 2, 0, 4, 7, 0, 7, 3, 1, 2, 6, 1, 6, 5,
];

fn box_corners(min: Vec3, max: Vec3) -> [[f32; 3]; 8] {
    [
        [min.x, min.y, min.z],
        [max.x, min.y, min.z],
        [max.x, max.y, min.z],
        [min.x, max.y, min.z],
        [min.x, min.y, max.z],
        [max.x, min.y, max.z],
        [max.x, max.y, max.z],
        [min.x, max.y, max.z],
    ]
}

pub fn block(min: Vec3, max: Vec3, element: ElementId) -> FragmentMesh {
    let positions = box_corners(min, max).iter().map(|p| Vec3::from_array(*p)).collect();
    FragmentMesh::new(positions, BOX_INDICES.to_vec(), vec![element; 12], [0.8, 0.8, 0.8, 1.0])
}

/// Single-fragment model file holding one box element.
pub fn block_model(model: &str, fragment: &str, min: Vec3, max: Vec3, element: ElementId, category: &str) -> Vec<u8> {
    let doc = json!({
        "model": model,
        "fragments": [{
            "id": fragment,
            "positions": box_corners(min, max),
            "indices": &BOX_INDICES[..],
            "element_ids": vec![element; 12],
        }],
        "elements": { element.to_string(): category },
    });
    serde_json::to_vec(&doc).expect("serialize model")
}

/// A wall standing in front of the inspection camera plus a slab under it, as two model files.
pub fn building_source() -> MemoryModelSource {
    MemoryModelSource::new()
        .with_file(
            "model/1.frag.json",
            block_model("wall", "f0", Vec3::new(-10.0, 0.0, -1.0), Vec3::new(10.0, 10.0, 1.0), 1, "IfcWallStandardCase"),
        )
        .with_file(
            "model/2.frag.json",
            block_model("slab", "f0", Vec3::new(-10.0, -1.0, -10.0), Vec3::new(10.0, 0.0, 10.0), 2, "IFCSLAB"),
        )
}

/// Defaults with an inspection camera looking straight at the wall's front face.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.inspection.model_offset = Vec3::ZERO;
    config.inspection.camera = CameraPoseConfig {
        eye: Vec3::new(0.0, 5.0, 30.0),
        target: Vec3::new(0.0, 5.0, 0.0),
        fov_degrees: 45.0,
        near: 0.1,
        far: 1000.0,
    };
    config
}
