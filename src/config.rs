use anyhow::{Context, Result};
use glam::Vec3;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "ViewerConfig::default_initial_mode")]
    pub initial_mode: String,
    #[serde(default = "ViewerConfig::default_input_bindings")]
    pub input_bindings: PathBuf,
    #[serde(default = "ViewerConfig::default_clear_color")]
    pub clear_color: [f32; 4],
}

/// Timing and distance gates for the section gesture state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "GestureConfig::default_arm_delay_ms")]
    pub arm_delay_ms: u64,
    #[serde(default = "GestureConfig::default_commit_delay_ms")]
    pub commit_delay_ms: u64,
    #[serde(default = "GestureConfig::default_move_threshold_px")]
    pub move_threshold_px: f32,
    #[serde(default = "GestureConfig::default_double_click_ms")]
    pub double_click_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    #[serde(default = "SectionConfig::default_plane_size")]
    pub plane_size: f32,
    #[serde(default = "SectionConfig::default_color")]
    pub color: [f32; 3],
    #[serde(default = "SectionConfig::default_opacity")]
    pub opacity: f32,
    #[serde(default = "SectionConfig::default_max_planes")]
    pub max_planes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MaterialConfig {
    pub color: [f32; 3],
    #[serde(default = "MaterialConfig::default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub double_sided: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeStyleConfig {
    #[serde(default = "EdgeStyleConfig::default_style_name")]
    pub style_name: String,
    #[serde(default = "EdgeStyleConfig::default_fill")]
    pub fill: MaterialConfig,
    #[serde(default = "EdgeStyleConfig::default_line")]
    pub line: MaterialConfig,
    #[serde(default = "EdgeStyleConfig::default_outline")]
    pub outline: MaterialConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraPoseConfig {
    pub eye: Vec3,
    pub target: Vec3,
    #[serde(default = "CameraPoseConfig::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "CameraPoseConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraPoseConfig::default_far")]
    pub far: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectionConfig {
    #[serde(default = "InspectionConfig::default_models")]
    pub models: Vec<PathBuf>,
    #[serde(default = "InspectionConfig::default_model_offset")]
    pub model_offset: Vec3,
    #[serde(default = "InspectionConfig::default_camera")]
    pub camera: CameraPoseConfig,
    #[serde(default = "InspectionConfig::default_max_polar_angle")]
    pub max_polar_angle: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub site_model: Option<PathBuf>,
    #[serde(default = "ProjectConfig::default_camera")]
    pub camera: CameraPoseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityConfig {
    #[serde(default = "CityConfig::default_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub section: SectionConfig,
    #[serde(default)]
    pub edges: EdgeStyleConfig,
    #[serde(default)]
    pub inspection: InspectionConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub city: CityConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
    pub initial_mode: Option<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Sitelens".to_string(), width: 1280, height: 720, vsync: true, fullscreen: false }
    }
}

impl ViewerConfig {
    fn default_initial_mode() -> String {
        "project".to_string()
    }

    fn default_input_bindings() -> PathBuf {
        PathBuf::from("config/input.json")
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.93, 0.93, 0.93, 1.0]
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_mode: Self::default_initial_mode(),
            input_bindings: Self::default_input_bindings(),
            clear_color: Self::default_clear_color(),
        }
    }
}

impl GestureConfig {
    const fn default_arm_delay_ms() -> u64 {
        500
    }

    const fn default_commit_delay_ms() -> u64 {
        1000
    }

    const fn default_move_threshold_px() -> f32 {
        5.0
    }

    const fn default_double_click_ms() -> u64 {
        300
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            arm_delay_ms: Self::default_arm_delay_ms(),
            commit_delay_ms: Self::default_commit_delay_ms(),
            move_threshold_px: Self::default_move_threshold_px(),
            double_click_ms: Self::default_double_click_ms(),
        }
    }
}

impl SectionConfig {
    const fn default_plane_size() -> f32 {
        40.0
    }

    const fn default_color() -> [f32; 3] {
        [0.0, 0.0, 0.0]
    }

    const fn default_opacity() -> f32 {
        0.3
    }

    const fn default_max_planes() -> usize {
        8
    }
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            plane_size: Self::default_plane_size(),
            color: Self::default_color(),
            opacity: Self::default_opacity(),
            max_planes: Self::default_max_planes(),
        }
    }
}

impl MaterialConfig {
    const fn default_opacity() -> f32 {
        1.0
    }
}

impl EdgeStyleConfig {
    fn default_style_name() -> String {
        "thick".to_string()
    }

    const fn default_fill() -> MaterialConfig {
        MaterialConfig { color: [1.0, 1.0, 1.0], opacity: 1.0, double_sided: true }
    }

    const fn default_line() -> MaterialConfig {
        MaterialConfig { color: [1.0, 0.0, 0.0], opacity: 1.0, double_sided: false }
    }

    const fn default_outline() -> MaterialConfig {
        MaterialConfig { color: [1.0, 0.0, 0.0], opacity: 0.5, double_sided: false }
    }
}

impl Default for EdgeStyleConfig {
    fn default() -> Self {
        Self {
            style_name: Self::default_style_name(),
            fill: Self::default_fill(),
            line: Self::default_line(),
            outline: Self::default_outline(),
        }
    }
}

impl CameraPoseConfig {
    const fn default_fov_degrees() -> f32 {
        45.0
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        3000.0
    }
}

impl InspectionConfig {
    fn default_models() -> Vec<PathBuf> {
        vec![PathBuf::from("model/1.frag.json"), PathBuf::from("model/2.frag.json")]
    }

    fn default_model_offset() -> Vec3 {
        Vec3::new(0.0, 67.0, 0.0)
    }

    fn default_camera() -> CameraPoseConfig {
        CameraPoseConfig {
            eye: Vec3::new(-300.0, 175.0, -300.0),
            target: Vec3::new(-20.0, 0.0, 0.0),
            fov_degrees: CameraPoseConfig::default_fov_degrees(),
            near: CameraPoseConfig::default_near(),
            far: CameraPoseConfig::default_far(),
        }
    }

    fn default_max_polar_angle() -> f32 {
        std::f32::consts::FRAC_PI_2
    }
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            models: Self::default_models(),
            model_offset: Self::default_model_offset(),
            camera: Self::default_camera(),
            max_polar_angle: Self::default_max_polar_angle(),
        }
    }
}

impl ProjectConfig {
    fn default_camera() -> CameraPoseConfig {
        CameraPoseConfig {
            eye: Vec3::new(-125.0, 30.0, -30.0),
            target: Vec3::new(25.0, 0.0, -30.0),
            fov_degrees: 35.0,
            near: 0.1,
            far: 3000.0,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { site_model: None, camera: Self::default_camera() }
    }
}

impl CityConfig {
    fn default_url() -> String {
        "https://ion.cesium.com/stories/viewer/?id=8065271b-29f0-4bd1-86db-c8f88820fbcb".to_string()
    }
}

impl Default for CityConfig {
    fn default() -> Self {
        Self { url: Self::default_url() }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = ?err, "config load failed, falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
        if let Some(mode) = overrides.initial_mode.as_ref() {
            self.viewer.initial_mode = mode.clone();
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.vsync.is_none() && self.initial_mode.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.vsync.is_some() {
            fields.push("vsync");
        }
        if self.initial_mode.is_some() {
            fields.push("initial_mode");
        }
        fields
    }
}
