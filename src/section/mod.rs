pub mod clipper;
pub mod edges;
pub mod indicator;
pub mod plane;

pub use clipper::{ClipperManager, GestureState};
pub use edges::{EdgeGeometry, EdgeOverlayStyle, EdgeOverlays, RecomputeReport};
pub use indicator::CountdownIndicator;
pub use plane::{PlaneId, SectionPlane};
