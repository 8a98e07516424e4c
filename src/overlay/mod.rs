//! Pose → garment rectangle → canvas pipeline.

pub mod composite;
pub mod mapper;
pub mod placement;
pub mod smooth;
pub mod status;

pub use composite::Compositor;
pub use mapper::{to_canvas_space, CoordinateMapper, ScalingMode, VideoPlacement, ViewportGeometry};
pub use placement::{OverlayRect, Placement, PlacementBranch, PlacementError, PlacementSolver};
pub use smooth::{smooth, SmoothedTransform, Smoother};
pub use status::Status;
