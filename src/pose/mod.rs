#[cfg(feature = "desktop")]
pub mod detector;
pub mod extractor;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod preprocess;
pub mod select;

#[cfg(feature = "desktop")]
pub use detector::{MoveNetExtractor, PoseDetector};
pub use extractor::{BlockingSlot, KeypointExtractor};
pub use keypoint::{Keypoint, KeypointIndex, NamedKeypoint, Pose};
#[cfg(feature = "desktop")]
pub use preprocess::preprocess_for_movenet;
pub use select::{bbox_from_keypoints, select_person, BBox, PersonSelection};
