//! Wall detection, room polygonization and the v1/v2 detection contract
//! for raster blueprint images.
//!
//! [`room_extractor`] is the deterministic geometric core; everything
//! else in this crate exists to feed it walls or to present its output.

pub mod config;
pub mod contract;
pub mod direct_detector;
pub mod error;
pub mod room_extractor;
pub mod types;
pub mod visualizer;
pub mod wall_detector;

pub use config::{DetectorConfig, ExtractorConfig};
pub use contract::{DetectionOptions, DetectionResponse, DetectionRouter, PipelineVersion};
pub use direct_detector::DirectRoomDetector;
pub use error::{DetectionError, Result};
pub use types::{BoundingBox, Canvas, Point, Room, ShapeType, Wall};
pub use wall_detector::WallDetector;
