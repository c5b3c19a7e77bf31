///! DHMZ radar camera module
///!
///! Rolling 25-frame acquisition from vrijeme.hr, validator-driven cache
///! invalidation, and animated composite assembly.
///!
///! ## Main Components
///! - `FrameWindow`: ordered store of per-frame cache metadata and bitmaps
///! - `RadarCamera`: single-flight cached retrieval entry point
///! - `Compositor`: animated WebP/GIF assembly with per-frame durations

mod camera;
mod compositor;
mod frames;
mod marker;
mod refresh;

pub use camera::{RadarCamera, RADAR_MAP_URL_ANIM, RADAR_MAP_URL_STATIC};
pub use compositor::{Compositor, OutputFormat};
pub use frames::{weak_etag_match, FrameSlot, FrameWindow, FRAME_COUNT};
pub use marker::LocationMarker;
