//! Region-of-interest detection client.
//!
//! A user draws a polygon on a map; the polygon (plus an optional satellite
//! snapshot of it) is sent to a remote detection service; the detections
//! that come back are normalized and rendered as map markers, a ranked list,
//! bounding-box overlays on the displayed image, and a confidence chart.
//!
//! # Pipeline
//!
//! 1. `session::Session::extract_polygon` reads the active region.
//! 2. `capture::CaptureAdapter` renders a satellite snapshot of it.
//! 3. `client::DetectionClient` posts the request, with a single fallback
//!    to the legacy endpoint on 404.
//! 4. `normalize::normalize_all` resolves the record shape variants.
//! 5. `render::Renderer` replaces whatever was on screen.
//!
//! The map toolkit is abstracted by `map::MapWidget`; `map::HeadlessMap`
//! implements it in memory for the command-line tools and tests.

pub mod capture;
pub mod client;
pub mod config;
pub mod export;
pub mod geo;
pub mod map;
pub mod normalize;
pub mod render;
pub mod session;

pub use capture::{CaptureAdapter, Snapshot};
pub use client::{DetectError, DetectionClient, DetectionReply, DetectionResponse, DetectionService, Endpoint};
pub use config::ScoutConfig;
pub use export::{clipboard_text, write_export, ExportDocument};
pub use geo::{Bounds, Coordinate, RegionOfInterest};
pub use map::{HeadlessMap, MapEvent, MapMode, MapWidget, Marker, MarkerId, Place, Viewport};
pub use normalize::{
    normalize_all, normalize_record, BoundingBox, BucketThresholds, ConfidenceBucket, Detection,
    RawDetection, DEFAULT_CONFIDENCE,
};
pub use render::{Chart, ChartBar, ListEntry, OverlayBox, Renderer, ResultsView};
pub use session::{CapturePolicy, Notice, NoticeLevel, RunOutcome, Session};
