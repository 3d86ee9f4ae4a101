//! Map widget abstraction.
//!
//! The pipeline never talks to a concrete map toolkit. Everything it needs
//! from the host (viewport, imagery mode, markers, the drawn polygon overlay,
//! snapshots) goes through `MapWidget`. User interaction arrives as
//! `MapEvent` values that the session dispatches.

use anyhow::Result;
use image::RgbaImage;

use crate::geo::{Bounds, Coordinate, RegionOfInterest};
use crate::normalize::ConfidenceBucket;

mod headless;

pub use headless::HeadlessMap;

/// Base imagery shown by the map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MapMode {
    #[default]
    Roadmap,
    Satellite,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub u64);

/// A marker placed at a detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub position: Coordinate,
    pub title: String,
    pub bucket: ConfidenceBucket,
}

/// A place picked from the search box.
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    pub name: String,
    /// Missing when the search returned a name without geometry.
    pub location: Option<Coordinate>,
}

/// User interactions delivered by the host.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    /// A polygon was completed on the drawing layer, vertices in ring order.
    DrawComplete(Vec<Coordinate>),
    /// The clear button was pressed.
    Clear,
    /// A place was chosen from search autocomplete.
    PlaceChanged(Place),
}

/// Host map widget.
///
/// Implementations render markers and the region overlay and produce bitmap
/// snapshots of the current view. Calls are sequential; the pipeline never
/// shares a widget across threads.
pub trait MapWidget {
    fn mode(&self) -> MapMode;

    fn set_mode(&mut self, mode: MapMode);

    fn viewport(&self) -> Viewport;

    fn set_viewport(&mut self, viewport: Viewport);

    /// Move and zoom so that `bounds` is fully visible.
    fn fit_bounds(&mut self, bounds: Bounds);

    fn pan_to(&mut self, center: Coordinate) {
        let zoom = self.viewport().zoom;
        self.set_viewport(Viewport { center, zoom });
    }

    fn set_zoom(&mut self, zoom: f64) {
        let center = self.viewport().center;
        self.set_viewport(Viewport { center, zoom });
    }

    /// Whether the polygon drawing tool is active.
    fn is_drawing(&self) -> bool;

    /// Turn the polygon drawing tool on or off.
    fn set_drawing(&mut self, enabled: bool);

    fn add_marker(&mut self, marker: Marker) -> MarkerId;

    fn remove_marker(&mut self, id: MarkerId);

    /// Show the active region overlay, replacing any previous one.
    fn show_region(&mut self, region: &RegionOfInterest);

    fn hide_region(&mut self);

    /// Block until the tiles for the current viewport and mode are loaded.
    fn wait_tiles_loaded(&mut self) -> Result<()> {
        Ok(())
    }

    /// Render the current view into a `width` x `height` bitmap.
    fn snapshot(&mut self, width: u32, height: u32) -> Result<RgbaImage>;
}

/// Slippy-map zoom level that fits a lat/lng span, clamped to 0..=21.
pub fn zoom_for_bounds(bounds: &Bounds) -> f64 {
    let lat_span = (bounds.north - bounds.south).abs();
    let lng_span = (bounds.east - bounds.west).abs();
    let span = lat_span.max(lng_span);
    if span <= f64::EPSILON {
        return 21.0;
    }
    (360.0 / span).log2().floor().clamp(0.0, 21.0)
}
