//! In-memory map widget.
//!
//! Keeps viewport, mode, markers and the region overlay as plain state and
//! answers snapshots from a loaded imagery file. Used by the command-line
//! tools and by tests.

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;

use super::{zoom_for_bounds, MapMode, MapWidget, Marker, MarkerId, Viewport};
use crate::geo::{Bounds, Coordinate, RegionOfInterest};

const ROADMAP_BACKGROUND: Rgba<u8> = Rgba([232, 229, 222, 255]);

pub struct HeadlessMap {
    mode: MapMode,
    viewport: Viewport,
    drawing: bool,
    markers: BTreeMap<MarkerId, Marker>,
    next_marker: u64,
    region: Option<RegionOfInterest>,
    imagery: Option<DynamicImage>,
    mode_history: Vec<MapMode>,
}

impl HeadlessMap {
    pub fn new(center: Coordinate, zoom: f64) -> Self {
        Self {
            mode: MapMode::Roadmap,
            viewport: Viewport { center, zoom },
            drawing: false,
            markers: BTreeMap::new(),
            next_marker: 1,
            region: None,
            imagery: None,
            mode_history: Vec::new(),
        }
    }

    /// Attach satellite imagery for snapshots.
    pub fn with_imagery(mut self, imagery: DynamicImage) -> Self {
        self.imagery = Some(imagery);
        self
    }

    pub fn with_imagery_file(self, path: &Path) -> Result<Self> {
        let imagery = image::open(path)
            .with_context(|| format!("load imagery from {}", path.display()))?;
        Ok(self.with_imagery(imagery))
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerId, &Marker)> {
        self.markers.iter()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn region(&self) -> Option<&RegionOfInterest> {
        self.region.as_ref()
    }

    /// Every mode the map has been switched to, in order.
    pub fn mode_history(&self) -> &[MapMode] {
        &self.mode_history
    }
}

impl MapWidget for HeadlessMap {
    fn mode(&self) -> MapMode {
        self.mode
    }

    fn set_mode(&mut self, mode: MapMode) {
        self.mode_history.push(mode);
        self.mode = mode;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.viewport = Viewport {
            center: bounds.center(),
            zoom: zoom_for_bounds(&bounds),
        };
    }

    fn is_drawing(&self) -> bool {
        self.drawing
    }

    fn set_drawing(&mut self, enabled: bool) {
        self.drawing = enabled;
    }

    fn add_marker(&mut self, marker: Marker) -> MarkerId {
        let id = MarkerId(self.next_marker);
        self.next_marker += 1;
        self.markers.insert(id, marker);
        id
    }

    fn remove_marker(&mut self, id: MarkerId) {
        if self.markers.remove(&id).is_none() {
            log::debug!("HeadlessMap: marker {:?} already removed", id);
        }
    }

    fn show_region(&mut self, region: &RegionOfInterest) {
        self.region = Some(region.clone());
    }

    fn hide_region(&mut self) {
        self.region = None;
    }

    fn snapshot(&mut self, width: u32, height: u32) -> Result<RgbaImage> {
        if width == 0 || height == 0 {
            return Err(anyhow!("snapshot size must be non-zero"));
        }
        match self.mode {
            MapMode::Satellite => {
                let imagery = self
                    .imagery
                    .as_ref()
                    .ok_or_else(|| anyhow!("no satellite imagery loaded"))?;
                Ok(imagery
                    .resize_exact(width, height, FilterType::Triangle)
                    .into_rgba8())
            }
            MapMode::Roadmap => Ok(RgbaImage::from_pixel(width, height, ROADMAP_BACKGROUND)),
        }
    }
}
