//! Satellite snapshot capture.
//!
//! Capturing borrows the live map: it is switched to satellite imagery and
//! fitted to the region, tiles are awaited, the view is rendered, and the
//! original mode and viewport are put back. Restoration lives in a drop
//! guard so it happens on every exit path.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::geo::RegionOfInterest;
use crate::map::{MapMode, MapWidget, Viewport};

/// Canonical snapshot edge length in pixels.
pub const DEFAULT_CAPTURE_SIZE: u32 = 512;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// A captured bitmap and its transport encoding.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub image: RgbaImage,
    /// `data:image/png;base64,...`
    pub data_uri: String,
}

impl Snapshot {
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        let data_uri = encode_png_data_uri(&image)?;
        Ok(Self { image, data_uri })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CaptureAdapter {
    size: u32,
}

impl Default for CaptureAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_SIZE)
    }
}

impl CaptureAdapter {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Capture the region in satellite mode.
    ///
    /// Never fails: on any error the view is restored, the error is logged,
    /// and `None` is returned.
    pub fn capture<M: MapWidget + ?Sized>(
        &self,
        map: &mut M,
        region: &RegionOfInterest,
    ) -> Option<Snapshot> {
        let mut view = SatelliteView::acquire(map, region);
        match view.render(self.size) {
            Ok(snapshot) => {
                log::info!(
                    "captured {}x{} satellite snapshot ({} bytes encoded)",
                    self.size,
                    self.size,
                    snapshot.data_uri.len()
                );
                Some(snapshot)
            }
            Err(err) => {
                log::warn!("satellite capture failed: {:#}", err);
                None
            }
        }
    }
}

/// The map temporarily switched to satellite mode over a region.
/// Dropping it restores the previous mode and viewport.
struct SatelliteView<'a, M: MapWidget + ?Sized> {
    map: &'a mut M,
    original_mode: MapMode,
    original_viewport: Viewport,
}

impl<'a, M: MapWidget + ?Sized> SatelliteView<'a, M> {
    fn acquire(map: &'a mut M, region: &RegionOfInterest) -> Self {
        let original_mode = map.mode();
        let original_viewport = map.viewport();
        map.set_mode(MapMode::Satellite);
        map.fit_bounds(region.bounds());
        Self {
            map,
            original_mode,
            original_viewport,
        }
    }

    fn render(&mut self, size: u32) -> Result<Snapshot> {
        self.map
            .wait_tiles_loaded()
            .context("wait for satellite tiles")?;
        let image = self
            .map
            .snapshot(size, size)
            .context("render map snapshot")?;
        if image.dimensions() != (size, size) {
            return Err(anyhow!(
                "snapshot has size {:?}, expected {}x{}",
                image.dimensions(),
                size,
                size
            ));
        }
        Snapshot::from_image(image)
    }
}

impl<M: MapWidget + ?Sized> Drop for SatelliteView<'_, M> {
    fn drop(&mut self) {
        self.map.set_mode(self.original_mode);
        self.map.set_viewport(self.original_viewport);
    }
}

pub fn encode_png_data_uri(image: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("encode snapshot as png")?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("{}{}", PNG_DATA_URI_PREFIX, encoded))
}

pub fn decode_data_uri(data_uri: &str) -> Result<RgbaImage> {
    let (header, payload) = data_uri
        .split_once(',')
        .ok_or_else(|| anyhow!("data uri missing ',' separator"))?;
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(anyhow!("unsupported data uri header '{}'", header));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("decode base64 payload")?;
    let image = image::load_from_memory(&bytes).context("decode image payload")?;
    Ok(image.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::map::HeadlessMap;
    use image::Rgba;

    fn region() -> RegionOfInterest {
        RegionOfInterest::new(vec![
            Coordinate { lat: 21.20, lng: 72.98 },
            Coordinate { lat: 21.21, lng: 72.98 },
            Coordinate { lat: 21.21, lng: 72.99 },
        ])
        .expect("region")
    }

    fn start() -> Viewport {
        Viewport {
            center: Coordinate { lat: 10.0, lng: 10.0 },
            zoom: 4.0,
        }
    }

    #[test]
    fn capture_restores_view_after_success() {
        let imagery = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 80, 10, 255])));
        let mut map = HeadlessMap::new(start().center, start().zoom).with_imagery(imagery);
        let snapshot = CaptureAdapter::new(32)
            .capture(&mut map, &region())
            .expect("snapshot");
        assert_eq!(snapshot.dimensions(), (32, 32));
        assert!(snapshot.data_uri.starts_with("data:image/png;base64,"));
        assert_eq!(map.mode(), MapMode::Roadmap);
        assert_eq!(map.viewport(), start());
        assert_eq!(map.mode_history(), &[MapMode::Satellite, MapMode::Roadmap]);
    }

    #[test]
    fn capture_failure_restores_view_and_returns_none() {
        let mut map = HeadlessMap::new(start().center, start().zoom);
        assert!(CaptureAdapter::default().capture(&mut map, &region()).is_none());
        assert_eq!(map.mode(), MapMode::Roadmap);
        assert_eq!(map.viewport(), start());
    }

    #[test]
    fn data_uri_decodes_back_to_pixels() -> Result<()> {
        let image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let uri = encode_png_data_uri(&image)?;
        assert_eq!(decode_data_uri(&uri)?, image);
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        Ok(())
    }
}
