//! Visualization of normalized detections.
//!
//! `Renderer::render` turns a batch of detections into a `ResultsView`:
//! one map marker, one list entry and (when a bounding box and a displayed
//! image exist) one overlay box per detection, plus the aggregate
//! confidence chart. Each render replaces the previous view entirely;
//! markers from the previous view are removed from the map first.

use crate::geo::{Bounds, Coordinate};
use crate::map::{MapWidget, Marker, MarkerId};
use crate::normalize::{BucketThresholds, ConfidenceBucket, Detection};

pub mod annotate;
pub mod text;

const MARKER_TITLE: &str = "Detected eucalyptus";

#[derive(Clone, Debug, PartialEq)]
pub struct ListEntry {
    /// 1-based position in service order.
    pub rank: usize,
    pub confidence: f64,
    pub bucket: ConfidenceBucket,
    pub coordinate: Coordinate,
}

impl ListEntry {
    pub fn summary(&self) -> String {
        format!(
            "#{} {:.0}% ({}) at {:.6}, {:.6}",
            self.rank,
            self.confidence * 100.0,
            self.bucket.label(),
            self.coordinate.lat,
            self.coordinate.lng
        )
    }
}

/// Overlay rectangle in pixels of the displayed image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayBox {
    pub rank: usize,
    pub bucket: ConfidenceBucket,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartBar {
    pub bucket: ConfidenceBucket,
    pub count: usize,
    /// Share of all detections, 0..=1. Bar width is proportional to it.
    pub share: f64,
}

impl ChartBar {
    pub fn percent(&self) -> f64 {
        self.share * 100.0
    }

    pub fn caption(&self) -> String {
        format!("{} ({:.1}%)", self.count, self.percent())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Chart {
    /// Nothing to chart.
    Empty,
    /// One bar per non-empty bucket, high first.
    Bars(Vec<ChartBar>),
}

impl Chart {
    pub fn build(detections: &[Detection], thresholds: &BucketThresholds) -> Self {
        if detections.is_empty() {
            return Chart::Empty;
        }
        let total = detections.len();
        let bars = ConfidenceBucket::ALL
            .iter()
            .filter_map(|bucket| {
                let count = detections
                    .iter()
                    .filter(|d| d.bucket(thresholds) == *bucket)
                    .count();
                (count > 0).then(|| ChartBar {
                    bucket: *bucket,
                    count,
                    share: count as f64 / total as f64,
                })
            })
            .collect();
        Chart::Bars(bars)
    }

    pub fn total(&self) -> usize {
        match self {
            Chart::Empty => 0,
            Chart::Bars(bars) => bars.iter().map(|bar| bar.count).sum(),
        }
    }
}

/// Pixel size of the image the overlays are positioned against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

/// Everything currently on screen for the last detection run.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsView {
    pub detections: Vec<Detection>,
    pub markers: Vec<MarkerId>,
    pub entries: Vec<ListEntry>,
    pub overlays: Vec<OverlayBox>,
    pub chart: Chart,
    pub display: Option<DisplaySize>,
}

impl ResultsView {
    /// The explicit "no detections" state.
    pub fn empty() -> Self {
        Self {
            detections: Vec::new(),
            markers: Vec::new(),
            entries: Vec::new(),
            overlays: Vec::new(),
            chart: Chart::Empty,
            display: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Remove this view's markers from the map and return the empty state.
    pub fn clear<M: MapWidget + ?Sized>(self, map: &mut M) -> Self {
        for id in self.markers {
            map.remove_marker(id);
        }
        Self::empty()
    }
}

impl Default for ResultsView {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer {
    thresholds: BucketThresholds,
}

impl Renderer {
    pub fn new(thresholds: BucketThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &BucketThresholds {
        &self.thresholds
    }

    /// Replace `previous` with a view of `detections`.
    pub fn render<M: MapWidget + ?Sized>(
        &self,
        map: &mut M,
        previous: ResultsView,
        detections: Vec<Detection>,
        display: Option<DisplaySize>,
    ) -> ResultsView {
        previous.clear(map);
        if detections.is_empty() {
            return ResultsView {
                display,
                ..ResultsView::empty()
            };
        }

        let mut markers = Vec::with_capacity(detections.len());
        let mut entries = Vec::with_capacity(detections.len());
        let mut overlays = Vec::new();
        for (index, detection) in detections.iter().enumerate() {
            let rank = index + 1;
            let bucket = detection.bucket(&self.thresholds);
            markers.push(map.add_marker(Marker {
                position: detection.coordinate,
                title: format!("{} #{}", MARKER_TITLE, rank),
                bucket,
            }));
            entries.push(ListEntry {
                rank,
                confidence: detection.confidence,
                bucket,
                coordinate: detection.coordinate,
            });
            if let (Some(bbox), Some(size)) = (detection.bounding_box, display) {
                let width = size.width as f64;
                let height = size.height as f64;
                overlays.push(OverlayBox {
                    rank,
                    bucket,
                    left: bbox.x_min / 100.0 * width,
                    top: bbox.y_min / 100.0 * height,
                    width: (bbox.x_max - bbox.x_min) / 100.0 * width,
                    height: (bbox.y_max - bbox.y_min) / 100.0 * height,
                });
            }
        }

        if let Some(bounds) = Bounds::around(detections.iter().map(|d| &d.coordinate)) {
            map.fit_bounds(bounds);
        }

        let chart = Chart::build(&detections, &self.thresholds);
        log::info!(
            "rendered {} markers, {} overlays",
            markers.len(),
            overlays.len()
        );
        ResultsView {
            detections,
            markers,
            entries,
            overlays,
            chart,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::HeadlessMap;
    use crate::normalize::BoundingBox;

    fn detection(lat: f64, lng: f64, confidence: f64) -> Detection {
        Detection {
            coordinate: Coordinate { lat, lng },
            confidence,
            bounding_box: None,
        }
    }

    fn map() -> HeadlessMap {
        HeadlessMap::new(Coordinate { lat: 0.0, lng: 0.0 }, 3.0)
    }

    #[test]
    fn render_replaces_previous_markers() {
        let mut map = map();
        let renderer = Renderer::default();
        let first = renderer.render(
            &mut map,
            ResultsView::empty(),
            vec![detection(1.0, 1.0, 0.9), detection(2.0, 2.0, 0.5)],
            None,
        );
        assert_eq!(map.marker_count(), 2);
        let second = renderer.render(&mut map, first, vec![detection(3.0, 3.0, 0.7)], None);
        assert_eq!(map.marker_count(), 1);
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].rank, 1);
    }

    #[test]
    fn chart_totals_match_detection_count() {
        let detections = vec![
            detection(1.0, 1.0, 0.95),
            detection(1.0, 1.0, 0.81),
            detection(1.0, 1.0, 0.65),
            detection(1.0, 1.0, 0.10),
        ];
        let chart = Chart::build(&detections, &BucketThresholds::default());
        assert_eq!(chart.total(), 4);
        let Chart::Bars(bars) = chart else {
            panic!("expected bars");
        };
        assert_eq!(bars[0].bucket, ConfidenceBucket::High);
        assert_eq!(bars[0].count, 2);
        assert_eq!(bars[0].caption(), "2 (50.0%)");
        assert_eq!(bars.len(), 3);
    }

    #[test]
    fn chart_skips_empty_buckets() {
        let chart = Chart::build(&[detection(1.0, 1.0, 0.9)], &BucketThresholds::default());
        assert_eq!(
            chart,
            Chart::Bars(vec![ChartBar {
                bucket: ConfidenceBucket::High,
                count: 1,
                share: 1.0
            }])
        );
    }

    #[test]
    fn empty_input_renders_empty_state() {
        let mut map = map();
        let view = Renderer::default().render(&mut map, ResultsView::empty(), Vec::new(), None);
        assert!(view.is_empty());
        assert_eq!(view.chart, Chart::Empty);
        assert_eq!(map.marker_count(), 0);
    }

    #[test]
    fn overlays_need_box_and_display_image() {
        let mut map = map();
        let mut boxed = detection(1.0, 1.0, 0.9);
        boxed.bounding_box = Some(BoundingBox {
            x_min: 10.0,
            y_min: 20.0,
            x_max: 30.0,
            y_max: 60.0,
        });
        let renderer = Renderer::default();
        let view = renderer.render(
            &mut map,
            ResultsView::empty(),
            vec![boxed.clone(), detection(2.0, 2.0, 0.9)],
            Some(DisplaySize {
                width: 200,
                height: 100,
            }),
        );
        assert_eq!(view.overlays.len(), 1);
        let overlay = view.overlays[0];
        assert_eq!((overlay.left, overlay.top), (20.0, 20.0));
        assert_eq!((overlay.width, overlay.height), (40.0, 40.0));

        let view = renderer.render(&mut map, view, vec![boxed], None);
        assert!(view.overlays.is_empty());
    }

    #[test]
    fn viewport_fits_markers() {
        let mut map = map();
        Renderer::default().render(
            &mut map,
            ResultsView::empty(),
            vec![detection(10.0, 20.0, 0.9), detection(12.0, 22.0, 0.9)],
            None,
        );
        assert_eq!(map.viewport().center, Coordinate { lat: 11.0, lng: 21.0 });
    }
}
