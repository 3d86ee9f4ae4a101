//! Detection record normalization.
//!
//! The service is not consistent about record shape: coordinates arrive as
//! `lat`/`lng` or `center_lat`/`center_lng`, confidence may be missing, and a
//! pixel-space bounding box (percentages of the image size) may or may not
//! be attached. All of that is resolved here, once, so renderers only see
//! `Detection`.

use serde::Deserialize;
use serde_json::Value;

use crate::geo::Coordinate;

/// Confidence assumed when the service omits it.
pub const DEFAULT_CONFIDENCE: f64 = 0.75;

/// A detection record exactly as it came over the wire.
///
/// Fields are kept as raw JSON values so that a present-but-non-numeric
/// field can be told apart from a missing one.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
    #[serde(default)]
    pub center_lat: Option<Value>,
    #[serde(default)]
    pub center_lng: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub x_min: Option<Value>,
    #[serde(default)]
    pub y_min: Option<Value>,
    #[serde(default)]
    pub x_max: Option<Value>,
    #[serde(default)]
    pub y_max: Option<Value>,
}

/// Bounding box in percent (0..=100) of the displayed image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Canonical detection record.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub coordinate: Coordinate,
    pub confidence: f64,
    pub bounding_box: Option<BoundingBox>,
}

impl Detection {
    pub fn bucket(&self, thresholds: &BucketThresholds) -> ConfidenceBucket {
        thresholds.classify(self.confidence)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceBucket {
    High,
    Medium,
    Low,
}

impl ConfidenceBucket {
    /// Display order: high first.
    pub const ALL: [ConfidenceBucket; 3] = [
        ConfidenceBucket::High,
        ConfidenceBucket::Medium,
        ConfidenceBucket::Low,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBucket::High => "high",
            ConfidenceBucket::Medium => "medium",
            ConfidenceBucket::Low => "low",
        }
    }

    /// Styling color shared by markers, list entries, chart bars and overlays.
    pub fn color(&self) -> [u8; 3] {
        match self {
            ConfidenceBucket::High => [46, 125, 50],
            ConfidenceBucket::Medium => [249, 168, 37],
            ConfidenceBucket::Low => [198, 40, 40],
        }
    }
}

/// Lower bounds (inclusive) of the high and medium buckets, as fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for BucketThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.6,
        }
    }
}

impl BucketThresholds {
    pub fn classify(&self, confidence: f64) -> ConfidenceBucket {
        if confidence >= self.high {
            ConfidenceBucket::High
        } else if confidence >= self.medium {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

/// Output of normalizing a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Normalized {
    pub detections: Vec<Detection>,
    /// Records dropped because no coordinate could be resolved.
    pub skipped: usize,
}

/// Normalize one record. `None` means the record has no usable coordinate.
pub fn normalize_record(raw: &RawDetection) -> Option<Detection> {
    let coordinate = resolve_coordinate(raw)?;
    let confidence = number(&raw.confidence)
        .map(clamp_confidence)
        .unwrap_or(DEFAULT_CONFIDENCE);
    Some(Detection {
        coordinate,
        confidence,
        bounding_box: resolve_bounding_box(raw),
    })
}

/// Normalize a batch of wire values, skipping (and logging) records that
/// are not objects or carry no coordinate.
pub fn normalize_all(records: &[Value]) -> Normalized {
    let mut out = Normalized::default();
    for (index, value) in records.iter().enumerate() {
        let raw = match RawDetection::deserialize(value) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("skipping detection #{}: not a record ({})", index, err);
                out.skipped += 1;
                continue;
            }
        };
        match normalize_record(&raw) {
            Some(detection) => out.detections.push(detection),
            None => {
                log::warn!("skipping detection #{}: no usable coordinate: {}", index, value);
                out.skipped += 1;
            }
        }
    }
    out
}

/// Center pair first, then `lat`/`lng`. Each pair must be complete and in
/// range to be used.
fn resolve_coordinate(raw: &RawDetection) -> Option<Coordinate> {
    let center = number(&raw.center_lat)
        .zip(number(&raw.center_lng))
        .and_then(|(lat, lng)| match Coordinate::new(lat, lng) {
            Ok(coordinate) => Some(coordinate),
            Err(err) => {
                log::warn!("ignoring center coordinate: {:#}", err);
                None
            }
        });
    center.or_else(|| {
        let (lat, lng) = number(&raw.lat).zip(number(&raw.lng))?;
        Coordinate::new(lat, lng).ok()
    })
}

/// Confidences are fractions. Anything outside [0, 1] is clamped with a
/// warning; a percentage like `82` ends up as `1.0`.
fn clamp_confidence(confidence: f64) -> f64 {
    let clamped = confidence.clamp(0.0, 1.0);
    if clamped != confidence {
        log::warn!(
            "confidence {} outside [0, 1]; clamped to {}",
            confidence,
            clamped
        );
    }
    clamped
}

fn resolve_bounding_box(raw: &RawDetection) -> Option<BoundingBox> {
    let x_min = number(&raw.x_min)?;
    let y_min = number(&raw.y_min)?;
    let x_max = number(&raw.x_max)?;
    let y_max = number(&raw.y_max)?;
    if x_max < x_min || y_max < y_min {
        return None;
    }
    Some(BoundingBox {
        x_min: x_min.clamp(0.0, 100.0),
        y_min: y_min.clamp(0.0, 100.0),
        x_max: x_max.clamp(0.0, 100.0),
        y_max: y_max.clamp(0.0, 100.0),
    })
}

fn number(value: &Option<Value>) -> Option<f64> {
    value.as_ref()?.as_f64().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawDetection {
        serde_json::from_value(value).expect("raw detection")
    }

    #[test]
    fn center_fields_resolve_without_lat_lng() {
        let det = normalize_record(&raw(json!({"center_lat": 21.2, "center_lng": 72.9})))
            .expect("coordinate");
        assert_eq!(det.coordinate, Coordinate { lat: 21.2, lng: 72.9 });
    }

    #[test]
    fn center_fields_win_over_plain_fields() {
        let det = normalize_record(&raw(json!({
            "lat": 1.0, "lng": 1.0, "center_lat": 2.0, "center_lng": 3.0
        })))
        .expect("coordinate");
        assert_eq!(det.coordinate, Coordinate { lat: 2.0, lng: 3.0 });
    }

    #[test]
    fn half_center_pair_falls_back_to_plain() {
        let det = normalize_record(&raw(json!({"lat": 1.0, "lng": 4.0, "center_lat": 2.0})))
            .expect("coordinate");
        assert_eq!(det.coordinate, Coordinate { lat: 1.0, lng: 4.0 });
    }

    #[test]
    fn out_of_range_center_falls_back_to_plain() {
        let det = normalize_record(&raw(json!({
            "center_lat": 95.0, "center_lng": 72.9, "lat": 21.2, "lng": 72.9
        })))
        .expect("coordinate");
        assert_eq!(det.coordinate, Coordinate { lat: 21.2, lng: 72.9 });

        assert!(normalize_record(&raw(json!({
            "center_lat": 95.0, "center_lng": 72.9, "lat": -91.0, "lng": 72.9
        })))
        .is_none());
    }

    #[test]
    fn confidence_is_clamped_to_unit_range() {
        let det = normalize_record(&raw(json!({"lat": 1.0, "lng": 1.0, "confidence": 82})))
            .expect("coordinate");
        assert_eq!(det.confidence, 1.0);
        let det = normalize_record(&raw(json!({"lat": 1.0, "lng": 1.0, "confidence": -0.2})))
            .expect("coordinate");
        assert_eq!(det.confidence, 0.0);
        let det = normalize_record(&raw(json!({"lat": 1.0, "lng": 1.0, "confidence": 0.42})))
            .expect("coordinate");
        assert_eq!(det.confidence, 0.42);
    }

    #[test]
    fn missing_confidence_defaults() {
        let det = normalize_record(&raw(json!({"lat": 1.0, "lng": 1.0}))).expect("coordinate");
        assert_eq!(det.confidence, 0.75);
        let det = normalize_record(&raw(json!({"lat": 1.0, "lng": 1.0, "confidence": "high"})))
            .expect("coordinate");
        assert_eq!(det.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn records_without_coordinates_are_skipped() {
        let batch = vec![
            json!({"lat": 1.0, "lng": 1.0}),
            json!({"confidence": 0.9}),
            json!({"lat": "21.2", "lng": 72.9}),
            json!(null),
            json!({"center_lat": 5.0, "center_lng": 6.0}),
        ];
        let out = normalize_all(&batch);
        assert_eq!(out.detections.len(), 2);
        assert_eq!(out.skipped, 3);
    }

    #[test]
    fn bounding_box_needs_all_four_numbers() {
        let det = normalize_record(&raw(json!({
            "lat": 1.0, "lng": 1.0, "x_min": 10, "y_min": 20, "x_max": 30
        })))
        .expect("coordinate");
        assert!(det.bounding_box.is_none());

        let det = normalize_record(&raw(json!({
            "lat": 1.0, "lng": 1.0, "x_min": 10, "y_min": 20, "x_max": 30, "y_max": 45.5
        })))
        .expect("coordinate");
        assert_eq!(
            det.bounding_box,
            Some(BoundingBox {
                x_min: 10.0,
                y_min: 20.0,
                x_max: 30.0,
                y_max: 45.5
            })
        );
    }

    #[test]
    fn inverted_bounding_box_is_dropped() {
        let det = normalize_record(&raw(json!({
            "lat": 1.0, "lng": 1.0, "x_min": 50, "y_min": 20, "x_max": 30, "y_max": 40
        })))
        .expect("coordinate");
        assert!(det.bounding_box.is_none());
    }

    #[test]
    fn thresholds_are_inclusive() {
        let t = BucketThresholds::default();
        assert_eq!(t.classify(0.8), ConfidenceBucket::High);
        assert_eq!(t.classify(0.79), ConfidenceBucket::Medium);
        assert_eq!(t.classify(0.6), ConfidenceBucket::Medium);
        assert_eq!(t.classify(0.59), ConfidenceBucket::Low);
    }
}
