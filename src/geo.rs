//! Geographic primitives: coordinates, the user-drawn region of interest,
//! and lat/lng bounding rectangles.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Minimum number of vertices for a polygon boundary.
pub const MIN_REGION_POINTS: usize = 3;

/// WGS84 coordinate. Serialized as `{ "lat": .., "lng": .. }`, the shape the
/// detection service expects.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coord = Self { lat, lng };
        coord.validate()?;
        Ok(coord)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(anyhow!("coordinate must be finite: ({}, {})", self.lat, self.lng));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(anyhow!("latitude {} outside [-90, 90]", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(anyhow!("longitude {} outside [-180, 180]", self.lng));
        }
        Ok(())
    }

    /// `[lng, lat]` pair, GeoJSON axis order.
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// A user-drawn polygon boundary in ring order.
///
/// The ring is kept exactly as drawn: no reordering, no deduplication, and
/// no closing vertex is added or removed.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionOfInterest {
    ring: Vec<Coordinate>,
}

impl RegionOfInterest {
    pub fn new(ring: Vec<Coordinate>) -> Result<Self> {
        if ring.len() < MIN_REGION_POINTS {
            return Err(anyhow!(
                "region of interest needs at least {} points, got {}",
                MIN_REGION_POINTS,
                ring.len()
            ));
        }
        for (index, coord) in ring.iter().enumerate() {
            coord
                .validate()
                .map_err(|e| anyhow!("vertex {}: {}", index, e))?;
        }
        Ok(Self { ring })
    }

    /// Parse a polygon from JSON: either `[{"lat":..,"lng":..}, ...]` or an
    /// object with a `polygon` field of that shape.
    pub fn from_json(raw: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PolygonDoc {
            Bare(Vec<Coordinate>),
            Wrapped { polygon: Vec<Coordinate> },
        }
        let doc: PolygonDoc =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid polygon json: {}", e))?;
        match doc {
            PolygonDoc::Bare(ring) | PolygonDoc::Wrapped { polygon: ring } => Self::new(ring),
        }
    }

    /// Parse `lat,lng;lat,lng;...`.
    pub fn parse_inline(raw: &str) -> Result<Self> {
        let mut ring = Vec::new();
        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (lat, lng) = pair
                .split_once(',')
                .ok_or_else(|| anyhow!("expected 'lat,lng', got '{}'", pair))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid latitude '{}'", lat.trim()))?;
            let lng: f64 = lng
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid longitude '{}'", lng.trim()))?;
            ring.push(Coordinate { lat, lng });
        }
        Self::new(ring)
    }

    pub fn ring(&self) -> &[Coordinate] {
        &self.ring
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        // `new` guarantees a non-empty ring.
        Bounds::around(&self.ring).unwrap_or(Bounds {
            south: 0.0,
            west: 0.0,
            north: 0.0,
            east: 0.0,
        })
    }
}

/// Axis-aligned lat/lng rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Smallest rectangle containing every point; `None` for no points.
    pub fn around<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: &Coordinate) {
        self.south = self.south.min(point.lat);
        self.north = self.north.max(point.lat);
        self.west = self.west.min(point.lng);
        self.east = self.east.max(point.lng);
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }
}
