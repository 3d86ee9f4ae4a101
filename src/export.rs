//! JSON export of the last rendered detection set, and clipboard text.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::geo::RegionOfInterest;
use crate::render::ResultsView;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub total_detections: usize,
    pub detections: Vec<ExportedDetection>,
    /// Ring of the active region as `[lng, lat]` pairs, `null` when none.
    pub area_of_interest: Option<Vec<[f64; 2]>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedDetection {
    pub id: usize,
    /// `[lng, lat]`
    pub coordinates: [f64; 2],
    pub confidence: f64,
}

impl ExportDocument {
    pub fn build(
        view: &ResultsView,
        region: Option<&RegionOfInterest>,
        now: DateTime<Utc>,
    ) -> Self {
        let detections: Vec<ExportedDetection> = view
            .detections
            .iter()
            .enumerate()
            .map(|(index, detection)| ExportedDetection {
                id: index + 1,
                coordinates: detection.coordinate.lng_lat(),
                confidence: detection.confidence,
            })
            .collect();
        Self {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_detections: detections.len(),
            detections,
            area_of_interest: region
                .map(|region| region.ring().iter().map(|c| c.lng_lat()).collect()),
        }
    }
}

/// `detections_20261019T120000Z.json`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("detections_{}.json", now.format("%Y%m%dT%H%M%SZ"))
}

/// Write the document into `dir` under a timestamped name.
pub fn write_export(document: &ExportDocument, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create export dir {}", dir.display()))?;
    let path = dir.join(export_file_name(now));
    let json = serde_json::to_vec_pretty(document)?;
    std::fs::write(&path, json).with_context(|| format!("write export {}", path.display()))?;
    Ok(path)
}

/// One `lat, lng` line per detection.
pub fn clipboard_text(view: &ResultsView) -> String {
    view.detections
        .iter()
        .map(|d| format!("{:.6}, {:.6}", d.coordinate.lat, d.coordinate.lng))
        .collect::<Vec<_>>()
        .join("\n")
}
