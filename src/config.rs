use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::DEFAULT_CAPTURE_SIZE;
use crate::client::timeout_from_secs;
use crate::geo::Coordinate;
use crate::normalize::BucketThresholds;

const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_PRIMARY_PATH: &str = "/api/detect";
const DEFAULT_FALLBACK_PATH: &str = "/detect";
const DEFAULT_TIMEOUT_SECS: u64 = 0;
const DEFAULT_EXPORT_DIR: &str = ".";
const DEFAULT_CENTER_LAT: f64 = 21.212968;
const DEFAULT_CENTER_LNG: f64 = 72.981295;
const DEFAULT_ZOOM: f64 = 13.0;
const DEFAULT_SEARCH_ZOOM: f64 = 15.0;
const MIN_CAPTURE_SIZE: u32 = 64;
const MAX_CAPTURE_SIZE: u32 = 4096;

#[derive(Debug, Deserialize, Default)]
struct ScoutConfigFile {
    service: Option<ServiceConfigFile>,
    capture: Option<CaptureConfigFile>,
    buckets: Option<BucketConfigFile>,
    export: Option<ExportConfigFile>,
    map: Option<MapConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    base_url: Option<String>,
    primary_path: Option<String>,
    fallback_path: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    enabled: Option<bool>,
    size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct BucketConfigFile {
    high: Option<f64>,
    medium: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ExportConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct MapConfigFile {
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    zoom: Option<f64>,
    search_zoom: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub service: ServiceSettings,
    pub capture: CaptureSettings,
    pub buckets: BucketThresholds,
    pub export_dir: PathBuf,
    pub map: MapSettings,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub primary_path: String,
    pub fallback_path: String,
    /// `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            primary_path: DEFAULT_PRIMARY_PATH.to_string(),
            fallback_path: DEFAULT_FALLBACK_PATH.to_string(),
            timeout: timeout_from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub enabled: bool,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct MapSettings {
    pub center: Coordinate,
    pub zoom: f64,
    pub search_zoom: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center: Coordinate {
                lat: DEFAULT_CENTER_LAT,
                lng: DEFAULT_CENTER_LNG,
            },
            zoom: DEFAULT_ZOOM,
            search_zoom: DEFAULT_SEARCH_ZOOM,
        }
    }
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            capture: CaptureSettings {
                enabled: true,
                size: DEFAULT_CAPTURE_SIZE,
            },
            buckets: BucketThresholds::default(),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            map: MapSettings::default(),
        }
    }
}

impl ScoutConfig {
    /// Defaults, then the file named by `SCOUT_CONFIG`, then `SCOUT_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCOUT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScoutConfigFile) -> Self {
        let defaults = Self::default();
        let service = file.service.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        let buckets = file.buckets.unwrap_or_default();
        let map = file.map.unwrap_or_default();
        Self {
            service: ServiceSettings {
                base_url: service.base_url.unwrap_or(defaults.service.base_url),
                primary_path: service.primary_path.unwrap_or(defaults.service.primary_path),
                fallback_path: service
                    .fallback_path
                    .unwrap_or(defaults.service.fallback_path),
                timeout: service
                    .timeout_secs
                    .map(timeout_from_secs)
                    .unwrap_or(defaults.service.timeout),
            },
            capture: CaptureSettings {
                enabled: capture.enabled.unwrap_or(defaults.capture.enabled),
                size: capture.size.unwrap_or(defaults.capture.size),
            },
            buckets: BucketThresholds {
                high: buckets.high.unwrap_or(defaults.buckets.high),
                medium: buckets.medium.unwrap_or(defaults.buckets.medium),
            },
            export_dir: file
                .export
                .and_then(|export| export.dir)
                .unwrap_or(defaults.export_dir),
            map: MapSettings {
                center: Coordinate {
                    lat: map.center_lat.unwrap_or(defaults.map.center.lat),
                    lng: map.center_lng.unwrap_or(defaults.map.center.lng),
                },
                zoom: map.zoom.unwrap_or(defaults.map.zoom),
                search_zoom: map.search_zoom.unwrap_or(defaults.map.search_zoom),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SCOUT_SERVICE_URL") {
            if !url.trim().is_empty() {
                self.service.base_url = url.trim().to_string();
            }
        }
        if let Ok(timeout) = std::env::var("SCOUT_TIMEOUT_SECS") {
            let secs: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("SCOUT_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.service.timeout = timeout_from_secs(secs);
        }
        if let Ok(size) = std::env::var("SCOUT_CAPTURE_SIZE") {
            self.capture.size = size
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCOUT_CAPTURE_SIZE must be an integer pixel size"))?;
        }
        if let Ok(buckets) = std::env::var("SCOUT_BUCKETS") {
            let parsed = split_csv(&buckets);
            if !parsed.is_empty() {
                let values: Vec<f64> = parsed
                    .iter()
                    .map(|v| v.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| anyhow!("SCOUT_BUCKETS must be 'high,medium' fractions"))?;
                match values.as_slice() {
                    [high, medium] => {
                        self.buckets = BucketThresholds {
                            high: *high,
                            medium: *medium,
                        }
                    }
                    _ => return Err(anyhow!("SCOUT_BUCKETS must be 'high,medium' fractions")),
                }
            }
        }
        if let Ok(dir) = std::env::var("SCOUT_EXPORT_DIR") {
            if !dir.trim().is_empty() {
                self.export_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.service.base_url)
            .map_err(|e| anyhow!("invalid service url '{}': {}", self.service.base_url, e))?;
        for path in [&self.service.primary_path, &self.service.fallback_path] {
            if !path.starts_with('/') {
                return Err(anyhow!("endpoint path '{}' must start with '/'", path));
            }
        }
        let BucketThresholds { high, medium } = self.buckets;
        if !(0.0..=1.0).contains(&medium) || !(0.0..=1.0).contains(&high) || medium > high {
            return Err(anyhow!(
                "bucket thresholds must satisfy 0 <= medium <= high <= 1 (got high={}, medium={})",
                high,
                medium
            ));
        }
        if !(MIN_CAPTURE_SIZE..=MAX_CAPTURE_SIZE).contains(&self.capture.size) {
            return Err(anyhow!(
                "capture size {} outside {}..={}",
                self.capture.size,
                MIN_CAPTURE_SIZE,
                MAX_CAPTURE_SIZE
            ));
        }
        self.map.center.validate()?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScoutConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
