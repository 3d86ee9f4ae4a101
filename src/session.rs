//! View-state session.
//!
//! Holds the single active region of interest and the single rendered
//! result set. Both are owned slots: a new polygon replaces the old one, a
//! new run replaces the old results, and clearing empties both. Runs are
//! sequential and last-writer-wins.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::mem;

use crate::capture::CaptureAdapter;
use crate::client::{DetectError, DetectionService, Endpoint};
use crate::config::{MapSettings, ScoutConfig};
use crate::export::ExportDocument;
use crate::geo::{Coordinate, RegionOfInterest};
use crate::map::{MapEvent, MapWidget, Place, Viewport};
use crate::normalize::normalize_all;
use crate::render::{text::NO_DETECTIONS_LIST, DisplaySize, Renderer, ResultsView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What to do about the satellite snapshot before a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Send the polygon only.
    Skip,
    /// Capture; continue without an image if capture fails.
    #[default]
    Optional,
    /// Capture; abort the run if capture fails.
    Required,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// No polygon drawn; nothing was sent.
    NoRegion,
    /// Capture failed under `CapturePolicy::Required`; nothing was sent.
    CaptureFailed,
    Completed {
        rendered: usize,
        skipped: usize,
        endpoint: Endpoint,
    },
    Failed(DetectError),
}

pub struct Session {
    region: Option<RegionOfInterest>,
    view: ResultsView,
    /// Region the rendered view was requested for.
    view_region: Option<RegionOfInterest>,
    display_image: Option<RgbaImage>,
    last_notice: Option<Notice>,
    loading: bool,
    capture: CaptureAdapter,
    capture_policy: CapturePolicy,
    renderer: Renderer,
    map_settings: MapSettings,
}

impl Session {
    pub fn new(cfg: &ScoutConfig) -> Self {
        Self {
            region: None,
            view: ResultsView::empty(),
            view_region: None,
            display_image: None,
            last_notice: None,
            loading: false,
            capture: CaptureAdapter::new(cfg.capture.size),
            capture_policy: if cfg.capture.enabled {
                CapturePolicy::Optional
            } else {
                CapturePolicy::Skip
            },
            renderer: Renderer::new(cfg.buckets),
            map_settings: cfg.map.clone(),
        }
    }

    pub fn with_capture_policy(mut self, policy: CapturePolicy) -> Self {
        self.capture_policy = policy;
        self
    }

    /// Put the map at the configured starting view, ready to draw.
    pub fn init<M: MapWidget + ?Sized>(&mut self, map: &mut M) {
        map.set_viewport(Viewport {
            center: self.map_settings.center,
            zoom: self.map_settings.zoom,
        });
        map.set_drawing(true);
    }

    pub fn handle_event<M: MapWidget + ?Sized>(&mut self, map: &mut M, event: MapEvent) {
        match event {
            MapEvent::DrawComplete(vertices) => self.set_region(map, vertices),
            MapEvent::Clear => self.clear(map),
            MapEvent::PlaceChanged(place) => self.go_to_place(map, place),
        }
    }

    fn set_region<M: MapWidget + ?Sized>(&mut self, map: &mut M, vertices: Vec<Coordinate>) {
        match RegionOfInterest::new(vertices) {
            Ok(region) => {
                log::info!("region of interest set ({} vertices)", region.len());
                map.show_region(&region);
                self.region = Some(region);
            }
            Err(err) => {
                log::warn!("rejected drawn polygon: {:#}", err);
                self.last_notice = Some(Notice::warning(format!("Invalid polygon: {}", err)));
            }
        }
    }

    fn go_to_place<M: MapWidget + ?Sized>(&mut self, map: &mut M, place: Place) {
        let Some(location) = place.location else {
            log::debug!("place '{}' has no geometry; ignoring", place.name);
            return;
        };
        map.pan_to(location);
        map.set_zoom(self.map_settings.search_zoom);
    }

    /// Drop the region and every rendered artifact.
    pub fn clear<M: MapWidget + ?Sized>(&mut self, map: &mut M) {
        self.region = None;
        map.hide_region();
        self.view = mem::take(&mut self.view).clear(map);
        self.view_region = None;
        self.display_image = None;
        self.last_notice = Some(Notice::info("Cleared."));
    }

    /// The active polygon in ring order, or `None` when nothing is drawn.
    pub fn extract_polygon(&self) -> Option<Vec<Coordinate>> {
        self.region.as_ref().map(|region| region.ring().to_vec())
    }

    /// Capture, request, normalize and render.
    ///
    /// Always leaves the session ready for the next interaction: the loading
    /// flag is cleared and a notice describes the outcome.
    pub fn run_detection<M, S>(&mut self, map: &mut M, service: &S) -> RunOutcome
    where
        M: MapWidget + ?Sized,
        S: DetectionService + ?Sized,
    {
        self.loading = true;
        let outcome = self.run_pipeline(map, service);
        self.loading = false;
        outcome
    }

    fn run_pipeline<M, S>(&mut self, map: &mut M, service: &S) -> RunOutcome
    where
        M: MapWidget + ?Sized,
        S: DetectionService + ?Sized,
    {
        let Some(region) = self.region.clone() else {
            self.last_notice = Some(Notice::warning("Please draw a polygon first."));
            return RunOutcome::NoRegion;
        };

        let snapshot = match self.capture_policy {
            CapturePolicy::Skip => None,
            CapturePolicy::Optional | CapturePolicy::Required => {
                self.capture.capture(map, &region)
            }
        };
        if snapshot.is_none() && self.capture_policy == CapturePolicy::Required {
            self.last_notice = Some(Notice::error("Could not capture the satellite image."));
            return RunOutcome::CaptureFailed;
        }

        let reply = match service.detect(
            region.ring(),
            snapshot.as_ref().map(|s| s.data_uri.as_str()),
        ) {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("detection request failed: {}", err);
                self.last_notice = Some(Notice::error(err.user_message()));
                self.view = mem::take(&mut self.view).clear(map);
                self.view_region = None;
                self.display_image = None;
                return RunOutcome::Failed(err);
            }
        };

        let normalized = normalize_all(reply.response.records());
        let display_image = match reply.response.satellite_url.as_deref() {
            Some(reference) => match service.load_image(reference) {
                Ok(image) => Some(image),
                Err(err) => {
                    log::warn!("could not load satellite image '{}': {:#}", reference, err);
                    snapshot.map(|s| s.image)
                }
            },
            None => snapshot.map(|s| s.image),
        };
        let display = display_image.as_ref().map(|image| DisplaySize {
            width: image.width(),
            height: image.height(),
        });

        let rendered = normalized.detections.len();
        self.view = self.renderer.render(
            map,
            mem::take(&mut self.view),
            normalized.detections,
            display,
        );
        self.view_region = Some(region);
        self.display_image = display_image;

        let mut message = if rendered == 0 {
            NO_DETECTIONS_LIST.to_string()
        } else {
            format!("Found {} eucalyptus area(s).", rendered)
        };
        if normalized.skipped > 0 {
            message.push_str(&format!(" {} malformed record(s) skipped.", normalized.skipped));
        }
        self.last_notice = Some(Notice::info(message));

        RunOutcome::Completed {
            rendered,
            skipped: normalized.skipped,
            endpoint: reply.endpoint,
        }
    }

    pub fn region(&self) -> Option<&RegionOfInterest> {
        self.region.as_ref()
    }

    pub fn view(&self) -> &ResultsView {
        &self.view
    }

    /// Image the overlays are positioned against, if any.
    pub fn display_image(&self) -> Option<&RgbaImage> {
        self.display_image.as_ref()
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Export of whatever is currently rendered, paired with the region
    /// that run was requested for rather than a polygon drawn since.
    pub fn export_document(&self, now: DateTime<Utc>) -> ExportDocument {
        ExportDocument::build(&self.view, self.view_region.as_ref(), now)
    }
}
