//! scout - command-line front end for the detection service.
//!
//! `detect` posts a polygon to the service and renders the answer,
//! `render` renders a previously saved response offline, and `ping` checks
//! that the service is up.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use roi_scout::render::{annotate::save_annotated, text, DisplaySize};
use roi_scout::{
    clipboard_text, normalize_all, write_export, CapturePolicy, DetectionClient, DetectionResponse,
    Endpoint, ExportDocument, HeadlessMap, MapEvent, NoticeLevel, RegionOfInterest, Renderer, ResultsView,
    RunOutcome, ScoutConfig, Session,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Request and render region-of-interest detections")]
struct Args {
    #[command(subcommand)]
    command: Command,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE", global = true)]
    ui: String,
    /// Detection service base URL (overrides config).
    #[arg(long, env = "SCOUT_SERVICE_URL", global = true)]
    service_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a polygon to the detection service and render the result.
    Detect {
        /// Polygon JSON file, or inline `lat,lng;lat,lng;...`.
        #[arg(long)]
        polygon: String,
        /// Satellite imagery used for the snapshot.
        #[arg(long)]
        imagery: Option<PathBuf>,
        /// Send the polygon without a snapshot.
        #[arg(long, conflicts_with = "require_capture")]
        no_capture: bool,
        /// Abort when the snapshot cannot be captured.
        #[arg(long)]
        require_capture: bool,
        /// Write a timestamped JSON export of the results.
        #[arg(long)]
        export: bool,
        /// Save the displayed image with bounding boxes drawn on it.
        #[arg(long)]
        annotate: Option<PathBuf>,
        /// Print the detected coordinates, one per line.
        #[arg(long)]
        copy: bool,
    },
    /// Render a saved service response without contacting the service.
    Render {
        /// Response JSON file.
        #[arg(long)]
        response: PathBuf,
        /// Polygon the response belongs to (recorded in the export).
        #[arg(long)]
        polygon: Option<String>,
        /// Image the bounding boxes refer to.
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        export: bool,
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
    /// Check that the detection service answers.
    Ping,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());
    let mut cfg = ScoutConfig::load()?;
    if let Some(url) = args.service_url {
        cfg.service.base_url = url;
    }

    match args.command {
        Command::Detect {
            polygon,
            imagery,
            no_capture,
            require_capture,
            export,
            annotate,
            copy,
        } => {
            let policy = if no_capture || !cfg.capture.enabled {
                CapturePolicy::Skip
            } else if require_capture {
                CapturePolicy::Required
            } else {
                CapturePolicy::Optional
            };
            let region = load_polygon(&polygon)?;
            let client = DetectionClient::new(&cfg.service)?;
            let mut map = HeadlessMap::new(cfg.map.center, cfg.map.zoom);
            if let Some(path) = &imagery {
                map = map.with_imagery_file(path)?;
            }
            let mut session = Session::new(&cfg).with_capture_policy(policy);
            session.init(&mut map);
            session.handle_event(&mut map, MapEvent::DrawComplete(region.ring().to_vec()));

            let outcome = {
                let mut stage = ui.stage("Detect");
                stage.progress(&format!(
                    "{} vertices to {}",
                    region.len(),
                    client.base_url()
                ));
                let outcome = session.run_detection(&mut map, &client);
                match &outcome {
                    RunOutcome::Completed {
                        rendered,
                        skipped,
                        endpoint,
                    } => stage.done(ui::detection_summary(
                        *rendered,
                        *skipped,
                        *endpoint == Endpoint::Fallback,
                    )),
                    RunOutcome::NoRegion => stage.failed("no polygon"),
                    RunOutcome::CaptureFailed => stage.failed("satellite capture failed"),
                    RunOutcome::Failed(err) => stage.failed(err.to_string()),
                }
                outcome
            };
            if let Some(notice) = session.last_notice() {
                match notice.level {
                    NoticeLevel::Info => log::info!("{}", notice.message),
                    NoticeLevel::Warning => log::warn!("{}", notice.message),
                    NoticeLevel::Error => log::error!("{}", notice.message),
                }
            }

            let view = session.view();
            print!("{}", text::render_list(view));
            print!("{}", text::render_chart(view));
            if copy && !view.is_empty() {
                println!("{}", clipboard_text(view));
            }
            if let (Some(path), Some(image)) = (&annotate, session.display_image()) {
                save_annotated(image, &view.overlays, path)?;
                println!("annotated image written to {}", path.display());
            }
            if export {
                let now = chrono::Utc::now();
                let path = write_export(&session.export_document(now), &cfg.export_dir, now)?;
                println!("export written to {}", path.display());
            }

            match outcome {
                RunOutcome::Completed { .. } => Ok(()),
                RunOutcome::NoRegion => Err(anyhow!("no polygon to submit")),
                RunOutcome::CaptureFailed => Err(anyhow!("satellite capture failed")),
                RunOutcome::Failed(err) => Err(err.into()),
            }
        }
        Command::Render {
            response,
            polygon,
            image: image_path,
            export,
            annotate,
        } => {
            let raw = std::fs::read_to_string(&response)
                .with_context(|| format!("read response {}", response.display()))?;
            let response = DetectionResponse::from_json(&raw)?;
            let region = polygon.as_deref().map(load_polygon).transpose()?;
            let image = image_path
                .as_deref()
                .map(|path| {
                    image::open(path)
                        .map(|img| img.into_rgba8())
                        .with_context(|| format!("load image {}", path.display()))
                })
                .transpose()?;

            let normalized = normalize_all(response.records());
            if normalized.skipped > 0 {
                log::warn!("{} malformed record(s) skipped", normalized.skipped);
            }
            let mut map = HeadlessMap::new(cfg.map.center, cfg.map.zoom);
            let display = image.as_ref().map(|img| DisplaySize {
                width: img.width(),
                height: img.height(),
            });
            let view = Renderer::new(cfg.buckets).render(
                &mut map,
                ResultsView::empty(),
                normalized.detections,
                display,
            );
            print!("{}", text::render_list(&view));
            print!("{}", text::render_chart(&view));

            if let (Some(path), Some(image)) = (&annotate, &image) {
                save_annotated(image, &view.overlays, path)?;
                println!("annotated image written to {}", path.display());
            }
            if export {
                let now = chrono::Utc::now();
                let doc = ExportDocument::build(&view, region.as_ref(), now);
                let path = write_export(&doc, &cfg.export_dir, now)?;
                println!("export written to {}", path.display());
            }
            Ok(())
        }
        Command::Ping => {
            let client = DetectionClient::new(&cfg.service)?;
            let message = {
                let mut stage = ui.stage("Ping detection service");
                match client.ping() {
                    Ok(message) => {
                        stage.done("service is up");
                        message
                    }
                    Err(err) => {
                        stage.failed(err.user_message());
                        return Err(err.into());
                    }
                }
            };
            println!("{}: {}", client.base_url(), message);
            Ok(())
        }
    }
}

fn load_polygon(arg: &str) -> Result<RegionOfInterest> {
    let path = Path::new(arg);
    if path.is_file() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read polygon {}", path.display()))?;
        RegionOfInterest::from_json(&raw)
    } else {
        RegionOfInterest::parse_inline(arg)
    }
}
