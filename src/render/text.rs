//! Plain-text rendering of a `ResultsView` for terminals and logs.

use super::{Chart, ResultsView};

pub const NO_DETECTIONS_LIST: &str = "No eucalyptus detected in this area.";
pub const NO_DETECTIONS_CHART: &str = "No detections to chart.";

const BAR_WIDTH: usize = 40;

pub fn render_list(view: &ResultsView) -> String {
    if view.entries.is_empty() {
        return format!("{}\n", NO_DETECTIONS_LIST);
    }
    let mut out = format!("Detections ({}):\n", view.entries.len());
    for entry in &view.entries {
        out.push_str("  ");
        out.push_str(&entry.summary());
        out.push('\n');
    }
    out
}

pub fn render_chart(view: &ResultsView) -> String {
    let bars = match &view.chart {
        Chart::Empty => return format!("{}\n", NO_DETECTIONS_CHART),
        Chart::Bars(bars) => bars,
    };
    let mut out = String::from("Confidence distribution:\n");
    for bar in bars {
        let filled = ((bar.share * BAR_WIDTH as f64).round() as usize).clamp(1, BAR_WIDTH);
        out.push_str(&format!(
            "  {:<6} {}{} {}\n",
            bar.bucket.label(),
            "█".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            bar.caption()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::normalize::{BucketThresholds, Detection};
    use crate::render::ListEntry;

    fn view(confidences: &[f64]) -> ResultsView {
        let detections: Vec<Detection> = confidences
            .iter()
            .map(|c| Detection {
                coordinate: Coordinate { lat: 21.205, lng: 72.985 },
                confidence: *c,
                bounding_box: None,
            })
            .collect();
        let entries = detections
            .iter()
            .enumerate()
            .map(|(i, d)| ListEntry {
                rank: i + 1,
                confidence: d.confidence,
                bucket: d.bucket(&BucketThresholds::default()),
                coordinate: d.coordinate,
            })
            .collect();
        ResultsView {
            chart: Chart::build(&detections, &BucketThresholds::default()),
            detections,
            entries,
            ..ResultsView::empty()
        }
    }

    #[test]
    fn empty_view_has_explicit_messages() {
        let empty = ResultsView::empty();
        assert_eq!(render_list(&empty).trim(), NO_DETECTIONS_LIST);
        assert_eq!(render_chart(&empty).trim(), NO_DETECTIONS_CHART);
    }

    #[test]
    fn list_shows_rank_confidence_and_coordinate() {
        let text = render_list(&view(&[0.82]));
        assert!(text.contains("#1 82% (high) at 21.205000, 72.985000"));
    }

    #[test]
    fn full_share_bar_spans_the_width() {
        let text = render_chart(&view(&[0.82]));
        assert!(text.contains(&"█".repeat(BAR_WIDTH)));
        assert!(text.contains("1 (100.0%)"));
    }
}
