//! Waterfall chart for a single attribution
//!
//! Bars run from the expected model output E[f(X)] at the bottom to the
//! instance output f(x) at the top, largest contribution nearest the top.
//! The chart is rendered to an in-memory SVG and returned base64-encoded,
//! ready to inline as a data URI.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use plotters::coord::ranged1d::SegmentValue;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ml::{Attribution, FeatureContribution};

const WIDTH: u32 = 760;
const ROW_HEIGHT: u32 = 38;
const CHROME_HEIGHT: u32 = 110;

/// Pushes the prediction up
const POSITIVE: RGBColor = RGBColor(255, 0, 81);
/// Pushes the prediction down
const NEGATIVE: RGBColor = RGBColor(0, 139, 251);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("nothing to plot")]
    Empty,

    #[error("attribution contains non-finite values")]
    NonFinite,

    #[error("chart rendering failed: {0}")]
    Render(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Render(err.to_string())
    }
}

/// Self-contained image payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub mime_type: String,
    pub base64: String,
}

impl ChartPayload {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    pub fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.base64).ok()
    }
}

struct Step<'a> {
    contribution: &'a FeatureContribution,
    start: f64,
    end: f64,
}

/// Bottom-up bar positions: least important first, cumulative from the base
fn steps(attribution: &Attribution) -> Vec<Step<'_>> {
    let mut current = attribution.base_value;
    attribution
        .ranked()
        .into_iter()
        .rev()
        .map(|contribution| {
            let start = current;
            current += contribution.contribution;
            Step { contribution, start, end: current }
        })
        .collect()
}

fn format_value(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}

/// Render the waterfall as base64 SVG
pub fn render_waterfall(attribution: &Attribution) -> Result<ChartPayload, ChartError> {
    if attribution.contributions.is_empty() {
        return Err(ChartError::Empty);
    }
    let all_finite = attribution.base_value.is_finite()
        && attribution.output_value.is_finite()
        && attribution.contributions.iter().all(|c| c.contribution.is_finite() && c.value.is_finite());
    if !all_finite {
        return Err(ChartError::NonFinite);
    }

    let steps = steps(attribution);
    let rows = steps.len() as i32;
    let labels: Vec<String> = steps
        .iter()
        .map(|s| format!("{} = {}", s.contribution.label, format_value(s.contribution.value)))
        .collect();

    let (mut lo, mut hi) = (attribution.base_value, attribution.base_value);
    for s in &steps {
        lo = lo.min(s.start).min(s.end);
        hi = hi.max(s.start).max(s.end);
    }
    let pad = ((hi - lo) * 0.15).max(0.01);

    let mut svg = String::new();
    {
        let height = CHROME_HEIGHT + ROW_HEIGHT * rows as u32;
        let root = SVGBackend::with_string(&mut svg, (WIDTH, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let caption = format!(
            "f(x) = {:.3}    E[f(X)] = {:.3}",
            attribution.output_value, attribution.base_value
        );
        let mut chart = ChartBuilder::on(&root)
            .caption(caption, ("sans-serif", 18).into_font())
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(190)
            .build_cartesian_2d((lo - pad)..(hi + pad), (0..rows).into_segmented())?;

        let label_for = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(steps.len())
            .y_label_formatter(&label_for)
            .x_desc("Model output (probability of diabetes)")
            .draw()?;

        chart.draw_series(steps.iter().enumerate().map(|(i, s)| {
            let color = if s.contribution.contribution >= 0.0 { POSITIVE } else { NEGATIVE };
            Rectangle::new(
                [
                    (s.start.min(s.end), SegmentValue::Exact(i as i32)),
                    (s.start.max(s.end), SegmentValue::Exact(i as i32 + 1)),
                ],
                color.filled(),
            )
        }))?;

        chart.draw_series(steps.iter().enumerate().map(|(i, s)| {
            Text::new(
                format!("{:+.3}", s.contribution.contribution),
                (s.start.max(s.end), SegmentValue::CenterOf(i as i32)),
                ("sans-serif", 13).into_font(),
            )
        }))?;

        for (x, style) in [
            (attribution.base_value, BLACK.mix(0.35)),
            (attribution.output_value, BLACK.mix(0.8)),
        ] {
            chart.draw_series(LineSeries::new(
                vec![(x, SegmentValue::Exact(0)), (x, SegmentValue::Exact(rows))],
                style,
            ))?;
        }

        root.present()?;
    }

    Ok(ChartPayload {
        mime_type: "image/svg+xml".to_string(),
        base64: STANDARD.encode(svg.as_bytes()),
    })
}
