//! Prediction-vs-truth line plots.
//!
//! The PNG carries the curves only: the bitmap backend is built without a
//! font rasterizer. The SVG twin written next to it adds the caption and the
//! test/predict legend, since SVG text is rendered by the viewer.

use crate::error::{RaError, Result};
use ndarray::Array1;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Plot configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Margin around the plotting area in pixels
    pub margin: u32,
    pub line_width: u32,
    /// Also write a labelled `.svg` next to the PNG
    pub labelled_svg: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 640,
            margin: 24,
            line_width: 2,
            labelled_svg: true,
        }
    }
}

/// Truth (green) and prediction (red) over the sample index
pub struct PredictionPlot {
    config: PlotConfig,
}

fn plot_err(e: impl std::fmt::Display) -> RaError {
    RaError::PlotError(e.to_string())
}

/// Axis ranges shared by both renderings
struct Bounds {
    x: Range<f64>,
    y: Range<f64>,
}

impl PredictionPlot {
    pub fn new(config: PlotConfig) -> Self {
        Self { config }
    }

    /// File name used for the test-set plot of `model_name`
    pub fn file_name(model_name: &str) -> String {
        format!("Test predict {}.png", model_name)
    }

    /// File name of the labelled SVG twin
    pub fn svg_file_name(model_name: &str) -> String {
        format!("Test predict {}.svg", model_name)
    }

    /// Caption of the labelled plot
    pub fn caption(model_name: &str) -> String {
        format!("Predict {} at test data", model_name)
    }

    /// Render into `save_dir/Test predict <model_name>.png` and return the written path
    pub fn save(&self, save_dir: &Path, model_name: &str, truth: &Array1<f64>, prediction: &Array1<f64>) -> Result<PathBuf> {
        if !save_dir.is_dir() {
            return Err(RaError::PathNotFound(save_dir.display().to_string()));
        }
        let path = save_dir.join(Self::file_name(model_name));
        self.render(&path, truth, prediction)?;
        if self.config.labelled_svg {
            self.render_svg(&save_dir.join(Self::svg_file_name(model_name)), model_name, truth, prediction)?;
        }
        Ok(path)
    }

    /// Unlabelled PNG
    pub fn render(&self, path: &Path, truth: &Array1<f64>, prediction: &Array1<f64>) -> Result<()> {
        let bounds = Self::bounds(truth, prediction)?;
        let root = BitMapBackend::new(path, (self.config.width, self.config.height)).into_drawing_area();
        self.draw(&root, &bounds, truth, prediction, None)?;
        root.present().map_err(plot_err)
    }

    /// SVG with caption and legend
    pub fn render_svg(&self, path: &Path, model_name: &str, truth: &Array1<f64>, prediction: &Array1<f64>) -> Result<()> {
        let bounds = Self::bounds(truth, prediction)?;
        let root = SVGBackend::new(path, (self.config.width, self.config.height)).into_drawing_area();
        self.draw(&root, &bounds, truth, prediction, Some(&Self::caption(model_name)))?;
        root.present().map_err(plot_err)
    }

    fn bounds(truth: &Array1<f64>, prediction: &Array1<f64>) -> Result<Bounds> {
        if truth.len() != prediction.len() {
            return Err(RaError::ShapeError {
                expected: format!("{} predictions", truth.len()),
                actual: format!("{} predictions", prediction.len()),
            });
        }
        if truth.is_empty() {
            return Err(RaError::PlotError("Nothing to plot".to_string()));
        }
        if truth.iter().chain(prediction.iter()).any(|v| !v.is_finite()) {
            return Err(RaError::PlotError("Values must be finite".to_string()));
        }

        let (mut lo, mut hi) = truth
            .iter()
            .chain(prediction.iter())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi - lo < f64::EPSILON {
            lo -= 1.0;
            hi += 1.0;
        }
        let pad = (hi - lo) * 0.05;
        Ok(Bounds {
            x: 0.0..(truth.len().max(2) - 1) as f64,
            y: (lo - pad)..(hi + pad),
        })
    }

    // Text is only drawn when `caption` is set; the bitmap backend has no font to draw it with.
    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        bounds: &Bounds,
        truth: &Array1<f64>,
        prediction: &Array1<f64>,
        caption: Option<&str>,
    ) -> Result<()> {
        root.fill(&WHITE).map_err(plot_err)?;

        let mut builder = ChartBuilder::on(root);
        builder.margin(self.config.margin);
        if let Some(caption) = caption {
            builder.caption(caption, ("sans-serif", 24));
        }
        let mut chart = builder
            .build_cartesian_2d(bounds.x.clone(), bounds.y.clone())
            .map_err(plot_err)?;

        chart
            .plotting_area()
            .draw(&Rectangle::new(
                [(bounds.x.start, bounds.y.start), (bounds.x.end, bounds.y.end)],
                BLACK.stroke_width(1),
            ))
            .map_err(plot_err)?;

        let width = self.config.line_width;
        let series = [("test", truth, GREEN), ("predict", prediction, RED)];
        for (label, values, color) in series {
            let drawn = chart
                .draw_series(LineSeries::new(
                    values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
                    color.stroke_width(width),
                ))
                .map_err(plot_err)?;
            if caption.is_some() {
                drawn
                    .label(label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(width)));
            }
        }

        if caption.is_some() {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(plot_err)?;
        }
        Ok(())
    }
}

impl Default for PredictionPlot {
    fn default() -> Self {
        Self::new(PlotConfig::default())
    }
}
