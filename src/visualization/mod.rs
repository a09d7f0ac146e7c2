//! Visualization module: prediction plots exported as PNG.

pub mod plot;
pub use plot::{PlotConfig, PredictionPlot};
