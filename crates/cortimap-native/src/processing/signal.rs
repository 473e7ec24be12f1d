//! Response preprocessing
//!
//! Baseline correction turns raw reflectance into the fractional change
//! ΔR/R the phase and feature maps are computed from; window averaging
//! collapses a stimulus epoch or a pre-stimulus baseline into one frame.

use cortimap_core::{ResponseSeries, SignalError, SignalResult};
use ndarray::{s, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a baseline frame is removed from a series
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    /// `x − b`
    Subtract,
    /// `(x − b) / b`
    #[default]
    Relative,
}

/// Per-pixel response preprocessing
pub struct SignalProcessor;

impl SignalProcessor {
    /// Remove a baseline frame from every time sample
    ///
    /// In [`BaselineMode::Relative`] pixels with a zero or non-finite
    /// baseline come out NaN in every frame.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::ShapeMismatch`] when the baseline does not
    /// match the series' spatial shape.
    pub fn normalize_by_baseline(
        series: &ResponseSeries,
        baseline: &Array2<f64>,
        mode: BaselineMode,
    ) -> SignalResult<ResponseSeries> {
        if baseline.dim() != series.shape() {
            return Err(SignalError::ShapeMismatch { expected: series.shape(), got: baseline.dim() });
        }

        let mut data = series.as_array().clone();
        for mut frame in data.axis_iter_mut(Axis(0)) {
            Zip::from(&mut frame).and(baseline).for_each(|x, &b| {
                *x = match mode {
                    BaselineMode::Subtract => *x - b,
                    BaselineMode::Relative if b != 0.0 && b.is_finite() => (*x - b) / b,
                    BaselineMode::Relative => f64::NAN,
                };
            });
        }

        debug!(?mode, frames = series.frames(), "Baseline removed");
        Ok(ResponseSeries::new(data)?)
    }

    /// Mean frame over `start..end` (end exclusive)
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidWindow`] for an empty window or one
    /// that runs past the last frame.
    pub fn average_across_time(
        series: &ResponseSeries,
        start: usize,
        end: usize,
    ) -> SignalResult<Array2<f64>> {
        let frames = series.frames();
        let invalid = SignalError::InvalidWindow { start, end, frames };
        if start >= end || end > frames {
            return Err(invalid);
        }

        series.as_array().slice(s![start..end, .., ..]).mean_axis(Axis(0)).ok_or(invalid)
    }
}
