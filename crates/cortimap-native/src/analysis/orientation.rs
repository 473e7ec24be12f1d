//! Orientation map structure
//!
//! Given a selectivity magnitude and a preferred-orientation map (radians,
//! period π), measures how fast orientation changes, how uniform it is
//! locally, where it winds around a pinwheel singularity, and the typical
//! size of an iso-orientation domain.

use cortimap_core::math::gradient;
use cortimap_core::{FeatureMapError, FeatureMapResult};
use ndarray::{Array2, Zip};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::processing::fft::autocorrelation_2d;
use crate::processing::filters::{GaussianFilter, SpatialFilter};
use crate::statistics::{finite_mean, finite_median};

/// Structural measures of one orientation map
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrientationAnalysis {
    /// Selectivity magnitude as given
    pub magnitude: Array2<f64>,
    /// Preferred orientation as given (radians)
    pub orientation: Array2<f64>,
    /// Circular uniformity `|mean exp(2iθ)|` over each pixel's window, in
    /// [0, 1]; NaN outside the analysed region
    pub uniformity: Array2<f64>,
    /// Orientation gradient magnitude (radians per pixel); NaN outside the
    /// analysed region
    pub gradient: Array2<f64>,
    /// Pinwheel centres as `(x, y)` pixel coordinates
    pub pinwheels: Vec<(f64, f64)>,
    /// Typical domain radius in pixels, `None` when nothing was analysed
    pub domain_size: Option<f64>,
}

/// Scalar summary of an [`OrientationAnalysis`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationSummary {
    /// Mean finite magnitude
    pub mean_selectivity: f64,
    /// Median finite uniformity
    pub median_uniformity: f64,
    /// Mean finite gradient
    pub mean_gradient: f64,
    /// Pinwheels per finite-magnitude pixel
    pub pinwheel_density: f64,
    /// Typical domain radius in pixels
    pub domain_size: Option<f64>,
}

impl OrientationAnalysis {
    /// Summarize the analysis
    #[must_use]
    pub fn summary(&self) -> OrientationSummary {
        let selective = self.magnitude.iter().filter(|m| m.is_finite()).count();
        let pinwheel_density = if selective == 0 {
            f64::NAN
        } else {
            self.pinwheels.len() as f64 / selective as f64
        };

        OrientationSummary {
            mean_selectivity: finite_mean(&self.magnitude),
            median_uniformity: finite_median(&self.uniformity),
            mean_gradient: finite_mean(&self.gradient),
            pinwheel_density,
            domain_size: self.domain_size,
        }
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Measures gradient, uniformity, pinwheels and domain size of orientation
/// maps
#[derive(Clone, Debug)]
pub struct OrientationAnalyzer {
    min_magnitude: f64,
    pinwheel_threshold: f64,
    gradient_filter: GaussianFilter,
    uniformity_window: usize,
}

impl OrientationAnalyzer {
    /// Default magnitude a pixel must exceed to be analysed
    pub const DEFAULT_MIN_MAGNITUDE: f64 = 0.1;
    /// Default winding (radians) that marks a pinwheel
    pub const DEFAULT_PINWHEEL_THRESHOLD: f64 = 0.5;
    /// Default smoothing sigma before the gradient (pixels)
    pub const DEFAULT_GRADIENT_SIGMA: f64 = 2.0;
    /// Default uniformity window width (pixels)
    pub const DEFAULT_UNIFORMITY_WINDOW: usize = 5;

    /// Create an analyzer
    ///
    /// # Errors
    ///
    /// Returns [`FeatureMapError::InvalidParameter`] for a negative or
    /// non-finite `min_magnitude`, a non-positive `pinwheel_threshold`, or an
    /// even or zero `uniformity_window`, and [`FeatureMapError::Smoothing`]
    /// for an unusable `gradient_sigma`.
    pub fn new(
        min_magnitude: f64,
        pinwheel_threshold: f64,
        gradient_sigma: f64,
        uniformity_window: usize,
    ) -> FeatureMapResult<Self> {
        if !min_magnitude.is_finite() || min_magnitude < 0.0 {
            return Err(FeatureMapError::InvalidParameter {
                parameter: "min_magnitude",
                value: min_magnitude,
            });
        }
        if !pinwheel_threshold.is_finite() || pinwheel_threshold <= 0.0 {
            return Err(FeatureMapError::InvalidParameter {
                parameter: "pinwheel_threshold",
                value: pinwheel_threshold,
            });
        }
        if uniformity_window % 2 == 0 {
            return Err(FeatureMapError::InvalidParameter {
                parameter: "uniformity_window",
                value: uniformity_window as f64,
            });
        }

        Ok(Self {
            min_magnitude,
            pinwheel_threshold,
            gradient_filter: GaussianFilter::new(gradient_sigma)?,
            uniformity_window,
        })
    }

    /// Magnitude a pixel must exceed to be analysed
    #[must_use]
    pub fn min_magnitude(&self) -> f64 {
        self.min_magnitude
    }

    /// Winding (radians) that marks a pinwheel
    #[must_use]
    pub fn pinwheel_threshold(&self) -> f64 {
        self.pinwheel_threshold
    }

    /// Uniformity window width (pixels)
    #[must_use]
    pub fn uniformity_window(&self) -> usize {
        self.uniformity_window
    }

    /// Analyse an orientation map
    ///
    /// Pixels take part when they lie inside `mask` (whole map if `None`),
    /// their magnitude exceeds the minimum, and their orientation is finite.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureMapError::EmptyExtent`] for an empty map and
    /// [`FeatureMapError::ShapeMismatch`] when the orientation or mask does
    /// not match the magnitude.
    pub fn analyze(
        &self,
        magnitude: &Array2<f64>,
        orientation: &Array2<f64>,
        mask: Option<&Array2<bool>>,
    ) -> FeatureMapResult<OrientationAnalysis> {
        let shape = magnitude.dim();
        if shape.0 == 0 || shape.1 == 0 {
            return Err(FeatureMapError::EmptyExtent { rows: shape.0, cols: shape.1 });
        }
        if orientation.dim() != shape {
            return Err(FeatureMapError::ShapeMismatch {
                field: "orientation",
                expected: shape,
                got: orientation.dim(),
            });
        }
        if let Some(mask) = mask {
            if mask.dim() != shape {
                return Err(FeatureMapError::ShapeMismatch {
                    field: "mask",
                    expected: shape,
                    got: mask.dim(),
                });
            }
        }

        let valid = Zip::from(magnitude).and(orientation).map_collect(|&m, &o| {
            m > self.min_magnitude && o.is_finite()
        });
        let valid = match mask {
            Some(mask) => Zip::from(&valid).and(mask).map_collect(|&v, &inside| v && inside),
            None => valid,
        };

        let gradient = self.orientation_gradient(orientation, &valid);
        let uniformity = self.local_uniformity(orientation, &valid);
        let pinwheels = self.detect_pinwheels(orientation, &valid);
        let domain_size = domain_size(orientation, &valid);

        debug!(
            valid = valid.iter().filter(|&&v| v).count(),
            pinwheels = pinwheels.len(),
            ?domain_size,
            "Orientation map analysed"
        );

        Ok(OrientationAnalysis {
            magnitude: magnitude.clone(),
            orientation: orientation.clone(),
            uniformity,
            gradient,
            pinwheels,
            domain_size,
        })
    }

    /// Gradient magnitude of the smoothed orientation, NaN outside `valid`
    fn orientation_gradient(&self, orientation: &Array2<f64>, valid: &Array2<bool>) -> Array2<f64> {
        let masked = Zip::from(orientation)
            .and(valid)
            .map_collect(|&o, &v| if v { o } else { f64::NAN });
        let smoothed = self.gradient_filter.apply(&masked);
        let (d_row, d_col) = gradient(&smoothed);

        Zip::from(&d_row).and(&d_col).and(valid).map_collect(|&dr, &dc, &v| {
            if v {
                dr.hypot(dc)
            } else {
                f64::NAN
            }
        })
    }

    /// `|mean exp(2iθ)|` over the valid pixels of a window clipped at the
    /// map border
    fn local_uniformity(&self, orientation: &Array2<f64>, valid: &Array2<bool>) -> Array2<f64> {
        let (rows, cols) = orientation.dim();
        let half = self.uniformity_window / 2;

        Array2::from_shape_fn((rows, cols), |(r, c)| {
            if !valid[[r, c]] {
                return f64::NAN;
            }
            let mut sum = Complex::new(0.0, 0.0);
            let mut n = 0usize;
            for rr in r.saturating_sub(half)..(r + half + 1).min(rows) {
                for cc in c.saturating_sub(half)..(c + half + 1).min(cols) {
                    if valid[[rr, cc]] {
                        sum += Complex::from_polar(1.0, 2.0 * orientation[[rr, cc]]);
                        n += 1;
                    }
                }
            }
            sum.norm() / n as f64
        })
    }

    /// Centres of 2×2 plaquettes around which orientation winds
    ///
    /// Orientation differences along the four edges are wrapped into
    /// [−π/2, π/2] and summed; a pinwheel winds by ±π, a smooth patch by 0.
    fn detect_pinwheels(&self, orientation: &Array2<f64>, valid: &Array2<bool>) -> Vec<(f64, f64)> {
        let (rows, cols) = orientation.dim();
        let wrap = |d: f64| d - PI * (d / PI).round();
        let mut centres = Vec::new();

        for r in 0..rows.saturating_sub(1) {
            for c in 0..cols.saturating_sub(1) {
                let corners = [(r, c), (r, c + 1), (r + 1, c + 1), (r + 1, c)];
                if !corners.iter().all(|&p| valid[p]) {
                    continue;
                }
                let winding: f64 = (0..4)
                    .map(|k| {
                        let from = orientation[corners[k]];
                        let to = orientation[corners[(k + 1) % 4]];
                        wrap(to - from)
                    })
                    .sum();
                if winding.abs() > self.pinwheel_threshold {
                    centres.push((c as f64 + 0.5, r as f64 + 0.5));
                }
            }
        }

        centres
    }
}

impl Default for OrientationAnalyzer {
    fn default() -> Self {
        Self {
            min_magnitude: Self::DEFAULT_MIN_MAGNITUDE,
            pinwheel_threshold: Self::DEFAULT_PINWHEEL_THRESHOLD,
            gradient_filter: GaussianFilter::from_constant(Self::DEFAULT_GRADIENT_SIGMA),
            uniformity_window: Self::DEFAULT_UNIFORMITY_WINDOW,
        }
    }
}

// ============================================================================
// Domain size
// ============================================================================

/// Radius of the first autocorrelation trough of `exp(2iθ)`
///
/// The radial mean of the autocorrelation is taken over lags up to half the
/// shorter side; the result is the lowest point after its peak.
fn domain_size(orientation: &Array2<f64>, valid: &Array2<bool>) -> Option<f64> {
    let (rows, cols) = orientation.dim();
    let max_radius = rows.min(cols) / 2;
    if max_radius == 0 || !valid.iter().any(|&v| v) {
        return None;
    }

    let phasor = Zip::from(orientation).and(valid).map_collect(|&o, &v| {
        if v {
            Complex::from_polar(1.0, 2.0 * o)
        } else {
            Complex::new(0.0, 0.0)
        }
    });
    let ac = autocorrelation_2d(&phasor);

    let mut sums = vec![0.0; max_radius + 1];
    let mut counts = vec![0usize; max_radius + 1];
    for ((i, j), &value) in ac.indexed_iter() {
        let dr = i as f64 - (rows - 1) as f64;
        let dc = j as f64 - (cols - 1) as f64;
        let radius = dr.hypot(dc).round() as usize;
        if radius <= max_radius {
            sums[radius] += value;
            counts[radius] += 1;
        }
    }
    let radial: Vec<f64> = sums.iter().zip(&counts).map(|(s, &n)| s / n as f64).collect();

    let peak = first_extreme(&radial, |candidate, best| candidate > best);
    let trough = peak + first_extreme(&radial[peak..], |candidate, best| candidate < best);
    Some(trough as f64)
}

/// Index of the first value that beats every other under `better`
fn first_extreme(values: &[f64], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if better(v, values[best]) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_magnitude(rows: usize, cols: usize) -> Array2<f64> {
        Array2::ones((rows, cols))
    }

    /// Orientation rotating through π every `period` columns
    fn stripes(size: usize, period: f64) -> Array2<f64> {
        Array2::from_shape_fn((size, size), |(_, c)| PI * c as f64 / period)
    }

    #[test]
    fn test_single_pinwheel() {
        let orientation = Array2::from_shape_fn((10, 10), |(r, c)| {
            (r as f64 - 4.5).atan2(c as f64 - 4.5) / 2.0
        });

        let analysis = OrientationAnalyzer::default()
            .analyze(&uniform_magnitude(10, 10), &orientation, None)
            .unwrap();

        assert_eq!(analysis.pinwheels, vec![(4.5, 4.5)]);
        let summary = analysis.summary();
        assert!((summary.pinwheel_density - 0.01).abs() < 1e-12);
        assert!((summary.mean_selectivity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_orientation() {
        let orientation = Array2::from_elem((8, 8), 0.4);
        let analysis = OrientationAnalyzer::default()
            .analyze(&uniform_magnitude(8, 8), &orientation, None)
            .unwrap();

        assert!(analysis.pinwheels.is_empty());
        for (&u, &g) in analysis.uniformity.iter().zip(&analysis.gradient) {
            assert!((u - 1.0).abs() < 1e-12);
            assert!(g.abs() < 1e-12);
        }
        assert!((analysis.summary().median_uniformity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_of_ramp() {
        let orientation = Array2::from_shape_fn((24, 24), |(_, c)| 0.01 * c as f64);
        let analysis = OrientationAnalyzer::default()
            .analyze(&uniform_magnitude(24, 24), &orientation, None)
            .unwrap();

        assert!((analysis.gradient[[12, 12]] - 0.01).abs() < 1e-9);
        assert!(analysis.uniformity[[12, 12]] > 0.99);
    }

    #[test]
    fn test_weak_and_masked_pixels_excluded() {
        let orientation = Array2::from_elem((6, 6), 0.2);
        let mut magnitude = uniform_magnitude(6, 6);
        magnitude[[1, 1]] = 0.05;
        let mut mask = Array2::from_elem((6, 6), true);
        mask[[4, 4]] = false;

        let analysis = OrientationAnalyzer::default()
            .analyze(&magnitude, &orientation, Some(&mask))
            .unwrap();

        for (r, c) in [(1, 1), (4, 4)] {
            assert!(analysis.uniformity[[r, c]].is_nan());
            assert!(analysis.gradient[[r, c]].is_nan());
        }
        assert!((analysis.uniformity[[1, 2]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_domain_size_tracks_period() {
        let analyzer = OrientationAnalyzer::default();
        let size = |period: f64| {
            analyzer
                .analyze(&uniform_magnitude(48, 48), &stripes(48, period), None)
                .unwrap()
                .domain_size
                .unwrap()
        };

        let small = size(6.0);
        let large = size(16.0);
        assert!((3.0..=5.0).contains(&small), "small domains: {small}");
        assert!((8.0..=12.0).contains(&large), "large domains: {large}");
        assert!(small < large);
    }

    #[test]
    fn test_nothing_to_analyse() {
        let orientation = stripes(8, 4.0);
        let mask = Array2::from_elem((8, 8), false);

        let analysis = OrientationAnalyzer::default()
            .analyze(&uniform_magnitude(8, 8), &orientation, Some(&mask))
            .unwrap();

        assert_eq!(analysis.domain_size, None);
        assert!(analysis.pinwheels.is_empty());
        let summary = analysis.summary();
        assert!(summary.median_uniformity.is_nan());
        assert!(summary.mean_gradient.is_nan());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let analyzer = OrientationAnalyzer::default();
        assert_eq!(
            analyzer
                .analyze(&uniform_magnitude(4, 4), &Array2::zeros((4, 3)), None)
                .unwrap_err(),
            FeatureMapError::ShapeMismatch { field: "orientation", expected: (4, 4), got: (4, 3) }
        );
        assert_eq!(
            analyzer
                .analyze(&Array2::zeros((0, 3)), &Array2::zeros((0, 3)), None)
                .unwrap_err(),
            FeatureMapError::EmptyExtent { rows: 0, cols: 3 }
        );

        assert!(matches!(
            OrientationAnalyzer::new(0.1, 0.5, 2.0, 4),
            Err(FeatureMapError::InvalidParameter { parameter: "uniformity_window", .. })
        ));
        assert!(matches!(
            OrientationAnalyzer::new(0.1, f64::NAN, 2.0, 5),
            Err(FeatureMapError::InvalidParameter { parameter: "pinwheel_threshold", .. })
        ));
        assert!(matches!(
            OrientationAnalyzer::new(0.1, 0.5, -1.0, 5),
            Err(FeatureMapError::Smoothing(_))
        ));

        let analyzer = OrientationAnalyzer::new(0.2, 1.0, 1.5, 3).unwrap();
        assert_eq!(analyzer.min_magnitude(), 0.2);
        assert_eq!(analyzer.pinwheel_threshold(), 1.0);
        assert_eq!(analyzer.uniformity_window(), 3);
    }
}
