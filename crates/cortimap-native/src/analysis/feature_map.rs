//! Orientation, direction and colour preference maps
//!
//! Orientation and direction maps are vector sums over stimulus conditions:
//! each condition's response is a vector at its stimulus angle (doubled for
//! orientation, whose period is π). The sum's angle is the preference and
//! its length the selectivity. Colour maps take the strongest wavelength as
//! the preference and the spread of peak-normalized responses as the
//! selectivity.
//!
//! Both outputs are Gaussian-smoothed, and the preference is masked where
//! the smoothed selectivity falls below `min_magnitude`. As with phase maps,
//! the preference is smoothed as a linear field.

use cortimap_core::{FeatureKind, FeatureMap, FeatureMapError, FeatureMapResult};
use ndarray::{Array2, Array3, Zip};
use tracing::debug;

use crate::processing::filters::{GaussianFilter, SpatialFilter};

/// Builds feature preference maps from per-condition response frames
#[derive(Clone, Debug)]
pub struct FeatureMapAnalyzer {
    filter: GaussianFilter,
    min_magnitude: f64,
}

impl FeatureMapAnalyzer {
    /// Default selectivity below which the preference is masked
    pub const DEFAULT_MIN_MAGNITUDE: f64 = 0.1;

    /// Create an analyzer
    ///
    /// # Errors
    ///
    /// Returns [`FeatureMapError::Smoothing`] for an unusable sigma and
    /// [`FeatureMapError::InvalidParameter`] unless `min_magnitude` is finite
    /// and non-negative.
    pub fn new(smoothing_sigma: f64, min_magnitude: f64) -> FeatureMapResult<Self> {
        let filter = GaussianFilter::new(smoothing_sigma)?;
        if !min_magnitude.is_finite() || min_magnitude < 0.0 {
            return Err(FeatureMapError::InvalidParameter {
                parameter: "min_magnitude",
                value: min_magnitude,
            });
        }
        Ok(Self { filter, min_magnitude })
    }

    /// Smoothing sigma (pixels)
    #[must_use]
    pub fn smoothing_sigma(&self) -> f64 {
        self.filter.sigma()
    }

    /// Selectivity below which the preference is masked
    #[must_use]
    pub fn min_magnitude(&self) -> f64 {
        self.min_magnitude
    }

    /// Orientation preference in (−π/2, π/2] radians
    ///
    /// # Arguments
    ///
    /// * `responses` - `(condition, row, column)` response frames
    /// * `orientations` - Stimulus orientation of each condition in degrees
    ///
    /// # Errors
    ///
    /// Fails when the labels do not match the conditions, a label is not
    /// finite, or the spatial extent is empty.
    pub fn process_orientation_map(
        &self,
        responses: &Array3<f64>,
        orientations: &[f64],
    ) -> FeatureMapResult<FeatureMap> {
        self.vector_map(FeatureKind::Orientation, responses, orientations, 2.0)
    }

    /// Direction preference in (−π, π] radians
    ///
    /// # Errors
    ///
    /// Same as [`Self::process_orientation_map`].
    pub fn process_direction_map(
        &self,
        responses: &Array3<f64>,
        directions: &[f64],
    ) -> FeatureMapResult<FeatureMap> {
        self.vector_map(FeatureKind::Direction, responses, directions, 1.0)
    }

    /// Preferred wavelength (nm) and colour selectivity
    ///
    /// Selectivity is the population standard deviation of the responses
    /// divided by their per-pixel maximum. Ties for the strongest response go
    /// to the first condition. Pixels whose maximum response is not positive
    /// are invalid.
    ///
    /// # Errors
    ///
    /// Same as [`Self::process_orientation_map`].
    pub fn process_color_map(
        &self,
        responses: &Array3<f64>,
        wavelengths: &[f64],
    ) -> FeatureMapResult<FeatureMap> {
        check_conditions(responses, wavelengths, "wavelengths")?;
        let (_, rows, cols) = responses.dim();

        let mut selectivity = Array2::from_elem((rows, cols), f64::NAN);
        let mut preferred = Array2::from_elem((rows, cols), f64::NAN);

        for r in 0..rows {
            for c in 0..cols {
                let values = responses.slice(ndarray::s![.., r, c]);
                if !values.iter().all(|v| v.is_finite()) {
                    continue;
                }
                let (best, peak) = values.iter().enumerate().fold(
                    (0, f64::NEG_INFINITY),
                    |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) },
                );
                if peak <= 0.0 {
                    continue;
                }

                let n = values.len() as f64;
                let mean = values.iter().map(|v| v / peak).sum::<f64>() / n;
                let variance = values.iter().map(|v| (v / peak - mean).powi(2)).sum::<f64>() / n;

                selectivity[[r, c]] = variance.sqrt();
                preferred[[r, c]] = wavelengths[best];
            }
        }

        Ok(self.finish(FeatureKind::Color, &selectivity, &preferred))
    }

    fn vector_map(
        &self,
        kind: FeatureKind,
        responses: &Array3<f64>,
        angles_deg: &[f64],
        harmonic: f64,
    ) -> FeatureMapResult<FeatureMap> {
        check_conditions(responses, angles_deg, kind.name())?;
        let (_, rows, cols) = responses.dim();

        let basis: Vec<(f64, f64)> = angles_deg
            .iter()
            .map(|deg| (harmonic * deg.to_radians()).sin_cos())
            .collect();

        let mut magnitude = Array2::from_elem((rows, cols), f64::NAN);
        let mut preference = Array2::from_elem((rows, cols), f64::NAN);

        for r in 0..rows {
            for c in 0..cols {
                let values = responses.slice(ndarray::s![.., r, c]);
                if !values.iter().all(|v| v.is_finite()) {
                    continue;
                }
                let (re, im) = values
                    .iter()
                    .zip(&basis)
                    .fold((0.0, 0.0), |(re, im), (&v, &(sin, cos))| (re + v * cos, im + v * sin));

                magnitude[[r, c]] = re.hypot(im);
                preference[[r, c]] = im.atan2(re) / harmonic;
            }
        }

        Ok(self.finish(kind, &magnitude, &preference))
    }

    /// Smooth both fields, keep raw-invalid pixels invalid and gate the
    /// preference on the smoothed magnitude
    fn finish(&self, kind: FeatureKind, magnitude: &Array2<f64>, preference: &Array2<f64>) -> FeatureMap {
        let mut smoothed_magnitude = self.filter.apply(magnitude);
        let mut smoothed_preference = self.filter.apply(preference);

        Zip::from(&mut smoothed_magnitude)
            .and(&mut smoothed_preference)
            .and(magnitude)
            .for_each(|m, p, &raw| {
                if !raw.is_finite() {
                    *m = f64::NAN;
                    *p = f64::NAN;
                } else if *m < self.min_magnitude {
                    *p = f64::NAN;
                }
            });

        let map = FeatureMap { kind, magnitude: smoothed_magnitude, preference: smoothed_preference };
        debug!(
            kind = kind.name(),
            valid = map.valid_count(),
            total = magnitude.len(),
            "Feature map computed"
        );
        map
    }
}

impl Default for FeatureMapAnalyzer {
    fn default() -> Self {
        Self {
            filter: GaussianFilter::default(),
            min_magnitude: Self::DEFAULT_MIN_MAGNITUDE,
        }
    }
}

fn check_conditions(
    responses: &Array3<f64>,
    labels: &[f64],
    parameter: &'static str,
) -> FeatureMapResult<()> {
    let (conditions, rows, cols) = responses.dim();
    if conditions == 0 {
        return Err(FeatureMapError::NoConditions);
    }
    if conditions != labels.len() {
        return Err(FeatureMapError::ConditionMismatch { conditions, labels: labels.len() });
    }
    if rows == 0 || cols == 0 {
        return Err(FeatureMapError::EmptyExtent { rows, cols });
    }
    if let Some(&value) = labels.iter().find(|v| !v.is_finite()) {
        return Err(FeatureMapError::InvalidParameter { parameter, value });
    }
    Ok(())
}
