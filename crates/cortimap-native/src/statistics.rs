//! Summary statistics over computed maps
//!
//! Histograms only count pixels whose response magnitude clears a gate.
//! Without an explicit gate the 25th percentile of the finite magnitudes is
//! used, so the weakest quarter of the map never contributes.

use std::f64::consts::PI;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{StatisticsError, StatisticsResult};

/// Percentile used as the histogram gate when none is given
pub const DEFAULT_GATE_PERCENTILE: f64 = 25.0;

/// Response strength summary inside a region of interest
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectivityStats {
    /// Mean over finite pixels
    pub mean: f64,
    /// Median (even counts average the two middle values)
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    /// Finite pixels over ROI pixels
    pub coverage: f64,
}

impl SelectivityStats {
    const EMPTY: Self = Self { mean: f64::NAN, median: f64::NAN, std: f64::NAN, coverage: 0.0 };
}

/// Equal-width histogram
///
/// Centres are in the unit of the binned quantity: radians for
/// [`MapStatistics::phase_histogram`], degrees for
/// [`MapStatistics::preference_distribution`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin centres
    pub centers: Vec<f64>,
    /// Pixels per bin
    pub counts: Vec<usize>,
}

impl Histogram {
    fn binned(lo: f64, hi: f64, n_bins: usize, values: impl Iterator<Item = f64>) -> Self {
        let width = (hi - lo) / n_bins as f64;
        let centers = (0..n_bins).map(|i| lo + (i as f64 + 0.5) * width).collect();
        let mut counts = vec![0; n_bins];

        for v in values {
            let bin = ((v - lo) / width).floor().max(0.0) as usize;
            counts[bin.min(n_bins - 1)] += 1;
        }

        Self { centers, counts }
    }

    /// Number of values binned
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Centre of the most populated bin; ties go to the lowest bin
    #[must_use]
    pub fn mode(&self) -> Option<f64> {
        let mut best: Option<(usize, usize)> = None;
        for (i, &n) in self.counts.iter().enumerate() {
            if n > 0 && best.map_or(true, |(_, b)| n > b) {
                best = Some((i, n));
            }
        }
        best.map(|(i, _)| self.centers[i])
    }
}

/// Map statistics
pub struct MapStatistics;

impl MapStatistics {
    /// Selectivity statistics of `magnitude` inside `roi` (whole map if
    /// `None`)
    ///
    /// An ROI without finite pixels yields NaN statistics and zero coverage.
    ///
    /// # Errors
    ///
    /// Returns [`StatisticsError::RoiShapeMismatch`] if the ROI does not
    /// match the map.
    pub fn selectivity(
        magnitude: &Array2<f64>,
        roi: Option<&Array2<bool>>,
    ) -> StatisticsResult<SelectivityStats> {
        let mut values = Vec::new();
        let roi_pixels = match roi {
            Some(mask) => {
                if mask.dim() != magnitude.dim() {
                    return Err(StatisticsError::RoiShapeMismatch {
                        expected: magnitude.dim(),
                        got: mask.dim(),
                    });
                }
                Zip::from(magnitude).and(mask).for_each(|&m, &inside| {
                    if inside && m.is_finite() {
                        values.push(m);
                    }
                });
                mask.iter().filter(|&&inside| inside).count()
            }
            None => {
                values.extend(magnitude.iter().copied().filter(|m| m.is_finite()));
                magnitude.len()
            }
        };

        if values.is_empty() {
            return Ok(SelectivityStats::EMPTY);
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Ok(SelectivityStats {
            mean,
            median: median_of(&mut values),
            std: variance.sqrt(),
            coverage: values.len() as f64 / roi_pixels as f64,
        })
    }

    /// `q`-th percentile of the finite values, linearly interpolated
    /// between order statistics; `None` when no value is finite
    ///
    /// # Errors
    ///
    /// Returns [`StatisticsError::InvalidPercentile`] unless `q` lies in
    /// [0, 100].
    pub fn percentile(field: &Array2<f64>, q: f64) -> StatisticsResult<Option<f64>> {
        if !(0.0..=100.0).contains(&q) {
            return Err(StatisticsError::InvalidPercentile { q });
        }

        let mut values: Vec<f64> = field.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Ok(None);
        }
        values.sort_unstable_by(f64::total_cmp);

        let rank = q / 100.0 * (values.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        Ok(Some(values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)))
    }

    /// Histogram of gated phases in `n_bins` equal bins over (−π, π]
    ///
    /// A phase is counted when it is finite and its magnitude exceeds
    /// `min_magnitude` (default: the 25th percentile of `magnitude`).
    ///
    /// # Errors
    ///
    /// Returns [`StatisticsError::NoBins`] when `n_bins` is zero and
    /// [`StatisticsError::ShapeMismatch`] when the maps differ in shape.
    pub fn phase_histogram(
        phase: &Array2<f64>,
        magnitude: &Array2<f64>,
        n_bins: usize,
        min_magnitude: Option<f64>,
    ) -> StatisticsResult<Histogram> {
        let values = gated(phase, magnitude, n_bins, min_magnitude)?;
        Ok(Histogram::binned(-PI, PI, n_bins, values.into_iter()))
    }

    /// Distribution of gated orientation preferences over [0°, 180°)
    ///
    /// Preferences are radians and are folded modulo 180°. Gating is the
    /// same as for [`Self::phase_histogram`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::phase_histogram`].
    pub fn preference_distribution(
        preference: &Array2<f64>,
        magnitude: &Array2<f64>,
        n_bins: usize,
        min_magnitude: Option<f64>,
    ) -> StatisticsResult<Histogram> {
        let values = gated(preference, magnitude, n_bins, min_magnitude)?;
        let degrees = values.into_iter().map(|p| p.to_degrees().rem_euclid(180.0));
        Ok(Histogram::binned(0.0, 180.0, n_bins, degrees))
    }
}

/// Finite values of `field` whose magnitude clears the gate
fn gated(
    field: &Array2<f64>,
    magnitude: &Array2<f64>,
    n_bins: usize,
    min_magnitude: Option<f64>,
) -> StatisticsResult<Vec<f64>> {
    if n_bins == 0 {
        return Err(StatisticsError::NoBins);
    }
    if magnitude.dim() != field.dim() {
        return Err(StatisticsError::ShapeMismatch { expected: field.dim(), got: magnitude.dim() });
    }

    let gate = match min_magnitude {
        Some(gate) => gate,
        None => match MapStatistics::percentile(magnitude, DEFAULT_GATE_PERCENTILE)? {
            Some(gate) => gate,
            None => return Ok(Vec::new()),
        },
    };

    let mut values = Vec::new();
    Zip::from(field).and(magnitude).for_each(|&v, &m| {
        if v.is_finite() && m > gate {
            values.push(v);
        }
    });
    Ok(values)
}

/// Median of a non-empty slice (sorts it in place)
fn median_of(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Mean of the finite values, NaN when there are none
pub(crate) fn finite_mean(field: &Array2<f64>) -> f64 {
    let (sum, n) = field
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Median of the finite values, NaN when there are none
pub(crate) fn finite_median(field: &Array2<f64>) -> f64 {
    let mut values: Vec<f64> = field.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        f64::NAN
    } else {
        median_of(&mut values)
    }
}
