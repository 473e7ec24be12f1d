//! Phase map extraction
//!
//! Recovers the stimulus-locked frequency component of every pixel's time
//! course: phase, magnitude, and an SNR against the pixel's spectral median.
//!
//! # Algorithm
//!
//! 1. Taper each pixel's series and take its positive-frequency spectrum
//! 2. Pick the non-DC bin with the highest spatially averaged power
//! 3. Read phase and magnitude at that bin
//! 4. SNR = magnitude / median magnitude over all bins
//! 5. Mask the phase where SNR does not exceed the threshold

use std::f64::consts::PI;

use cortimap_core::{
    PhaseMapError, PhaseMapResult, PhaseResult, ResponseSeries, RetinotopyConfig, TaperWindow,
};
use ndarray::Array2;
use rustfft::num_complex::Complex;
use tracing::{debug, warn};

use super::fft::RealSpectrum;

/// Fourier-based phase map computer
#[derive(Clone, Debug)]
pub struct PhaseMapComputer {
    snr_threshold: f64,
    window: TaperWindow,
}

impl PhaseMapComputer {
    /// Create a computer with an SNR threshold and temporal taper
    ///
    /// # Errors
    ///
    /// Returns [`PhaseMapError::InvalidThreshold`] unless `snr_threshold` is
    /// finite and positive.
    pub fn new(snr_threshold: f64, window: TaperWindow) -> PhaseResult<Self> {
        if !snr_threshold.is_finite() || snr_threshold <= 0.0 {
            return Err(PhaseMapError::InvalidThreshold { threshold: snr_threshold });
        }
        Ok(Self { snr_threshold, window })
    }

    /// Create from the pipeline configuration
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_config(config: &RetinotopyConfig) -> PhaseResult<Self> {
        Self::new(config.snr_threshold, config.window)
    }

    /// SNR a phase value must exceed to be kept
    #[must_use]
    pub fn snr_threshold(&self) -> f64 {
        self.snr_threshold
    }

    /// Temporal taper
    #[must_use]
    pub fn window(&self) -> TaperWindow {
        self.window
    }

    /// Compute phase, magnitude and SNR maps for one stimulus axis
    ///
    /// Pixels whose time course contains a non-finite sample get an invalid
    /// phase, zero magnitude and zero SNR, and do not take part in stimulus
    /// bin selection.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseMapError::NonFiniteSeries`] when no pixel has a fully
    /// finite time course.
    pub fn compute_phase_map(&self, responses: &ResponseSeries) -> PhaseResult<PhaseMapResult> {
        let frames = responses.frames();
        let (rows, cols) = responses.shape();
        if frames < ResponseSeries::MIN_SAMPLES {
            return Err(PhaseMapError::TooFewSamples {
                got: frames,
                need: ResponseSeries::MIN_SAMPLES,
            });
        }

        let mut spectrum = RealSpectrum::new(frames, self.window);
        let n_bins = spectrum.n_bins();
        let pixels = rows * cols;

        // Row-major pixel spectra, n_bins per pixel
        let mut spectra = vec![Complex::new(0.0, 0.0); pixels * n_bins];
        let mut finite = vec![false; pixels];

        for r in 0..rows {
            for c in 0..cols {
                let series = responses.pixel(r, c);
                if !series.iter().all(|v| v.is_finite()) {
                    continue;
                }
                let idx = r * cols + c;
                let bins = spectrum.transform(series);
                spectra[idx * n_bins..(idx + 1) * n_bins].copy_from_slice(bins);
                finite[idx] = true;
            }
        }

        let finite_pixels = finite.iter().filter(|&&f| f).count();
        if finite_pixels == 0 {
            return Err(PhaseMapError::NonFiniteSeries);
        }
        if finite_pixels < pixels {
            warn!(
                corrupted = pixels - finite_pixels,
                total = pixels,
                "Pixels with non-finite samples excluded from phase mapping"
            );
        }

        let stimulus_bin = select_stimulus_bin(&spectra, &finite, n_bins);

        let mut phase = Array2::from_elem((rows, cols), f64::NAN);
        let mut magnitude = Array2::zeros((rows, cols));
        let mut snr = Array2::zeros((rows, cols));
        let mut scratch = vec![0.0; n_bins];

        for (idx, _) in finite.iter().enumerate().filter(|(_, &f)| f) {
            let bins = &spectra[idx * n_bins..(idx + 1) * n_bins];
            let value = bins[stimulus_bin];
            let mag = value.norm();

            for (slot, bin) in scratch.iter_mut().zip(bins) {
                *slot = bin.norm();
            }
            let noise_floor = lower_median(&mut scratch);
            let ratio = if noise_floor > 0.0 { mag / noise_floor } else { f64::INFINITY };

            let (r, c) = (idx / cols, idx % cols);
            magnitude[[r, c]] = mag;
            snr[[r, c]] = ratio;
            if ratio > self.snr_threshold {
                phase[[r, c]] = wrap_phase(value.arg());
            }
        }

        let result = PhaseMapResult { phase, magnitude, snr, stimulus_bin };
        debug!(
            frames,
            rows,
            cols,
            stimulus_bin,
            valid_fraction = result.valid_fraction(),
            "Phase map computed"
        );

        Ok(result)
    }
}

impl Default for PhaseMapComputer {
    fn default() -> Self {
        Self {
            snr_threshold: RetinotopyConfig::DEFAULT_SNR_THRESHOLD,
            window: TaperWindow::default(),
        }
    }
}

/// Non-DC bin with the highest mean power over finite pixels; ties go to the
/// lowest index
fn select_stimulus_bin(spectra: &[Complex<f64>], finite: &[bool], n_bins: usize) -> usize {
    let mut power = vec![0.0; n_bins];
    let mut count = 0usize;

    for (idx, _) in finite.iter().enumerate().filter(|(_, &f)| f) {
        for (acc, bin) in power.iter_mut().zip(&spectra[idx * n_bins..(idx + 1) * n_bins]) {
            *acc += bin.norm_sqr();
        }
        count += 1;
    }

    let count = count.max(1) as f64;
    let mut best = 1;
    for k in 2..n_bins {
        if power[k] / count > power[best] / count {
            best = k;
        }
    }
    best
}

/// Lower median (no averaging for even lengths); reorders `values`
fn lower_median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    values[(values.len() - 1) / 2]
}

/// Map an angle from `atan2` into (−π, π]
#[inline]
fn wrap_phase(angle: f64) -> f64 {
    if angle <= -PI {
        angle + 2.0 * PI
    } else {
        angle
    }
}
