//! FFT-based spectral analysis
//!
//! Provides tapered positive-frequency spectra of real pixel time courses
//! and linear 2-D autocorrelation of complex fields.

use std::sync::Arc;

use cortimap_core::TaperWindow;
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Windowed real-input spectrum for series of a fixed length
pub struct RealSpectrum {
    len: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl RealSpectrum {
    /// Create a spectrum for series of `len` samples
    ///
    /// # Arguments
    ///
    /// * `len` - Number of time samples per series
    /// * `window` - Taper applied before the transform
    #[must_use]
    pub fn new(len: usize, window: TaperWindow) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            len,
            fft,
            window: window_coefficients(window, len),
            buffer: vec![Complex::new(0.0, 0.0); len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Series length
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the spectrum covers an empty series
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-negative frequency bins (`len / 2 + 1`)
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// Tapered, unnormalized spectrum of one series, bins `0..=len/2`
    ///
    /// # Panics
    ///
    /// Panics if `samples` is shorter than the planned length.
    pub fn transform(&mut self, samples: ArrayView1<'_, f64>) -> &[Complex<f64>] {
        assert!(samples.len() >= self.len, "Not enough samples for FFT");

        for ((slot, &s), &w) in self.buffer.iter_mut().zip(samples.iter()).zip(&self.window) {
            *slot = Complex::new(s * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        &self.buffer[..self.n_bins()]
    }
}

/// Periodic taper coefficients for a series of `len` samples
///
/// Periodic windows keep an on-bin sinusoid's phase exact: the taper only
/// leaks into the two adjacent bins.
#[must_use]
pub fn window_coefficients(window: TaperWindow, len: usize) -> Vec<f64> {
    let cosine = |a0: f64, a1: f64| -> Vec<f64> {
        (0..len)
            .map(|i| a0 - a1 * (2.0 * std::f64::consts::PI * i as f64 / len as f64).cos())
            .collect()
    };

    match window {
        TaperWindow::Hamming => cosine(0.54, 0.46),
        TaperWindow::Hann => cosine(0.5, 0.5),
        TaperWindow::Rectangular => vec![1.0; len],
    }
}

// ============================================================================
// 2-D autocorrelation
// ============================================================================

/// Linear autocorrelation `Re Σₓ z(x + d)·conj(z(x))` of a complex field
///
/// The result has shape `(2·rows − 1, 2·cols − 1)`; lag `(dr, dc)` sits at
/// index `(dr + rows − 1, dc + cols − 1)`. Computed by zero-padding to twice
/// the extent so no lag wraps around.
#[must_use]
pub fn autocorrelation_2d(field: &Array2<Complex<f64>>) -> Array2<f64> {
    let (rows, cols) = field.dim();
    if rows == 0 || cols == 0 {
        return Array2::zeros((0, 0));
    }

    let (padded_rows, padded_cols) = (2 * rows, 2 * cols);
    let mut data = vec![Complex::new(0.0, 0.0); padded_rows * padded_cols];
    for ((r, c), &z) in field.indexed_iter() {
        data[r * padded_cols + c] = z;
    }

    let mut planner = FftPlanner::new();
    let forward = (planner.plan_fft_forward(padded_cols), planner.plan_fft_forward(padded_rows));
    let inverse = (planner.plan_fft_inverse(padded_cols), planner.plan_fft_inverse(padded_rows));

    fft_2d(&mut data, padded_rows, padded_cols, &forward.0, &forward.1);
    for z in &mut data {
        *z = Complex::new(z.norm_sqr(), 0.0);
    }
    fft_2d(&mut data, padded_rows, padded_cols, &inverse.0, &inverse.1);

    let scale = (padded_rows * padded_cols) as f64;
    Array2::from_shape_fn((2 * rows - 1, 2 * cols - 1), |(i, j)| {
        let dr = i as isize - (rows as isize - 1);
        let dc = j as isize - (cols as isize - 1);
        let r = dr.rem_euclid(padded_rows as isize) as usize;
        let c = dc.rem_euclid(padded_cols as isize) as usize;
        data[r * padded_cols + c].re / scale
    })
}

/// In-place 2-D transform of a row-major buffer: rows, then columns
fn fft_2d(
    data: &mut [Complex<f64>],
    rows: usize,
    cols: usize,
    row_fft: &Arc<dyn Fft<f64>>,
    col_fft: &Arc<dyn Fft<f64>>,
) {
    // Buffers are whole multiples of the transform length, one FFT per chunk
    row_fft.process(data);

    let mut transposed = vec![Complex::new(0.0, 0.0); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            transposed[c * rows + r] = data[r * cols + c];
        }
    }
    col_fft.process(&mut transposed);
    for r in 0..rows {
        for c in 0..cols {
            data[r * cols + c] = transposed[c * rows + r];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;

    #[test]
    fn test_window_shapes() {
        let hamming = window_coefficients(TaperWindow::Hamming, 8);
        assert!((hamming[0] - 0.08).abs() < 1e-12);
        assert!((hamming[4] - 1.0).abs() < 1e-12);
        assert!((hamming[1] - hamming[7]).abs() < 1e-12);

        let hann = window_coefficients(TaperWindow::Hann, 8);
        assert!(hann[0].abs() < 1e-12);

        let flat = window_coefficients(TaperWindow::Rectangular, 5);
        assert!(flat.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_spectrum_peak_bin() {
        let mut spectrum = RealSpectrum::new(64, TaperWindow::Hann);
        assert_eq!(spectrum.n_bins(), 33);

        // 5 cycles over 64 samples
        let samples: Array1<f64> = (0..64)
            .map(|i| (2.0 * PI * 5.0 * i as f64 / 64.0).sin())
            .collect();

        let bins = spectrum.transform(samples.view());
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(k, _)| k);

        assert_eq!(peak, Some(5));
    }

    #[test]
    fn test_rectangular_dc() {
        let mut spectrum = RealSpectrum::new(4, TaperWindow::Rectangular);
        let samples = Array1::from(vec![1.0, 1.0, 1.0, 1.0]);
        let bins = spectrum.transform(samples.view());

        assert_eq!(bins.len(), 3);
        assert!((bins[0].re - 4.0).abs() < 1e-12);
        assert!(bins[1].norm() < 1e-12);
        assert!(bins[2].norm() < 1e-12);
    }

    #[test]
    fn test_autocorrelation_of_row() {
        let field = Array2::from_elem((1, 3), Complex::new(1.0, 0.0));
        let ac = autocorrelation_2d(&field);

        assert_eq!(ac.dim(), (1, 5));
        for (value, expected) in ac.iter().zip([1.0, 2.0, 3.0, 2.0, 1.0]) {
            assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_autocorrelation_of_phase_field() {
        // Unit phasors: zero lag counts pixels, opposite phases anticorrelate
        let field = Array2::from_shape_fn((2, 2), |(_, c)| {
            Complex::from_polar(1.0, if c == 0 { 0.0 } else { PI })
        });
        let ac = autocorrelation_2d(&field);

        assert_eq!(ac.dim(), (3, 3));
        assert!((ac[[1, 1]] - 4.0).abs() < 1e-9);
        assert!((ac[[1, 2]] + 2.0).abs() < 1e-9);
        assert!((ac[[2, 1]] - 2.0).abs() < 1e-9);
        assert!((ac[[0, 0]] + 1.0).abs() < 1e-9);
    }
}
