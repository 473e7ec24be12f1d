//! Visual field sign map generation
//!
//! The sign of a pixel is the orientation of the horizontal and vertical
//! phase gradients relative to each other: mirror-image representations of
//! visual space come out with opposite signs.
//!
//! Phase maps are smoothed linearly. Near the ±π wrap this blurs across the
//! discontinuity; the resulting gradient spike is left in place (it lands on
//! area borders, which segmentation treats as boundary evidence anyway).

use cortimap_core::math::{gradient, sign_of};
use cortimap_core::{SignMap, SignMapError, SignMapResult};
use ndarray::{Array2, Zip};
use rustfft::num_complex::Complex;
use tracing::debug;

use super::filters::{GaussianFilter, SpatialFilter};

/// Derives visual field sign maps from pairs of orthogonal phase maps
#[derive(Clone, Copy, Debug, Default)]
pub struct SignMapGenerator;

impl SignMapGenerator {
    /// Create a generator
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate a sign map with Gaussian smoothing
    ///
    /// # Arguments
    ///
    /// * `phase_h` - Horizontal-axis phase map (NaN = invalid)
    /// * `phase_v` - Vertical-axis phase map (NaN = invalid)
    /// * `smoothing_sigma` - Gaussian sigma in pixels
    ///
    /// # Errors
    ///
    /// Returns [`SignMapError::ShapeMismatch`] if the maps differ in shape
    /// and [`SignMapError::InvalidSigma`] for a non-positive sigma.
    pub fn generate_sign_map(
        &self,
        phase_h: &Array2<f64>,
        phase_v: &Array2<f64>,
        smoothing_sigma: f64,
    ) -> SignMapResult<SignMap> {
        check_shapes(phase_h, phase_v)?;
        let filter = GaussianFilter::new(smoothing_sigma)?;
        self.generate_with_filter(phase_h, phase_v, &filter)
    }

    /// Generate a sign map with any smoothing filter
    ///
    /// # Errors
    ///
    /// Returns [`SignMapError::ShapeMismatch`] if the maps differ in shape.
    pub fn generate_with_filter(
        &self,
        phase_h: &Array2<f64>,
        phase_v: &Array2<f64>,
        filter: &dyn SpatialFilter,
    ) -> SignMapResult<SignMap> {
        check_shapes(phase_h, phase_v)?;

        let grad_h = smoothed_gradient(phase_h, filter);
        let grad_v = smoothed_gradient(phase_v, filter);
        let mut values = field_sign(&grad_h, &grad_v);

        // Invalid wherever either input is invalid, even if smoothing
        // filled the pixel in from its neighbours
        Zip::from(&mut values).and(phase_h).and(phase_v).for_each(|s, &h, &v| {
            if !h.is_finite() || !v.is_finite() {
                *s = f64::NAN;
            }
        });

        let map = SignMap::from_values(values);
        debug!(
            kernel = filter.kind(),
            invalid = map.invalid_count(),
            total = phase_h.len(),
            "Sign map generated"
        );

        Ok(map)
    }
}

fn check_shapes(phase_h: &Array2<f64>, phase_v: &Array2<f64>) -> SignMapResult<()> {
    if phase_h.dim() == phase_v.dim() {
        Ok(())
    } else {
        Err(SignMapError::ShapeMismatch { horizontal: phase_h.dim(), vertical: phase_v.dim() })
    }
}

/// Smooth a field and return its gradient as `d/dcol + i·d/drow`
#[must_use]
pub fn smoothed_gradient(field: &Array2<f64>, filter: &dyn SpatialFilter) -> Array2<Complex<f64>> {
    let smoothed = filter.apply(field);
    let (d_row, d_col) = gradient(&smoothed);
    Zip::from(&d_col).and(&d_row).map_collect(|&re, &im| Complex::new(re, im))
}

/// Per-pixel sign of `angle(grad_h · conj(grad_v))`
///
/// The angle's sign is the sign of the product's imaginary part, so an angle
/// of exactly 0 or π gives 0. Non-finite products give NaN.
#[must_use]
pub fn field_sign(grad_h: &Array2<Complex<f64>>, grad_v: &Array2<Complex<f64>>) -> Array2<f64> {
    Zip::from(grad_h).and(grad_v).map_collect(|&gh, &gv| {
        let product = gh * gv.conj();
        if product.re.is_finite() && product.im.is_finite() {
            sign_of(product.im)
        } else {
            f64::NAN
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::filters::{DiskFilter, HannFilter};

    fn columns(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(_, c)| c as f64 * 0.1)
    }

    fn rows_of(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, _)| r as f64 * 0.1)
    }

    #[test]
    fn test_orthogonal_gradients() {
        // grad_h = 1 + 0i, grad_v = 0 + 1i, product = -i
        let map = SignMapGenerator::new()
            .generate_sign_map(&columns(16, 16), &rows_of(16, 16), 1.0)
            .unwrap();

        assert_eq!(map.shape(), (16, 16));
        for r in 5..11 {
            for c in 5..11 {
                assert_eq!(map.get(r, c), Some(-1.0));
            }
        }
    }

    #[test]
    fn test_swapping_axes_flips_sign() {
        let map = SignMapGenerator::new()
            .generate_sign_map(&rows_of(16, 16), &columns(16, 16), 1.0)
            .unwrap();
        assert_eq!(map.get(8, 8), Some(1.0));
    }

    #[test]
    fn test_parallel_gradients_give_zero() {
        let field = columns(12, 12);
        let map = SignMapGenerator::new().generate_sign_map(&field, &field, 1.0).unwrap();
        assert_eq!(map.get(6, 6), Some(0.0));
    }

    #[test]
    fn test_invalid_inputs_propagate() {
        let mut h = columns(10, 10);
        let mut v = rows_of(10, 10);
        h[[2, 3]] = f64::NAN;
        v[[7, 7]] = f64::NAN;

        let map = SignMapGenerator::new().generate_sign_map(&h, &v, 1.0).unwrap();
        assert!(!map.is_valid(2, 3));
        assert!(!map.is_valid(7, 7));
        assert!(map.is_valid(5, 5));
        assert_eq!(map.invalid_count(), 2);
    }

    #[test]
    fn test_single_invalid_pixel_stays_local() {
        let mut h = columns(8, 8);
        let v = rows_of(8, 8);
        h[[4, 4]] = f64::NAN;

        let filters: Vec<Box<dyn SpatialFilter>> = vec![
            Box::new(GaussianFilter::new(1.0).unwrap()),
            Box::new(HannFilter::new(3).unwrap()),
            Box::new(DiskFilter::new(0.5).unwrap()),
        ];

        for filter in &filters {
            let map = SignMapGenerator::new().generate_with_filter(&h, &v, filter.as_ref()).unwrap();
            assert_eq!(map.invalid_count(), 1, "{}", filter.kind());
            for (r, c) in [(4, 3), (4, 5), (3, 4), (5, 4)] {
                assert!(map.is_valid(r, c), "{} invalidated ({r}, {c})", filter.kind());
            }
        }

        // Identity-like kernels keep the ramps exact next to the hole
        for filter in &filters[1..] {
            let map = SignMapGenerator::new().generate_with_filter(&h, &v, filter.as_ref()).unwrap();
            assert_eq!(map.get(4, 3), Some(-1.0));
            assert_eq!(map.get(4, 5), Some(-1.0));
        }
    }

    #[test]
    fn test_values_in_sign_range() {
        let h = Array2::from_shape_fn((14, 14), |(r, c)| ((r * 3 + c * 5) as f64 * 0.37).sin());
        let v = Array2::from_shape_fn((14, 14), |(r, c)| ((r * 7 + c) as f64 * 0.21).cos());

        let map = SignMapGenerator::new().generate_sign_map(&h, &v, 1.5).unwrap();
        for &s in map.as_array() {
            assert!(s.is_nan() || s == -1.0 || s == 0.0 || s == 1.0);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let err = SignMapGenerator::new()
            .generate_sign_map(&columns(4, 5), &rows_of(5, 4), 1.0)
            .unwrap_err();
        assert_eq!(err, SignMapError::ShapeMismatch { horizontal: (4, 5), vertical: (5, 4) });
    }

    #[test]
    fn test_invalid_sigma() {
        let err = SignMapGenerator::new()
            .generate_sign_map(&columns(4, 4), &rows_of(4, 4), 0.0)
            .unwrap_err();
        assert!(matches!(err, SignMapError::InvalidSigma { .. }));
    }

    #[test]
    fn test_custom_filter() {
        let filter = DiskFilter::new(2.0).unwrap();
        let map = SignMapGenerator::new()
            .generate_with_filter(&columns(16, 16), &rows_of(16, 16), &filter)
            .unwrap();
        assert_eq!(map.get(8, 8), Some(-1.0));
    }

    #[test]
    fn test_deterministic() {
        let h = Array2::from_shape_fn((12, 9), |(r, c)| (r as f64 * 0.3 + c as f64 * 0.2).sin());
        let v = Array2::from_shape_fn((12, 9), |(r, c)| (r as f64 * 0.1 - c as f64 * 0.4).cos());
        let generator = SignMapGenerator::new();

        let a = generator.generate_sign_map(&h, &v, 1.0).unwrap();
        let b = generator.generate_sign_map(&h, &v, 1.0).unwrap();
        for (x, y) in a.as_array().iter().zip(b.as_array()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}
