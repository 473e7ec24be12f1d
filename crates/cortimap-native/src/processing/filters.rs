//! Spatial smoothing filters for phase maps
//!
//! Every filter skips invalid (NaN) pixels and renormalizes over the valid
//! support, so masked phase values never bleed into their neighbours.
//! Pixels with no valid support stay invalid.

use cortimap_core::math::{
    convolve_2d, convolve_separable, disk_kernel, gaussian_kernel_1d, hann_kernel_2d,
};
use cortimap_core::{SignMapError, SignMapResult, SmoothingKernel};
use ndarray::Array2;

/// A 2-D smoothing filter applied before gradient computation
pub trait SpatialFilter: Send + Sync {
    /// Kernel family name
    fn kind(&self) -> &'static str;

    /// Smooth a field, preserving its shape
    fn apply(&self, field: &Array2<f64>) -> Array2<f64>;
}

// ============================================================================
// Gaussian
// ============================================================================

/// Isotropic Gaussian, separable, truncated at 4σ
#[derive(Clone, Debug)]
pub struct GaussianFilter {
    sigma: f64,
    taps: Vec<f64>,
}

impl GaussianFilter {
    /// Create a Gaussian filter
    ///
    /// # Errors
    ///
    /// Returns [`SignMapError::InvalidSigma`] unless `sigma` is finite and
    /// positive.
    pub fn new(sigma: f64) -> SignMapResult<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(SignMapError::InvalidSigma { sigma });
        }
        Ok(Self { sigma, taps: gaussian_kernel_1d(sigma) })
    }

    /// Standard deviation in pixels
    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Kernel radius in pixels
    #[must_use]
    pub fn radius(&self) -> usize {
        self.taps.len() / 2
    }
}

impl Default for GaussianFilter {
    /// Unit sigma
    fn default() -> Self {
        Self::from_constant(1.0)
    }
}

impl GaussianFilter {
    /// Build from a compile-time default; `sigma` must be finite and positive
    pub(crate) fn from_constant(sigma: f64) -> Self {
        debug_assert!(sigma.is_finite() && sigma > 0.0);
        Self { sigma, taps: gaussian_kernel_1d(sigma) }
    }
}

impl SpatialFilter for GaussianFilter {
    fn kind(&self) -> &'static str {
        "gaussian"
    }

    fn apply(&self, field: &Array2<f64>) -> Array2<f64> {
        convolve_separable(field, &self.taps)
    }
}

// ============================================================================
// Hann
// ============================================================================

/// Outer product of two symmetric Hann windows
#[derive(Clone, Debug)]
pub struct HannFilter {
    width: usize,
    kernel: Array2<f64>,
}

impl HannFilter {
    /// Create a Hann filter with `width` taps per axis
    ///
    /// # Errors
    ///
    /// Returns [`SignMapError::InvalidKernel`] for fewer than 3 taps, where
    /// the symmetric window has no interior weight.
    pub fn new(width: usize) -> SignMapResult<Self> {
        if width < 3 {
            return Err(SignMapError::InvalidKernel {
                kernel: "hann",
                reason: format!("needs at least 3 taps, got {width}"),
            });
        }
        Ok(Self { width, kernel: hann_kernel_2d(width) })
    }

    /// Taps per axis
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }
}

impl SpatialFilter for HannFilter {
    fn kind(&self) -> &'static str {
        "hann"
    }

    fn apply(&self, field: &Array2<f64>) -> Array2<f64> {
        convolve_2d(field, &self.kernel)
    }
}

// ============================================================================
// Disk
// ============================================================================

/// Uniform disk (pillbox)
#[derive(Clone, Debug)]
pub struct DiskFilter {
    radius: f64,
    kernel: Array2<f64>,
}

impl DiskFilter {
    /// Create a disk filter
    ///
    /// # Errors
    ///
    /// Returns [`SignMapError::InvalidKernel`] unless `radius` is finite and
    /// positive.
    pub fn new(radius: f64) -> SignMapResult<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(SignMapError::InvalidKernel {
                kernel: "disk",
                reason: format!("radius must be finite and positive, got {radius}"),
            });
        }
        Ok(Self { radius, kernel: disk_kernel(radius) })
    }

    /// Radius in pixels
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl SpatialFilter for DiskFilter {
    fn kind(&self) -> &'static str {
        "disk"
    }

    fn apply(&self, field: &Array2<f64>) -> Array2<f64> {
        convolve_2d(field, &self.kernel)
    }
}

/// Build the filter a configuration names
///
/// `sigma` only applies to the Gaussian family.
///
/// # Errors
///
/// Propagates the constructor error of the selected family.
pub fn build_filter(kernel: SmoothingKernel, sigma: f64) -> SignMapResult<Box<dyn SpatialFilter>> {
    Ok(match kernel {
        SmoothingKernel::Gaussian => Box::new(GaussianFilter::new(sigma)?),
        SmoothingKernel::Hann { width } => Box::new(HannFilter::new(width)?),
        SmoothingKernel::Disk { radius } => Box::new(DiskFilter::new(radius)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f64)
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let field = Array2::from_elem((9, 11), 2.5);
        let filters: Vec<Box<dyn SpatialFilter>> = vec![
            Box::new(GaussianFilter::new(1.5).unwrap()),
            Box::new(HannFilter::new(5).unwrap()),
            Box::new(DiskFilter::new(2.0).unwrap()),
        ];

        for filter in &filters {
            let out = filter.apply(&field);
            assert_eq!(out.dim(), field.dim());
            for &v in &out {
                assert!((v - 2.5).abs() < 1e-12, "{} changed a constant field", filter.kind());
            }
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(GaussianFilter::new(0.0), Err(SignMapError::InvalidSigma { .. })));
        assert!(matches!(GaussianFilter::new(f64::NAN), Err(SignMapError::InvalidSigma { .. })));
        assert!(matches!(
            HannFilter::new(2),
            Err(SignMapError::InvalidKernel { kernel: "hann", .. })
        ));
        assert!(matches!(
            DiskFilter::new(-1.0),
            Err(SignMapError::InvalidKernel { kernel: "disk", .. })
        ));
    }

    #[test]
    fn test_nan_does_not_spread() {
        let mut field = ramp(7, 7);
        field[[3, 3]] = f64::NAN;

        let out = GaussianFilter::new(1.0).unwrap().apply(&field);
        assert!(out[[3, 2]].is_finite());
        assert!(out[[2, 3]].is_finite());
    }

    #[test]
    fn test_build_filter_selects_family() {
        assert_eq!(build_filter(SmoothingKernel::Gaussian, 1.0).unwrap().kind(), "gaussian");
        assert_eq!(
            build_filter(SmoothingKernel::Hann { width: 5 }, 1.0).unwrap().kind(),
            "hann"
        );
        assert_eq!(
            build_filter(SmoothingKernel::Disk { radius: 1.5 }, 1.0).unwrap().kind(),
            "disk"
        );
        assert!(build_filter(SmoothingKernel::Gaussian, -2.0).is_err());
    }

    #[test]
    fn test_gaussian_radius() {
        assert_eq!(GaussianFilter::new(1.0).unwrap().radius(), 4);
        assert_eq!(GaussianFilter::new(0.1).unwrap().radius(), 1);
    }
}
