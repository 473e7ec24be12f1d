//! Pipeline configuration
//!
//! Parameters are fixed for the lifetime of the components built from them.
//! Documents are TOML; missing fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Connectivity;

// ============================================================================
// Enumerated options
// ============================================================================

/// Temporal taper applied before the Fourier transform
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaperWindow {
    /// Periodic Hamming, 0.54 − 0.46·cos(2πn/N)
    #[default]
    Hamming,
    /// Periodic Hann, 0.5 − 0.5·cos(2πn/N)
    Hann,
    /// No taper
    Rectangular,
}

/// Spatial smoothing kernel family used before gradient computation
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SmoothingKernel {
    /// Isotropic Gaussian with `smoothing_sigma`
    #[default]
    Gaussian,
    /// Separable Hann window
    Hann {
        /// Taps per axis
        width: usize,
    },
    /// Uniform disk
    Disk {
        /// Radius in pixels
        radius: f64,
    },
}

impl SmoothingKernel {
    /// Kernel family name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Hann { .. } => "hann",
            Self::Disk { .. } => "disk",
        }
    }
}

/// Where the per-axis phase computations run
///
/// Resolved once when the analyzer is built, never switched mid-pipeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    /// Axes one after another on the calling thread
    #[default]
    Sequential,
    /// Axes concurrently on the rayon pool
    Parallel,
}

// ============================================================================
// Retinotopy configuration
// ============================================================================

/// Parameters for phase mapping, sign map generation and segmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetinotopyConfig {
    /// Smoothing applied before gradient computation (pixels)
    pub smoothing_sigma: f64,
    /// Minimum SNR for a phase value to be kept
    pub snr_threshold: f64,
    /// Gradient magnitude above which a pixel is boundary evidence
    pub boundary_threshold: f64,
    /// Areas smaller than this are discarded (mm²)
    pub min_area_size: f64,
    /// Adjacency rule for labeling
    pub connectivity: Connectivity,
    /// Temporal taper
    pub window: TaperWindow,
    /// Execution target for the per-axis stage
    pub execution: ExecutionTarget,
    /// Spatial smoothing family
    pub smoothing_kernel: SmoothingKernel,
}

impl RetinotopyConfig {
    /// Default smoothing sigma
    pub const DEFAULT_SMOOTHING_SIGMA: f64 = 1.0;
    /// Default SNR threshold
    pub const DEFAULT_SNR_THRESHOLD: f64 = 2.0;
    /// Default boundary threshold
    pub const DEFAULT_BOUNDARY_THRESHOLD: f64 = 0.5;
    /// Default minimum area (mm²)
    pub const DEFAULT_MIN_AREA_SIZE: f64 = 0.01;

    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::InvalidParameter`] for out-of-range values.
    pub fn from_toml_str(document: &str) -> ConfigResult<Self> {
        let config: Self =
            toml::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every parameter against its valid range
    ///
    /// # Errors
    ///
    /// Returns the first offending parameter.
    pub fn validate(&self) -> ConfigResult<()> {
        require_positive("smoothing_sigma", self.smoothing_sigma)?;
        require_positive("snr_threshold", self.snr_threshold)?;
        require_positive("boundary_threshold", self.boundary_threshold)?;

        if !self.min_area_size.is_finite() || self.min_area_size < 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "min_area_size",
                reason: format!("must be finite and non-negative, got {}", self.min_area_size),
            });
        }

        match self.smoothing_kernel {
            SmoothingKernel::Gaussian => {}
            SmoothingKernel::Hann { width } => {
                if width < 3 {
                    return Err(ConfigError::InvalidParameter {
                        parameter: "smoothing_kernel.width",
                        reason: format!("Hann kernel needs at least 3 taps, got {width}"),
                    });
                }
            }
            SmoothingKernel::Disk { radius } => require_positive("smoothing_kernel.radius", radius)?,
        }

        Ok(())
    }
}

impl Default for RetinotopyConfig {
    fn default() -> Self {
        Self {
            smoothing_sigma: Self::DEFAULT_SMOOTHING_SIGMA,
            snr_threshold: Self::DEFAULT_SNR_THRESHOLD,
            boundary_threshold: Self::DEFAULT_BOUNDARY_THRESHOLD,
            min_area_size: Self::DEFAULT_MIN_AREA_SIZE,
            connectivity: Connectivity::Four,
            window: TaperWindow::Hamming,
            execution: ExecutionTarget::Sequential,
            smoothing_kernel: SmoothingKernel::Gaussian,
        }
    }
}

fn require_positive(parameter: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            parameter,
            reason: format!("must be finite and positive, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RetinotopyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.smoothing_sigma, 1.0);
        assert_eq!(config.snr_threshold, 2.0);
        assert_eq!(config.boundary_threshold, 0.5);
        assert_eq!(config.min_area_size, 0.01);
        assert_eq!(config.connectivity, Connectivity::Four);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = RetinotopyConfig::from_toml_str(
            r#"
            smoothing_sigma = 2.5
            connectivity = "eight"
            execution = "parallel"

            [smoothing_kernel]
            kind = "disk"
            radius = 3.0
            "#,
        )
        .unwrap();

        assert_eq!(config.smoothing_sigma, 2.5);
        assert_eq!(config.connectivity, Connectivity::Eight);
        assert_eq!(config.execution, ExecutionTarget::Parallel);
        assert_eq!(config.smoothing_kernel, SmoothingKernel::Disk { radius: 3.0 });
        assert_eq!(config.snr_threshold, RetinotopyConfig::DEFAULT_SNR_THRESHOLD);
        assert_eq!(config.window, TaperWindow::Hamming);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = RetinotopyConfig::from_toml_str("snr_threshold = -1.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { parameter: "snr_threshold", .. }
        ));

        let config = RetinotopyConfig {
            smoothing_kernel: SmoothingKernel::Hann { width: 2 },
            ..RetinotopyConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RetinotopyConfig { min_area_size: 0.0, ..RetinotopyConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connectivity_accepts_neighborhood_size() {
        let config = RetinotopyConfig::from_toml_str("connectivity = 8").unwrap();
        assert_eq!(config.connectivity, Connectivity::Eight);

        let config = RetinotopyConfig::from_toml_str("connectivity = 4").unwrap();
        assert_eq!(config.connectivity, Connectivity::Four);

        let err = RetinotopyConfig::from_toml_str("connectivity = 6").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = RetinotopyConfig::from_toml_str("smoothing_sigma = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RetinotopyConfig {
            smoothing_kernel: SmoothingKernel::Hann { width: 5 },
            ..RetinotopyConfig::default()
        };
        let document = config.to_toml_string().unwrap();
        assert_eq!(RetinotopyConfig::from_toml_str(&document).unwrap(), config);
    }
}
