//! Pipeline error types
//!
//! [`AnalysisError`] wraps the stage errors of the core so callers can tell
//! which stage of a full analysis failed.

use cortimap_core::{
    ConfigError, PhaseMapError, SegmentationError, SignMapError, StimulusAxis,
};
use thiserror::Error;

/// Retinotopic analysis errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The two response series cover different spatial extents
    #[error("Response series shapes differ: horizontal {horizontal:?}, vertical {vertical:?}")]
    ShapeMismatch {
        /// Horizontal series shape `(rows, columns)`
        horizontal: (usize, usize),
        /// Vertical series shape `(rows, columns)`
        vertical: (usize, usize),
    },

    /// Phase mapping failed for one axis
    #[error("Phase mapping failed for {axis} axis: {source}")]
    PhaseMapping {
        /// Failing axis
        axis: StimulusAxis,
        /// Underlying error
        #[source]
        source: PhaseMapError,
    },

    /// Phase mapping stage rejected its parameters
    #[error("Phase mapping setup failed: {0}")]
    PhaseSetup(#[from] PhaseMapError),

    /// Sign map generation failed
    #[error("Sign map generation failed: {0}")]
    SignMap(#[from] SignMapError),

    /// Segmentation failed
    #[error("Segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Wrap a phase mapping error with its axis
    #[must_use]
    pub fn phase_mapping(axis: StimulusAxis, source: PhaseMapError) -> Self {
        Self::PhaseMapping { axis, source }
    }
}

/// Map statistics errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatisticsError {
    /// Region of interest does not cover the map
    #[error("ROI shape {got:?} does not match map shape {expected:?}")]
    RoiShapeMismatch {
        /// Map shape
        expected: (usize, usize),
        /// ROI shape
        got: (usize, usize),
    },

    /// Two maps that are binned together differ in shape
    #[error("Magnitude shape {got:?} does not match map shape {expected:?}")]
    ShapeMismatch {
        /// Map shape
        expected: (usize, usize),
        /// Magnitude shape
        got: (usize, usize),
    },

    /// Histogram needs at least one bin
    #[error("Histogram bin count must be positive")]
    NoBins,

    /// Percentile outside [0, 100]
    #[error("Percentile {q} outside [0, 100]")]
    InvalidPercentile {
        /// Requested percentile
        q: f64,
    },
}

/// Result type for full analyses
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type for map statistics
pub type StatisticsResult<T> = Result<T, StatisticsError>;
