//! Error types for the retinotopy pipeline
//!
//! One enum per stage so callers can tell which stage failed without
//! parsing message text. Shape and precondition variants indicate caller
//! misuse and are never retried.

use thiserror::Error;

/// Phase map computation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseMapError {
    /// Time axis too short for a spectrum with a non-DC bin
    #[error("Too few time samples: got {got}, need at least {need}")]
    TooFewSamples {
        /// Number of samples received
        got: usize,
        /// Minimum number of samples
        need: usize,
    },

    /// No pixels to analyse
    #[error("Empty spatial extent: {rows}x{cols}")]
    EmptyExtent {
        /// Number of rows
        rows: usize,
        /// Number of columns
        cols: usize,
    },

    /// Every pixel's time course contains non-finite samples
    #[error("Response series contains no pixel with a fully finite time course")]
    NonFiniteSeries,

    /// SNR threshold must be positive and finite
    #[error("Invalid SNR threshold: {threshold}")]
    InvalidThreshold {
        /// Rejected value
        threshold: f64,
    },
}

/// Sign map generation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignMapError {
    /// The two phase maps differ in shape
    #[error("Phase map shapes differ: horizontal {horizontal:?}, vertical {vertical:?}")]
    ShapeMismatch {
        /// Horizontal map shape
        horizontal: (usize, usize),
        /// Vertical map shape
        vertical: (usize, usize),
    },

    /// Smoothing sigma must be positive and finite
    #[error("Invalid smoothing sigma: {sigma}")]
    InvalidSigma {
        /// Rejected value
        sigma: f64,
    },

    /// Kernel parameters do not describe a usable kernel
    #[error("Invalid {kernel} kernel: {reason}")]
    InvalidKernel {
        /// Kernel family
        kernel: &'static str,
        /// Reason
        reason: String,
    },
}

/// Visual area segmentation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// An input field disagrees with the reference shape
    #[error("Shape mismatch for {field}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Offending input
        field: &'static str,
        /// Reference shape
        expected: (usize, usize),
        /// Received shape
        got: (usize, usize),
    },

    /// Pixel scale must be positive and finite
    #[error("Invalid scale: {pixels_per_mm} pixels per mm")]
    InvalidScale {
        /// Rejected value
        pixels_per_mm: f64,
    },

    /// A segmentation parameter is outside its valid range
    #[error("Invalid segmentation parameter {parameter}: {value}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Gradient smoothing could not be set up
    #[error("Gradient smoothing failed: {0}")]
    Smoothing(#[from] SignMapError),
}

/// Response preprocessing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Baseline frame does not cover the series
    #[error("Baseline shape {got:?} does not match series shape {expected:?}")]
    ShapeMismatch {
        /// Series spatial shape
        expected: (usize, usize),
        /// Baseline shape
        got: (usize, usize),
    },

    /// Time window is empty or runs past the series
    #[error("Invalid time window {start}..{end} for {frames} frames")]
    InvalidWindow {
        /// First frame (inclusive)
        start: usize,
        /// Last frame (exclusive)
        end: usize,
        /// Frames available
        frames: usize,
    },

    /// The processed tensor is not a valid response series
    #[error("Invalid response series: {0}")]
    Series(#[from] PhaseMapError),
}

/// Feature map (orientation, direction, colour) errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureMapError {
    /// No stimulus conditions supplied
    #[error("No stimulus conditions")]
    NoConditions,

    /// Condition axis and labels disagree in length
    #[error("Responses cover {conditions} conditions but {labels} labels were given")]
    ConditionMismatch {
        /// Conditions in the response stack
        conditions: usize,
        /// Stimulus labels supplied
        labels: usize,
    },

    /// No pixels to analyse
    #[error("Empty spatial extent: {rows}x{cols}")]
    EmptyExtent {
        /// Number of rows
        rows: usize,
        /// Number of columns
        cols: usize,
    },

    /// An input map disagrees with the reference shape
    #[error("Shape mismatch for {field}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Offending input
        field: &'static str,
        /// Reference shape
        expected: (usize, usize),
        /// Received shape
        got: (usize, usize),
    },

    /// A parameter or stimulus label is outside its valid range
    #[error("Invalid feature map parameter {parameter}: {value}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Smoothing could not be set up
    #[error("Feature map smoothing failed: {0}")]
    Smoothing(#[from] SignMapError),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter is outside its valid range
    #[error("Invalid configuration parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Reason
        reason: String,
    },

    /// The configuration document could not be parsed or rendered
    #[error("Configuration parse error: {0}")]
    Parse(String),
}

/// Result type for phase map operations
pub type PhaseResult<T> = Result<T, PhaseMapError>;

/// Result type for sign map operations
pub type SignMapResult<T> = Result<T, SignMapError>;

/// Result type for segmentation operations
pub type SegmentationResult<T> = Result<T, SegmentationError>;

/// Result type for response preprocessing
pub type SignalResult<T> = Result<T, SignalError>;

/// Result type for feature map operations
pub type FeatureMapResult<T> = Result<T, FeatureMapError>;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
