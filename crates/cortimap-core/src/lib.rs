//! Cortimap Core - data model and field kernels for retinotopic mapping
//!
//! This crate provides the foundational types shared by the processing
//! pipeline and its front ends.
//!
//! # Modules
//!
//! - [`types`]: Response series, phase maps, sign maps, visual areas and
//!   feature maps
//! - [`error`]: Stage-specific error types
//! - [`config`]: Pipeline configuration (TOML)
//! - [`math`]: Smoothing, gradients, Sobel and dilation over 2-D fields
//!
//! # Example
//!
//! ```rust
//! use cortimap_core::types::{ResponseSeries, SignMap};
//!
//! // Eight frames of a 2x3 field
//! let series = ResponseSeries::from_fn(8, 2, 3, |(t, _, _)| (t as f64).sin()).unwrap();
//! assert_eq!(series.shape(), (2, 3));
//!
//! // Sign maps only hold -1, 0, +1 or NaN
//! let map = SignMap::uniform(2, 3, 0.4);
//! assert_eq!(map.get(1, 2), Some(1.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{ExecutionTarget, RetinotopyConfig, SmoothingKernel, TaperWindow};
pub use error::{
    ConfigError, ConfigResult, FeatureMapError, FeatureMapResult, PhaseMapError, PhaseResult,
    SegmentationError, SegmentationResult, SignMapError, SignMapResult, SignalError, SignalResult,
};
pub use types::{
    Area, AreaMap, Connectivity, FeatureKind, FeatureMap, PhaseMapResult, ResponseSeries, SignMap,
    StimulusAxis, INVALID,
};
