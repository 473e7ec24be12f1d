//! Cortimap Native - retinotopic mapping and visual area segmentation
//!
//! This crate provides the host-side processing pipeline:
//! - Fourier phase mapping of periodic stimulus responses
//! - Visual field sign maps from orthogonal phase gradients
//! - Boundary detection, labeling and area characterization
//! - Orientation, direction and colour feature maps
//! - Map statistics and synthetic test fields
//!
//! # Modules
//!
//! - [`processing`]: Individual pipeline stages
//! - [`analyzer`]: The composed pipeline
//! - [`analysis`]: Feature preference maps and orientation structure
//! - [`statistics`]: Selectivity, percentiles and gated histograms
//! - [`synthetic`]: Generated response series with known layout

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod analysis;
pub mod analyzer;
pub mod error;
pub mod processing;
pub mod statistics;
pub mod synthetic;

// Re-export key types
pub use analysis::feature_map::FeatureMapAnalyzer;
pub use analysis::orientation::{OrientationAnalysis, OrientationAnalyzer, OrientationSummary};
pub use analyzer::{RetinotopicAnalyzer, RetinotopyMaps, RetinotopyReport};
pub use error::{AnalysisError, AnalysisResult, StatisticsError, StatisticsResult};
pub use processing::filters::{build_filter, DiskFilter, GaussianFilter, HannFilter, SpatialFilter};
pub use processing::phase_map::PhaseMapComputer;
pub use processing::segmentation::{identify_v1, VisualAreaSegmenter};
pub use processing::sign_map::SignMapGenerator;
pub use processing::signal::{BaselineMode, SignalProcessor};
pub use statistics::{Histogram, MapStatistics, SelectivityStats};
pub use synthetic::SyntheticRetinotopy;
