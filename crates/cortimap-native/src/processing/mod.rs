//! Retinotopic processing stages
//!
//! This module provides the per-stage algorithms:
//! - [`signal`]: Baseline correction and window averaging
//! - [`fft`]: Tapered spectra and 2-D autocorrelation
//! - [`phase_map`]: Stimulus-locked phase, magnitude and SNR
//! - [`filters`]: Spatial smoothing kernels
//! - [`sign_map`]: Visual field sign from phase gradients
//! - [`labeling`]: Connected components and adjacency
//! - [`segmentation`]: Visual area extraction

pub mod fft;
pub mod filters;
pub mod labeling;
pub mod phase_map;
pub mod segmentation;
pub mod sign_map;
pub mod signal;
