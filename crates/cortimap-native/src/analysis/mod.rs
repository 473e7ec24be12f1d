//! Feature map analysis
//!
//! - [`feature_map`]: Orientation, direction and colour preference maps
//! - [`orientation`]: Gradient, uniformity, pinwheels and domain size of
//!   orientation maps

pub mod feature_map;
pub mod orientation;
