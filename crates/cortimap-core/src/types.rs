//! Core data types for retinotopic mapping
//!
//! All planar fields are `ndarray::Array2<f64>` indexed `(row, column)`.
//! Invalid samples carry the [`INVALID`] sentinel (NaN).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ndarray::{Array2, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{PhaseMapError, PhaseResult};
use crate::math::sign_of;

/// Sentinel for pixels without a usable value
pub const INVALID: f64 = f64::NAN;

// ============================================================================
// Stimulus axes
// ============================================================================

/// Direction of the periodic drifting stimulus
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusAxis {
    /// Bar sweeping along azimuth
    Horizontal,
    /// Bar sweeping along elevation
    Vertical,
}

impl StimulusAxis {
    /// Both axes, horizontal first
    pub const ALL: [Self; 2] = [Self::Horizontal, Self::Vertical];

    /// Lowercase axis name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

impl fmt::Display for StimulusAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Pixel adjacency
// ============================================================================

/// Pixel adjacency rule for labeling and dilation
///
/// Deserializes from the neighborhood size (`4`, `8`) or its name
/// (`"four"`, `"eight"`); serializes as the name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "ConnectivityRepr")]
pub enum Connectivity {
    /// Edge-adjacent neighbors only
    #[default]
    Four,
    /// Edge- and corner-adjacent neighbors
    Eight,
}

impl Connectivity {
    const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
    const EIGHT: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];

    /// `(row, column)` offsets of the neighborhood, excluding the centre
    #[must_use]
    pub fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &Self::FOUR,
            Self::Eight => &Self::EIGHT,
        }
    }

    /// Neighborhood size (4 or 8)
    #[must_use]
    pub const fn neighbors(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConnectivityRepr {
    Count(u8),
    Name(String),
}

impl TryFrom<ConnectivityRepr> for Connectivity {
    type Error = String;

    fn try_from(repr: ConnectivityRepr) -> Result<Self, Self::Error> {
        match repr {
            ConnectivityRepr::Count(4) => Ok(Self::Four),
            ConnectivityRepr::Count(8) => Ok(Self::Eight),
            ConnectivityRepr::Count(n) => Err(format!("connectivity must be 4 or 8, got {n}")),
            ConnectivityRepr::Name(name) => match name.as_str() {
                "four" => Ok(Self::Four),
                "eight" => Ok(Self::Eight),
                _ => Err(format!("unknown connectivity {name:?}, expected \"four\" or \"eight\"")),
            },
        }
    }
}

// ============================================================================
// Response series
// ============================================================================

/// Stimulus-locked response tensor for one axis, indexed `(time, row, column)`
#[derive(Clone, Debug)]
pub struct ResponseSeries {
    data: Array3<f64>,
}

impl ResponseSeries {
    /// Minimum number of time samples for a spectrum with a non-DC bin
    pub const MIN_SAMPLES: usize = 2;

    /// Wrap a `(time, row, column)` array
    ///
    /// # Errors
    ///
    /// Fails when the time axis is shorter than [`Self::MIN_SAMPLES`] or the
    /// spatial extent is empty.
    pub fn new(data: Array3<f64>) -> PhaseResult<Self> {
        let (frames, rows, cols) = data.dim();
        if frames < Self::MIN_SAMPLES {
            return Err(PhaseMapError::TooFewSamples {
                got: frames,
                need: Self::MIN_SAMPLES,
            });
        }
        if rows == 0 || cols == 0 {
            return Err(PhaseMapError::EmptyExtent { rows, cols });
        }
        Ok(Self { data })
    }

    /// Build a series from a generator over `(time, row, column)`
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::new`].
    pub fn from_fn<F>(frames: usize, rows: usize, cols: usize, f: F) -> PhaseResult<Self>
    where
        F: FnMut((usize, usize, usize)) -> f64,
    {
        Self::new(Array3::from_shape_fn((frames, rows, cols), f))
    }

    /// Number of time samples
    #[must_use]
    pub fn frames(&self) -> usize {
        self.data.dim().0
    }

    /// Spatial shape `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.data.dim();
        (rows, cols)
    }

    /// Time course of a single pixel
    #[must_use]
    pub fn pixel(&self, row: usize, col: usize) -> ArrayView1<'_, f64> {
        self.data.slice(ndarray::s![.., row, col])
    }

    /// Underlying tensor
    #[must_use]
    pub fn as_array(&self) -> &Array3<f64> {
        &self.data
    }

    /// Consume and return the underlying tensor
    #[must_use]
    pub fn into_inner(self) -> Array3<f64> {
        self.data
    }
}

// ============================================================================
// Phase map result
// ============================================================================

/// Phase, magnitude and SNR at the stimulus frequency for one axis
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseMapResult {
    /// Phase in (−π, π]; NaN where the SNR did not clear the threshold
    pub phase: Array2<f64>,
    /// Magnitude at the stimulus bin
    pub magnitude: Array2<f64>,
    /// Stimulus magnitude over the per-pixel spectral median
    pub snr: Array2<f64>,
    /// Frequency bin selected as the stimulus component
    pub stimulus_bin: usize,
}

impl PhaseMapResult {
    /// Spatial shape `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.phase.dim()
    }

    /// `true` where the phase is valid
    #[must_use]
    pub fn valid_mask(&self) -> Array2<bool> {
        self.phase.mapv(f64::is_finite)
    }

    /// Number of valid phase pixels
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.phase.iter().filter(|p| p.is_finite()).count()
    }

    /// Fraction of pixels with a valid phase
    #[must_use]
    pub fn valid_fraction(&self) -> f64 {
        let total = self.phase.len();
        if total == 0 {
            0.0
        } else {
            self.valid_count() as f64 / total as f64
        }
    }
}

// ============================================================================
// Sign map
// ============================================================================

/// Visual field sign map valued in {−1, 0, +1} with NaN for invalid pixels
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignMap(Array2<f64>);

impl SignMap {
    /// Build from arbitrary values: finite values collapse to their sign,
    /// non-finite values become invalid
    #[must_use]
    pub fn from_values(values: Array2<f64>) -> Self {
        Self(values.mapv(sign_of))
    }

    /// Map with the same value everywhere
    #[must_use]
    pub fn uniform(rows: usize, cols: usize, value: f64) -> Self {
        Self::from_values(Array2::from_elem((rows, cols), value))
    }

    /// Value at a pixel, `None` when invalid or out of bounds
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.0.get((row, col)).copied().filter(|v| v.is_finite())
    }

    /// Whether a pixel carries a sign
    #[must_use]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some()
    }

    /// `true` where the sign is defined
    #[must_use]
    pub fn valid_mask(&self) -> Array2<bool> {
        self.0.mapv(f64::is_finite)
    }

    /// Number of invalid pixels
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.0.iter().filter(|v| !v.is_finite()).count()
    }

    /// Spatial shape `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    /// Raw values
    #[must_use]
    pub fn as_array(&self) -> &Array2<f64> {
        &self.0
    }

    /// Consume and return the raw values
    #[must_use]
    pub fn into_inner(self) -> Array2<f64> {
        self.0
    }
}

// ============================================================================
// Visual areas
// ============================================================================

/// A segmented cortical area
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Connected-component label (stable within one segmentation run only)
    pub id: u32,
    /// `Area_{id}`, or `V1` for the largest area
    pub name: String,
    /// Pixel mask over the full image extent
    pub boundary: Array2<bool>,
    /// Centroid as `(x, y)` = `(column, row)`
    pub center: (f64, f64),
    /// Dominant visual field sign: −1, 0 or +1
    pub sign: f64,
    /// Area in mm²
    pub size: f64,
    /// Labels of adjacent areas
    pub neighbors: BTreeSet<u32>,
}

impl Area {
    /// Name given to the primary visual area
    pub const V1_NAME: &'static str = "V1";

    /// Generated name for a label
    #[must_use]
    pub fn default_name(id: u32) -> String {
        format!("Area_{id}")
    }

    /// Number of pixels in the mask
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.boundary.iter().filter(|&&m| m).count()
    }

    /// Whether this area was identified as V1
    #[must_use]
    pub fn is_v1(&self) -> bool {
        self.name == Self::V1_NAME
    }

    /// Whether `other` was recorded as adjacent
    #[must_use]
    pub fn borders(&self, other: u32) -> bool {
        self.neighbors.contains(&other)
    }
}

/// Areas keyed by their final name
pub type AreaMap = BTreeMap<String, Area>;

// ============================================================================
// Feature maps
// ============================================================================

/// Stimulus feature a map encodes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Preferred orientation in radians, period π
    Orientation,
    /// Preferred drift direction in radians, period 2π
    Direction,
    /// Preferred wavelength in nm
    Color,
}

impl FeatureKind {
    /// Lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Orientation => "orientation",
            Self::Direction => "direction",
            Self::Color => "color",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-pixel feature preference and its strength
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureMap {
    /// Encoded feature
    pub kind: FeatureKind,
    /// Selectivity strength (vector magnitude, or spread across colours)
    pub magnitude: Array2<f64>,
    /// Preferred feature value; NaN where the magnitude is below threshold
    pub preference: Array2<f64>,
}

impl FeatureMap {
    /// Spatial shape `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.preference.dim()
    }

    /// `true` where a preference is defined
    #[must_use]
    pub fn valid_mask(&self) -> Array2<bool> {
        self.preference.mapv(f64::is_finite)
    }

    /// Number of pixels with a defined preference
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.preference.iter().filter(|p| p.is_finite()).count()
    }
}
