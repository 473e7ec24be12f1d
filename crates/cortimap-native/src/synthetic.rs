//! Synthetic retinotopy
//!
//! Generates response series for a periodic drifting-bar stimulus over a
//! field with known phase layout, for tests, benchmarks and demonstrations.
//!
//! ```text
//! phase_h:  -s/2 ──────► m ◄────── (mirror at column m)
//! phase_v:  -s/2 ▼ rows ▼ +s/2
//! ```

use std::f64::consts::PI;

use cortimap_core::{PhaseResult, ResponseSeries, StimulusAxis};
use serde::{Deserialize, Serialize};

/// Parameters of a synthetic retinotopic field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRetinotopy {
    /// Image rows
    pub rows: usize,
    /// Image columns
    pub cols: usize,
    /// Time samples per series
    pub frames: usize,
    /// Stimulus cycles over the recording
    pub cycles: usize,
    /// Total phase progression across the field (radians)
    pub phase_span: f64,
    /// Column beyond which the horizontal progression reverses
    pub mirror_column: Option<usize>,
    /// Response amplitude
    pub amplitude: f64,
    /// Uniform noise amplitude
    pub noise: f64,
    /// Noise seed
    pub seed: u64,
}

impl SyntheticRetinotopy {
    /// A noise-free field without mirror reversal
    #[must_use]
    pub fn new(rows: usize, cols: usize, frames: usize, cycles: usize) -> Self {
        Self {
            rows,
            cols,
            frames,
            cycles,
            phase_span: 2.4,
            mirror_column: None,
            amplitude: 1.0,
            noise: 0.0,
            seed: 0x2545_F491_4F6C_DD1D,
        }
    }

    /// Reverse the horizontal progression at `column`
    #[must_use]
    pub fn with_mirror_column(mut self, column: usize) -> Self {
        self.mirror_column = Some(column);
        self
    }

    /// Add uniform noise in `[-noise, noise]`
    #[must_use]
    pub fn with_noise(mut self, noise: f64, seed: u64) -> Self {
        self.noise = noise;
        self.seed = seed;
        self
    }

    /// Ground-truth phase of a pixel for one axis
    #[must_use]
    pub fn phase_at(&self, axis: StimulusAxis, row: usize, col: usize) -> f64 {
        let (position, extent) = match axis {
            StimulusAxis::Horizontal => {
                let position = match self.mirror_column {
                    Some(m) if col > m => (2 * m).saturating_sub(col),
                    _ => col,
                };
                (position, self.cols)
            }
            StimulusAxis::Vertical => (row, self.rows),
        };
        let fraction = if extent > 1 { position as f64 / (extent - 1) as f64 } else { 0.0 };
        -self.phase_span / 2.0 + self.phase_span * fraction
    }

    /// Response series for one axis
    ///
    /// # Errors
    ///
    /// Fails for fewer than two frames or an empty field.
    pub fn responses(&self, axis: StimulusAxis) -> PhaseResult<ResponseSeries> {
        let omega = 2.0 * PI * self.cycles as f64 / self.frames.max(1) as f64;
        let mut rng = XorShift64::new(self.seed ^ axis_salt(axis));

        ResponseSeries::from_fn(self.frames, self.rows, self.cols, |(t, r, c)| {
            let signal = self.amplitude * (omega * t as f64 + self.phase_at(axis, r, c)).cos();
            if self.noise > 0.0 {
                signal + self.noise * (2.0 * rng.next_f64() - 1.0)
            } else {
                signal
            }
        })
    }

    /// Horizontal and vertical series
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::responses`].
    pub fn pair(&self) -> PhaseResult<(ResponseSeries, ResponseSeries)> {
        Ok((self.responses(StimulusAxis::Horizontal)?, self.responses(StimulusAxis::Vertical)?))
    }
}

impl Default for SyntheticRetinotopy {
    fn default() -> Self {
        Self::new(32, 48, 64, 8).with_mirror_column(24)
    }
}

fn axis_salt(axis: StimulusAxis) -> u64 {
    match axis {
        StimulusAxis::Horizontal => 0x9E37_79B9_7F4A_7C15,
        StimulusAxis::Vertical => 0xC2B2_AE3D_27D4_EB4F,
    }
}

/// xorshift64 in `[0, 1]`
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        // Zero is a fixed point
        Self { state: if seed == 0 { 0x2545_F491_4F6C_DD1D } else { seed } }
    }

    fn next_f64(&mut self) -> f64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state as f64 / u64::MAX as f64
    }
}
