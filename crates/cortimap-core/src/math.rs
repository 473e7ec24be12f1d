//! Dense 2-D field kernels
//!
//! This module provides:
//! - Smoothing kernels (Gaussian, Hann, disk) and NaN-skipping convolution
//! - Finite-difference gradients
//! - Sobel gradient magnitude
//! - Binary dilation
//!
//! Borders use half-sample reflection (`d c b a | a b c d | d c b a`).

use ndarray::{Array2, Zip};

use crate::types::Connectivity;

/// Gaussian kernels are truncated at this many standard deviations
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Sign of a value: −1, 0 or +1, NaN for non-finite input
///
/// Unlike [`f64::signum`], zero maps to zero.
#[inline]
#[must_use]
pub fn sign_of(value: f64) -> f64 {
    if !value.is_finite() {
        f64::NAN
    } else if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Map an out-of-range index back into `0..len` by half-sample reflection
#[inline]
#[must_use]
pub fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let folded = index.rem_euclid(period);
    (if folded < len { folded } else { period - 1 - folded }) as usize
}

// ============================================================================
// Kernels
// ============================================================================

/// Normalized 1-D Gaussian kernel of radius `round(4σ)` (at least 1)
#[must_use]
pub fn gaussian_kernel_1d(sigma: f64) -> Vec<f64> {
    let radius = ((GAUSSIAN_TRUNCATE * sigma + 0.5) as usize).max(1) as isize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    normalize(&mut kernel);
    kernel
}

/// Symmetric Hann window of `width` taps (endpoints zero)
#[must_use]
pub fn hann_window_symmetric(width: usize) -> Vec<f64> {
    if width < 2 {
        return vec![1.0; width];
    }
    let span = (width - 1) as f64;
    (0..width)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / span).cos())
        .collect()
}

/// Outer product of two Hann windows, normalized to unit sum
#[must_use]
pub fn hann_kernel_2d(width: usize) -> Array2<f64> {
    let window = hann_window_symmetric(width);
    let mut kernel = Array2::from_shape_fn((width, width), |(r, c)| window[r] * window[c]);
    let total = kernel.sum();
    if total > 0.0 {
        kernel /= total;
    }
    kernel
}

/// Uniform disk `x² + y² ≤ r²`, normalized to unit sum
#[must_use]
pub fn disk_kernel(radius: f64) -> Array2<f64> {
    let half = radius.floor().max(0.0) as isize;
    let size = (2 * half + 1) as usize;
    let r2 = radius * radius;

    let mut kernel = Array2::from_shape_fn((size, size), |(r, c)| {
        let y = (r as isize - half) as f64;
        let x = (c as isize - half) as f64;
        if x * x + y * y <= r2 {
            1.0
        } else {
            0.0
        }
    });
    let total = kernel.sum();
    if total > 0.0 {
        kernel /= total;
    }
    kernel
}

fn normalize(kernel: &mut [f64]) {
    let total: f64 = kernel.iter().sum();
    if total > 0.0 {
        for w in kernel.iter_mut() {
            *w /= total;
        }
    }
}

// ============================================================================
// Convolution
// ============================================================================

/// Apply a symmetric 1-D kernel along columns, then along rows
///
/// Non-finite samples are skipped and the remaining weights renormalized, so
/// an output pixel is NaN only when no finite sample falls under the kernel.
#[must_use]
pub fn convolve_separable(field: &Array2<f64>, kernel: &[f64]) -> Array2<f64> {
    let along_cols = convolve_axis(field, kernel, true);
    convolve_axis(&along_cols, kernel, false)
}

fn convolve_axis(field: &Array2<f64>, kernel: &[f64], along_cols: bool) -> Array2<f64> {
    let (rows, cols) = field.dim();
    let half = (kernel.len() / 2) as isize;

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut sum = 0.0;
        let mut weight = 0.0;
        for (k, &w) in kernel.iter().enumerate() {
            let offset = k as isize - half;
            let value = if along_cols {
                field[[r, reflect_index(c as isize + offset, cols)]]
            } else {
                field[[reflect_index(r as isize + offset, rows), c]]
            };
            if value.is_finite() {
                sum += w * value;
                weight += w;
            }
        }
        if weight > 0.0 {
            sum / weight
        } else {
            f64::NAN
        }
    })
}

/// Apply a symmetric 2-D kernel with the same NaN handling as
/// [`convolve_separable`]
#[must_use]
pub fn convolve_2d(field: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = field.dim();
    let (k_rows, k_cols) = kernel.dim();
    let half_r = (k_rows / 2) as isize;
    let half_c = (k_cols / 2) as isize;

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut sum = 0.0;
        let mut weight = 0.0;
        for ((kr, kc), &w) in kernel.indexed_iter() {
            if w == 0.0 {
                continue;
            }
            let rr = reflect_index(r as isize + kr as isize - half_r, rows);
            let cc = reflect_index(c as isize + kc as isize - half_c, cols);
            let value = field[[rr, cc]];
            if value.is_finite() {
                sum += w * value;
                weight += w;
            }
        }
        if weight > 0.0 {
            sum / weight
        } else {
            f64::NAN
        }
    })
}

// ============================================================================
// Derivatives
// ============================================================================

/// Finite-difference gradient `(d/drow, d/dcol)`
///
/// Central differences in the interior, one-sided differences at the edges,
/// zero along an axis of length 1. A non-finite neighbour is treated like an
/// edge: the difference falls back to the valid side, or to zero when both
/// sides are invalid. Non-finite samples have a non-finite gradient.
#[must_use]
pub fn gradient(field: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (rows, cols) = field.dim();
    let d_row = Array2::from_shape_fn((rows, cols), |(r, c)| {
        difference(rows, r, |i| field[[i, c]])
    });
    let d_col = Array2::from_shape_fn((rows, cols), |(r, c)| {
        difference(cols, c, |i| field[[r, i]])
    });
    (d_row, d_col)
}

#[inline]
fn difference(len: usize, i: usize, at: impl Fn(usize) -> f64) -> f64 {
    if len < 2 {
        return 0.0;
    }
    let centre = at(i);
    if !centre.is_finite() {
        return f64::NAN;
    }

    let finite = |j: usize| Some(at(j)).filter(|v| v.is_finite());
    let prev = if i > 0 { finite(i - 1) } else { None };
    let next = if i + 1 < len { finite(i + 1) } else { None };

    match (prev, next) {
        (Some(p), Some(n)) => (n - p) / 2.0,
        (Some(p), None) => centre - p,
        (None, Some(n)) => n - centre,
        (None, None) => 0.0,
    }
}

/// Sobel gradient magnitude `sqrt(sobel_row² + sobel_col²)`
///
/// Non-finite samples enter the operator as zero.
#[must_use]
pub fn sobel_magnitude(field: &Array2<f64>) -> Array2<f64> {
    const SMOOTH: [f64; 3] = [1.0, 2.0, 1.0];
    let (rows, cols) = field.dim();

    let at = |r: isize, c: isize| -> f64 {
        let v = field[[reflect_index(r, rows), reflect_index(c, cols)]];
        if v.is_finite() {
            v
        } else {
            0.0
        }
    };

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (r, c) = (r as isize, c as isize);
        let mut d_row = 0.0;
        let mut d_col = 0.0;
        for (k, &w) in SMOOTH.iter().enumerate() {
            let offset = k as isize - 1;
            d_row += w * (at(r + 1, c + offset) - at(r - 1, c + offset));
            d_col += w * (at(r + offset, c + 1) - at(r + offset, c - 1));
        }
        d_row.hypot(d_col)
    })
}

// ============================================================================
// Morphology
// ============================================================================

/// One-step binary dilation with the structuring element of `connectivity`
///
/// Pixels outside the image count as unset.
#[must_use]
pub fn binary_dilation(mask: &Array2<bool>, connectivity: Connectivity) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    let mut dilated = mask.clone();

    for ((r, c), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        for &(dr, dc) in connectivity.offsets() {
            let rr = r as isize + dr;
            let cc = c as isize + dc;
            if rr >= 0 && cc >= 0 && (rr as usize) < rows && (cc as usize) < cols {
                dilated[[rr as usize, cc as usize]] = true;
            }
        }
    }

    dilated
}

/// Elementwise `a && !b`
#[must_use]
pub fn mask_difference(a: &Array2<bool>, b: &Array2<bool>) -> Array2<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x && !y)
}
