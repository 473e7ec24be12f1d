//! Visual area segmentation
//!
//! Splits the imaged surface into areas bounded by steep phase gradients and
//! visual field sign reversals, then characterizes each area.
//!
//! # Algorithm
//!
//! 1. Boundary evidence where either smoothed phase gradient exceeds
//!    `boundary_threshold`
//! 2. Boundary evidence where the Sobel magnitude of the sign map is
//!    positive
//! 3. Label connected components of the non-boundary, valid-sign pixels
//! 4. Drop components below `min_area_size`; measure the rest
//! 5. Rename the largest survivor V1

use std::collections::BTreeSet;

use cortimap_core::math::{sign_of, sobel_magnitude};
use cortimap_core::{
    Area, AreaMap, Connectivity, RetinotopyConfig, SegmentationError, SegmentationResult,
    SignMap, SmoothingKernel,
};
use ndarray::{Array2, Zip};
use tracing::{debug, warn};

use super::filters::{build_filter, GaussianFilter};
use super::labeling::{adjacent_labels, label_components};
use super::sign_map::smoothed_gradient;

/// Per-label running sums over one raster pass
#[derive(Clone, Copy, Default)]
struct Moments {
    count: usize,
    row_sum: f64,
    col_sum: f64,
    sign_sum: f64,
}

/// Segments sign maps into visual areas
#[derive(Clone, Debug)]
pub struct VisualAreaSegmenter {
    smoothing_sigma: f64,
    min_area_size: f64,
    boundary_threshold: f64,
    connectivity: Connectivity,
    smoothing_kernel: SmoothingKernel,
}

impl VisualAreaSegmenter {
    /// Create a segmenter with 4-connectivity and Gaussian smoothing
    ///
    /// # Arguments
    ///
    /// * `smoothing_sigma` - Gaussian sigma for the phase gradients (pixels)
    /// * `min_area_size` - Smallest area kept (mm²)
    /// * `boundary_threshold` - Gradient magnitude marking a boundary
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::Smoothing`] for an unusable sigma and
    /// [`SegmentationError::InvalidParameter`] for a negative or non-finite
    /// `min_area_size` or a non-positive or non-finite `boundary_threshold`.
    pub fn new(
        smoothing_sigma: f64,
        min_area_size: f64,
        boundary_threshold: f64,
    ) -> SegmentationResult<Self> {
        GaussianFilter::new(smoothing_sigma)?;
        if !min_area_size.is_finite() || min_area_size < 0.0 {
            return Err(SegmentationError::InvalidParameter {
                parameter: "min_area_size",
                value: min_area_size,
            });
        }
        if !boundary_threshold.is_finite() || boundary_threshold <= 0.0 {
            return Err(SegmentationError::InvalidParameter {
                parameter: "boundary_threshold",
                value: boundary_threshold,
            });
        }

        Ok(Self {
            smoothing_sigma,
            min_area_size,
            boundary_threshold,
            connectivity: Connectivity::Four,
            smoothing_kernel: SmoothingKernel::Gaussian,
        })
    }

    /// Create from the pipeline configuration
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_config(config: &RetinotopyConfig) -> SegmentationResult<Self> {
        Ok(Self::new(config.smoothing_sigma, config.min_area_size, config.boundary_threshold)?
            .with_connectivity(config.connectivity)
            .with_smoothing_kernel(config.smoothing_kernel))
    }

    /// Use a different labeling adjacency
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Use a different smoothing family for the phase gradients
    #[must_use]
    pub fn with_smoothing_kernel(mut self, kernel: SmoothingKernel) -> Self {
        self.smoothing_kernel = kernel;
        self
    }

    /// Labeling adjacency
    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Smallest area kept (mm²)
    #[must_use]
    pub fn min_area_size(&self) -> f64 {
        self.min_area_size
    }

    /// Segment a sign map into named areas
    ///
    /// # Arguments
    ///
    /// * `phase_h` - Horizontal-axis phase map
    /// * `phase_v` - Vertical-axis phase map
    /// * `sign_map` - Visual field sign map of the same shape
    /// * `pixels_per_mm` - Linear image scale
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::ShapeMismatch`] when the inputs disagree
    /// in shape, [`SegmentationError::InvalidScale`] for a non-positive scale
    /// and [`SegmentationError::Smoothing`] for unusable smoothing parameters.
    pub fn segment(
        &self,
        phase_h: &Array2<f64>,
        phase_v: &Array2<f64>,
        sign_map: &SignMap,
        pixels_per_mm: f64,
    ) -> SegmentationResult<AreaMap> {
        check_scale(pixels_per_mm)?;
        let boundary = self.detect_boundaries(phase_h, phase_v, sign_map)?;
        self.extract_areas(&boundary, sign_map, pixels_per_mm)
    }

    /// Boundary mask: steep phase gradients or sign changes
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::ShapeMismatch`] or
    /// [`SegmentationError::Smoothing`].
    pub fn detect_boundaries(
        &self,
        phase_h: &Array2<f64>,
        phase_v: &Array2<f64>,
        sign_map: &SignMap,
    ) -> SegmentationResult<Array2<bool>> {
        let shape = phase_h.dim();
        check_shape("phase_v", shape, phase_v.dim())?;
        check_shape("sign_map", shape, sign_map.shape())?;

        let filter = build_filter(self.smoothing_kernel, self.smoothing_sigma)?;
        let grad_h = smoothed_gradient(phase_h, filter.as_ref());
        let grad_v = smoothed_gradient(phase_v, filter.as_ref());
        let edges = sobel_magnitude(sign_map.as_array());

        let threshold = self.boundary_threshold;
        let boundary = Zip::from(&grad_h)
            .and(&grad_v)
            .and(&edges)
            .map_collect(|gh, gv, &edge| {
                gh.norm() > threshold || gv.norm() > threshold || edge > 0.0
            });

        debug!(
            boundary_pixels = boundary.iter().filter(|&&b| b).count(),
            total = boundary.len(),
            "Boundaries detected"
        );

        Ok(boundary)
    }

    /// Label, measure and name the areas enclosed by a boundary mask
    ///
    /// Pixels with an invalid sign never belong to an area. Neighbor sets
    /// only reference areas present in the result.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::ShapeMismatch`] when the mask and sign
    /// map disagree in shape and [`SegmentationError::InvalidScale`] for a
    /// non-positive scale.
    pub fn extract_areas(
        &self,
        boundary: &Array2<bool>,
        sign_map: &SignMap,
        pixels_per_mm: f64,
    ) -> SegmentationResult<AreaMap> {
        check_scale(pixels_per_mm)?;
        check_shape("boundary", sign_map.shape(), boundary.dim())?;

        let signs = sign_map.as_array();
        let foreground = Zip::from(boundary)
            .and(signs)
            .map_collect(|&edge, &s| !edge && s.is_finite());
        let components = label_components(&foreground, self.connectivity);

        let mut moments = vec![Moments::default(); components.count as usize + 1];
        for ((r, c), &label) in components.labels.indexed_iter() {
            if label == 0 {
                continue;
            }
            let m = &mut moments[label as usize];
            m.count += 1;
            m.row_sum += r as f64;
            m.col_sum += c as f64;
            m.sign_sum += signs[[r, c]];
        }

        let pixel_area = pixels_per_mm * pixels_per_mm;
        let kept: BTreeSet<u32> = (1..=components.count)
            .filter(|&label| moments[label as usize].count as f64 / pixel_area >= self.min_area_size)
            .collect();

        let mut areas = AreaMap::new();
        for &label in &kept {
            let m = moments[label as usize];
            let n = m.count as f64;
            let mask = components.mask(label);
            let mut neighbors =
                adjacent_labels(&components.labels, &mask, label, self.connectivity);
            neighbors.retain(|id| kept.contains(id));

            let name = Area::default_name(label);
            areas.insert(
                name.clone(),
                Area {
                    id: label,
                    name,
                    boundary: mask,
                    center: (m.col_sum / n, m.row_sum / n),
                    sign: sign_of(m.sign_sum / n),
                    size: n / pixel_area,
                    neighbors,
                },
            );
        }

        if let Some(key) = identify_v1(&areas) {
            if let Some(mut v1) = areas.remove(&key) {
                v1.name = Area::V1_NAME.to_string();
                areas.insert(v1.name.clone(), v1);
            }
        }

        let excluded = signs.iter().filter(|s| !s.is_finite()).count();
        debug!(
            components = components.count,
            kept = areas.len(),
            invalid_pixels = excluded,
            "Areas extracted"
        );
        if areas.is_empty() {
            warn!(
                components = components.count,
                min_area_size = self.min_area_size,
                "No area survived segmentation"
            );
        }

        Ok(areas)
    }
}

impl Default for VisualAreaSegmenter {
    fn default() -> Self {
        Self {
            smoothing_sigma: RetinotopyConfig::DEFAULT_SMOOTHING_SIGMA,
            min_area_size: RetinotopyConfig::DEFAULT_MIN_AREA_SIZE,
            boundary_threshold: RetinotopyConfig::DEFAULT_BOUNDARY_THRESHOLD,
            connectivity: Connectivity::Four,
            smoothing_kernel: SmoothingKernel::Gaussian,
        }
    }
}

/// Key of the largest area; ties go to the lowest id
#[must_use]
pub fn identify_v1(areas: &AreaMap) -> Option<String> {
    areas
        .iter()
        .fold(None::<(&String, &Area)>, |best, (key, area)| match best {
            Some((_, b)) if area.size < b.size || (area.size == b.size && area.id > b.id) => best,
            _ => Some((key, area)),
        })
        .map(|(key, _)| key.clone())
}

fn check_scale(pixels_per_mm: f64) -> SegmentationResult<()> {
    if pixels_per_mm.is_finite() && pixels_per_mm > 0.0 {
        Ok(())
    } else {
        Err(SegmentationError::InvalidScale { pixels_per_mm })
    }
}

fn check_shape(
    field: &'static str,
    expected: (usize, usize),
    got: (usize, usize),
) -> SegmentationResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(SegmentationError::ShapeMismatch { field, expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::sign_map::SignMapGenerator;
    use cortimap_core::SignMapError;

    /// Everything is boundary except the given inclusive rectangles
    fn open_regions(rows: usize, cols: usize, regions: &[(usize, usize, usize, usize)]) -> Array2<bool> {
        let mut boundary = Array2::from_elem((rows, cols), true);
        for &(r0, r1, c0, c1) in regions {
            for r in r0..=r1 {
                for c in c0..=c1 {
                    boundary[[r, c]] = false;
                }
            }
        }
        boundary
    }

    fn segmenter(min_area_size: f64) -> VisualAreaSegmenter {
        VisualAreaSegmenter::new(1.0, min_area_size, 0.5).unwrap()
    }

    #[test]
    fn test_two_regions_across_one_pixel_boundary() {
        // Rows 0 and 4, columns 0, 4 and 8 are boundary
        let boundary = open_regions(5, 9, &[(1, 3, 1, 3), (1, 3, 5, 7)]);
        let signs = SignMap::uniform(5, 9, 1.0);

        let areas = segmenter(0.0).extract_areas(&boundary, &signs, 1.0).unwrap();

        assert_eq!(areas.len(), 2);
        let v1 = &areas["V1"];
        let other = &areas["Area_2"];
        assert_eq!(v1.id, 1);
        assert!((v1.size - 9.0).abs() < 1e-12);
        assert!((other.size - 9.0).abs() < 1e-12);
        assert!(v1.borders(2));
        assert!(other.borders(1));
        assert_eq!(v1.center, (2.0, 2.0));
        assert_eq!(other.center, (6.0, 2.0));
    }

    #[test]
    fn test_largest_area_becomes_v1() {
        // 20 px then 500 px at 10 px/mm: 0.2 mm² and 5.0 mm²
        let boundary = open_regions(27, 27, &[(1, 4, 1, 5), (6, 25, 1, 25)]);
        let signs = SignMap::uniform(27, 27, -1.0);

        let areas = segmenter(0.01).extract_areas(&boundary, &signs, 10.0).unwrap();

        assert_eq!(areas.len(), 2);
        let v1 = &areas["V1"];
        assert_eq!(v1.id, 2);
        assert!((v1.size - 5.0).abs() < 1e-9);
        assert!(v1.is_v1());

        let small = &areas["Area_1"];
        assert_eq!(small.name, "Area_1");
        assert!((small.size - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_size_filter_and_dangling_neighbors() {
        // 9 px, 3 px, 9 px side by side
        let boundary = open_regions(5, 11, &[(1, 3, 1, 3), (1, 3, 5, 5), (1, 3, 7, 9)]);
        let signs = SignMap::uniform(5, 11, 1.0);

        let areas = segmenter(5.0).extract_areas(&boundary, &signs, 1.0).unwrap();

        assert_eq!(areas.len(), 2);
        assert!(areas.values().all(|a| a.size >= 5.0));
        assert!(areas.values().all(|a| a.id != 2));
        for area in areas.values() {
            assert!(area.neighbors.iter().all(|n| areas.values().any(|a| a.id == *n)));
        }
        assert!(areas["V1"].neighbors.is_empty());
        assert!(areas["Area_3"].neighbors.is_empty());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let boundary = open_regions(5, 9, &[(1, 3, 1, 3)]);
        let signs = SignMap::uniform(5, 9, 1.0);

        let areas = segmenter(100.0).extract_areas(&boundary, &signs, 1.0).unwrap();
        assert!(areas.is_empty());
        assert_eq!(identify_v1(&areas), None);
    }

    #[test]
    fn test_dominant_sign_is_sign_of_mean() {
        let boundary = open_regions(5, 9, &[(1, 3, 1, 3), (1, 3, 5, 7)]);
        let mut values = Array2::from_elem((5, 9), 1.0);
        // Left: five +1, four -1
        for &(r, c) in &[(1, 1), (1, 3), (3, 1), (3, 3)] {
            values[[r, c]] = -1.0;
        }
        // Right: four +1, four -1, one 0
        for &(r, c) in &[(1, 5), (1, 6), (2, 5), (2, 6)] {
            values[[r, c]] = -1.0;
        }
        values[[3, 7]] = 0.0;
        let signs = SignMap::from_values(values);

        let areas = segmenter(0.0).extract_areas(&boundary, &signs, 1.0).unwrap();
        assert_eq!(areas["V1"].sign, 1.0);
        assert_eq!(areas["Area_2"].sign, 0.0);
    }

    #[test]
    fn test_invalid_sign_pixels_excluded() {
        let boundary = open_regions(5, 9, &[(1, 3, 1, 3), (1, 3, 5, 7)]);
        let mut values = Array2::from_elem((5, 9), 1.0);
        values[[2, 2]] = f64::NAN;
        let signs = SignMap::from_values(values);

        let areas = segmenter(0.0).extract_areas(&boundary, &signs, 1.0).unwrap();
        let left = areas.values().find(|a| a.boundary[[1, 1]]).unwrap();
        assert_eq!(left.pixel_count(), 8);
        assert!(!left.boundary[[2, 2]]);
    }

    #[test]
    fn test_eight_connectivity_merges_diagonals() {
        let boundary = open_regions(4, 4, &[(0, 0, 0, 0), (1, 1, 1, 1)]);
        let signs = SignMap::uniform(4, 4, 1.0);

        let four = segmenter(0.0).extract_areas(&boundary, &signs, 1.0).unwrap();
        let eight = segmenter(0.0)
            .with_connectivity(Connectivity::Eight)
            .extract_areas(&boundary, &signs, 1.0)
            .unwrap();

        assert_eq!(four.len(), 2);
        assert_eq!(eight.len(), 1);
    }

    #[test]
    fn test_segment_smooth_field_is_one_area() {
        let phase_h = Array2::from_shape_fn((12, 16), |(_, c)| c as f64 * 0.1);
        let phase_v = Array2::from_shape_fn((12, 16), |(r, _)| r as f64 * 0.1);
        let signs = SignMapGenerator::new().generate_sign_map(&phase_h, &phase_v, 1.0).unwrap();

        let areas = segmenter(0.01).segment(&phase_h, &phase_v, &signs, 2.0).unwrap();

        assert_eq!(areas.len(), 1);
        let v1 = &areas["V1"];
        assert_eq!(v1.sign, -1.0);
        assert_eq!(v1.pixel_count(), 192);
        assert!((v1.size - 48.0).abs() < 1e-9);
        assert!((v1.center.0 - 7.5).abs() < 1e-9);
        assert!((v1.center.1 - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_phase_jump_splits_field() {
        let phase_h = Array2::from_shape_fn((12, 16), |(_, c)| {
            c as f64 * 0.1 + if c >= 8 { 6.0 } else { 0.0 }
        });
        let phase_v = Array2::from_shape_fn((12, 16), |(r, _)| r as f64 * 0.1);
        let signs = SignMapGenerator::new().generate_sign_map(&phase_h, &phase_v, 1.0).unwrap();
        let seg = segmenter(0.0);

        let boundary = seg.detect_boundaries(&phase_h, &phase_v, &signs).unwrap();
        assert!(boundary[[5, 7]] && boundary[[5, 8]]);
        assert!(!boundary[[5, 2]] && !boundary[[5, 13]]);

        let areas = seg.segment(&phase_h, &phase_v, &signs, 1.0).unwrap();
        assert_eq!(areas.len(), 2);
    }

    #[test]
    fn test_masks_disjoint_and_sizes_filtered() {
        let values = Array2::from_shape_fn((20, 20), |(r, c)| {
            if (r / 5 + c / 7) % 2 == 0 { 1.0 } else { -1.0 }
        });
        let signs = SignMap::from_values(values);
        let phase = Array2::zeros((20, 20));
        let seg = segmenter(2.0);

        let areas = seg.segment(&phase, &phase, &signs, 1.0).unwrap();

        assert!(!areas.is_empty());
        let mut cover = Array2::<u32>::zeros((20, 20));
        for area in areas.values() {
            assert!(area.size >= seg.min_area_size());
            assert_eq!(area.sign.abs(), 1.0);
            Zip::from(&mut cover).and(&area.boundary).for_each(|n, &m| *n += u32::from(m));
        }
        assert!(cover.iter().all(|&n| n <= 1));
    }

    #[test]
    fn test_identify_v1_tie_keeps_lowest_id() {
        let boundary = open_regions(5, 9, &[(1, 3, 1, 3), (1, 3, 5, 7)]);
        let signs = SignMap::uniform(5, 9, 1.0);
        let mut areas = segmenter(0.0).extract_areas(&boundary, &signs, 1.0).unwrap();

        // Rename back and re-identify
        let mut v1 = areas.remove("V1").unwrap();
        v1.name = Area::default_name(v1.id);
        areas.insert(v1.name.clone(), v1);
        assert_eq!(identify_v1(&areas).as_deref(), Some("Area_1"));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let phase = Array2::zeros((4, 4));
        let signs = SignMap::uniform(4, 4, 1.0);
        let seg = VisualAreaSegmenter::default();

        assert!(matches!(
            seg.segment(&phase, &phase, &signs, 0.0),
            Err(SegmentationError::InvalidScale { .. })
        ));
        assert!(matches!(
            seg.segment(&phase, &phase, &signs, f64::NAN),
            Err(SegmentationError::InvalidScale { .. })
        ));
        assert_eq!(
            seg.segment(&phase, &Array2::zeros((4, 5)), &signs, 1.0).unwrap_err(),
            SegmentationError::ShapeMismatch { field: "phase_v", expected: (4, 4), got: (4, 5) }
        );
        assert!(matches!(
            seg.segment(&phase, &phase, &SignMap::uniform(3, 4, 1.0), 1.0),
            Err(SegmentationError::ShapeMismatch { field: "sign_map", .. })
        ));

        let bad_kernel = VisualAreaSegmenter::default()
            .with_smoothing_kernel(SmoothingKernel::Hann { width: 2 });
        assert!(matches!(
            bad_kernel.segment(&phase, &phase, &signs, 1.0),
            Err(SegmentationError::Smoothing(SignMapError::InvalidKernel { kernel: "hann", .. }))
        ));
    }

    #[test]
    fn test_constructor_rejects_bad_parameters() {
        assert_eq!(
            VisualAreaSegmenter::new(-1.0, 0.0, 0.5).unwrap_err(),
            SegmentationError::Smoothing(SignMapError::InvalidSigma { sigma: -1.0 })
        );
        assert!(matches!(
            VisualAreaSegmenter::new(1.0, f64::NAN, 0.5),
            Err(SegmentationError::InvalidParameter { parameter: "min_area_size", .. })
        ));
        assert_eq!(
            VisualAreaSegmenter::new(1.0, -0.5, 0.5).unwrap_err(),
            SegmentationError::InvalidParameter { parameter: "min_area_size", value: -0.5 }
        );
        assert!(matches!(
            VisualAreaSegmenter::new(1.0, 0.0, f64::NAN),
            Err(SegmentationError::InvalidParameter { parameter: "boundary_threshold", .. })
        ));
        assert!(VisualAreaSegmenter::new(1.0, 0.0, 0.5).is_ok());

        let config = RetinotopyConfig { min_area_size: f64::NAN, ..RetinotopyConfig::default() };
        assert!(VisualAreaSegmenter::from_config(&config).is_err());
    }

    #[test]
    fn test_deterministic() {
        let phase_h = Array2::from_shape_fn((16, 16), |(r, c)| ((r * 2 + c) as f64 * 0.3).sin());
        let phase_v = Array2::from_shape_fn((16, 16), |(r, c)| ((r + c * 3) as f64 * 0.2).cos());
        let signs = SignMapGenerator::new().generate_sign_map(&phase_h, &phase_v, 1.0).unwrap();
        let seg = segmenter(0.0);

        let a = seg.segment(&phase_h, &phase_v, &signs, 1.0).unwrap();
        let b = seg.segment(&phase_h, &phase_v, &signs, 1.0).unwrap();
        assert_eq!(a, b);
    }
}
