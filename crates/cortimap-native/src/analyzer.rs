//! Retinotopic analysis pipeline
//!
//! ```text
//! horizontal ─► PhaseMapComputer ─┐
//!                                 ├─► SignMapGenerator ─► VisualAreaSegmenter ─► AreaMap
//! vertical   ─► PhaseMapComputer ─┘
//! ```
//!
//! The two axes are independent until the sign map; with
//! [`ExecutionTarget::Parallel`] they run on the rayon pool.

use std::fmt;

use cortimap_core::{
    Area, AreaMap, ExecutionTarget, PhaseMapResult, ResponseSeries, RetinotopyConfig, SignMap,
    StimulusAxis,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::processing::filters::{build_filter, SpatialFilter};
use crate::processing::phase_map::PhaseMapComputer;
use crate::processing::segmentation::VisualAreaSegmenter;
use crate::processing::sign_map::SignMapGenerator;

/// Phase maps of both axes and the derived sign map
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetinotopyMaps {
    /// Horizontal-axis phase map
    pub horizontal: PhaseMapResult,
    /// Vertical-axis phase map
    pub vertical: PhaseMapResult,
    /// Visual field sign
    pub sign_map: SignMap,
}

impl RetinotopyMaps {
    /// Phase map of one axis
    #[must_use]
    pub fn phase(&self, axis: StimulusAxis) -> &PhaseMapResult {
        match axis {
            StimulusAxis::Horizontal => &self.horizontal,
            StimulusAxis::Vertical => &self.vertical,
        }
    }
}

/// Maps plus the segmented areas
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetinotopyReport {
    /// Intermediate maps
    pub maps: RetinotopyMaps,
    /// Areas keyed by name
    pub areas: AreaMap,
}

impl RetinotopyReport {
    /// The primary visual area, if any area survived
    #[must_use]
    pub fn v1(&self) -> Option<&Area> {
        self.areas.get(Area::V1_NAME)
    }
}

/// Full retinotopic analysis with one fixed configuration
pub struct RetinotopicAnalyzer {
    config: RetinotopyConfig,
    phase_mapper: PhaseMapComputer,
    sign_mapper: SignMapGenerator,
    segmenter: VisualAreaSegmenter,
    filter: Box<dyn SpatialFilter>,
}

impl RetinotopicAnalyzer {
    /// Build the pipeline stages from a configuration
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] if the configuration does not
    /// validate.
    pub fn new(config: RetinotopyConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let filter = build_filter(config.smoothing_kernel, config.smoothing_sigma)?;

        Ok(Self {
            phase_mapper: PhaseMapComputer::from_config(&config)?,
            sign_mapper: SignMapGenerator::new(),
            segmenter: VisualAreaSegmenter::from_config(&config)?,
            filter,
            config,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &RetinotopyConfig {
        &self.config
    }

    /// Compute both phase maps and the sign map
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ShapeMismatch`] when the series cover
    /// different extents, and wraps any stage failure.
    pub fn analyze_retinotopy(
        &self,
        horizontal: &ResponseSeries,
        vertical: &ResponseSeries,
    ) -> AnalysisResult<RetinotopyMaps> {
        if horizontal.shape() != vertical.shape() {
            return Err(AnalysisError::ShapeMismatch {
                horizontal: horizontal.shape(),
                vertical: vertical.shape(),
            });
        }

        let compute = |axis: StimulusAxis, series: &ResponseSeries| {
            self.phase_mapper
                .compute_phase_map(series)
                .map_err(|source| AnalysisError::phase_mapping(axis, source))
        };

        let (h, v) = match self.config.execution {
            ExecutionTarget::Sequential => (
                compute(StimulusAxis::Horizontal, horizontal),
                compute(StimulusAxis::Vertical, vertical),
            ),
            ExecutionTarget::Parallel => rayon::join(
                || compute(StimulusAxis::Horizontal, horizontal),
                || compute(StimulusAxis::Vertical, vertical),
            ),
        };
        let (horizontal, vertical) = (h?, v?);

        let sign_map =
            self.sign_mapper
                .generate_with_filter(&horizontal.phase, &vertical.phase, self.filter.as_ref())?;

        debug!(
            execution = ?self.config.execution,
            horizontal_bin = horizontal.stimulus_bin,
            vertical_bin = vertical.stimulus_bin,
            "Retinotopic maps computed"
        );

        Ok(RetinotopyMaps { horizontal, vertical, sign_map })
    }

    /// Compute the maps and segment them into visual areas
    ///
    /// # Errors
    ///
    /// Same as [`Self::analyze_retinotopy`], plus
    /// [`AnalysisError::Segmentation`].
    pub fn analyze_and_segment(
        &self,
        horizontal: &ResponseSeries,
        vertical: &ResponseSeries,
        pixels_per_mm: f64,
    ) -> AnalysisResult<RetinotopyReport> {
        let maps = self.analyze_retinotopy(horizontal, vertical)?;
        let areas = self.segmenter.segment(
            &maps.horizontal.phase,
            &maps.vertical.phase,
            &maps.sign_map,
            pixels_per_mm,
        )?;

        info!(
            areas = areas.len(),
            v1_size = areas.get(Area::V1_NAME).map(|a| a.size),
            "Segmentation complete"
        );

        Ok(RetinotopyReport { maps, areas })
    }
}

impl fmt::Debug for RetinotopicAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetinotopicAnalyzer")
            .field("config", &self.config)
            .field("filter", &self.filter.kind())
            .finish_non_exhaustive()
    }
}
