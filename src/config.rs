use std::path::Path;

use serde::Deserialize;

use crate::alignment::{CostModel, DecodeStrategy, DEFAULT_PROB_FLOOR};
use crate::error::AlignmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Globally optimal shortest path through the lattice.
    #[serde(alias = "exact")]
    Dijkstra,
    Beam,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub extraction_method: ExtractionMethod,
    /// Only read when `extraction_method` is `beam`.
    pub beam_width: usize,
    pub prob_floor: f32,
}

impl ExtractorConfig {
    pub const DEFAULT_BEAM_WIDTH: usize = 16;

    pub fn load(path: &Path) -> Result<Self, AlignmentError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AlignmentError::io("read extractor config", e))?;
        serde_json::from_str(&data).map_err(|e| AlignmentError::json("parse extractor config", e))
    }

    pub fn strategy(&self) -> Result<DecodeStrategy, AlignmentError> {
        match self.extraction_method {
            ExtractionMethod::Dijkstra => Ok(DecodeStrategy::Exact),
            ExtractionMethod::Beam if self.beam_width == 0 => Err(
                AlignmentError::invalid_input("beam_width must be at least 1"),
            ),
            ExtractionMethod::Beam => Ok(DecodeStrategy::Beam {
                width: self.beam_width,
            }),
        }
    }

    pub fn cost_model(&self) -> Result<CostModel, AlignmentError> {
        CostModel::new(self.prob_floor)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            extraction_method: ExtractionMethod::Dijkstra,
            beam_width: Self::DEFAULT_BEAM_WIDTH,
            prob_floor: DEFAULT_PROB_FLOOR,
        }
    }
}
