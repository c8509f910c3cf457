pub mod beam;
pub mod durations;
pub mod exact;
pub mod lattice;
pub mod report;

use std::fmt;

use serde::Serialize;

use crate::error::AlignmentError;
use crate::types::{AlignmentPath, DurationOutput, PosteriorMatrix};

pub use beam::decode_beam;
pub use durations::to_durations;
pub use exact::decode_exact;
pub use lattice::{CostModel, DEFAULT_PROB_FLOOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    Exact,
    Beam,
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Beam => "beam",
        })
    }
}

/// Which decoder to run for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    Exact,
    Beam { width: usize },
}

impl DecodeStrategy {
    pub fn kind(&self) -> DecoderKind {
        match self {
            Self::Exact => DecoderKind::Exact,
            Self::Beam { .. } => DecoderKind::Beam,
        }
    }

    pub fn beam_width(&self) -> Option<usize> {
        match self {
            Self::Exact => None,
            Self::Beam { width } => Some(*width),
        }
    }
}

pub fn decode(
    strategy: DecodeStrategy,
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    cost_model: &CostModel,
) -> Result<AlignmentPath, AlignmentError> {
    match strategy {
        DecodeStrategy::Exact => decode_exact(matrix, tokens, cost_model),
        DecodeStrategy::Beam { width } => decode_beam(matrix, tokens, width, cost_model),
    }
}

/// Decode and reduce in one call.
pub fn extract_durations(
    strategy: DecodeStrategy,
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    cost_model: &CostModel,
) -> Result<DurationOutput, AlignmentError> {
    let path = decode(strategy, matrix, tokens, cost_model)?;
    let durations = to_durations(&path.token_indices, tokens.len())?;
    Ok(DurationOutput { path, durations })
}
