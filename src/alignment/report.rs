use serde::Serialize;

use crate::alignment::DecoderKind;
use crate::types::{DurationOutput, DurationSequence, PosteriorMatrix, SymbolTable};

#[derive(Debug, Clone, Serialize)]
pub struct DurationReport {
    pub id: String,
    pub num_frames: usize,
    pub num_tokens: usize,
    pub decoder: DecoderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam_width: Option<usize>,
    pub total_cost: f64,
    /// Mean per-frame cost, comparable across utterances of different length.
    pub mean_frame_cost: f64,
    pub durations: DurationSequence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering: Option<AlignmentRendering>,
}

/// Human-readable view of one alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignmentRendering {
    /// Per-frame argmax symbols of the posterior matrix.
    pub prediction: String,
    pub target: String,
    /// Target with each symbol repeated by its duration.
    pub target_duration_repr: String,
}

impl DurationReport {
    pub fn new(id: impl Into<String>, output: &DurationOutput, beam_width: Option<usize>) -> Self {
        let num_frames = output.path.num_frames();
        Self {
            id: id.into(),
            num_frames,
            num_tokens: output.durations.as_slice().len(),
            decoder: output.path.decoder,
            beam_width,
            total_cost: output.path.total_cost,
            mean_frame_cost: if num_frames == 0 {
                0.0
            } else {
                output.path.total_cost / num_frames as f64
            },
            durations: output.durations.clone(),
            rendering: None,
        }
    }

    pub fn with_rendering(mut self, rendering: AlignmentRendering) -> Self {
        self.rendering = Some(rendering);
        self
    }
}

/// Most probable symbol per frame; ties go to the lower symbol id.
pub fn greedy_symbols(matrix: &PosteriorMatrix) -> Vec<usize> {
    matrix
        .rows()
        .map(|row| {
            let mut best = 0usize;
            for (idx, &p) in row.iter().enumerate().skip(1) {
                if p > row[best] {
                    best = idx;
                }
            }
            best
        })
        .collect()
}

pub fn render_duration_repr(
    tokens: &[usize],
    durations: &DurationSequence,
    symbols: &SymbolTable,
) -> String {
    tokens
        .iter()
        .zip(durations.as_slice())
        .map(|(&id, &d)| symbols.label(id).repeat(d as usize))
        .collect()
}

pub fn render_alignment(
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    durations: &DurationSequence,
    symbols: &SymbolTable,
) -> AlignmentRendering {
    AlignmentRendering {
        prediction: symbols.decode(&greedy_symbols(matrix)),
        target: symbols.decode(tokens),
        target_duration_repr: render_duration_repr(tokens, durations, symbols),
    }
}
