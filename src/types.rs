use candle_core::{Device, Tensor, D};

use crate::alignment::DecoderKind;
use crate::error::AlignmentError;

/// Frame-major `T × V` table of per-frame symbol probabilities.
///
/// Rows are taken as given: they are expected to sum to 1 but the decoders
/// only rely on entries being non-negative, and exact zeros are legal.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorMatrix {
    data: Vec<f32>,
    num_frames: usize,
    num_symbols: usize,
}

impl PosteriorMatrix {
    pub fn from_flat(
        data: Vec<f32>,
        num_frames: usize,
        num_symbols: usize,
    ) -> Result<Self, AlignmentError> {
        if num_symbols == 0 && num_frames > 0 {
            return Err(AlignmentError::invalid_input(
                "posterior matrix rows must have at least one symbol",
            ));
        }
        if data.len() != num_frames * num_symbols {
            return Err(AlignmentError::invalid_input(format!(
                "posterior data has {} entries, expected {num_frames} frames x {num_symbols} symbols",
                data.len()
            )));
        }
        Ok(Self {
            data,
            num_frames,
            num_symbols,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, AlignmentError> {
        let num_frames = rows.len();
        let num_symbols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(num_frames * num_symbols);
        for (frame, row) in rows.into_iter().enumerate() {
            if row.len() != num_symbols {
                return Err(AlignmentError::invalid_input(format!(
                    "ragged posterior matrix: frame {frame} has {} symbols, frame 0 has {num_symbols}",
                    row.len()
                )));
            }
            data.extend(row);
        }
        Self::from_flat(data, num_frames, num_symbols)
    }

    /// Softmax raw network scores over the symbol axis.
    pub fn from_logits(rows: Vec<Vec<f32>>) -> Result<Self, AlignmentError> {
        let raw = Self::from_rows(rows)?;
        if raw.num_frames == 0 {
            return Ok(raw);
        }
        let logits = Tensor::from_vec(raw.data, (raw.num_frames, raw.num_symbols), &Device::Cpu)
            .map_err(|e| AlignmentError::runtime("tensor creation", e))?;
        Self::from_logits_tensor(&logits)
    }

    /// Accepts `[T, V]` or a single-item batch `[1, T, V]`.
    pub fn from_logits_tensor(logits: &Tensor) -> Result<Self, AlignmentError> {
        let logits = match logits.rank() {
            2 => logits.clone(),
            3 if logits.dims()[0] == 1 => logits
                .squeeze(0)
                .map_err(|e| AlignmentError::runtime("squeeze", e))?,
            _ => {
                return Err(AlignmentError::invalid_input(format!(
                    "logits must have shape [T, V] or [1, T, V], got {:?}",
                    logits.dims()
                )))
            }
        };
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|t| t.to_dtype(candle_core::DType::F32))
            .map_err(|e| AlignmentError::runtime("softmax", e))?;
        let rows: Vec<Vec<f32>> = probs
            .to_vec2()
            .map_err(|e| AlignmentError::runtime("to_vec2", e))?;
        Self::from_rows(rows)
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_symbols(&self) -> usize {
        self.num_symbols
    }

    #[inline(always)]
    pub fn prob(&self, frame: usize, symbol: usize) -> f32 {
        self.data[frame * self.num_symbols + symbol]
    }

    pub fn row(&self, frame: usize) -> &[f32] {
        let start = frame * self.num_symbols;
        &self.data[start..start + self.num_symbols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.num_symbols.max(1))
    }

    /// Largest `|sum(row) - 1|` over all frames.
    pub fn max_row_sum_deviation(&self) -> f32 {
        self.rows()
            .map(|row| (row.iter().sum::<f32>() - 1.0).abs())
            .fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    pub tokens: Vec<usize>,
}

impl TokenSequence {
    pub fn new(tokens: Vec<usize>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl From<Vec<usize>> for TokenSequence {
    fn from(tokens: Vec<usize>) -> Self {
        Self { tokens }
    }
}

/// Frame-to-token assignment: `token_indices[i]` is the position in the
/// token sequence that frame `i` is aligned to.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentPath {
    pub token_indices: Vec<usize>,
    pub total_cost: f64,
    pub decoder: DecoderKind,
}

impl AlignmentPath {
    pub fn num_frames(&self) -> usize {
        self.token_indices.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct DurationSequence(pub Vec<u32>);

impl DurationSequence {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn total_frames(&self) -> u64 {
        self.0.iter().map(|&d| d as u64).sum()
    }
}

/// Symbol id → printable label, used for rendering alignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    labels: Vec<String>,
}

impl SymbolTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, id: usize) -> &str {
        self.labels.get(id).map_or("?", String::as_str)
    }

    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter().map(|&id| self.label(id)).collect()
    }
}

/// Everything a caller needs from one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationOutput {
    pub path: AlignmentPath,
    pub durations: DurationSequence,
}
