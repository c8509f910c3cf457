use crate::alignment::report::{render_alignment, DurationReport};
use crate::alignment::{extract_durations, CostModel, DecodeStrategy};
use crate::error::AlignmentError;
use crate::types::{DurationOutput, PosteriorMatrix, SymbolTable, TokenSequence};

const ROW_SUM_WARN_TOLERANCE: f32 = 1e-3;

/// Configured duration extraction, shareable across worker threads.
pub struct DurationExtractor {
    strategy: DecodeStrategy,
    cost_model: CostModel,
    symbols: Option<SymbolTable>,
}

pub(crate) struct DurationExtractorParts {
    pub strategy: DecodeStrategy,
    pub cost_model: CostModel,
    pub symbols: Option<SymbolTable>,
}

impl DurationExtractor {
    pub(crate) fn from_parts(parts: DurationExtractorParts) -> Self {
        Self {
            strategy: parts.strategy,
            cost_model: parts.cost_model,
            symbols: parts.symbols,
        }
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.strategy
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }

    pub fn extract(
        &self,
        matrix: &PosteriorMatrix,
        tokens: &TokenSequence,
    ) -> Result<DurationOutput, AlignmentError> {
        self.extract_with(self.strategy, matrix, tokens)
    }

    /// Same as [`extract`](Self::extract) with an explicit strategy, for
    /// callers that escalate from beam to exact on their own.
    pub fn extract_with(
        &self,
        strategy: DecodeStrategy,
        matrix: &PosteriorMatrix,
        tokens: &TokenSequence,
    ) -> Result<DurationOutput, AlignmentError> {
        let deviation = matrix.max_row_sum_deviation();
        if deviation > ROW_SUM_WARN_TOLERANCE {
            tracing::warn!(
                max_row_sum_deviation = deviation,
                frames = matrix.num_frames(),
                "posterior rows do not sum to 1; durations follow the raw values"
            );
        }

        let output = extract_durations(strategy, matrix, &tokens.tokens, &self.cost_model)?;
        tracing::debug!(
            decoder = %output.path.decoder,
            frames = matrix.num_frames(),
            tokens = tokens.len(),
            total_cost = output.path.total_cost,
            "extracted durations"
        );
        Ok(output)
    }

    /// Extract and summarise one item; adds a rendering when symbols are known.
    pub fn report(
        &self,
        id: &str,
        matrix: &PosteriorMatrix,
        tokens: &TokenSequence,
    ) -> Result<DurationReport, AlignmentError> {
        self.report_with(self.strategy, id, matrix, tokens)
    }

    pub fn report_with(
        &self,
        strategy: DecodeStrategy,
        id: &str,
        matrix: &PosteriorMatrix,
        tokens: &TokenSequence,
    ) -> Result<DurationReport, AlignmentError> {
        let output = self.extract_with(strategy, matrix, tokens)?;
        let report = DurationReport::new(id, &output, strategy.beam_width());
        Ok(match &self.symbols {
            Some(symbols) => report.with_rendering(render_alignment(
                matrix,
                &tokens.tokens,
                &output.durations,
                symbols,
            )),
            None => report,
        })
    }
}
