use thiserror::Error;

use crate::alignment::DecoderKind;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error(
        "{decoder} decoder: no monotonic alignment of {tokens} tokens over {frames} frames ({reason})"
    )]
    InfeasibleAlignment {
        decoder: DecoderKind,
        frames: usize,
        tokens: usize,
        reason: &'static str,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error(
        "beam decoder: no hypothesis reached the final token ({tokens} tokens, {frames} frames, beam width {beam_width})"
    )]
    BeamExhausted {
        frames: usize,
        tokens: usize,
        beam_width: usize,
    },
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
}

impl AlignmentError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn infeasible(
        decoder: DecoderKind,
        frames: usize,
        tokens: usize,
        reason: &'static str,
    ) -> Self {
        Self::InfeasibleAlignment {
            decoder,
            frames,
            tokens,
            reason,
        }
    }

    /// True when retrying with the exact decoder may succeed.
    pub fn is_beam_exhausted(&self) -> bool {
        matches!(self, Self::BeamExhausted { .. })
    }
}
