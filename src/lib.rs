pub mod alignment;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use alignment::report::{AlignmentRendering, DurationReport};
pub use alignment::{
    decode, decode_beam, decode_exact, extract_durations, to_durations, CostModel,
    DecodeStrategy, DecoderKind, DEFAULT_PROB_FLOOR,
};
pub use config::{ExtractionMethod, ExtractorConfig};
pub use error::AlignmentError;
pub use pipeline::builder::DurationExtractorBuilder;
pub use pipeline::runtime::DurationExtractor;
pub use types::{
    AlignmentPath, DurationOutput, DurationSequence, PosteriorMatrix, SymbolTable, TokenSequence,
};
