use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::alignment::{CostModel, DecodeStrategy};
use crate::config::ExtractorConfig;
use crate::error::AlignmentError;
use crate::pipeline::runtime::{DurationExtractor, DurationExtractorParts};
use crate::types::SymbolTable;

pub struct DurationExtractorBuilder {
    config: ExtractorConfig,
    strategy: Option<DecodeStrategy>,
    cost_model: Option<CostModel>,
    symbols: Option<SymbolTable>,
    symbols_path: Option<PathBuf>,
}

impl DurationExtractorBuilder {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            strategy: None,
            cost_model: None,
            symbols: None,
            symbols_path: None,
        }
    }

    /// Overrides the strategy derived from the config.
    pub fn with_strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = Some(cost_model);
        self
    }

    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// JSON object mapping each symbol label to its id, loaded at build time.
    pub fn with_symbols_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.symbols_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DurationExtractor, AlignmentError> {
        let strategy = match self.strategy {
            Some(DecodeStrategy::Beam { width: 0 }) => {
                return Err(AlignmentError::invalid_input(
                    "beam width must be at least 1",
                ))
            }
            Some(strategy) => strategy,
            None => self.config.strategy()?,
        };
        let cost_model = match self.cost_model {
            Some(cost_model) => cost_model,
            None => self.config.cost_model()?,
        };
        let symbols = match (self.symbols, self.symbols_path) {
            (Some(symbols), _) => Some(symbols),
            (None, Some(path)) => Some(load_symbols(&path)?),
            (None, None) => None,
        };

        Ok(DurationExtractor::from_parts(DurationExtractorParts {
            strategy,
            cost_model,
            symbols,
        }))
    }
}

/// Largest symbol id accepted from a symbols file.
const MAX_SYMBOL_ID: usize = 1 << 16;

fn load_symbols(path: &Path) -> Result<SymbolTable, AlignmentError> {
    let data =
        std::fs::read_to_string(path).map_err(|e| AlignmentError::io("read symbols.json", e))?;
    let raw: HashMap<String, usize> =
        serde_json::from_str(&data).map_err(|e| AlignmentError::json("parse symbols.json", e))?;

    if let Some((label, &id)) = raw.iter().find(|&(_, &id)| id > MAX_SYMBOL_ID) {
        return Err(AlignmentError::invalid_input(format!(
            "symbols.json maps '{label}' to id {id}, above the limit of {MAX_SYMBOL_ID}"
        )));
    }
    let size = raw.values().copied().max().map_or(0, |max_id| max_id + 1);
    let mut labels = vec![String::new(); size];
    for (label, id) in raw {
        if !labels[id].is_empty() {
            return Err(AlignmentError::invalid_input(format!(
                "symbols.json maps both '{}' and '{label}' to id {id}",
                labels[id]
            )));
        }
        labels[id] = label;
    }
    Ok(SymbolTable::new(labels))
}
