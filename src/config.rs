use crate::error::NotationError;
use crate::notation::{normalize_position, STARTING_FEN};

/// Settings for a [`crate::tree::MoveTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// FEN the tree starts from and returns to on reset. `None` is the
    /// standard starting position.
    pub start_position: Option<String>,
    /// Label stem for auto-named branches ("Variation 3").
    pub variation_prefix: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_position: None,
            variation_prefix: "Variation".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_position(mut self, fen: impl Into<String>) -> Self {
        self.start_position = Some(fen.into());
        self
    }

    pub fn with_variation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.variation_prefix = prefix.into();
        self
    }

    /// The configured start as normalised FEN.
    pub fn resolve_start(&self) -> Result<String, NotationError> {
        match &self.start_position {
            Some(fen) => normalize_position(fen),
            None => Ok(STARTING_FEN.to_string()),
        }
    }

    pub(crate) fn branch_name(&self, number: u32) -> String {
        format!("{} {}", self.variation_prefix.trim_end(), number)
    }
}
