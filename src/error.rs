use thiserror::Error;

/// Why the rules engine refused a move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveRejected {
    #[error("unknown square '{0}'")]
    UnknownSquare(String),
    #[error("unknown promotion piece '{0}'")]
    UnknownPromotion(char),
    #[error("'{0}' is not a move request (expected e.g. e2e4 or e7e8q)")]
    BadRequest(String),
    #[error("'{0}' is not algebraic notation")]
    BadNotation(String),
    #[error("no legal move {0} in this position")]
    NoSuchMove(String),
    #[error("position cannot be played from: {0}")]
    InvalidPosition(String),
}

/// Failures of the notation codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("FEN describes an impossible position: {0}")]
    IllegalPosition(String),
    #[error("unterminated {0} in move text")]
    Unterminated(&'static str),
    #[error("unexpected '{0}' in move text")]
    Unbalanced(char),
    #[error("malformed tag pair: {0}")]
    BadTag(String),
    #[error("'{0}' is not a move")]
    BadToken(String),
}

/// Errors surfaced by [`crate::tree::MoveTree`] operations.
///
/// Every variant means the tree was left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("illegal move {request}: {source}")]
    IllegalMove {
        request: String,
        #[source]
        source: MoveRejected,
    },
    #[error("move {ply} ({san}) could not be replayed: {source}")]
    IllegalImport {
        ply: usize,
        san: String,
        #[source]
        source: MoveRejected,
    },
    #[error(transparent)]
    Notation(#[from] NotationError),
}
