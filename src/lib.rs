pub mod config;
pub mod error;
pub mod notation;
pub mod record;
pub mod shell;
pub mod tree;
pub mod validator;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, MoveRejected, NotationError};
pub use record::{Branch, BranchId, MoveRecord, MoveRow, Side};
pub use tree::MoveTree;
pub use validator::{AppliedMove, MoveRequest, MoveValidator, StandardRules};
