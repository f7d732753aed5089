// src/error.rs
use thiserror::Error;

use crate::core::operations::OperationStatus;

#[derive(Debug, Error, PartialEq)]
pub enum PlannerError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("operation {0} not found")]
    OperationNotFound(String),

    #[error("cannot {action} operation {id}: status is {from}")]
    InvalidTransition {
        id: String,
        from: OperationStatus,
        action: &'static str,
    },

    #[error("already {limit} active operations")]
    TooManyActive { limit: usize },

    #[error("symbol {0} not present in market feed")]
    SymbolNotFound(String),
}
