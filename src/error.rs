use thiserror::Error;

/// The reason a [`NoSolution`](AdvisorError::NoSolution) was returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSolutionKind {
    #[error("storage budget infeasible")]
    Budget,
    #[error("no plan covers every query under any enabled index set")]
    Coverage,
    #[error("solver deadline exceeded")]
    Timeout,
}

#[derive(Error, Debug, Clone)]
pub enum AdvisorError {
    #[error("parse error at {pos}: {reason}")]
    ParseFailed { pos: usize, reason: String },

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("no plan found for query: {0}")]
    NoPlan(String),

    #[error("no solution: {0}")]
    NoSolution(NoSolutionKind),

    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("invalid workload: {0}")]
    InvalidWorkload(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, AdvisorError>;

impl From<std::io::Error> for AdvisorError {
    fn from(e: std::io::Error) -> Self {
        AdvisorError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(e: serde_json::Error) -> Self {
        AdvisorError::Serialization(e.to_string())
    }
}
