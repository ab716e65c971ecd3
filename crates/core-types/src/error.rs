use crate::enums::TaskStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Illegal status transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Unknown task status '{0}'")]
    UnknownStatus(String),

    #[error("Unknown algorithm '{0}'")]
    UnknownAlgorithm(String),
}
