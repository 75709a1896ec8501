use super::IntegratorState;
use crate::fem::SolverFailure;
use crate::StrError;
use thiserror::Error;

/// Defines the errors reported by the time integrator
#[derive(Clone, Debug, Error, PartialEq)]
pub enum IntegratorError {
    /// Inconsistent configuration (e.g., operators with different numbers of DOFs)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The solution vector does not have the number of DOFs of the operators
    #[error("dimension error: the solution vector has {actual} entries but {expected} are required")]
    Dimension { expected: usize, actual: usize },

    /// The Newton iterations exceeded the maximum count or the residual kept growing
    #[error("nonlinear iterations diverged after {iterations} iterations (relative residual = {residual:.3e})")]
    NonlinearDivergence { iterations: usize, residual: f64 },

    /// The linear solve service failed (propagated unchanged)
    #[error("linear solver failed: {0}")]
    SolverFailure(SolverFailure),

    /// Recovering was requested but no checkpoint is available
    #[error("there is no checkpoint to recover from")]
    NoCheckpoint,

    /// An operator failed to assemble its matrix or right-hand side
    #[error("assembly failed: {0}")]
    Assembly(StrError),

    /// The operation is not allowed in the current lifecycle state
    #[error("{operation} is not allowed in the {state:?} state")]
    InvalidState {
        operation: &'static str,
        state: IntegratorState,
    },
}

/// Defines the result type of the time integrator
pub type IntegratorResult<T> = Result<T, IntegratorError>;

impl From<SolverFailure> for IntegratorError {
    fn from(failure: SolverFailure) -> Self {
        IntegratorError::SolverFailure(failure)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
