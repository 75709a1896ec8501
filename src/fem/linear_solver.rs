use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{CooMatrix, Genie, LinSolParams, LinSolver};
use thiserror::Error;

/// Defines the reasons of a linear solver failure
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SolverFailure {
    /// The matrix is singular or near-singular
    #[error("singular or near-singular matrix ({0})")]
    Singular(StrError),

    /// An iterative solver did not converge
    #[error("the iterative solver did not converge ({0})")]
    NotConverged(StrError),

    /// Any other failure (e.g., inconsistent dimensions)
    #[error("{0}")]
    Other(StrError),
}

/// Defines the contract of the sparse linear solve service
pub trait LinearSolveService {
    /// Solves `A·x = b` and returns `x`
    fn solve(&mut self, matrix: &CooMatrix, rhs: &Vector) -> Result<Vector, SolverFailure>;
}

/// Implements the linear solve service with the direct sparse solvers of russell
pub struct DirectSolver {
    /// Selects UMFPACK, MUMPS, or Intel DSS
    pub genie: Genie,

    /// Parameters for the factorization
    pub params: Option<LinSolParams>,

    /// Shows messages from the factorization and solution phases
    pub verbose: bool,
}

impl DirectSolver {
    /// Allocates a new instance
    pub fn new(genie: Genie) -> Self {
        DirectSolver {
            genie,
            params: None,
            verbose: false,
        }
    }
}

impl Default for DirectSolver {
    fn default() -> Self {
        DirectSolver::new(Genie::Umfpack)
    }
}

impl LinearSolveService for DirectSolver {
    fn solve(&mut self, matrix: &CooMatrix, rhs: &Vector) -> Result<Vector, SolverFailure> {
        let (nrow, ncol, _, _) = matrix.get_info();
        if nrow != ncol || rhs.dim() != nrow {
            return Err(SolverFailure::Other("the matrix must be square and compatible with the rhs"));
        }

        // a new solver is allocated because the sparsity pattern may change between calls
        let mut solver = LinSolver::new(self.genie).map_err(SolverFailure::Other)?;
        solver
            .actual
            .factorize(matrix, self.params)
            .map_err(SolverFailure::Singular)?;

        // solve
        let mut x = Vector::new(nrow);
        solver
            .actual
            .solve(&mut x, rhs, self.verbose)
            .map_err(SolverFailure::Other)?;
        if x.as_data().iter().any(|v| !v.is_finite()) {
            return Err(SolverFailure::Singular("found NaN or Inf in the solution"));
        }
        Ok(x)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
