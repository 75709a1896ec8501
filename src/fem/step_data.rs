use super::{AleVelocity, OperatorOutput, SystemOperator};
use crate::base::{FixedDofs, IntegratorState};
use russell_lab::Vector;
use russell_sparse::CooMatrix;

/// Holds every mutable buffer owned by the time integrator
///
/// A checkpoint is a clone of this structure; thus, all the buffers must be owned here.
#[derive(Clone)]
pub struct StepData {
    /// Lifecycle state
    pub(crate) state: IntegratorState,

    /// Current solution `uⁿ⁺¹` (free DOFs)
    pub(crate) solution: Vector,

    /// Solution at the beginning of the last step `uⁿ`
    pub(crate) solution_old: Vector,

    /// Prescribed values of the eliminated DOFs
    pub(crate) fixed_dofs: FixedDofs,

    /// Combined system of the last assembly
    pub(crate) system: SystemOperator,

    /// Mass matrix of the last assembly
    pub(crate) mass_matrix: Option<CooMatrix>,

    /// Mass right-hand side corresponding to `solution`
    pub(crate) mass_rhs: Vector,

    /// Mass right-hand side corresponding to `solution_old`
    pub(crate) mass_rhs_old: Vector,

    /// Stiffness output evaluated at `solution` (reused by the history term of the next step)
    ///
    /// The single-solve steps assemble it after the solve (with the mesh velocity of the step);
    /// the Newton steps keep the output of the converged iterate. It is `None` if θ = 1 and
    /// whenever `solution` is changed externally; then the next step assembles the operator at
    /// `solution` with `ale_velocity`.
    pub(crate) stiffness_at_solution: Option<OperatorOutput>,

    /// Mesh velocity of the step that produced `solution` (None for implicit steps)
    pub(crate) ale_velocity: Option<AleVelocity>,

    /// Stiffness matrix of the last assembly (used when the matrix is frozen)
    pub(crate) stiffness_matrix: Option<CooMatrix>,

    /// History term `Kⁿ·uⁿ - Fⁿ` corresponding to `solution_old`
    pub(crate) history: Option<Vector>,

    /// Current time
    pub(crate) time: f64,

    /// Time at the beginning of the last step
    pub(crate) time_old: f64,

    /// Time increment of the last step (or the default one before the first step)
    pub(crate) dt: f64,

    /// Time increment of the step before the last one
    pub(crate) dt_old: f64,

    /// Number of accepted steps
    pub(crate) n_steps: usize,

    /// Indicates that the last accepted step was an FSI step (a corrector may follow)
    pub(crate) fsi_predicted: bool,
}

impl StepData {
    /// Allocates a new instance
    pub fn new(ndof: usize, fixed_dofs: FixedDofs, dt: f64) -> Self {
        StepData {
            state: IntegratorState::Uninitialized,
            solution: Vector::new(ndof),
            solution_old: Vector::new(ndof),
            fixed_dofs,
            system: SystemOperator::new(ndof),
            mass_matrix: None,
            mass_rhs: Vector::new(ndof),
            mass_rhs_old: Vector::new(ndof),
            stiffness_at_solution: None,
            ale_velocity: None,
            stiffness_matrix: None,
            history: None,
            time: 0.0,
            time_old: 0.0,
            dt,
            dt_old: dt,
            n_steps: 0,
            fsi_predicted: false,
        }
    }

    /// Returns the number of DOFs
    pub fn ndof(&self) -> usize {
        self.solution.dim()
    }

    /// Invalidates the caches that depend on the current solution
    pub(crate) fn invalidate_solution_caches(&mut self) {
        self.stiffness_at_solution = None;
        self.history = None;
        self.fsi_predicted = false;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
