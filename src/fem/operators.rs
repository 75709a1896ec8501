use crate::base::FixedDofs;
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::CooMatrix;

/// Holds the output of an operator assembly: a sparse matrix and a right-hand side vector
///
/// The matrix is `None` when the assembly was requested without the matrix.
#[derive(Clone)]
pub struct OperatorOutput {
    /// Global (free DOFs × free DOFs) matrix
    pub matrix: Option<CooMatrix>,

    /// Global right-hand side vector (free DOFs)
    pub rhs: Vector,
}

impl OperatorOutput {
    /// Returns the matrix or an error if it has not been assembled
    pub fn matrix(&self) -> Result<&CooMatrix, StrError> {
        self.matrix.as_ref().ok_or("the operator matrix has not been assembled")
    }
}

/// Holds the mesh velocity of an arbitrary Lagrangian-Eulerian (ALE) formulation
///
/// The values are interpreted by the stiffness operator; `patches` pairs each patch of
/// the flow domain with the patch of the mesh-motion field providing its velocity.
#[derive(Clone, Debug)]
pub struct AleVelocity {
    /// Mesh velocity values
    pub values: Vector,

    /// Pairs (flow patch, mesh-motion patch)
    pub patches: Vec<(usize, usize)>,
}

impl AleVelocity {
    /// Allocates a new instance
    pub fn new(values: Vector, patches: Vec<(usize, usize)>) -> Self {
        AleVelocity { values, patches }
    }

    /// Allocates a zero mesh velocity with `n` values on a single patch
    pub fn zero(n: usize) -> Self {
        AleVelocity {
            values: Vector::new(n),
            patches: vec![(0, 0)],
        }
    }

    /// Returns the maximum absolute mesh velocity
    pub fn max_abs(&self) -> f64 {
        self.values.as_data().iter().fold(0.0, |acc, v| f64::max(acc, f64::abs(*v)))
    }
}

/// Defines the contract of the (possibly nonlinear) spatial operator
///
/// The operator acts on the free DOFs only; the fixed DOFs are eliminated and their
/// prescribed values enter the right-hand side. For a state `u` the assembly returns
/// `K(u)` and `F(u)` such that the spatial residual reads `K(u)·u - F(u)`.
///
/// The assembly must be deterministic for identical inputs and must not keep
/// references to the state.
pub trait StiffnessOperator {
    /// Returns the number of (free) DOFs
    fn num_dofs(&self) -> usize;

    /// Assembles `K(u)` (if `compute_matrix`) and `F(u)`
    fn assemble(
        &mut self,
        state: &Vector,
        fixed_dofs: &FixedDofs,
        compute_matrix: bool,
    ) -> Result<OperatorOutput, StrError>;

    /// Assembles the tangent `∂(K(u)·u)/∂u` used by the Newton iterations
    ///
    /// Returns `None` if the operator has no tangent; then `K(u)` is used (Picard linearization).
    fn assemble_tangent(&mut self, _state: &Vector, _fixed_dofs: &FixedDofs) -> Result<Option<CooMatrix>, StrError> {
        Ok(None)
    }

    /// Assembles `K(u)` and `F(u)` with the convection relative to the moving mesh
    fn assemble_ale(
        &mut self,
        _state: &Vector,
        _fixed_dofs: &FixedDofs,
        _ale: &AleVelocity,
        _compute_matrix: bool,
    ) -> Result<OperatorOutput, StrError> {
        Err("ALE assembly is not available for this operator")
    }
}

/// Defines the contract of the mass (time-derivative) operator
///
/// The right-hand side `b_M` accounts for the eliminated DOFs; it enters the
/// system as `(b_Mⁿ⁺¹ - b_Mⁿ)/Δt`. For example, with a consistent mass matrix,
/// `b_M = -M_fd·g` where `g` holds the prescribed values.
pub trait MassOperator {
    /// Returns the number of (free) DOFs
    fn num_dofs(&self) -> usize;

    /// Assembles `M` (if `compute_matrix`) and `b_M`
    fn assemble(
        &mut self,
        state: &Vector,
        fixed_dofs: &FixedDofs,
        compute_matrix: bool,
    ) -> Result<OperatorOutput, StrError>;

    /// Returns whether the geometry changes between steps (the matrix is then reassembled at every step)
    fn moving_mesh(&self) -> bool {
        false
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
