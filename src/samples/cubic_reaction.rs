use crate::base::FixedDofs;
use crate::fem::{MassOperator, OperatorOutput, StiffnessOperator};
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{CooMatrix, Sym};

/// Implements a diagonal operator with a cubic reaction term
///
/// ```text
/// K(u) = diag(κ uᵢ²)    F = f    T(u) = diag(3 κ uᵢ²)
/// ```
///
/// Thus, `K(u)·u - F` has the components `κ uᵢ³ - fᵢ`. There are no fixed DOFs.
pub struct CubicReaction {
    kappa: f64,
    forcing: Vector,
    with_tangent: bool,
}

impl CubicReaction {
    /// Allocates a new instance
    pub fn new(kappa: f64, forcing: &[f64]) -> Self {
        CubicReaction {
            kappa,
            forcing: Vector::from(&forcing.to_vec()),
            with_tangent: true,
        }
    }

    /// Disables the tangent; then the integrator falls back to K(u) (Picard iterations)
    pub fn set_with_tangent(&mut self, flag: bool) -> &mut Self {
        self.with_tangent = flag;
        self
    }

    /// Assembles a diagonal matrix with the values calculated by `f(uᵢ)`
    fn diagonal<F>(&self, state: &Vector, f: F) -> Result<CooMatrix, StrError>
    where
        F: Fn(f64) -> f64,
    {
        let n = self.forcing.dim();
        if state.dim() != n {
            return Err("the state vector must have dimension equal to the number of DOFs");
        }
        let mut kk = CooMatrix::new(n, n, n, Sym::No)?;
        for i in 0..n {
            kk.put(i, i, f(state[i]))?;
        }
        Ok(kk)
    }
}

impl StiffnessOperator for CubicReaction {
    fn num_dofs(&self) -> usize {
        self.forcing.dim()
    }

    fn assemble(&mut self, state: &Vector, _fixed_dofs: &FixedDofs, compute_matrix: bool) -> Result<OperatorOutput, StrError> {
        let kappa = self.kappa;
        let matrix = if compute_matrix {
            Some(self.diagonal(state, |u| kappa * u * u)?)
        } else {
            None
        };
        Ok(OperatorOutput {
            matrix,
            rhs: self.forcing.clone(),
        })
    }

    fn assemble_tangent(&mut self, state: &Vector, _fixed_dofs: &FixedDofs) -> Result<Option<CooMatrix>, StrError> {
        if !self.with_tangent {
            return Ok(None);
        }
        let kappa = self.kappa;
        Ok(Some(self.diagonal(state, |u| 3.0 * kappa * u * u)?))
    }
}

/// Implements a diagonal mass operator `M = ρ I` with a zero right-hand side
pub struct LumpedMass {
    ndof: usize,
    rho: f64,
}

impl LumpedMass {
    /// Allocates a new instance
    pub fn new(ndof: usize, rho: f64) -> Self {
        LumpedMass { ndof, rho }
    }
}

impl MassOperator for LumpedMass {
    fn num_dofs(&self) -> usize {
        self.ndof
    }

    fn assemble(&mut self, _state: &Vector, _fixed_dofs: &FixedDofs, compute_matrix: bool) -> Result<OperatorOutput, StrError> {
        let matrix = if compute_matrix {
            let mut mm = CooMatrix::new(self.ndof, self.ndof, usize::max(self.ndof, 1), Sym::No)?;
            for i in 0..self.ndof {
                mm.put(i, i, self.rho)?;
            }
            Some(mm)
        } else {
            None
        };
        Ok(OperatorOutput {
            matrix,
            rhs: Vector::new(self.ndof),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
