use super::Mesh1d;
use crate::base::FixedDofs;
use crate::fem::{AleVelocity, OperatorOutput, StiffnessOperator};
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::CooMatrix;

/// Implements the spatial operator of the one-dimensional convection-diffusion equation
///
/// ```text
/// ∂u/∂t + c ∂u/∂x - κ ∂²u/∂x² = s
/// ```
///
/// The convection velocity `c` is constant (linear problem) or equal to `u` (viscous Burgers
/// equation). Linear elements with the Galerkin method give, for an element of length `h`:
///
/// ```text
///      κ ┌       ┐   cₑ ┌       ┐
/// Kₑ = ─ │  1 -1 │ + ── │ -1  1 │      Fₑ = s h/2 [1, 1]
///      h │ -1  1 │   2  │ -1  1 │
///        └       ┘      └       ┘
/// ```
///
/// where `cₑ` is the velocity (or the element average of `u`) minus the average mesh velocity.
pub struct ConvectionDiffusion1d {
    mesh: Mesh1d,
    kappa: f64,
    velocity: f64,
    burgers: bool,
    source: f64,
}

impl ConvectionDiffusion1d {
    /// Allocates the operator with a constant convection velocity
    pub fn new(mesh: &Mesh1d, kappa: f64, velocity: f64) -> Self {
        ConvectionDiffusion1d {
            mesh: mesh.clone(),
            kappa,
            velocity,
            burgers: false,
            source: 0.0,
        }
    }

    /// Allocates the operator of the viscous Burgers equation (convection velocity equal to `u`)
    pub fn new_burgers(mesh: &Mesh1d, kappa: f64) -> Self {
        ConvectionDiffusion1d {
            mesh: mesh.clone(),
            kappa,
            velocity: 0.0,
            burgers: true,
            source: 0.0,
        }
    }

    /// Sets the (constant) source term
    pub fn set_source(&mut self, source: f64) -> &mut Self {
        self.source = source;
        self
    }

    /// Returns an access to the mesh (e.g., to move the nodes)
    pub fn mesh_mut(&mut self) -> &mut Mesh1d {
        &mut self.mesh
    }

    /// Calculates the convection velocity of an element relative to the mesh
    fn element_velocity(&self, e: usize, values: &[f64], mesh_velocity: Option<&[f64]>) -> f64 {
        let c = if self.burgers {
            (values[e] + values[e + 1]) / 2.0
        } else {
            self.velocity
        };
        match mesh_velocity {
            Some(w) => c - (w[e] + w[e + 1]) / 2.0,
            None => c,
        }
    }

    /// Assembles K and F with an optional mesh velocity (one value per node)
    fn assemble_with(
        &self,
        state: &Vector,
        fixed_dofs: &FixedDofs,
        mesh_velocity: Option<&[f64]>,
        compute_matrix: bool,
    ) -> Result<OperatorOutput, StrError> {
        let values = self.mesh.nodal_values(state, fixed_dofs)?;
        let mut matrix = if compute_matrix {
            Some(self.mesh.alloc_matrix()?)
        } else {
            None
        };
        let mut rhs = Vector::new(self.mesh.ndof());
        for e in 0..self.mesh.nelem() {
            let h = self.mesh.element_length(e);
            let d = self.kappa / h;
            let c = self.element_velocity(e, &values, mesh_velocity) / 2.0;
            let ke = [[d - c, -d + c], [-d - c, d + c]];
            self.mesh.add_element(e, &ke, &values, &mut matrix, &mut rhs)?;
            for r in 0..2 {
                if let Some(i) = self.mesh.dof(e + r) {
                    rhs[i] += self.source * h / 2.0;
                }
            }
        }
        Ok(OperatorOutput { matrix, rhs })
    }
}

impl StiffnessOperator for ConvectionDiffusion1d {
    fn num_dofs(&self) -> usize {
        self.mesh.ndof()
    }

    fn assemble(&mut self, state: &Vector, fixed_dofs: &FixedDofs, compute_matrix: bool) -> Result<OperatorOutput, StrError> {
        self.assemble_with(state, fixed_dofs, None, compute_matrix)
    }

    fn assemble_tangent(&mut self, state: &Vector, fixed_dofs: &FixedDofs) -> Result<Option<CooMatrix>, StrError> {
        if !self.burgers {
            return Ok(None);
        }
        // K(u) plus the derivative of the element average: (u_b - u_a)/4 [[1, 1], [1, 1]]
        let values = self.mesh.nodal_values(state, fixed_dofs)?;
        let mut tangent = Some(self.mesh.alloc_matrix()?);
        let mut unused = Vector::new(self.mesh.ndof());
        for e in 0..self.mesh.nelem() {
            let h = self.mesh.element_length(e);
            let d = self.kappa / h;
            let c = self.element_velocity(e, &values, None) / 2.0;
            let g = (values[e + 1] - values[e]) / 4.0;
            let te = [[d - c + g, -d + c + g], [-d - c + g, d + c + g]];
            self.mesh.add_element(e, &te, &values, &mut tangent, &mut unused)?;
        }
        Ok(tangent)
    }

    fn assemble_ale(
        &mut self,
        state: &Vector,
        fixed_dofs: &FixedDofs,
        ale: &AleVelocity,
        compute_matrix: bool,
    ) -> Result<OperatorOutput, StrError> {
        if ale.values.dim() != self.mesh.npoint() {
            return Err("the mesh velocity must have one value per node");
        }
        self.assemble_with(state, fixed_dofs, Some(ale.values.as_data()), compute_matrix)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
