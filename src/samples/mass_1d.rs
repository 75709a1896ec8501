use super::Mesh1d;
use crate::base::FixedDofs;
use crate::fem::{MassOperator, OperatorOutput};
use crate::StrError;
use russell_lab::Vector;

/// Implements the mass operator of linear elements in one dimension
///
/// ```text
///      ρ h ┌     ┐                  ρ h ┌     ┐
/// Mₑ = ─── │ 2 1 │  (consistent)  or ─── │ 1 0 │  (lumped)
///       6  │ 1 2 │                   2  │ 0 1 │
///          └     ┘                      └     ┘
/// ```
///
/// The right-hand side is `b_M = -M_fd·g` where `g` holds the prescribed boundary values.
pub struct Mass1d {
    mesh: Mesh1d,
    rho: f64,
    lumped: bool,
    moving: bool,
}

impl Mass1d {
    /// Allocates a new instance
    pub fn new(mesh: &Mesh1d, rho: f64, lumped: bool) -> Self {
        Mass1d {
            mesh: mesh.clone(),
            rho,
            lumped,
            moving: false,
        }
    }

    /// Marks the mesh as moving; then the matrix is reassembled at every step
    pub fn set_moving(&mut self, moving: bool) -> &mut Self {
        self.moving = moving;
        self
    }

    /// Returns an access to the mesh (e.g., to move the nodes)
    pub fn mesh_mut(&mut self) -> &mut Mesh1d {
        &mut self.mesh
    }
}

impl MassOperator for Mass1d {
    fn num_dofs(&self) -> usize {
        self.mesh.ndof()
    }

    fn assemble(&mut self, state: &Vector, fixed_dofs: &FixedDofs, compute_matrix: bool) -> Result<OperatorOutput, StrError> {
        let values = self.mesh.nodal_values(state, fixed_dofs)?;
        let mut matrix = if compute_matrix {
            Some(self.mesh.alloc_matrix()?)
        } else {
            None
        };
        let mut rhs = Vector::new(self.mesh.ndof());
        for e in 0..self.mesh.nelem() {
            let m = self.rho * self.mesh.element_length(e);
            let me = if self.lumped {
                [[m / 2.0, 0.0], [0.0, m / 2.0]]
            } else {
                [[m / 3.0, m / 6.0], [m / 6.0, m / 3.0]]
            };
            self.mesh.add_element(e, &me, &values, &mut matrix, &mut rhs)?;
        }
        Ok(OperatorOutput { matrix, rhs })
    }

    fn moving_mesh(&self) -> bool {
        self.moving
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
