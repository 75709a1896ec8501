use crate::base::{coo_add_scaled, coo_alloc_sum, coo_check, coo_mat_vec};
use crate::StrError;
use russell_lab::{vec_update, Vector};
use russell_sparse::CooMatrix;

/// Holds the combined linear system `A·x = b` of one step (or one Newton iteration)
///
/// The matrix is always rebuilt from the mass and stiffness outputs; only the
/// right-hand side may be rebuilt alone, in which case the previous matrix is kept.
#[derive(Clone)]
pub struct SystemOperator {
    /// Combined matrix
    pub(crate) matrix: Option<CooMatrix>,

    /// Combined right-hand side
    pub(crate) rhs: Vector,
}

impl SystemOperator {
    /// Allocates an empty system with `ndof` equations
    pub fn new(ndof: usize) -> Self {
        SystemOperator {
            matrix: None,
            rhs: Vector::new(ndof),
        }
    }

    /// Returns the number of equations
    pub fn ndof(&self) -> usize {
        self.rhs.dim()
    }

    /// Returns the combined matrix, if assembled
    pub fn matrix(&self) -> Option<&CooMatrix> {
        self.matrix.as_ref()
    }

    /// Returns the combined right-hand side
    pub fn rhs(&self) -> &Vector {
        &self.rhs
    }
}

/// Combines the mass and stiffness matrices: `A = α_M·M + α_K·K`
pub(crate) fn combine_matrices(
    ndof: usize,
    mass: &CooMatrix,
    alpha_m: f64,
    stiffness: &CooMatrix,
    alpha_k: f64,
) -> Result<CooMatrix, StrError> {
    coo_check(mass, ndof)?;
    coo_check(stiffness, ndof)?;
    let mut aa = coo_alloc_sum(ndof, &[mass, stiffness])?;
    coo_add_scaled(&mut aa, alpha_m, mass)?;
    if alpha_k != 0.0 {
        coo_add_scaled(&mut aa, alpha_k, stiffness)?;
    }
    Ok(aa)
}

/// Computes `v += α·a·u`
pub(crate) fn add_mat_vec(v: &mut Vector, alpha: f64, a: &CooMatrix, u: &Vector) -> Result<(), StrError> {
    if alpha == 0.0 {
        return Ok(());
    }
    let mut w = Vector::new(v.dim());
    coo_mat_vec(&mut w, alpha, a, u)?;
    vec_update(v, 1.0, &w)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{add_mat_vec, combine_matrices, SystemOperator};
    use crate::base::coo_entries;
    use russell_lab::Vector;
    use russell_sparse::{CooMatrix, Sym};

    #[test]
    fn new_works() {
        let system = SystemOperator::new(3);
        assert_eq!(system.ndof(), 3);
        assert!(system.matrix().is_none());
        assert_eq!(system.rhs().as_data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn combine_matrices_works() {
        let mut mm = CooMatrix::new(2, 2, 2, Sym::No).unwrap();
        mm.put(0, 0, 2.0).unwrap();
        mm.put(1, 1, 2.0).unwrap();
        let mut kk = CooMatrix::new(2, 2, 4, Sym::No).unwrap();
        kk.put(0, 0, 1.0).unwrap();
        kk.put(0, 1, -1.0).unwrap();
        kk.put(1, 0, -1.0).unwrap();
        kk.put(1, 1, 1.0).unwrap();
        let aa = combine_matrices(2, &mm, 10.0, &kk, 0.5).unwrap();
        assert_eq!(
            coo_entries(&aa),
            vec![
                (0, 0, 20.0),
                (1, 1, 20.0),
                (0, 0, 0.5),
                (0, 1, -0.5),
                (1, 0, -0.5),
                (1, 1, 0.5)
            ]
        );

        // θ = 0 keeps only the mass entries
        let aa = combine_matrices(2, &mm, 10.0, &kk, 0.0).unwrap();
        assert_eq!(coo_entries(&aa), vec![(0, 0, 20.0), (1, 1, 20.0)]);

        // wrong dimension
        assert_eq!(
            combine_matrices(3, &mm, 1.0, &kk, 1.0).err(),
            Some("the operator matrix must be square with dimension equal to the number of DOFs")
        );
    }

    #[test]
    fn add_mat_vec_works() {
        let mut kk = CooMatrix::new(2, 2, 3, Sym::No).unwrap();
        kk.put(0, 0, 1.0).unwrap();
        kk.put(0, 1, 2.0).unwrap();
        kk.put(1, 1, 3.0).unwrap();
        let u = Vector::from(&[1.0, 1.0]);
        let mut v = Vector::from(&[10.0, 20.0]);
        add_mat_vec(&mut v, 2.0, &kk, &u).unwrap();
        assert_eq!(v.as_data(), &[16.0, 26.0]);
        add_mat_vec(&mut v, 0.0, &kk, &u).unwrap();
        assert_eq!(v.as_data(), &[16.0, 26.0]);
    }
}
