use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{CooMatrix, Sym};

/// Returns the number of rows, number of columns and number of non-zero values
pub fn coo_dims(a: &CooMatrix) -> (usize, usize, usize) {
    let (nrow, ncol, nnz, _) = a.get_info();
    (nrow, ncol, nnz)
}

/// Checks that a matrix is square with the given dimension and stored in full format
pub fn coo_check(a: &CooMatrix, ndof: usize) -> Result<(), StrError> {
    let (nrow, ncol, _, sym) = a.get_info();
    if nrow != ndof || ncol != ndof {
        return Err("the operator matrix must be square with dimension equal to the number of DOFs");
    }
    if sym.triangular() {
        return Err("the operator matrix must not use triangular storage");
    }
    Ok(())
}

/// Allocates a (square, non-symmetric) COO matrix to hold the sum of the given matrices
///
/// The maximum number of non-zero values is the sum of the numbers of non-zero values
/// of all terms because duplicate entries are summed by the linear solvers.
pub fn coo_alloc_sum(ndof: usize, terms: &[&CooMatrix]) -> Result<CooMatrix, StrError> {
    let max_nnz = terms.iter().fold(0, |acc, a| acc + coo_dims(a).2);
    CooMatrix::new(ndof, ndof, usize::max(max_nnz, 1), Sym::No)
}

/// Adds the scaled entries of a matrix into another one: `dest += α·src`
pub fn coo_add_scaled(dest: &mut CooMatrix, alpha: f64, src: &CooMatrix) -> Result<(), StrError> {
    let (_, _, nnz, sym) = src.get_info();
    if sym.triangular() {
        return Err("the operator matrix must not use triangular storage");
    }
    let rows = src.get_row_indices();
    let cols = src.get_col_indices();
    let values = src.get_values();
    for p in 0..nnz {
        dest.put(rows[p] as usize, cols[p] as usize, alpha * values[p])?;
    }
    Ok(())
}

/// Performs the matrix-vector multiplication `v = α·a·u`
pub fn coo_mat_vec(v: &mut Vector, alpha: f64, a: &CooMatrix, u: &Vector) -> Result<(), StrError> {
    a.mat_vec_mul(v, alpha, u)
}

/// Returns the (i, j, aᵢⱼ) entries in storage order
pub fn coo_entries(a: &CooMatrix) -> Vec<(usize, usize, f64)> {
    let (_, _, nnz, _) = a.get_info();
    let rows = a.get_row_indices();
    let cols = a.get_col_indices();
    let values = a.get_values();
    (0..nnz)
        .map(|p| (rows[p] as usize, cols[p] as usize, values[p]))
        .collect()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{coo_add_scaled, coo_alloc_sum, coo_check, coo_dims, coo_entries, coo_mat_vec};
    use russell_lab::Vector;
    use russell_sparse::{CooMatrix, Sym};

    #[test]
    fn coo_check_captures_errors() {
        let a = CooMatrix::new(2, 3, 4, Sym::No).unwrap();
        assert_eq!(
            coo_check(&a, 2).err(),
            Some("the operator matrix must be square with dimension equal to the number of DOFs")
        );
        let a = CooMatrix::new(2, 2, 4, Sym::YesLower).unwrap();
        assert_eq!(
            coo_check(&a, 2).err(),
            Some("the operator matrix must not use triangular storage")
        );
        let a = CooMatrix::new(2, 2, 4, Sym::No).unwrap();
        assert_eq!(coo_check(&a, 2), Ok(()));
    }

    #[test]
    fn sum_and_mat_vec_work() {
        // ┌     ┐      ┌     ┐
        // │ 2 1 │      │ 1 0 │
        // │ 1 2 │  and │ 0 3 │
        // └     ┘      └     ┘
        let mut a = CooMatrix::new(2, 2, 4, Sym::No).unwrap();
        a.put(0, 0, 2.0).unwrap();
        a.put(0, 1, 1.0).unwrap();
        a.put(1, 0, 1.0).unwrap();
        a.put(1, 1, 2.0).unwrap();
        let mut b = CooMatrix::new(2, 2, 2, Sym::No).unwrap();
        b.put(0, 0, 1.0).unwrap();
        b.put(1, 1, 3.0).unwrap();

        // c = 0.5 a + 2 b
        let mut c = coo_alloc_sum(2, &[&a, &b]).unwrap();
        coo_add_scaled(&mut c, 0.5, &a).unwrap();
        coo_add_scaled(&mut c, 2.0, &b).unwrap();
        assert_eq!(coo_dims(&c), (2, 2, 6));
        assert_eq!(
            coo_entries(&c),
            vec![
                (0, 0, 1.0),
                (0, 1, 0.5),
                (1, 0, 0.5),
                (1, 1, 1.0),
                (0, 0, 2.0),
                (1, 1, 6.0)
            ]
        );

        // v = c u
        let u = Vector::from(&[1.0, -1.0]);
        let mut v = Vector::new(2);
        coo_mat_vec(&mut v, 1.0, &c, &u).unwrap();
        assert_eq!(v.as_data(), &[2.5, -6.5]);
    }
}
