use crate::types::DcaError;
use faer::linalg::solvers::ColPivQr;
use faer::{Mat, MatRef};
use ndarray::{Array2, ArrayBase, Data, Ix2};

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

enum FaerStorage<'a> {
    Borrowed(MatRef<'a, f64>),
    Owned(Mat<f64>),
}

impl<'a> FaerStorage<'a> {
    #[inline]
    fn as_ref(&self) -> MatRef<'_, f64> {
        match self {
            FaerStorage::Borrowed(view) => *view,
            FaerStorage::Owned(mat) => mat.as_ref(),
        }
    }
}

/// Borrows an ndarray matrix as a faer view, copying only when the memory
/// layout is neither row- nor column-major contiguous.
pub struct FaerArrayView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let storage = match array.as_slice_memory_order() {
            Some(slice) if array.is_standard_layout() => FaerStorage::Borrowed(
                MatRef::from_row_major_slice(slice, array.nrows(), array.ncols()),
            ),
            Some(slice) if array.t().is_standard_layout() => FaerStorage::Borrowed(
                MatRef::from_column_major_slice(slice, array.nrows(), array.ncols()),
            ),
            _ => {
                let (rows, cols) = array.dim();
                FaerStorage::Owned(Mat::from_fn(rows, cols, |i, j| array[(i, j)]))
            }
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        self.storage.as_ref()
    }
}

/// Orthonormal basis for the column span of an m × k matrix (m ≥ k).
///
/// Uses the thin Q factor of a column-pivoted QR. Pivoting permutes the
/// columns of Q but not its span, which is all deflation needs.
pub fn orthonormal_columns<S: Data<Elem = f64>>(
    matrix: &ArrayBase<S, Ix2>,
) -> Result<Array2<f64>, DcaError> {
    let (rows, cols) = matrix.dim();
    if cols > rows {
        return Err(DcaError::ShapeMismatch {
            context: "orthonormal_columns",
            expected: (rows, rows),
            found: (rows, cols),
        });
    }
    if cols == 0 {
        return Ok(Array2::zeros((rows, 0)));
    }
    let view = FaerArrayView::new(matrix);
    let qr = ColPivQr::new(view.as_ref());
    let q = mat_to_array(qr.compute_thin_Q().as_ref());
    if q.iter().any(|v| !v.is_finite()) {
        return Err(DcaError::Linalg(
            "QR factorization produced non-finite entries".to_string(),
        ));
    }
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn thin_q_is_orthonormal_and_spans_input() {
        let u = array![[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [0.0, 1.0]];
        let q = orthonormal_columns(&u).unwrap();
        assert_eq!(q.dim(), (4, 2));
        let gram = q.t().dot(&q);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-12);
            }
        }
        // Projecting the input onto span(Q) leaves it unchanged.
        let reprojected = q.dot(&q.t().dot(&u));
        for (a, b) in reprojected.iter().zip(u.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn transposed_views_are_read_correctly() {
        let base = array![[2.0, 0.0, 0.0], [0.0, 3.0, 0.0]];
        let t = base.t();
        let view = FaerArrayView::new(&t);
        let m = view.as_ref();
        assert_eq!((m.nrows(), m.ncols()), (3, 2));
        assert_eq!(m[(1, 1)], 3.0);
        assert_eq!(m[(0, 0)], 2.0);
        assert_eq!(m[(2, 1)], 0.0);
    }

    #[test]
    fn wide_input_is_rejected() {
        let wide = Array2::<f64>::zeros((2, 3));
        assert!(orthonormal_columns(&wide).is_err());
    }
}
