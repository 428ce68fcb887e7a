//! Dense LU factorization with partial pivoting for the Newton correction.

use crate::error::{Result, TubesimError};

/// Pivots smaller than this are treated as zero.
const PIVOT_EPSILON: f64 = 1e-15;

/// Row-major LU factors of an `n × n` matrix, reused across samples.
#[derive(Debug, Clone)]
pub struct DenseLu {
    size: usize,
    lu: Vec<f64>,
    pivots: Vec<usize>,
}

impl DenseLu {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            lu: vec![0.0; size * size],
            pivots: (0..size).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Factor the row-major matrix `a`.
    pub fn factor(&mut self, a: &[f64]) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(a);
        for (i, p) in self.pivots.iter_mut().enumerate() {
            *p = i;
        }

        for k in 0..n {
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            // Also catches NaN pivots.
            if !(max_val >= PIVOT_EPSILON) {
                return Err(TubesimError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }
        Ok(())
    }

    /// Solve `A x = b` with the factors from the last [`factor`](Self::factor).
    pub fn solve(&self, b: &[f64], x: &mut [f64]) {
        let n = self.size;

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            x[i] = b[self.pivots[i]];
            for j in 0..i {
                x[i] -= self.lu[i * n + j] * x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i * n + j] * x[j];
            }
            x[i] /= self.lu[i * n + i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_with_pivoting() {
        // First pivot is zero, forcing a row swap.
        let a = [0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0];
        let b = [5.0, 3.0, 6.0];
        let mut lu = DenseLu::new(3);
        lu.factor(&a).unwrap();
        let mut x = [0.0; 3];
        lu.solve(&b, &mut x);

        for i in 0..3 {
            let row: f64 = (0..3).map(|j| a[i * 3 + j] * x[j]).sum();
            assert_relative_eq!(row, b[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_matrix() {
        let mut lu = DenseLu::new(2);
        let err = lu.factor(&[1.0, 2.0, 2.0, 4.0]).unwrap_err();
        assert!(matches!(err, TubesimError::SingularMatrix));
        assert!(lu.factor(&[f64::NAN, 0.0, 0.0, 1.0]).is_err());
    }
}
