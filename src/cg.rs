// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sparse conjugate gradient solver with relaxed incomplete LU
//! preconditioning.
//!
//! The solver owns an attached coefficient matrix in compressed sparse row
//! form and solves `A * x = b` for symmetric positive definite `A`. High
//! degree least squares fitting produces badly conditioned systems, for
//! which a relaxed incomplete LU (RILU) factorization can be built once and
//! applied every iteration; plain conjugate gradient remains available for
//! small or well conditioned systems where the factorization is not worth
//! its cost.
//!
//! Whether `A` really is symmetric positive definite is the caller's
//! responsibility; no check is performed.

use log::{debug, warn};
use thiserror::Error;

use crate::lu::{DenseMatrix, SquareMatrix};

/// A square sparse matrix in compressed sparse row form.
///
/// Three parallel sequences: the nonzero values, the column index of each
/// nonzero, and the position in both of the first nonzero of every row
/// (length `n + 1`, so row `k` occupies `row_starts[k]..row_starts[k + 1]`).
/// Column indices within a row need not be sorted.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsrMatrix {
    n: usize,
    values: Vec<f64>,
    col_indices: Vec<usize>,
    row_starts: Vec<usize>,
}

impl CsrMatrix {
    /// Assemble a matrix from raw compressed sparse row storage.
    ///
    /// # Panics
    ///
    /// Panics if the sequences are inconsistent: `row_starts` must have
    /// length `n + 1`, start at zero, end at the nonzero count and be
    /// non-decreasing, `values` and `col_indices` must have equal length,
    /// and every column index must be in range.
    pub fn new(
        n: usize,
        values: Vec<f64>,
        col_indices: Vec<usize>,
        row_starts: Vec<usize>,
    ) -> CsrMatrix {
        assert_eq!(row_starts.len(), n + 1, "row_starts must have length n + 1");
        assert_eq!(row_starts[0], 0, "row_starts must begin at zero");
        assert_eq!(
            *row_starts.last().unwrap(),
            values.len(),
            "row_starts must end at the nonzero count"
        );
        assert_eq!(
            values.len(),
            col_indices.len(),
            "values and col_indices must have equal length"
        );
        assert!(
            row_starts.windows(2).all(|w| w[0] <= w[1]),
            "row_starts must be non-decreasing"
        );
        assert!(
            col_indices.iter().all(|&c| c < n),
            "column index out of range"
        );
        CsrMatrix {
            n,
            values,
            col_indices,
            row_starts,
        }
    }

    /// Assemble a matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed; columns within a row end up sorted.
    ///
    /// # Panics
    ///
    /// Panics if a row or column index is out of range.
    pub fn from_triplets(n: usize, triplets: &[(usize, usize, f64)]) -> CsrMatrix {
        let mut row_counts = vec![0usize; n];
        for &(r, c, _) in triplets {
            assert!(r < n && c < n, "triplet index out of range");
            row_counts[r] += 1;
        }
        let mut row_starts = vec![0usize; n + 1];
        for i in 0..n {
            row_starts[i + 1] = row_starts[i] + row_counts[i];
        }

        let nnz = row_starts[n];
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![0.0f64; nnz];
        let mut cursor = row_starts[..n].to_vec();
        for &(r, c, v) in triplets {
            col_indices[cursor[r]] = c;
            values[cursor[r]] = v;
            cursor[r] += 1;
        }

        // Sort each row by column; rows are short, insertion sort is fine.
        for i in 0..n {
            let (start, end) = (row_starts[i], row_starts[i + 1]);
            for j in (start + 1)..end {
                let mut k = j;
                while k > start && col_indices[k - 1] > col_indices[k] {
                    col_indices.swap(k - 1, k);
                    values.swap(k - 1, k);
                    k -= 1;
                }
            }
        }

        // Merge duplicates.
        let mut out_values = Vec::with_capacity(nnz);
        let mut out_cols = Vec::with_capacity(nnz);
        let mut out_starts = vec![0usize; n + 1];
        for i in 0..n {
            let mut idx = row_starts[i];
            while idx < row_starts[i + 1] {
                let col = col_indices[idx];
                let mut sum = values[idx];
                idx += 1;
                while idx < row_starts[i + 1] && col_indices[idx] == col {
                    sum += values[idx];
                    idx += 1;
                }
                out_cols.push(col);
                out_values.push(sum);
            }
            out_starts[i + 1] = out_values.len();
        }

        CsrMatrix {
            n,
            values: out_values,
            col_indices: out_cols,
            row_starts: out_starts,
        }
    }

    /// Extract the nonzero entries of a dense square matrix.
    pub fn from_dense(matrix: &DenseMatrix) -> CsrMatrix {
        let n = matrix.size();
        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_starts = vec![0usize; n + 1];
        for i in 0..n {
            for j in 0..n {
                let v = matrix.at(i, j);
                if v != 0.0 {
                    values.push(v);
                    col_indices.push(j);
                }
            }
            row_starts[i + 1] = values.len();
        }
        CsrMatrix {
            n,
            values,
            col_indices,
            row_starts,
        }
    }

    /// Number of rows (equals the number of columns).
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Number of stored nonzero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// The stored value at `(row, col)`, or `None` outside the sparsity
    /// pattern.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (self.row_starts[row]..self.row_starts[row + 1])
            .find(|&idx| self.col_indices[idx] == col)
            .map(|idx| self.values[idx])
    }

    /// Matrix-vector product `y = A * x`.
    ///
    /// # Panics
    ///
    /// Panics if either vector length differs from the matrix size.
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n, "vector length mismatch");
        assert_eq!(y.len(), self.n, "vector length mismatch");
        for (i, yi) in y.iter_mut().enumerate() {
            let mut sum = 0.0;
            for idx in self.row_starts[i]..self.row_starts[i + 1] {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            *yi = sum;
        }
    }
}

/// Structural failure of the conjugate gradient solver.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CgError {
    /// No matrix has been attached to the solver.
    #[error("no matrix attached to the solver")]
    NoMatrix,
    /// A vector length disagreed with the attached system size.
    #[error("system size mismatch: matrix size is {expected}, vector length is {got}")]
    SizeMismatch {
        /// Size of the attached system.
        expected: usize,
        /// Offending vector length.
        got: usize,
    },
    /// An exactly zero (or missing) pivot was met during the RILU
    /// factorization.
    #[error("zero pivot in row {row} during RILU factorization")]
    ZeroPivot {
        /// Row whose pivot vanished.
        row: usize,
    },
}

/// How a conjugate gradient solve ended.
///
/// Non-convergence is not an error: the iterate reached when the limit was
/// hit is left in the solution vector, explicitly tagged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CgOutcome {
    /// The residual dropped below the tolerance.
    Converged {
        /// Number of iterations used.
        iterations: usize,
    },
    /// The iteration limit was exceeded; the solution vector holds the best
    /// effort iterate.
    IterationLimit {
        /// Euclidean norm of the final residual.
        residual: f64,
    },
}

impl CgOutcome {
    /// Did the solve converge?
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, CgOutcome::Converged { .. })
    }
}

// The incomplete factors over a row-sorted copy of the matrix pattern.
// L is unit lower (multipliers stored), U upper with its diagonal; the
// position of each row's diagonal entry is cached for the elimination
// sweeps. Derived from the attached matrix, so it is discarded whenever a
// new matrix is attached.
#[derive(Clone, Debug)]
struct Rilu {
    values: Vec<f64>,
    col_indices: Vec<usize>,
    row_starts: Vec<usize>,
    diagonal: Vec<usize>,
}

impl Rilu {
    fn build(matrix: &CsrMatrix, relaxfac: f64) -> Result<Rilu, CgError> {
        let n = matrix.n;
        let row_starts = matrix.row_starts.clone();

        // Row-sorted copy of the pattern.
        let mut entries: Vec<(usize, f64)> = Vec::new();
        let mut col_indices = Vec::with_capacity(matrix.nnz());
        let mut values = Vec::with_capacity(matrix.nnz());
        for i in 0..n {
            entries.clear();
            for idx in row_starts[i]..row_starts[i + 1] {
                entries.push((matrix.col_indices[idx], matrix.values[idx]));
            }
            entries.sort_by_key(|&(c, _)| c);
            for &(c, v) in &entries {
                col_indices.push(c);
                values.push(v);
            }
        }

        // Cache the diagonal positions; a structurally missing diagonal is
        // as fatal as a zero one.
        let mut diagonal = vec![0usize; n];
        for i in 0..n {
            let row = &col_indices[row_starts[i]..row_starts[i + 1]];
            match row.binary_search(&i) {
                Ok(pos) => diagonal[i] = row_starts[i] + pos,
                Err(_) => return Err(CgError::ZeroPivot { row: i }),
            }
        }

        // Incomplete factorization in the fixed pattern. Fill-in outside
        // the pattern is not stored; it is accumulated and subtracted from
        // the diagonal, scaled by the relaxation factor.
        for i in 0..n {
            let row_start = row_starts[i];
            let row_end = row_starts[i + 1];
            let mut dropped = 0.0;
            for idx in row_start..diagonal[i] {
                let k = col_indices[idx];
                let lik = values[idx] / values[diagonal[k]];
                values[idx] = lik;
                for kidx in (diagonal[k] + 1)..row_starts[k + 1] {
                    let j = col_indices[kidx];
                    let update = lik * values[kidx];
                    match col_indices[row_start..row_end].binary_search(&j) {
                        Ok(pos) => values[row_start + pos] -= update,
                        Err(_) => dropped += update,
                    }
                }
            }
            values[diagonal[i]] -= relaxfac * dropped;
            if values[diagonal[i]] == 0.0 {
                return Err(CgError::ZeroPivot { row: i });
            }
        }

        Ok(Rilu {
            values,
            col_indices,
            row_starts,
            diagonal,
        })
    }

    // Solve M * s = r by forward then backward elimination through the
    // stored factors.
    fn forward_backward(&self, r: &[f64], s: &mut [f64]) {
        let n = self.row_starts.len() - 1;
        for i in 0..n {
            let mut sum = r[i];
            for idx in self.row_starts[i]..self.diagonal[i] {
                sum -= self.values[idx] * s[self.col_indices[idx]];
            }
            s[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = s[i];
            for idx in (self.diagonal[i] + 1)..self.row_starts[i + 1] {
                sum -= self.values[idx] * s[self.col_indices[idx]];
            }
            s[i] = sum / self.values[self.diagonal[i]];
        }
    }
}

/// Conjugate gradient solver for symmetric positive definite sparse
/// systems.
///
/// A matrix is attached once and owned by the solver; solves can then be
/// run against any number of right-hand sides. Building the RILU
/// preconditioner is optional and must be redone after attaching a new
/// matrix.
#[derive(Clone, Debug)]
pub struct CgSolver {
    matrix: Option<CsrMatrix>,
    precond: Option<Rilu>,
    tolerance: f64,
    max_iterations: usize,
}

impl Default for CgSolver {
    fn default() -> CgSolver {
        CgSolver::new()
    }
}

impl CgSolver {
    /// A solver with no matrix attached, tolerance `1e-6` and an automatic
    /// iteration limit of twice the system size.
    pub fn new() -> CgSolver {
        CgSolver {
            matrix: None,
            precond: None,
            tolerance: 1e-6,
            max_iterations: 0,
        }
    }

    /// Attach the coefficient matrix, replacing any previous one.
    ///
    /// Any preconditioner built for the previous matrix is discarded.
    pub fn attach_matrix(&mut self, matrix: CsrMatrix) {
        self.precond = None;
        self.matrix = Some(matrix);
    }

    /// The currently attached matrix, if any.
    #[inline]
    pub fn matrix(&self) -> Option<&CsrMatrix> {
        self.matrix.as_ref()
    }

    /// Set the numerical tolerance deciding when a residual counts as zero.
    #[inline]
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Set the maximal number of iterations; zero restores the automatic
    /// limit of twice the system size.
    #[inline]
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    /// Is a preconditioner built for the attached matrix?
    #[inline]
    pub fn is_preconditioned(&self) -> bool {
        self.precond.is_some()
    }

    /// Build the RILU preconditioner for the attached matrix.
    ///
    /// `relaxfac` in `[0, 1]` blends between standard incomplete LU (`0`)
    /// and the fully relaxed variant (`1`), where all fill-in dropped
    /// outside the sparsity pattern is folded into the diagonal.
    ///
    /// # Panics
    ///
    /// Panics if `relaxfac` is outside `[0, 1]`.
    pub fn precond_rilu(&mut self, relaxfac: f64) -> Result<(), CgError> {
        assert!(
            (0.0..=1.0).contains(&relaxfac),
            "relaxation factor must lie in [0, 1]"
        );
        let matrix = self.matrix.as_ref().ok_or(CgError::NoMatrix)?;
        self.precond = Some(Rilu::build(matrix, relaxfac)?);
        Ok(())
    }

    /// Solve `A * x = b` by conjugate gradient, preconditioned if a
    /// factorization has been built.
    ///
    /// On entry `x` holds the initial guess; on return it holds the
    /// solution, or the best effort iterate when the iteration limit was
    /// exceeded. Convergence is reached when the residual norm drops below
    /// the tolerance relative to the norm of `b` (absolute, if `b` is
    /// zero).
    pub fn solve(&self, x: &mut [f64], b: &[f64]) -> Result<CgOutcome, CgError> {
        let a = self.matrix.as_ref().ok_or(CgError::NoMatrix)?;
        let n = a.size();
        if x.len() != n {
            return Err(CgError::SizeMismatch {
                expected: n,
                got: x.len(),
            });
        }
        if b.len() != n {
            return Err(CgError::SizeMismatch {
                expected: n,
                got: b.len(),
            });
        }
        let max_iterations = if self.max_iterations == 0 {
            2 * n.max(1)
        } else {
            self.max_iterations
        };

        let mut r = vec![0.0; n];
        a.mul_vec(x, &mut r);
        for i in 0..n {
            r[i] = b[i] - r[i];
        }

        let bnorm2 = dot(b, b);
        let threshold2 = if bnorm2 > 0.0 {
            self.tolerance * self.tolerance * bnorm2
        } else {
            self.tolerance * self.tolerance
        };

        let mut rr = dot(&r, &r);
        if rr <= threshold2 {
            debug!("cg: initial guess already within tolerance");
            return Ok(CgOutcome::Converged { iterations: 0 });
        }

        let mut z = vec![0.0; n];
        self.apply_precond(&r, &mut z);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);
        let mut q = vec![0.0; n];

        for iteration in 1..=max_iterations {
            a.mul_vec(&p, &mut q);
            let pq = dot(&p, &q);
            if pq <= 0.0 {
                // The search direction has lost positive curvature; the
                // matrix is not positive definite as promised.
                warn!("cg: non-positive curvature met, stopping early");
                return Ok(CgOutcome::IterationLimit {
                    residual: rr.sqrt(),
                });
            }
            let alpha = rz / pq;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * q[i];
            }
            rr = dot(&r, &r);
            if rr <= threshold2 {
                debug!(
                    "cg: converged after {} iterations, residual {:e}",
                    iteration,
                    rr.sqrt()
                );
                return Ok(CgOutcome::Converged {
                    iterations: iteration,
                });
            }
            self.apply_precond(&r, &mut z);
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        warn!(
            "cg: iteration limit {} exceeded, residual {:e}",
            max_iterations,
            rr.sqrt()
        );
        Ok(CgOutcome::IterationLimit {
            residual: rr.sqrt(),
        })
    }

    fn apply_precond(&self, r: &[f64], z: &mut [f64]) {
        match &self.precond {
            Some(m) => m.forward_backward(r, z),
            None => z.copy_from_slice(r),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
