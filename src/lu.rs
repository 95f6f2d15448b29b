// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dense LU decomposition with scaled partial pivoting.
//!
//! The decomposition runs in place over anything that looks like a square
//! matrix, leaving the multipliers of the unit lower triangle below the
//! diagonal and the eliminated upper triangle on and above it. Row order is
//! reported through a permutation, and the swap parity gives the sign of the
//! determinant. Only exactly zero pivots are rejected; near-singular systems
//! are decomposed as-is and left to the caller's judgement.

use std::ops::{Index, IndexMut};

use thiserror::Error;

use crate::Point;

/// Failure of [`lu_decompose`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DecomposeError {
    /// A row was identically zero before elimination started.
    #[error("row {row} of the matrix is identically zero")]
    NullRow {
        /// Index of the offending row.
        row: usize,
    },
    /// The pivot selected for a column was exactly zero.
    #[error("exactly zero pivot in column {col}; the matrix is singular")]
    SingularPivot {
        /// Index of the column whose pivot vanished.
        col: usize,
    },
}

/// Evenness of the number of row swaps performed during decomposition.
///
/// Determines the sign of the determinant relative to the unpermuted matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    /// An even number of row swaps.
    Even,
    /// An odd number of row swaps.
    Odd,
}

impl Parity {
    /// The determinant sign contributed by the row swaps: +1 or -1.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Parity::Even => 1.0,
            Parity::Odd => -1.0,
        }
    }

    #[inline]
    fn flip(&mut self) {
        *self = match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        };
    }
}

/// The row bookkeeping produced by [`lu_decompose`].
#[derive(Clone, Debug)]
pub struct Pivoting {
    /// `perm[i]` is the original index of the row now in position `i`.
    pub perm: Vec<usize>,
    /// Parity of the row swaps performed.
    pub parity: Parity,
}

/// A square matrix viewed as a mutable, row/column indexed table.
///
/// The decomposition and substitution routines are generic over this view,
/// so callers can run them over their own storage. [`DenseMatrix`] is the
/// obvious implementation.
pub trait SquareMatrix {
    /// Number of rows (equals the number of columns).
    fn size(&self) -> usize;

    /// The entry at `(row, col)`.
    fn at(&self, row: usize, col: usize) -> f64;

    /// Mutable access to the entry at `(row, col)`.
    fn at_mut(&mut self, row: usize, col: usize) -> &mut f64;

    /// Physically exchange two rows.
    fn swap_rows(&mut self, a: usize, b: usize) {
        for j in 0..self.size() {
            let tmp = self.at(a, j);
            *self.at_mut(a, j) = self.at(b, j);
            *self.at_mut(b, j) = tmp;
        }
    }
}

/// A square matrix in a contiguous row-major buffer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenseMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// An `n` by `n` matrix of zeros.
    pub fn zeros(n: usize) -> DenseMatrix {
        DenseMatrix {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// The `n` by `n` identity matrix.
    pub fn identity(n: usize) -> DenseMatrix {
        let mut m = DenseMatrix::zeros(n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Build a matrix from its rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not form a square matrix.
    pub fn from_rows(rows: &[&[f64]]) -> DenseMatrix {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for row in rows {
            assert_eq!(row.len(), n, "matrix is not square");
            data.extend_from_slice(row);
        }
        DenseMatrix { n, data }
    }

    /// Build an `n` by `n` matrix by evaluating `f(row, col)` per entry.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> DenseMatrix {
        let mut m = DenseMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                m[(i, j)] = f(i, j);
            }
        }
        m
    }

    /// Matrix-vector product `A * x`.
    ///
    /// # Panics
    ///
    /// Panics if `x.len()` differs from the matrix size.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.n, "vector length mismatch");
        self.data
            .chunks_exact(self.n.max(1))
            .take(self.n)
            .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.n + col]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.n + col]
    }
}

impl SquareMatrix for DenseMatrix {
    #[inline]
    fn size(&self) -> usize {
        self.n
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    #[inline]
    fn at_mut(&mut self, row: usize, col: usize) -> &mut f64 {
        &mut self.data[row * self.n + col]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let n = self.n;
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.data.split_at_mut(hi * n);
        head[lo * n..lo * n + n].swap_with_slice(&mut tail[..n]);
    }
}

/// Decompose a square matrix in place into `L * U`, Crout style, with
/// scaled partial pivoting.
///
/// Each row is scaled by the reciprocal of its largest-magnitude entry
/// before pivot candidates are compared, so pivot choice does not depend on
/// the absolute magnitude of a row. At every column the candidate rows are
/// eliminated first and the row with the largest scaled entry wins, earliest
/// row on ties. Winning rows are physically swapped into place and the swap
/// parity is toggled.
///
/// On success the strict lower triangle holds the elimination multipliers
/// (the unit diagonal of `L` is implicit) and the upper triangle, diagonal
/// included, holds `U`. The returned [`Pivoting`] records the row order that
/// was actually used.
///
/// Fails with [`DecomposeError::NullRow`] if a row is identically zero, and
/// with [`DecomposeError::SingularPivot`] if a selected pivot is exactly
/// zero. No near-singularity tolerance is applied.
pub fn lu_decompose<M: SquareMatrix>(mat: &mut M) -> Result<Pivoting, DecomposeError> {
    let n = mat.size();
    let mut perm: Vec<usize> = (0..n).collect();
    let mut parity = Parity::Even;

    // Scaling factor of each row: reciprocal of its largest entry.
    let mut scaling = vec![0.0; n];
    for i in 0..n {
        let mut max = 0.0f64;
        for j in 0..n {
            max = max.max(mat.at(i, j).abs());
        }
        if max == 0.0 {
            return Err(DecomposeError::NullRow { row: i });
        }
        scaling[i] = max.recip();
    }

    for j in 0..n {
        // Upper-triangle entries of this column.
        for i in 0..j {
            let mut sum = mat.at(i, j);
            for k in 0..i {
                sum -= mat.at(i, k) * mat.at(k, j);
            }
            *mat.at_mut(i, j) = sum;
        }

        // Eliminate the rest of the column, tracking the best scaled pivot.
        let mut pivot_val = 0.0;
        let mut pivot_row = j;
        for i in j..n {
            let mut sum = mat.at(i, j);
            for k in 0..j {
                sum -= mat.at(i, k) * mat.at(k, j);
            }
            *mat.at_mut(i, j) = sum;
            let scaled = (sum * scaling[i]).abs();
            if scaled > pivot_val {
                pivot_val = scaled;
                pivot_row = i;
            }
        }

        if mat.at(pivot_row, j) == 0.0 {
            return Err(DecomposeError::SingularPivot { col: j });
        }

        if pivot_row != j {
            mat.swap_rows(pivot_row, j);
            parity.flip();
            scaling.swap(j, pivot_row);
            perm.swap(j, pivot_row);
        }

        if j + 1 < n {
            let inv_pivot = mat.at(j, j).recip();
            for i in (j + 1)..n {
                *mat.at_mut(i, j) *= inv_pivot;
            }
        }
    }

    Ok(Pivoting { perm, parity })
}

/// Solve the unit lower triangular system left implicit by the
/// decomposition, overwriting `x`.
pub fn forward_substitution<M: SquareMatrix + ?Sized>(mat: &M, x: &mut [f64]) {
    assert_eq!(x.len(), mat.size(), "vector length mismatch");
    for i in 1..x.len() {
        for j in 0..i {
            x[i] -= mat.at(i, j) * x[j];
        }
    }
}

/// Solve the upper triangular system of the decomposition, diagonal
/// included, overwriting `x`.
pub fn backward_substitution<M: SquareMatrix + ?Sized>(mat: &M, x: &mut [f64]) {
    let n = x.len();
    assert_eq!(n, mat.size(), "vector length mismatch");
    x[n - 1] /= mat.at(n - 1, n - 1);
    for i in (0..n - 1).rev() {
        for j in (i + 1)..n {
            x[i] -= mat.at(i, j) * x[j];
        }
        x[i] /= mat.at(i, i);
    }
}

/// Complete a solve against an already decomposed matrix.
///
/// Gathers the right-hand side through the row permutation, then runs
/// forward and backward substitution. `rhs` is overwritten with the
/// solution.
pub fn lu_substitute<M: SquareMatrix + ?Sized>(mat: &M, pivoting: &Pivoting, rhs: &mut [f64]) {
    assert_eq!(rhs.len(), mat.size(), "vector length mismatch");
    let old = rhs.to_vec();
    for (x, &p) in rhs.iter_mut().zip(&pivoting.perm) {
        *x = old[p];
    }
    forward_substitution(mat, rhs);
    backward_substitution(mat, rhs);
}

/// Solve `A * x = b`, decomposing `A` in place.
///
/// `rhs` is overwritten with the solution. The decomposition is left in the
/// matrix and returned bookkeeping so further right-hand sides can be solved
/// with [`lu_substitute`].
pub fn lu_solve<M: SquareMatrix>(mat: &mut M, rhs: &mut [f64]) -> Result<Pivoting, DecomposeError> {
    let pivoting = lu_decompose(mat)?;
    lu_substitute(mat, &pivoting, rhs);
    Ok(pivoting)
}

/// Forward substitution for point-valued right-hand sides.
///
/// Each spatial component of the points is an independent right-hand side
/// over the same decomposition, as when fitting curve coefficients per
/// dimension.
pub fn forward_substitution_multi<M: SquareMatrix + ?Sized>(mat: &M, x: &mut [Point]) {
    assert_eq!(x.len(), mat.size(), "vector length mismatch");
    for i in 1..mat.size() {
        let (head, tail) = x.split_at_mut(i);
        let xi = &mut tail[0];
        for (j, xj) in head.iter().enumerate() {
            *xi -= xj * mat.at(i, j);
        }
    }
}

/// Backward substitution for point-valued right-hand sides.
pub fn backward_substitution_multi<M: SquareMatrix + ?Sized>(mat: &M, x: &mut [Point]) {
    let n = x.len();
    assert_eq!(n, mat.size(), "vector length mismatch");
    x[n - 1] /= mat.at(n - 1, n - 1);
    for i in (0..n - 1).rev() {
        let (head, tail) = x.split_at_mut(i + 1);
        let xi = &mut head[i];
        for (j, xj) in tail.iter().enumerate() {
            *xi -= xj * mat.at(i, i + 1 + j);
        }
        *xi /= mat.at(i, i);
    }
}

/// [`lu_substitute`] for point-valued right-hand sides.
pub fn lu_substitute_multi<M: SquareMatrix + ?Sized>(
    mat: &M,
    pivoting: &Pivoting,
    rhs: &mut [Point],
) {
    assert_eq!(rhs.len(), mat.size(), "vector length mismatch");
    let old = rhs.to_vec();
    for (x, &p) in rhs.iter_mut().zip(&pivoting.perm) {
        *x = old[p].clone();
    }
    forward_substitution_multi(mat, rhs);
    backward_substitution_multi(mat, rhs);
}

/// Solve `A * X = B` for a point-valued right-hand side, decomposing `A` in
/// place.
pub fn lu_solve_multi<M: SquareMatrix>(
    mat: &mut M,
    rhs: &mut [Point],
) -> Result<Pivoting, DecomposeError> {
    let pivoting = lu_decompose(mat)?;
    lu_substitute_multi(mat, &pivoting, rhs);
    Ok(pivoting)
}
