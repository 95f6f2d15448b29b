// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Numerical kernels for parametric curve fitting and projection.
//!
//! This crate contains the numerical core that iterative curve fitting
//! algorithms are built from: dense and sparse linear equation solvers for
//! computing spline coefficients, and a polymorphic curve evaluation and
//! closest point search framework that produces the fitting data those
//! solvers consume. A fitting driver samples an [evaluator](EvalCurve) at
//! chosen parameters, assembles a linear system, solves it with the
//! [dense](lu_solve) or [sparse](CgSolver) solver, and asks the evaluator's
//! tolerance predicate whether the approximation is acceptable, refining
//! until it is.
//!
//! # Examples
//!
//! Solving a small dense system:
//! ```
//! use curvefit::{lu_solve, DenseMatrix};
//!
//! let mut a = DenseMatrix::from_rows(&[&[4.0, 1.0], &[2.0, 3.0]]);
//! let mut b = [9.0, 13.0];
//! lu_solve(&mut a, &mut b).unwrap();
//! assert!((b[0] - 1.4).abs() < 1e-12);
//! assert!((b[1] - 3.4).abs() < 1e-12);
//! ```
//!
//! Finding the closest point on a curve:
//! ```
//! use curvefit::{closest_point, Line, Point};
//!
//! let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[10.0, 0.0]));
//! let hit = closest_point(&line, &Point::new(&[5.0, 3.0]), 0.0, 1.0, None);
//! assert!(hit.converged);
//! assert!((hit.t - 0.5).abs() < 1e-9);
//! assert!((hit.distance - 3.0).abs() < 1e-9);
//! ```
//!
//! Curve and surface representations are deliberately open: the search and
//! evaluator machinery consumes anything implementing [`ParamCurve`] and
//! [`ParamSurface`], so a host geometry kernel plugs in its own types.

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::trivially_copy_pass_by_ref)]
#![warn(clippy::doc_markdown, rustdoc::broken_intra_doc_links)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(unused_qualifications)]
#![allow(clippy::many_single_char_names, clippy::excessive_precision)]

mod cg;
mod closest;
mod curve;
mod eval;
mod lu;
mod offset;
mod point;
mod project;
mod surface;

pub use crate::cg::*;
pub use crate::closest::*;
pub use crate::curve::*;
pub use crate::eval::*;
pub use crate::lu::*;
pub use crate::offset::*;
pub use crate::point::*;
pub use crate::project::*;
pub use crate::surface::*;
