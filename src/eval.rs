//! Evaluator contracts consumed by iterative fitting drivers.
//!
//! A fitting driver samples an evaluator at chosen parameters, assembles a
//! linear system from the samples, solves it for spline coefficients and
//! then asks the evaluator whether the resulting approximation is
//! acceptable, refining and repeating until it is. These traits are the
//! whole of what such a driver needs to know about the geometry being
//! approximated.

use crate::Point;

/// A curve-shaped source of positions and derivatives, with an opinion on
/// approximation quality.
pub trait EvalCurve {
    /// Evaluate the position at parameter `t`.
    fn eval(&self, t: f64) -> Point;

    /// Evaluate the position and derivatives up to `order` at parameter
    /// `t`.
    ///
    /// The first entry of the result is the position, the second the first
    /// derivative, and so on; the result has length `order + 1`.
    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Point>;

    /// Start parameter of the domain.
    fn start(&self) -> f64;

    /// End parameter of the domain.
    fn end(&self) -> f64;

    /// Dimension of the space the evaluated positions live in.
    fn dim(&self) -> usize;

    /// Is `approx` an acceptable approximation of this curve at parameter
    /// `t`?
    ///
    /// `tol1` bounds the spatial deviation directly. `tol2` is a secondary,
    /// evaluator-specific tolerance, typically consulted only when the
    /// spatial check is borderline; evaluators that have no secondary
    /// criterion ignore it.
    fn approximation_ok(&self, t: f64, approx: &Point, tol1: f64, tol2: f64) -> bool;
}

/// A fixed-size ordered family of curves evaluated together.
///
/// Some constructions yield several logically distinct positions per
/// parameter (for example a projection produces a parameter-domain point, a
/// space point and a cross tangent point). The set evaluator returns them
/// as one ordered sequence; [`num_curves`] is declared so callers can size
/// their buffers without knowing the concrete evaluator.
///
/// [`num_curves`]: EvalCurveSet::num_curves
pub trait EvalCurveSet {
    /// Evaluate all positions at parameter `t`; the result has length
    /// [`num_curves`](EvalCurveSet::num_curves).
    fn eval(&self, t: f64) -> Vec<Point>;

    /// Evaluate positions and derivatives up to `order` at parameter `t`.
    ///
    /// One entry per curve, each of length `order + 1` with the position
    /// first.
    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Vec<Point>>;

    /// Start parameter of the common domain.
    fn start(&self) -> f64;

    /// End parameter of the common domain.
    fn end(&self) -> f64;

    /// Dimension of the space the primary curve of the set lives in.
    fn dim(&self) -> usize;

    /// The number of curves in the set.
    fn num_curves(&self) -> usize;

    /// Are the positions in `approx` an acceptable approximation of the
    /// set at parameter `t`? Tolerances as in
    /// [`EvalCurve::approximation_ok`].
    fn approximation_ok(&self, t: f64, approx: &[Point], tol1: f64, tol2: f64) -> bool;
}
