// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parametric curves: the collaborator interface and two basic
//! implementations.

use crate::closest::{closest_point, ClosestPoint};
use crate::Point;

/// A curve parametrized by a scalar over a bounded interval.
///
/// This is the narrow interface through which the search and evaluator
/// machinery consumes a host representation; any curve that can report its
/// domain and evaluate positions and derivatives qualifies.
pub trait ParamCurve {
    /// Dimension of the space the curve lives in.
    fn dim(&self) -> usize;

    /// Start parameter of the curve.
    fn start_param(&self) -> f64;

    /// End parameter of the curve.
    fn end_param(&self) -> f64;

    /// Evaluate the position at parameter `t`.
    fn eval(&self, t: f64) -> Point;

    /// Evaluate the position and derivatives up to `order` at parameter
    /// `t`; the result has length `order + 1` with the position first.
    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Point>;

    /// Compute the closest point on an interval of this curve to `target`.
    ///
    /// An optional `seed` parameter starts the iteration; without one, a
    /// coarse sampling pass over the interval selects a starting parameter.
    fn closest_point(
        &self,
        target: &Point,
        tmin: f64,
        tmax: f64,
        seed: Option<f64>,
    ) -> ClosestPoint {
        closest_point(self, target, tmin, tmax, seed)
    }

    /// Estimate the length of the curve from the chords between
    /// `num_samples` evenly spaced sample points.
    fn estimated_length(&self, num_samples: usize) -> f64 {
        let n = num_samples.max(2);
        let (start, end) = (self.start_param(), self.end_param());
        let mut length = 0.0;
        let mut prev = self.eval(start);
        for i in 1..n {
            let t = start + (end - start) * (i as f64) / ((n - 1) as f64);
            let next = self.eval(t);
            length += prev.distance(&next);
            prev = next;
        }
        length
    }
}

/// The straight line segment between two points, parametrized over
/// `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Line {
    p0: Point,
    p1: Point,
}

impl Line {
    /// Create a new line segment.
    ///
    /// # Panics
    ///
    /// Panics if the endpoints have different dimensions.
    pub fn new(p0: Point, p1: Point) -> Line {
        assert_eq!(p0.dim(), p1.dim(), "dimension mismatch");
        Line { p0, p1 }
    }

    /// The start point.
    #[inline]
    pub fn p0(&self) -> &Point {
        &self.p0
    }

    /// The end point.
    #[inline]
    pub fn p1(&self) -> &Point {
        &self.p1
    }
}

impl ParamCurve for Line {
    fn dim(&self) -> usize {
        self.p0.dim()
    }

    fn start_param(&self) -> f64 {
        0.0
    }

    fn end_param(&self) -> f64 {
        1.0
    }

    fn eval(&self, t: f64) -> Point {
        self.p0.lerp(&self.p1, t)
    }

    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Point> {
        let mut result = Vec::with_capacity(order + 1);
        result.push(self.eval(t));
        if order >= 1 {
            result.push(&self.p1 - &self.p0);
        }
        for _ in 2..=order {
            result.push(Point::zeros(self.dim()));
        }
        result
    }
}

/// A Bézier curve of arbitrary degree and dimension, parametrized over
/// `[0, 1]`.
///
/// Evaluation is by de Casteljau subdivision; derivatives come from the
/// hodograph (the control net of differences), applied repeatedly for
/// higher orders.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bezier {
    ctrl: Vec<Point>,
}

impl Bezier {
    /// Create a Bézier curve from its control points.
    ///
    /// # Panics
    ///
    /// Panics if no control points are given or their dimensions disagree.
    pub fn new(ctrl: Vec<Point>) -> Bezier {
        assert!(!ctrl.is_empty(), "a Bézier curve needs control points");
        let dim = ctrl[0].dim();
        assert!(
            ctrl.iter().all(|p| p.dim() == dim),
            "dimension mismatch among control points"
        );
        Bezier { ctrl }
    }

    /// The polynomial degree of the curve.
    #[inline]
    pub fn degree(&self) -> usize {
        self.ctrl.len() - 1
    }

    /// The control points.
    #[inline]
    pub fn ctrl(&self) -> &[Point] {
        &self.ctrl
    }

    fn de_casteljau(ctrl: &[Point], t: f64) -> Point {
        let mut scratch = ctrl.to_vec();
        for level in (1..scratch.len()).rev() {
            for i in 0..level {
                scratch[i] = scratch[i].lerp(&scratch[i + 1], t);
            }
        }
        scratch.swap_remove(0)
    }

    // Control net of the derivative curve: n * (p[i+1] - p[i]).
    fn hodograph(ctrl: &[Point], dim: usize) -> Vec<Point> {
        let n = ctrl.len() - 1;
        if n == 0 {
            return vec![Point::zeros(dim)];
        }
        ctrl.windows(2)
            .map(|w| (&w[1] - &w[0]) * n as f64)
            .collect()
    }
}

impl ParamCurve for Bezier {
    fn dim(&self) -> usize {
        self.ctrl[0].dim()
    }

    fn start_param(&self) -> f64 {
        0.0
    }

    fn end_param(&self) -> f64 {
        1.0
    }

    fn eval(&self, t: f64) -> Point {
        Bezier::de_casteljau(&self.ctrl, t)
    }

    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Point> {
        let dim = self.dim();
        let mut result = Vec::with_capacity(order + 1);
        let mut net = self.ctrl.clone();
        result.push(Bezier::de_casteljau(&net, t));
        for _ in 0..order {
            net = Bezier::hodograph(&net, dim);
            result.push(Bezier::de_casteljau(&net, t));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_eval_and_derivs() {
        let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[10.0, 4.0]));
        assert_eq!(line.eval(0.5), Point::new(&[5.0, 2.0]));
        let ders = line.eval_derivs(0.25, 2);
        assert_eq!(ders.len(), 3);
        assert_eq!(ders[0], Point::new(&[2.5, 1.0]));
        assert_eq!(ders[1], Point::new(&[10.0, 4.0]));
        assert_eq!(ders[2], Point::new(&[0.0, 0.0]));
    }

    #[test]
    fn line_estimated_length_is_chord() {
        let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[3.0, 4.0]));
        assert!((line.estimated_length(4) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn bezier_matches_cubic_closed_form() {
        // The cubic with y = x^3 over x in [0, 1].
        let c = Bezier::new(vec![
            Point::new(&[0.0, 0.0]),
            Point::new(&[1.0 / 3.0, 0.0]),
            Point::new(&[2.0 / 3.0, 0.0]),
            Point::new(&[1.0, 1.0]),
        ]);
        let n = 10;
        for i in 0..=n {
            let t = (i as f64) * (n as f64).recip();
            let p = c.eval(t);
            assert!((p[0] - t).abs() < 1e-12);
            assert!((p[1] - t.powi(3)).abs() < 1e-12);
        }
    }

    #[test]
    fn bezier_derivs_match_finite_differences() {
        let c = Bezier::new(vec![
            Point::new(&[0.0, 0.0, 1.0]),
            Point::new(&[1.0, 2.0, 0.0]),
            Point::new(&[3.0, 1.0, -1.0]),
            Point::new(&[4.0, 0.0, 2.0]),
        ]);
        let delta = 1e-6;
        for i in 1..10 {
            let t = i as f64 / 10.0;
            let ders = c.eval_derivs(t, 2);
            let d1 = (c.eval(t + delta) - c.eval(t - delta)) / (2.0 * delta);
            let d2 = (c.eval(t + delta) + c.eval(t - delta) - c.eval(t) * 2.0) / (delta * delta);
            assert!((d1 - &ders[1]).length() < 1e-5);
            assert!((d2 - &ders[2]).length() < 1e-3);
        }
    }

    #[test]
    fn bezier_derivs_of_low_degree_vanish() {
        let line = Bezier::new(vec![Point::new(&[1.0]), Point::new(&[2.0])]);
        let ders = line.eval_derivs(0.5, 3);
        assert_eq!(ders[1], Point::new(&[1.0]));
        assert_eq!(ders[2], Point::new(&[0.0]));
        assert_eq!(ders[3], Point::new(&[0.0]));
    }
}
