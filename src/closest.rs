// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Closest point search on parametric curves.
//!
//! Given a target point and a parameter interval, the search minimizes the
//! distance from the target to the curve by Newton refinement of the
//! stationarity function `f(t) = (C(t) - target) . C'(t)`, clamping the
//! parameter to the interval. The result is recomputed on every call; there
//! is no persistent search state.

use log::warn;

use crate::{ParamCurve, Point};

/// The outcome of a closest point search.
#[derive(Clone, Debug)]
pub struct ClosestPoint {
    /// Parameter of the closest point found.
    pub t: f64,
    /// Position of the closest point found.
    pub point: Point,
    /// Distance from the target to `point`.
    pub distance: f64,
    /// Whether the iteration converged. When `false` the fields hold the
    /// best point seen, which is not guaranteed to be a local minimum.
    pub converged: bool,
}

const MAX_ITERATIONS: usize = 30;
const SEED_SAMPLES: usize = 32;
// Step convergence threshold, relative to the interval length.
const STEP_TOL: f64 = 1e-13;
// Residual threshold for (C - target) . C', relative to |C - target| |C'|.
const RESIDUAL_TOL: f64 = 1e-11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SearchState {
    Seeded,
    Searching,
    Converged,
    Failed,
}

/// Compute the closest point on an interval of `curve` to `target`.
///
/// When `seed` is absent, a coarse sampling pass over `[tmin, tmax]`
/// selects the starting parameter; a seed outside the interval is clamped
/// into it. On non-convergence the best point found so far is returned with
/// [`ClosestPoint::converged`] set to `false`.
///
/// # Panics
///
/// Panics if `tmin > tmax` or the target dimension differs from the curve
/// dimension.
pub fn closest_point<C: ParamCurve + ?Sized>(
    curve: &C,
    target: &Point,
    tmin: f64,
    tmax: f64,
    seed: Option<f64>,
) -> ClosestPoint {
    assert!(tmin <= tmax, "empty search interval");
    assert_eq!(curve.dim(), target.dim(), "dimension mismatch");

    let mut t = match seed {
        Some(s) => s.clamp(tmin, tmax),
        None => seed_by_sampling(curve, target, tmin, tmax),
    };

    let interval = (tmax - tmin).max(f64::EPSILON);
    let mut best_t = t;
    let mut best_point = curve.eval(t);
    let mut best_dist2 = best_point.distance_squared(target);

    let mut state = SearchState::Seeded;
    let mut iterations = 0;
    while state == SearchState::Seeded || state == SearchState::Searching {
        let ders = curve.eval_derivs(t, 2);
        let diff = &ders[0] - target;
        let dist2 = diff.length_squared();
        if dist2 < best_dist2 {
            best_t = t;
            best_point = ders[0].clone();
            best_dist2 = dist2;
        }

        let f = diff.dot(&ders[1]);
        let scale = diff.length() * ders[1].length();
        if f.abs() <= RESIDUAL_TOL * scale.max(1.0) {
            state = SearchState::Converged;
            break;
        }

        let fprime = ders[1].length_squared() + diff.dot(&ders[2]);
        if fprime == 0.0 {
            // Flat stationarity function; Newton has nowhere to go.
            state = SearchState::Failed;
            break;
        }

        let t_next = (t - f / fprime).clamp(tmin, tmax);
        let step = t_next - t;
        t = t_next;
        if step.abs() <= STEP_TOL * interval {
            state = SearchState::Converged;
            break;
        }

        iterations += 1;
        state = if iterations >= MAX_ITERATIONS {
            SearchState::Failed
        } else {
            SearchState::Searching
        };
    }

    // The final iterate may improve on the tracked best.
    let point = curve.eval(t);
    let dist2 = point.distance_squared(target);
    if dist2 < best_dist2 {
        best_t = t;
        best_point = point;
        best_dist2 = dist2;
    }

    let converged = state == SearchState::Converged;
    if !converged {
        warn!(
            "closest point search did not converge after {MAX_ITERATIONS} iterations; \
             returning best effort at t = {best_t}"
        );
    }
    ClosestPoint {
        t: best_t,
        point: best_point,
        distance: best_dist2.sqrt(),
        converged,
    }
}

// Coarse sampling pass selecting the most promising start parameter.
fn seed_by_sampling<C: ParamCurve + ?Sized>(
    curve: &C,
    target: &Point,
    tmin: f64,
    tmax: f64,
) -> f64 {
    let mut best_t = tmin;
    let mut best_dist2 = f64::INFINITY;
    for i in 0..=SEED_SAMPLES {
        let t = tmin + (tmax - tmin) * (i as f64) / (SEED_SAMPLES as f64);
        let dist2 = curve.eval(t).distance_squared(target);
        if dist2 < best_dist2 {
            best_t = t;
            best_dist2 = dist2;
        }
    }
    best_t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bezier, Line};

    #[test]
    fn line_midpoint() {
        let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[10.0, 0.0]));
        let hit = closest_point(&line, &Point::new(&[5.0, 3.0]), 0.0, 1.0, None);
        assert!(hit.converged);
        assert!((hit.t - 0.5).abs() < 1e-9);
        assert!(hit.point.distance(&Point::new(&[5.0, 0.0])) < 1e-9);
        assert!((hit.distance - 3.0).abs() < 1e-9);
    }

    #[test]
    fn seeded_and_unseeded_agree() {
        let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[10.0, 0.0]));
        let target = Point::new(&[7.3, -2.0]);
        let unseeded = closest_point(&line, &target, 0.0, 1.0, None);
        let seeded = closest_point(&line, &target, 0.0, 1.0, Some(0.1));
        assert!((unseeded.t - seeded.t).abs() < 1e-9);
    }

    #[test]
    fn clamps_to_interval() {
        let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[10.0, 0.0]));
        let hit = closest_point(&line, &Point::new(&[15.0, 1.0]), 0.0, 1.0, None);
        assert!((hit.t - 1.0).abs() < 1e-9);
        assert!(hit.point.distance(&Point::new(&[10.0, 0.0])) < 1e-9);

        // Restricting the interval moves the answer with it.
        let hit = closest_point(&line, &Point::new(&[9.0, 0.0]), 0.0, 0.5, None);
        assert!((hit.t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bezier_projection() {
        // y = x^2 over [0, 1]; closest point to a point on the curve is
        // the point itself.
        let c = Bezier::new(vec![
            Point::new(&[0.0, 0.0]),
            Point::new(&[0.5, 0.0]),
            Point::new(&[1.0, 1.0]),
        ]);
        for i in 1..10 {
            let t = i as f64 / 10.0;
            let on_curve = c.eval(t);
            let hit = closest_point(&c, &on_curve, 0.0, 1.0, None);
            assert!(hit.converged);
            assert!(hit.distance < 1e-9);
            assert!((hit.t - t).abs() < 1e-6);
        }
    }

    #[test]
    fn degenerate_interval() {
        let line = Line::new(Point::new(&[0.0, 0.0]), Point::new(&[10.0, 0.0]));
        let hit = closest_point(&line, &Point::new(&[5.0, 3.0]), 0.25, 0.25, Some(0.25));
        assert!((hit.t - 0.25).abs() < 1e-15);
        assert!(hit.point.distance(&Point::new(&[2.5, 0.0])) < 1e-12);
    }

    #[test]
    fn trait_method_delegates() {
        let line = Line::new(Point::new(&[0.0, 0.0, 0.0]), Point::new(&[0.0, 0.0, 4.0]));
        let hit = line.closest_point(&Point::new(&[1.0, 0.0, 2.0]), 0.0, 1.0, None);
        assert!(hit.converged);
        assert!((hit.t - 0.5).abs() < 1e-9);
        assert!((hit.distance - 1.0).abs() < 1e-12);
    }
}
