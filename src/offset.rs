// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Offset curves along a blended cross tangent direction.

use crate::{EvalCurve, ParamCurve, Point};

/// An offset curve from a position curve, along a direction obtained by
/// blending two cross tangent curves, with an offset distance interpolating
/// the blended tangent length at the curve ends.
///
/// At parameter `t` the blended tangent is
/// `c(t) = b1(t) * T1(t) + b2(t) * T2(t)`, where the blending curves `b1`,
/// `b2` are scalar valued. The evaluated point is the position offset along
/// `c(t)`, rescaled so the offset distance varies linearly between
/// `|c(start)|` and `|c(end)|` over the parameter interval.
///
/// Derivatives of any order are exact compositions of the constituent
/// curves' own derivatives; nothing is approximated by finite differences.
pub struct CrossTangentOffset<'a> {
    poscurve: &'a dyn ParamCurve,
    tangcurves: [&'a dyn ParamCurve; 2],
    blends: [&'a dyn ParamCurve; 2],
    len_start: f64,
    len_end: f64,
}

impl<'a> CrossTangentOffset<'a> {
    /// Create an offset evaluator from a position curve, two cross tangent
    /// curves and their scalar blending curves.
    ///
    /// All five curves must share the parameter interval; the tangent
    /// curves must live in the position curve's (three-dimensional) space
    /// and the blending curves must be one-dimensional.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions or parameter intervals disagree, or if the
    /// blended tangent vanishes at either end of the interval.
    pub fn new(
        poscurve: &'a dyn ParamCurve,
        tangcv1: &'a dyn ParamCurve,
        tangcv2: &'a dyn ParamCurve,
        blend1: &'a dyn ParamCurve,
        blend2: &'a dyn ParamCurve,
    ) -> CrossTangentOffset<'a> {
        assert_eq!(poscurve.dim(), 3, "offset curves live in dimension 3");
        let (start, end) = (poscurve.start_param(), poscurve.end_param());
        for cv in [tangcv1, tangcv2, blend1, blend2] {
            assert!(
                cv.start_param() == start && cv.end_param() == end,
                "all curves must share the parameter interval"
            );
        }
        assert_eq!(tangcv1.dim(), 3, "dimension mismatch");
        assert_eq!(tangcv2.dim(), 3, "dimension mismatch");
        assert_eq!(blend1.dim(), 1, "blending curves must be scalar valued");
        assert_eq!(blend2.dim(), 1, "blending curves must be scalar valued");

        let evaluator = CrossTangentOffset {
            poscurve,
            tangcurves: [tangcv1, tangcv2],
            blends: [blend1, blend2],
            len_start: 0.0,
            len_end: 0.0,
        };
        let len_start = evaluator.eval_crosstan(start).length();
        let len_end = evaluator.eval_crosstan(end).length();
        assert!(
            len_start > 0.0 && len_end > 0.0,
            "blended cross tangent vanishes at an end of the interval"
        );
        CrossTangentOffset {
            len_start,
            len_end,
            ..evaluator
        }
    }

    // The blended cross tangent b1 T1 + b2 T2.
    fn eval_crosstan(&self, t: f64) -> Point {
        let mut sum = Point::zeros(3);
        for (tang, blend) in self.tangcurves.iter().zip(&self.blends) {
            sum += tang.eval(t) * blend.eval(t)[0];
        }
        sum
    }

    // Derivatives of the blended cross tangent up to `order`, by the
    // Leibniz rule over each blend-tangent product.
    fn eval_crosstan_derivs(&self, t: f64, order: usize) -> Vec<Point> {
        let mut result = vec![Point::zeros(3); order + 1];
        for (tang, blend) in self.tangcurves.iter().zip(&self.blends) {
            let tang_ders = tang.eval_derivs(t, order);
            let blend_ders = blend.eval_derivs(t, order);
            for m in 0..=order {
                for k in 0..=m {
                    result[m] += &tang_ders[m - k] * (binomial(m, k) * blend_ders[k][0]);
                }
            }
        }
        result
    }

    // The linearly interpolated offset length and its derivatives.
    fn length_derivs(&self, t: f64, order: usize) -> Vec<f64> {
        let (start, end) = (self.start(), self.end());
        let slope = (self.len_end - self.len_start) / (end - start);
        let mut result = vec![0.0; order + 1];
        result[0] = self.len_start + slope * (t - start);
        if order >= 1 {
            result[1] = slope;
        }
        result
    }
}

// Binomial coefficient as a float; orders are small.
fn binomial(n: usize, k: usize) -> f64 {
    let mut c = 1.0;
    for i in 0..k.min(n - k) {
        c = c * (n - i) as f64 / (i + 1) as f64;
    }
    c
}

impl EvalCurve for CrossTangentOffset<'_> {
    fn eval(&self, t: f64) -> Point {
        self.eval_derivs(t, 0).swap_remove(0)
    }

    /// Evaluate position and derivatives of the offset curve.
    ///
    /// The composition `pos + (l / |c|) * c` is differentiated through the
    /// recurrences of `q = c . c`, `r = sqrt(q)` (from `r * r = q`) and
    /// `s = l / r` (from `s * r = l`), so each derivative order uses only
    /// the constituent curves' exact derivatives.
    ///
    /// # Panics
    ///
    /// Panics if the blended cross tangent vanishes at `t`, which leaves
    /// the offset direction undefined.
    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Point> {
        let pos = self.poscurve.eval_derivs(t, order);
        let c = self.eval_crosstan_derivs(t, order);
        let l = self.length_derivs(t, order);

        // q = c . c
        let mut q = vec![0.0; order + 1];
        for m in 0..=order {
            for k in 0..=m {
                q[m] += binomial(m, k) * c[k].dot(&c[m - k]);
            }
        }

        // r = sqrt(q), from r * r = q
        let mut r = vec![0.0; order + 1];
        assert!(q[0] > 0.0, "blended cross tangent vanishes at t = {t}");
        r[0] = q[0].sqrt();
        for m in 1..=order {
            let mut sum = q[m];
            for k in 1..m {
                sum -= binomial(m, k) * r[k] * r[m - k];
            }
            r[m] = sum / (2.0 * r[0]);
        }

        // s = l / r, from s * r = l
        let mut s = vec![0.0; order + 1];
        s[0] = l[0] / r[0];
        for m in 1..=order {
            let mut sum = l[m];
            for k in 1..=m {
                sum -= binomial(m, k) * r[k] * s[m - k];
            }
            s[m] = sum / r[0];
        }

        // result = pos + s * c
        let mut result = pos;
        for m in 0..=order {
            for k in 0..=m {
                result[m] += &c[m - k] * (binomial(m, k) * s[k]);
            }
        }
        result
    }

    fn start(&self) -> f64 {
        self.poscurve.start_param()
    }

    fn end(&self) -> f64 {
        self.poscurve.end_param()
    }

    fn dim(&self) -> usize {
        self.poscurve.dim()
    }

    /// Two-tier acceptance test.
    ///
    /// `tol1` bounds the spatial deviation. A candidate well inside it is
    /// accepted outright; a borderline candidate is additionally required
    /// to carry a cross tangent within the angular tolerance `tol2` of the
    /// plane spanned by the two tangent curves at `t`.
    fn approximation_ok(&self, t: f64, approx: &Point, tol1: f64, tol2: f64) -> bool {
        let pos = self.eval(t);
        let dist = pos.distance(approx);
        if dist > tol1 {
            return false;
        }
        if dist <= 0.5 * tol1 {
            return true;
        }

        // Borderline: check the candidate cross tangent against the
        // tangent plane.
        let candidate = approx - self.poscurve.eval(t);
        let normal = self.tangcurves[0]
            .eval(t)
            .cross(&self.tangcurves[1].eval(t));
        let scale = candidate.length() * normal.length();
        if scale == 0.0 {
            // No usable plane or a vanishing candidate; the spatial check
            // has to stand alone.
            return true;
        }
        let deviation = (candidate.dot(&normal).abs() / scale).min(1.0).asin();
        deviation <= tol2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bezier, Line};

    fn constant(coords: &[f64]) -> Line {
        Line::new(Point::new(coords), Point::new(coords))
    }

    #[test]
    fn blend_of_equal_tangents_is_doubled() {
        let tang = Bezier::new(vec![
            Point::new(&[0.0, 0.0, 1.0]),
            Point::new(&[0.5, 0.5, 1.0]),
            Point::new(&[0.0, 1.0, 1.0]),
        ]);
        let pos = Line::new(Point::new(&[0.0, 0.0, 0.0]), Point::new(&[10.0, 0.0, 0.0]));
        let one = constant(&[1.0]);
        let offset = CrossTangentOffset::new(&pos, &tang, &tang, &one, &one);

        for i in 0..=10 {
            let t = i as f64 / 10.0;
            let blended = offset.eval_crosstan(t);
            let single = tang.eval(t);
            assert!((blended - single * 2.0).length() < 1e-12);
        }
    }

    #[test]
    fn constant_tangent_gives_plain_offset() {
        let pos = Line::new(Point::new(&[0.0, 0.0, 0.0]), Point::new(&[10.0, 0.0, 0.0]));
        let tang = constant(&[0.0, 0.0, 1.0]);
        let one = constant(&[1.0]);
        let offset = CrossTangentOffset::new(&pos, &tang, &tang, &one, &one);

        // Blend is (0, 0, 2) everywhere, so the offset length is the
        // constant 2 and every point moves two units along z.
        for i in 0..=4 {
            let t = i as f64 / 4.0;
            let p = offset.eval(t);
            assert!(p.distance(&Point::new(&[10.0 * t, 0.0, 2.0])) < 1e-12);
        }
        assert_eq!(offset.dim(), 3);
        assert_eq!((offset.start(), offset.end()), (0.0, 1.0));
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let pos = Bezier::new(vec![
            Point::new(&[0.0, 0.0, 0.0]),
            Point::new(&[3.0, 1.0, 0.0]),
            Point::new(&[7.0, -1.0, 1.0]),
            Point::new(&[10.0, 0.0, 0.0]),
        ]);
        let tang1 = Bezier::new(vec![
            Point::new(&[0.0, 0.0, 1.0]),
            Point::new(&[0.2, 0.3, 1.5]),
            Point::new(&[0.0, 0.5, 1.0]),
        ]);
        let tang2 = Bezier::new(vec![
            Point::new(&[0.1, 0.0, 2.0]),
            Point::new(&[0.0, 0.2, 1.0]),
        ]);
        let blend1 = Line::new(Point::new(&[1.0]), Point::new(&[0.5]));
        let blend2 = Line::new(Point::new(&[0.3]), Point::new(&[1.0]));
        let offset = CrossTangentOffset::new(&pos, &tang1, &tang2, &blend1, &blend2);

        let delta = 1e-6;
        for i in 1..10 {
            let t = i as f64 / 10.0;
            let ders = offset.eval_derivs(t, 2);
            let ahead = offset.eval(t + delta);
            let behind = offset.eval(t - delta);
            let fd1 = (&ahead - &behind) / (2.0 * delta);
            let fd2 = (&(&ahead + &behind) - &(offset.eval(t) * 2.0)) / (delta * delta);
            assert!((&fd1 - &ders[1]).length() < 1e-5, "first derivative at {t}");
            assert!((&fd2 - &ders[2]).length() < 1e-2, "second derivative at {t}");
        }
    }

    #[test]
    fn offset_length_interpolates_linearly() {
        let pos = Line::new(Point::new(&[0.0, 0.0, 0.0]), Point::new(&[10.0, 0.0, 0.0]));
        // Tangent length 1 at the start, 3 at the end.
        let tang = Line::new(Point::new(&[0.0, 0.0, 1.0]), Point::new(&[0.0, 0.0, 3.0]));
        let zero = constant(&[0.0]);
        let one = constant(&[1.0]);
        let offset = CrossTangentOffset::new(&pos, &tang, &tang, &one, &zero);

        for i in 0..=4 {
            let t = i as f64 / 4.0;
            let p = offset.eval(t);
            let expected_len = 1.0 + 2.0 * t;
            assert!((p.distance(&pos.eval(t)) - expected_len).abs() < 1e-12);
        }
    }

    #[test]
    fn two_tier_acceptance() {
        let pos = Line::new(Point::new(&[0.0, 0.0, 0.0]), Point::new(&[10.0, 0.0, 0.0]));
        let tang1 = constant(&[0.0, 1.0, 0.0]);
        let tang2 = constant(&[0.0, 1.0, 1.0]);
        let one = constant(&[1.0]);
        let offset = CrossTangentOffset::new(&pos, &tang1, &tang2, &one, &one);

        let t = 0.5;
        let exact = offset.eval(t);
        let tol1 = 0.1;

        // Well inside the spatial tolerance: accepted without the angular
        // check.
        let near = &exact + &Point::new(&[0.01, 0.0, 0.0]);
        assert!(offset.approximation_ok(t, &near, tol1, 0.0));

        // Borderline and rotated out of the tangent plane (the plane of
        // tang1 and tang2 is x = 0): rejected under a tight angular
        // tolerance, accepted under a loose one.
        let borderline = &exact + &Point::new(&[0.08, 0.0, 0.0]);
        assert!(!offset.approximation_ok(t, &borderline, tol1, 1e-3));
        assert!(offset.approximation_ok(t, &borderline, tol1, 1.0));

        // Outside the spatial tolerance: always rejected.
        let far = &exact + &Point::new(&[1.0, 0.0, 0.0]);
        assert!(!offset.approximation_ok(t, &far, tol1, 1.0));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let pos = Line::new(Point::new(&[0.0, 0.0, 0.0]), Point::new(&[10.0, 0.0, 0.0]));
        let tang = constant(&[0.0, 0.5, 1.0]);
        let one = constant(&[1.0]);
        let offset = CrossTangentOffset::new(&pos, &tang, &tang, &one, &one);
        assert_eq!(offset.eval(0.37), offset.eval(0.37));
    }
}
