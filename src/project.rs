// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Projection of a space curve and its cross tangent onto a surface.

use crate::lu::{lu_solve, DenseMatrix};
use crate::surface::SurfacePoint;
use crate::{EvalCurveSet, ParamCurve, ParamSurface, Point, RectDomain};

/// Evaluator producing the projection of a space curve onto a surface,
/// together with the projection of its cross tangent.
///
/// Three points are computed per parameter: the projection expressed in the
/// surface parameter domain, the corresponding space point, and the
/// projected cross tangent. A fitting driver approximates all three as
/// curves over the common parameter interval.
///
/// The evaluator borrows its inputs for its lifetime and never mutates
/// them.
pub struct SurfaceProjection<'a> {
    space_curve: &'a dyn ParamCurve,
    crosstan_curve: &'a dyn ParamCurve,
    surface: &'a dyn ParamSurface,
    start_par_pt: Option<Point>,
    end_par_pt: Option<Point>,
    epsgeo: f64,
    domain_of_interest: Option<RectDomain>,
}

const SEED_SAMPLES: usize = 10;

impl<'a> SurfaceProjection<'a> {
    /// Create a projection evaluator.
    ///
    /// `space_curve` is the curve to project and `crosstan_curve` its
    /// associated cross tangent curve, sharing the parameter interval.
    /// `start_par_pt` and `end_par_pt`, when given, force the projected
    /// curve to start and end in those parameter-domain points, overriding
    /// the search at the interval boundaries. `epsgeo` is the geometric
    /// tolerance of the projection, used by the acceptance test.
    /// `domain_of_interest` restricts the searched part of the surface
    /// domain.
    ///
    /// # Panics
    ///
    /// Panics if the two curves and the surface do not live in the same
    /// space, or if the curves' parameter intervals disagree.
    pub fn new(
        space_curve: &'a dyn ParamCurve,
        crosstan_curve: &'a dyn ParamCurve,
        surface: &'a dyn ParamSurface,
        start_par_pt: Option<Point>,
        end_par_pt: Option<Point>,
        epsgeo: f64,
        domain_of_interest: Option<RectDomain>,
    ) -> SurfaceProjection<'a> {
        assert_eq!(space_curve.dim(), surface.dim(), "dimension mismatch");
        assert_eq!(space_curve.dim(), crosstan_curve.dim(), "dimension mismatch");
        assert!(
            space_curve.start_param() == crosstan_curve.start_param()
                && space_curve.end_param() == crosstan_curve.end_param(),
            "space and cross tangent curves must share their parameter interval"
        );
        SurfaceProjection {
            space_curve,
            crosstan_curve,
            surface,
            start_par_pt,
            end_par_pt,
            epsgeo,
            domain_of_interest,
        }
    }

    /// The geometric tolerance of the projection.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.epsgeo
    }

    fn search_domain(&self) -> RectDomain {
        match &self.domain_of_interest {
            Some(r) => self.surface.domain().intersect(r),
            None => self.surface.domain(),
        }
    }

    // Seed for the closest point search: a coarse grid scan of the
    // searched domain against the space position at `t`.
    fn create_seed(&self, target: &Point) -> (f64, f64) {
        let domain = self.search_domain();
        let mut best = (domain.umin, domain.vmin);
        let mut best_dist2 = f64::INFINITY;
        for i in 0..=SEED_SAMPLES {
            for j in 0..=SEED_SAMPLES {
                let u = domain.umin
                    + (domain.umax - domain.umin) * (i as f64) / (SEED_SAMPLES as f64);
                let v = domain.vmin
                    + (domain.vmax - domain.vmin) * (j as f64) / (SEED_SAMPLES as f64);
                let dist2 = self.surface.eval(u, v).distance_squared(target);
                if dist2 < best_dist2 {
                    best = (u, v);
                    best_dist2 = dist2;
                }
            }
        }
        best
    }

    fn project(&self, target: &Point, seed: Option<(f64, f64)>) -> SurfacePoint {
        let seed = seed.unwrap_or_else(|| self.create_seed(target));
        self.surface
            .closest_point(target, Some(seed), self.domain_of_interest.as_ref())
    }

    // A fixed parameter-domain point overriding the search at the
    // interval boundaries, if one applies at `t`.
    fn boundary_override(&self, t: f64) -> Option<&Point> {
        if t <= self.start() {
            self.start_par_pt.as_ref()
        } else if t >= self.end() {
            self.end_par_pt.as_ref()
        } else {
            None
        }
    }

    // Derivative of the projected parameter curve at the projection
    // (u, v) of a moving target with velocity `target_deriv`: implicit
    // differentiation of the stationarity system of the squared distance.
    fn parameter_derivative(
        &self,
        surf_ders: &[Point],
        diff: &Point,
        target_deriv: &Point,
    ) -> (f64, f64) {
        let (su, sv) = (&surf_ders[1], &surf_ders[2]);
        let (suu, suv, svv) = (&surf_ders[3], &surf_ders[4], &surf_ders[5]);
        let mut system = DenseMatrix::from_rows(&[
            &[
                su.length_squared() + diff.dot(suu),
                su.dot(sv) + diff.dot(suv),
            ],
            &[
                su.dot(sv) + diff.dot(suv),
                sv.length_squared() + diff.dot(svv),
            ],
        ]);
        let mut rhs = [target_deriv.dot(su), target_deriv.dot(sv)];
        lu_solve(&mut system, &mut rhs)
            .expect("degenerate projection: stationarity system is singular");
        (rhs[0], rhs[1])
    }
}

impl EvalCurveSet for SurfaceProjection<'_> {
    fn eval(&self, t: f64) -> Vec<Point> {
        let space_pos = self.space_curve.eval(t);

        let (par_pt, surf_pt) = match self.boundary_override(t) {
            Some(fixed) => {
                let pt = self.surface.eval(fixed[0], fixed[1]);
                (fixed.clone(), pt)
            }
            None => {
                let hit = self.project(&space_pos, None);
                (Point::new(&[hit.u, hit.v]), hit.point)
            }
        };

        // The cross tangent projects as the difference between the
        // projections of the displaced and the base point.
        let crosstan = self.crosstan_curve.eval(t);
        let displaced = &space_pos + &crosstan;
        let hit2 = self.project(&displaced, Some((par_pt[0], par_pt[1])));
        let crosstan_pt = &hit2.point - &surf_pt;

        vec![par_pt, surf_pt, crosstan_pt]
    }

    fn eval_derivs(&self, t: f64, order: usize) -> Vec<Vec<Point>> {
        assert!(
            order <= 1,
            "derivatives above order 1 are not available for surface projections"
        );
        if order == 0 {
            return self.eval(t).into_iter().map(|p| vec![p]).collect();
        }

        let space_ders = self.space_curve.eval_derivs(t, 1);
        let crosstan_ders = self.crosstan_curve.eval_derivs(t, 1);

        let base_hit = match self.boundary_override(t) {
            Some(fixed) => {
                let pt = self.surface.eval(fixed[0], fixed[1]);
                let distance = pt.distance(&space_ders[0]);
                SurfacePoint {
                    u: fixed[0],
                    v: fixed[1],
                    point: pt,
                    distance,
                    converged: true,
                }
            }
            None => self.project(&space_ders[0], None),
        };

        let surf_ders = self.surface.eval_derivs(base_hit.u, base_hit.v, 2);
        let diff = &surf_ders[0] - &space_ders[0];
        let (du, dv) = self.parameter_derivative(&surf_ders, &diff, &space_ders[1]);
        let par_curve = vec![
            Point::new(&[base_hit.u, base_hit.v]),
            Point::new(&[du, dv]),
        ];
        let space_deriv = &surf_ders[1] * du + &surf_ders[2] * dv;

        // The displaced projection and its derivative, for the cross
        // tangent output.
        let displaced = &space_ders[0] + &crosstan_ders[0];
        let displaced_deriv = &space_ders[1] + &crosstan_ders[1];
        let hit2 = self.project(&displaced, Some((base_hit.u, base_hit.v)));
        let surf2_ders = self.surface.eval_derivs(hit2.u, hit2.v, 2);
        let diff2 = &surf2_ders[0] - &displaced;
        let (du2, dv2) = self.parameter_derivative(&surf2_ders, &diff2, &displaced_deriv);
        let crosstan_pt = &surf2_ders[0] - &surf_ders[0];
        let crosstan_deriv = &(&surf2_ders[1] * du2 + &surf2_ders[2] * dv2) - &space_deriv;

        vec![
            par_curve,
            vec![surf_ders[0].clone(), space_deriv],
            vec![crosstan_pt, crosstan_deriv],
        ]
    }

    fn start(&self) -> f64 {
        self.space_curve.start_param()
    }

    fn end(&self) -> f64 {
        self.space_curve.end_param()
    }

    // Dimension of the parameter domain: the projected parameter curve is
    // the primary output of the set.
    fn dim(&self) -> usize {
        2
    }

    fn num_curves(&self) -> usize {
        3
    }

    fn approximation_ok(&self, t: f64, approx: &[Point], tol1: f64, _tol2: f64) -> bool {
        assert_eq!(approx.len(), self.num_curves(), "wrong number of points");
        let pts = self.eval(t);
        // The parameter-domain point lives in domain units, so instead of
        // a direct comparison it must map onto the surface within the
        // projection tolerance of the approximated space point. The space
        // and cross tangent points are measured against tol1.
        let on_surface = self.surface.eval(approx[0][0], approx[0][1]);
        pts[1].distance(&approx[1]) <= tol1
            && pts[2].distance(&approx[2]) <= tol1
            && on_surface.distance(&approx[1]) <= self.epsgeo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Line, Plane};

    fn xy_plane() -> Plane {
        Plane::new(
            Point::new(&[0.0, 0.0, 0.0]),
            Point::new(&[1.0, 0.0, 0.0]),
            Point::new(&[0.0, 1.0, 0.0]),
            RectDomain::new(0.0, 10.0, 0.0, 10.0),
        )
    }

    #[test]
    fn plane_projection_drops_the_normal_component() {
        let space = Line::new(Point::new(&[1.0, 2.0, 3.0]), Point::new(&[5.0, 2.0, 3.0]));
        let crosstan = Line::new(Point::new(&[0.0, 1.0, 1.0]), Point::new(&[0.0, 1.0, 1.0]));
        let plane = xy_plane();
        let proj = SurfaceProjection::new(&space, &crosstan, &plane, None, None, 1e-6, None);

        assert_eq!(proj.num_curves(), 3);
        assert_eq!(proj.dim(), 2);

        let pts = proj.eval(0.5);
        assert_eq!(pts.len(), 3);
        // Foot point of (3, 2, 3) on the plane z = 0.
        assert!(pts[0].distance(&Point::new(&[3.0, 2.0])) < 1e-9);
        assert!(pts[1].distance(&Point::new(&[3.0, 2.0, 0.0])) < 1e-9);
        // The cross tangent (0, 1, 1) keeps only its in-plane part.
        assert!(pts[2].distance(&Point::new(&[0.0, 1.0, 0.0])) < 1e-9);
    }

    #[test]
    fn endpoint_override_wins() {
        let space = Line::new(Point::new(&[1.0, 2.0, 3.0]), Point::new(&[5.0, 2.0, 3.0]));
        let crosstan = Line::new(Point::new(&[0.0, 1.0, 0.0]), Point::new(&[0.0, 1.0, 0.0]));
        let plane = xy_plane();
        let fixed = Point::new(&[0.25, 0.75]);
        let proj = SurfaceProjection::new(
            &space,
            &crosstan,
            &plane,
            Some(fixed.clone()),
            None,
            1e-6,
            None,
        );

        let pts = proj.eval(0.0);
        assert_eq!(pts[0], fixed);
        assert!(pts[1].distance(&Point::new(&[0.25, 0.75, 0.0])) < 1e-12);

        // Interior parameters are unaffected by the override.
        let pts = proj.eval(0.5);
        assert!(pts[0].distance(&Point::new(&[3.0, 2.0])) < 1e-9);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let space = Line::new(Point::new(&[1.0, 2.0, 3.0]), Point::new(&[5.0, 6.0, 3.0]));
        let crosstan = Line::new(Point::new(&[0.5, 0.0, 1.0]), Point::new(&[0.0, 0.5, 1.0]));
        let plane = xy_plane();
        let proj = SurfaceProjection::new(&space, &crosstan, &plane, None, None, 1e-6, None);

        let t = 0.4;
        let delta = 1e-6;
        let ders = proj.eval_derivs(t, 1);
        let ahead = proj.eval(t + delta);
        let behind = proj.eval(t - delta);
        for k in 0..3 {
            let fd = (&ahead[k] - &behind[k]) / (2.0 * delta);
            assert!(
                (&fd - &ders[k][1]).length() < 1e-5,
                "curve {k}: {fd:?} vs {:?}",
                ders[k][1]
            );
        }
    }

    #[test]
    fn domain_restriction_limits_the_projection() {
        let space = Line::new(Point::new(&[5.0, 5.0, 1.0]), Point::new(&[6.0, 5.0, 1.0]));
        let crosstan = Line::new(Point::new(&[0.0, 0.0, 1.0]), Point::new(&[0.0, 0.0, 1.0]));
        let plane = xy_plane();
        let restriction = RectDomain::new(0.0, 2.0, 0.0, 2.0);
        let proj = SurfaceProjection::new(
            &space,
            &crosstan,
            &plane,
            None,
            None,
            1e-6,
            Some(restriction),
        );
        let pts = proj.eval(0.0);
        assert!(pts[0].distance(&Point::new(&[2.0, 2.0])) < 1e-9);
    }

    #[test]
    fn acceptance_uses_the_spatial_tolerance() {
        let space = Line::new(Point::new(&[1.0, 2.0, 3.0]), Point::new(&[5.0, 2.0, 3.0]));
        let crosstan = Line::new(Point::new(&[0.0, 1.0, 0.0]), Point::new(&[0.0, 1.0, 0.0]));
        let plane = xy_plane();
        let proj = SurfaceProjection::new(&space, &crosstan, &plane, None, None, 1e-6, None);

        let exact = proj.eval(0.5);
        assert!(proj.approximation_ok(0.5, &exact, 1e-9, 0.0));

        // A consistent in-plane displacement of the parameter and space
        // points: acceptance depends on the spatial tolerance alone.
        let mut off = exact.clone();
        off[0] += Point::new(&[0.5, 0.0]);
        off[1] += Point::new(&[0.5, 0.0, 0.0]);
        assert!(!proj.approximation_ok(0.5, &off, 1e-3, 0.0));
        assert!(proj.approximation_ok(0.5, &off, 0.6, 0.0));

        // A space point drifting off the surface violates the projection
        // tolerance no matter how loose the spatial tolerance is.
        let mut lifted = exact.clone();
        lifted[1] += Point::new(&[0.0, 0.0, 0.5]);
        assert!(!proj.approximation_ok(0.5, &lifted, 10.0, 0.0));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let space = Line::new(Point::new(&[1.0, 2.0, 3.0]), Point::new(&[5.0, 6.0, 3.0]));
        let crosstan = Line::new(Point::new(&[0.5, 0.0, 1.0]), Point::new(&[0.0, 0.5, 1.0]));
        let plane = xy_plane();
        let proj = SurfaceProjection::new(&space, &crosstan, &plane, None, None, 1e-6, None);
        assert_eq!(proj.eval(0.3), proj.eval(0.3));
    }
}
