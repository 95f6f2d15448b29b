// Copyright 2025 the Curvefit Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parametric surfaces: rectangular domains, the collaborator interface
//! and a plane implementation.

use log::warn;

use crate::Point;

/// A rectangular parameter domain `[umin, umax] x [vmin, vmax]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RectDomain {
    /// Lower bound of the first parameter.
    pub umin: f64,
    /// Upper bound of the first parameter.
    pub umax: f64,
    /// Lower bound of the second parameter.
    pub vmin: f64,
    /// Upper bound of the second parameter.
    pub vmax: f64,
}

impl RectDomain {
    /// Create a new domain.
    ///
    /// # Panics
    ///
    /// Panics if a lower bound exceeds its upper bound.
    pub fn new(umin: f64, umax: f64, vmin: f64, vmax: f64) -> RectDomain {
        assert!(umin <= umax && vmin <= vmax, "empty parameter domain");
        RectDomain {
            umin,
            umax,
            vmin,
            vmax,
        }
    }

    /// Does the domain contain the parameter pair?
    #[inline]
    pub fn contains(&self, u: f64, v: f64) -> bool {
        (self.umin..=self.umax).contains(&u) && (self.vmin..=self.vmax).contains(&v)
    }

    /// Clamp a parameter pair into the domain.
    #[inline]
    pub fn clamp(&self, u: f64, v: f64) -> (f64, f64) {
        (u.clamp(self.umin, self.umax), v.clamp(self.vmin, self.vmax))
    }

    /// Intersect with another domain.
    ///
    /// # Panics
    ///
    /// Panics if the intersection is empty.
    pub fn intersect(&self, other: &RectDomain) -> RectDomain {
        RectDomain::new(
            self.umin.max(other.umin),
            self.umax.min(other.umax),
            self.vmin.max(other.vmin),
            self.vmax.min(other.vmax),
        )
    }
}

/// The outcome of a surface closest point search.
#[derive(Clone, Debug)]
pub struct SurfacePoint {
    /// First parameter of the closest point found.
    pub u: f64,
    /// Second parameter of the closest point found.
    pub v: f64,
    /// Position of the closest point found.
    pub point: Point,
    /// Distance from the target to `point`.
    pub distance: f64,
    /// Whether the iteration converged; `false` tags a best effort result.
    pub converged: bool,
}

const MAX_ITERATIONS: usize = 30;
const SEED_SAMPLES: usize = 8;
const STEP_TOL: f64 = 1e-13;
const RESIDUAL_TOL: f64 = 1e-11;

/// A surface parametrized by two scalars over a rectangular domain.
///
/// Derivatives are reported in triangular order: position; then `Su`,
/// `Sv`; then `Suu`, `Suv`, `Svv`; so an evaluation of order `n` yields
/// `(n + 1)(n + 2) / 2` points.
pub trait ParamSurface {
    /// Dimension of the space the surface lives in.
    fn dim(&self) -> usize;

    /// The parameter domain.
    fn domain(&self) -> RectDomain;

    /// Evaluate the position at `(u, v)`.
    fn eval(&self, u: f64, v: f64) -> Point;

    /// Evaluate position and partial derivatives up to `order` at
    /// `(u, v)`, in triangular order.
    fn eval_derivs(&self, u: f64, v: f64, order: usize) -> Vec<Point>;

    /// Compute the closest point on the surface to `target`.
    ///
    /// The search runs over the surface domain, or over its intersection
    /// with `restriction` when one is given. Without a `seed` a coarse
    /// grid scan picks the starting parameters. Newton refinement of the
    /// squared distance follows, with parameters clamped into the domain;
    /// a non-converged search returns the best point seen, tagged.
    fn closest_point(
        &self,
        target: &Point,
        seed: Option<(f64, f64)>,
        restriction: Option<&RectDomain>,
    ) -> SurfacePoint {
        assert_eq!(self.dim(), target.dim(), "dimension mismatch");
        let domain = match restriction {
            Some(r) => self.domain().intersect(r),
            None => self.domain(),
        };

        let (mut u, mut v) = match seed {
            Some((su, sv)) => domain.clamp(su, sv),
            None => {
                let mut best = (domain.umin, domain.vmin);
                let mut best_dist2 = f64::INFINITY;
                for i in 0..=SEED_SAMPLES {
                    for j in 0..=SEED_SAMPLES {
                        let gu = domain.umin
                            + (domain.umax - domain.umin) * (i as f64) / (SEED_SAMPLES as f64);
                        let gv = domain.vmin
                            + (domain.vmax - domain.vmin) * (j as f64) / (SEED_SAMPLES as f64);
                        let dist2 = self.eval(gu, gv).distance_squared(target);
                        if dist2 < best_dist2 {
                            best = (gu, gv);
                            best_dist2 = dist2;
                        }
                    }
                }
                best
            }
        };

        let u_span = (domain.umax - domain.umin).max(f64::EPSILON);
        let v_span = (domain.vmax - domain.vmin).max(f64::EPSILON);

        let mut best = self.eval(u, v);
        let mut best_dist2 = best.distance_squared(target);
        let (mut best_u, mut best_v) = (u, v);
        let mut converged = false;

        for _ in 0..MAX_ITERATIONS {
            let ders = self.eval_derivs(u, v, 2);
            let diff = &ders[0] - target;
            let dist2 = diff.length_squared();
            if dist2 < best_dist2 {
                best = ders[0].clone();
                best_dist2 = dist2;
                best_u = u;
                best_v = v;
            }

            // Stationarity of the squared distance in both parameters.
            let gu = diff.dot(&ders[1]);
            let gv = diff.dot(&ders[2]);
            let scale = diff.length() * ders[1].length().max(ders[2].length());
            if gu.abs().max(gv.abs()) <= RESIDUAL_TOL * scale.max(1.0) {
                converged = true;
                break;
            }

            // Hessian of the squared distance (halved).
            let huu = ders[1].length_squared() + diff.dot(&ders[3]);
            let huv = ders[1].dot(&ders[2]) + diff.dot(&ders[4]);
            let hvv = ders[2].length_squared() + diff.dot(&ders[5]);
            let det = huu * hvv - huv * huv;
            if det == 0.0 {
                break;
            }
            let du = -(hvv * gu - huv * gv) / det;
            let dv = -(huu * gv - huv * gu) / det;

            let (u_next, v_next) = domain.clamp(u + du, v + dv);
            let step_u = u_next - u;
            let step_v = v_next - v;
            u = u_next;
            v = v_next;
            if step_u.abs() <= STEP_TOL * u_span && step_v.abs() <= STEP_TOL * v_span {
                converged = true;
                break;
            }
        }

        let point = self.eval(u, v);
        let dist2 = point.distance_squared(target);
        if dist2 < best_dist2 {
            best = point;
            best_dist2 = dist2;
            best_u = u;
            best_v = v;
        }

        if !converged {
            warn!(
                "surface closest point search did not converge; \
                 returning best effort at ({best_u}, {best_v})"
            );
        }
        SurfacePoint {
            u: best_u,
            v: best_v,
            point: best,
            distance: best_dist2.sqrt(),
            converged,
        }
    }
}

/// A planar surface patch: an origin swept by two spanning directions over
/// a rectangular domain.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Plane {
    origin: Point,
    u_dir: Point,
    v_dir: Point,
    domain: RectDomain,
}

impl Plane {
    /// Create a plane patch `origin + u * u_dir + v * v_dir`.
    ///
    /// # Panics
    ///
    /// Panics if the origin and direction dimensions disagree.
    pub fn new(origin: Point, u_dir: Point, v_dir: Point, domain: RectDomain) -> Plane {
        assert_eq!(origin.dim(), u_dir.dim(), "dimension mismatch");
        assert_eq!(origin.dim(), v_dir.dim(), "dimension mismatch");
        Plane {
            origin,
            u_dir,
            v_dir,
            domain,
        }
    }
}

impl ParamSurface for Plane {
    fn dim(&self) -> usize {
        self.origin.dim()
    }

    fn domain(&self) -> RectDomain {
        self.domain
    }

    fn eval(&self, u: f64, v: f64) -> Point {
        &self.origin + &(&self.u_dir * u + &self.v_dir * v)
    }

    fn eval_derivs(&self, u: f64, v: f64, order: usize) -> Vec<Point> {
        let mut result = Vec::with_capacity((order + 1) * (order + 2) / 2);
        result.push(self.eval(u, v));
        if order >= 1 {
            result.push(self.u_dir.clone());
            result.push(self.v_dir.clone());
        }
        for o in 2..=order {
            for _ in 0..=o {
                result.push(Point::zeros(self.dim()));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_plane() -> Plane {
        Plane::new(
            Point::new(&[0.0, 0.0, 0.0]),
            Point::new(&[1.0, 0.0, 0.0]),
            Point::new(&[0.0, 1.0, 0.0]),
            RectDomain::new(0.0, 10.0, 0.0, 10.0),
        )
    }

    #[test]
    fn domain_operations() {
        let d = RectDomain::new(0.0, 2.0, -1.0, 1.0);
        assert!(d.contains(1.0, 0.0));
        assert!(!d.contains(3.0, 0.0));
        assert_eq!(d.clamp(5.0, -4.0), (2.0, -1.0));
        let e = RectDomain::new(1.0, 4.0, -2.0, 0.5);
        assert_eq!(d.intersect(&e), RectDomain::new(1.0, 2.0, -1.0, 0.5));
    }

    #[test]
    fn plane_closest_point_is_orthogonal_projection() {
        let plane = xy_plane();
        let hit = plane.closest_point(&Point::new(&[3.0, 4.0, 5.0]), None, None);
        assert!(hit.converged);
        assert!((hit.u - 3.0).abs() < 1e-9);
        assert!((hit.v - 4.0).abs() < 1e-9);
        assert!((hit.distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn restriction_clamps_the_search() {
        let plane = xy_plane();
        let restriction = RectDomain::new(0.0, 2.0, 0.0, 2.0);
        let hit = plane.closest_point(&Point::new(&[5.0, 5.0, 0.0]), None, Some(&restriction));
        assert!((hit.u - 2.0).abs() < 1e-9);
        assert!((hit.v - 2.0).abs() < 1e-9);
    }

    #[test]
    fn seed_is_honored() {
        let plane = xy_plane();
        let target = Point::new(&[7.5, 2.5, -1.0]);
        let seeded = plane.closest_point(&target, Some((7.0, 2.0)), None);
        assert!(seeded.converged);
        assert!((seeded.u - 7.5).abs() < 1e-9 && (seeded.v - 2.5).abs() < 1e-9);
    }
}
