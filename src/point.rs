//! A point or vector of dynamic dimension.

use std::fmt;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign,
};

use smallvec::{smallvec, SmallVec};

/// A point in space, of dynamic dimension.
///
/// The same type doubles as a vector; the distinction is carried by usage,
/// not by the type system. One-dimensional points (scalar-valued curves),
/// two-dimensional parameter-domain points and three-dimensional space
/// points all occur in the same fitting problem, so the dimension is a
/// runtime property. Points of dimension up to three are stored inline.
///
/// Componentwise arithmetic asserts that both operands have the same
/// dimension.
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    coords: SmallVec<[f64; 3]>,
}

impl Point {
    /// Create a new `Point` with the provided coordinates.
    #[inline]
    pub fn new(coords: &[f64]) -> Point {
        Point {
            coords: SmallVec::from_slice(coords),
        }
    }

    /// The origin of a space of the given dimension.
    #[inline]
    pub fn zeros(dim: usize) -> Point {
        Point {
            coords: smallvec![0.0; dim],
        }
    }

    /// The dimension of the space this point lives in.
    #[inline]
    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    /// The coordinates as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.coords
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Point) -> f64 {
        assert_eq!(self.dim(), other.dim(), "dimension mismatch");
        self.coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Cross product of two three-dimensional points.
    ///
    /// # Panics
    ///
    /// Panics unless both points are three-dimensional.
    pub fn cross(&self, other: &Point) -> Point {
        assert_eq!(self.dim(), 3, "cross product requires dimension 3");
        assert_eq!(other.dim(), 3, "cross product requires dimension 3");
        let (a, b) = (&self.coords, &other.coords);
        Point::new(&[
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ])
    }

    /// Euclidean length, interpreting the point as a vector.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Squared Euclidean length.
    #[inline]
    pub fn length_squared(&self) -> f64 {
        self.coords.iter().map(|a| a * a).sum()
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Squared Euclidean distance to another point.
    #[inline]
    pub fn distance_squared(&self, other: &Point) -> f64 {
        assert_eq!(self.dim(), other.dim(), "dimension mismatch");
        self.coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Linearly interpolate between two points.
    #[inline]
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        self + &((other - self) * t)
    }

    /// Determine the midpoint of two points.
    #[inline]
    pub fn midpoint(&self, other: &Point) -> Point {
        self.lerp(other, 0.5)
    }

    /// Is every coordinate of this point finite?
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|a| a.is_finite())
    }
}

impl Index<usize> for Point {
    type Output = f64;

    #[inline]
    fn index(&self, i: usize) -> &f64 {
        &self.coords[i]
    }
}

impl IndexMut<usize> for Point {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.coords[i]
    }
}

impl<const N: usize> From<[f64; N]> for Point {
    #[inline]
    fn from(coords: [f64; N]) -> Point {
        Point::new(&coords)
    }
}

impl From<&[f64]> for Point {
    #[inline]
    fn from(coords: &[f64]) -> Point {
        Point::new(coords)
    }
}

impl FromIterator<f64> for Point {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Point {
        Point {
            coords: iter.into_iter().collect(),
        }
    }
}

// Componentwise binary operators, for owned and borrowed operands alike.
macro_rules! impl_pointwise {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Point> for &Point {
            type Output = Point;

            fn $method(self, other: &Point) -> Point {
                assert_eq!(self.dim(), other.dim(), "dimension mismatch");
                self.coords
                    .iter()
                    .zip(&other.coords)
                    .map(|(a, b)| a $op b)
                    .collect()
            }
        }

        impl $trait<Point> for &Point {
            type Output = Point;

            #[inline]
            fn $method(self, other: Point) -> Point {
                self $op &other
            }
        }

        impl $trait<&Point> for Point {
            type Output = Point;

            #[inline]
            fn $method(self, other: &Point) -> Point {
                &self $op other
            }
        }

        impl $trait for Point {
            type Output = Point;

            #[inline]
            fn $method(self, other: Point) -> Point {
                &self $op &other
            }
        }
    };
}

impl_pointwise!(Add, add, +);
impl_pointwise!(Sub, sub, -);

impl AddAssign<&Point> for Point {
    fn add_assign(&mut self, other: &Point) {
        assert_eq!(self.dim(), other.dim(), "dimension mismatch");
        for (a, b) in self.coords.iter_mut().zip(&other.coords) {
            *a += b;
        }
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, other: Point) {
        *self += &other;
    }
}

impl SubAssign<&Point> for Point {
    fn sub_assign(&mut self, other: &Point) {
        assert_eq!(self.dim(), other.dim(), "dimension mismatch");
        for (a, b) in self.coords.iter_mut().zip(&other.coords) {
            *a -= b;
        }
    }
}

impl SubAssign for Point {
    #[inline]
    fn sub_assign(&mut self, other: Point) {
        *self -= &other;
    }
}

impl Mul<f64> for &Point {
    type Output = Point;

    fn mul(self, factor: f64) -> Point {
        self.coords.iter().map(|a| a * factor).collect()
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    #[inline]
    fn mul(self, factor: f64) -> Point {
        &self * factor
    }
}

impl Mul<&Point> for f64 {
    type Output = Point;

    #[inline]
    fn mul(self, point: &Point) -> Point {
        point * self
    }
}

impl Mul<Point> for f64 {
    type Output = Point;

    #[inline]
    fn mul(self, point: Point) -> Point {
        &point * self
    }
}

impl MulAssign<f64> for Point {
    fn mul_assign(&mut self, factor: f64) {
        for a in self.coords.iter_mut() {
            *a *= factor;
        }
    }
}

impl Div<f64> for &Point {
    type Output = Point;

    #[inline]
    fn div(self, divisor: f64) -> Point {
        self * divisor.recip()
    }
}

impl Div<f64> for Point {
    type Output = Point;

    #[inline]
    fn div(self, divisor: f64) -> Point {
        &self * divisor.recip()
    }
}

impl DivAssign<f64> for Point {
    #[inline]
    fn div_assign(&mut self, divisor: f64) {
        *self *= divisor.recip();
    }
}

impl Neg for &Point {
    type Output = Point;

    fn neg(self) -> Point {
        self.coords.iter().map(|a| -a).collect()
    }
}

impl Neg for Point {
    type Output = Point;

    #[inline]
    fn neg(self) -> Point {
        -&self
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, a) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Point {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "(")?;
        for (i, a) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(formatter, ", ")?;
            }
            fmt::Display::fmt(a, formatter)?;
        }
        write!(formatter, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(&[1.0, 2.0, 3.0]);
        let b = Point::new(&[-1.0, 0.5, 2.0]);
        assert_eq!(&a + &b, Point::new(&[0.0, 2.5, 5.0]));
        assert_eq!(&a - &b, Point::new(&[2.0, 1.5, 1.0]));
        assert_eq!(&a * 2.0, Point::new(&[2.0, 4.0, 6.0]));
        assert_eq!(2.0 * &a, Point::new(&[2.0, 4.0, 6.0]));
        assert_eq!(a.clone() / 2.0, Point::new(&[0.5, 1.0, 1.5]));
        assert_eq!(-a, Point::new(&[-1.0, -2.0, -3.0]));
    }

    #[test]
    fn dot_and_cross() {
        let x = Point::new(&[1.0, 0.0, 0.0]);
        let y = Point::new(&[0.0, 1.0, 0.0]);
        assert_eq!(x.dot(&y), 0.0);
        assert_eq!(x.cross(&y), Point::new(&[0.0, 0.0, 1.0]));
        assert_eq!(y.cross(&x), Point::new(&[0.0, 0.0, -1.0]));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn distance() {
        let p1 = Point::new(&[0.0, 10.0]);
        let p2 = Point::new(&[0.0, 5.0]);
        assert_eq!(p1.distance(&p2), 5.0);

        let p1 = Point::new(&[-11.0, 1.0]);
        let p2 = Point::new(&[-7.0, -2.0]);
        assert_eq!(p1.distance(&p2), 5.0);
    }

    #[test]
    fn lerp_endpoints() {
        let a = Point::new(&[1.0, 1.0]);
        let b = Point::new(&[3.0, 5.0]);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.midpoint(&b), Point::new(&[2.0, 3.0]));
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn mismatched_dimensions() {
        let _ = Point::new(&[1.0, 2.0]) + Point::new(&[1.0, 2.0, 3.0]);
    }

    #[test]
    fn display() {
        let p = Point::new(&[0.12345, 9.87654]);
        assert_eq!(format!("{p}"), "(0.12345, 9.87654)");
    }
}
