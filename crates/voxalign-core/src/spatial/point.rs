//! Point type for representing positions in physical space.

use nalgebra::Point as NaPoint;
use serde::{Deserialize, Serialize};

use super::Vector;

/// A position in D-dimensional physical space.
///
/// Points represent locations in the physical coordinate system: domain
/// origins, sample positions, transformed coordinates. Displacements between
/// points are [`Vector`]s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    /// Create a new point from coordinates.
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    /// Create a point at the origin.
    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Create a new point from a slice of coordinates.
    ///
    /// Panics when the slice length does not match the dimension.
    pub fn from_slice(coords: &[f64]) -> Self {
        assert!(
            coords.len() == D,
            "coordinate slice length must match dimension"
        );
        let mut point = Self::origin();
        point.0.coords.copy_from_slice(coords);
        point
    }

    /// Copy the coordinates into a `Vec`.
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.coords.iter().copied().collect()
    }

    /// Get the inner nalgebra point.
    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }

    /// Get mutable reference to the inner nalgebra point.
    pub fn inner_mut(&mut self) -> &mut NaPoint<f64, D> {
        &mut self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0.coords - other.0.coords)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 + vector.0)
    }
}

impl<const D: usize> std::ops::Sub<Vector<D>> for Point<D> {
    type Output = Self;

    fn sub(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 - vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Point2 = Point<2>;
    type Vector2 = Vector<2>;

    #[test]
    fn test_point_creation() {
        let p = Point2::new([1.0, 2.0]);
        assert_eq!(p[0], 1.0);
        assert_eq!(p[1], 2.0);
    }

    #[test]
    fn test_point_origin() {
        let p = Point2::origin();
        assert_eq!(p, Point2::new([0.0, 0.0]));
    }

    #[test]
    fn test_point_difference_is_vector() {
        let p1 = Point2::new([5.0, 5.0]);
        let p2 = Point2::new([2.0, 3.0]);
        assert_eq!(p1 - p2, Vector2::new([3.0, 2.0]));
    }

    #[test]
    fn test_point_vector_offset() {
        let p = Point2::new([1.0, 2.0]);
        let v = Vector2::new([4.0, 5.0]);
        assert_eq!(p + v, Point2::new([5.0, 7.0]));
        assert_eq!((p + v) - v, p);
    }
}
