//! Direction type for grid orientation in physical space.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

use super::Vector;

/// Orientation of grid axes in physical space.
///
/// A D×D matrix whose column `i` is the physical-space direction of the
/// i-th grid axis. Thin wrapper around nalgebra's `SMatrix`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    /// Create an identity direction matrix (axes aligned with physical axes).
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Create a direction from a column-major array of axis vectors.
    pub fn from_columns(columns: [[f64; D]; D]) -> Self {
        let mut m = SMatrix::<f64, D, D>::zeros();
        for (c, column) in columns.iter().enumerate() {
            for (r, value) in column.iter().enumerate() {
                m[(r, c)] = *value;
            }
        }
        Self(m)
    }

    /// Check whether the matrix is orthogonal within `1e-6`.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        let identity = SMatrix::<f64, D, D>::identity();
        (0..D).all(|i| (0..D).all(|j| (product[(i, j)] - identity[(i, j)]).abs() < 1e-6))
    }

    /// Determinant of the direction matrix.
    pub fn determinant(&self) -> f64
    where
        nalgebra::Const<D>:
            nalgebra::DimMin<nalgebra::Const<D>, Output = nalgebra::Const<D>>,
    {
        self.0.determinant()
    }

    /// Try to invert the direction matrix. `None` when singular.
    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Physical-space direction of the given grid axis.
    pub fn axis_direction(&self, axis: usize) -> Vector<D> {
        let mut v = Vector::zeros();
        for row in 0..D {
            v[row] = self.0[(row, axis)];
        }
        v
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul for Direction<D> {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        Self(self.0 * other.0)
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Direction2 = Direction<2>;
    type Vector2 = Vector<2>;

    #[test]
    fn test_direction_identity() {
        let d = Direction2::identity();
        assert_eq!(d[(0, 0)], 1.0);
        assert_eq!(d[(1, 1)], 1.0);
        assert_eq!(d[(0, 1)], 0.0);
        assert!(d.is_orthogonal());
    }

    #[test]
    fn test_direction_rotation_is_orthogonal() {
        // 90 degree rotation
        let rot = Direction2::from_columns([[0.0, 1.0], [-1.0, 0.0]]);
        assert!(rot.is_orthogonal());
        assert!((rot.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_direction_inverse() {
        let rot = Direction2::from_columns([[0.0, 1.0], [-1.0, 0.0]]);
        let inv = rot.try_inverse().unwrap();
        let v = Vector2::new([1.0, 0.0]);
        let round_trip = inv * (rot * v);
        assert!((round_trip - v).norm() < 1e-12);
    }

    #[test]
    fn test_direction_axis() {
        let d = Direction2::from_columns([[0.0, 1.0], [-1.0, 0.0]]);
        assert_eq!(d.axis_direction(0), Vector2::new([0.0, 1.0]));
        assert_eq!(d.axis_direction(1), Vector2::new([-1.0, 0.0]));
    }
}
