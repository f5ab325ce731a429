//! Virtual domain: the reference grid on which metric evaluation happens.
//!
//! The virtual domain fixes the coordinate system and resolution at which
//! similarity is evaluated, independent of either input dataset. Metrics with
//! local-support transforms additionally use it to map grid indices to
//! offsets into their linearly stored parameter arrays.

use voxalign_core::{Direction, GridRegion, Point, Spacing, Vector};

use crate::error::{RegistrationError, Result};

/// Reference grid definition: spacing, origin, orientation and region.
///
/// Immutable once constructed; replace the whole domain between runs to
/// change the evaluation geometry.
#[derive(Debug, Clone)]
pub struct VirtualDomain<const D: usize> {
    spacing: Spacing<D>,
    origin: Point<D>,
    direction: Direction<D>,
    inverse_direction: Direction<D>,
    region: GridRegion<D>,
}

impl<const D: usize> VirtualDomain<D> {
    /// Create a virtual domain.
    ///
    /// Fails when any spacing component is non-positive or the direction
    /// matrix is singular.
    pub fn new(
        spacing: Spacing<D>,
        origin: Point<D>,
        direction: Direction<D>,
        region: GridRegion<D>,
    ) -> Result<Self> {
        if !spacing.is_valid() {
            return Err(RegistrationError::domain(format!(
                "virtual domain spacing must be strictly positive, got {:?}",
                spacing.to_vec()
            )));
        }
        let inverse_direction = direction
            .try_inverse()
            .ok_or_else(|| RegistrationError::domain("virtual domain direction is singular"))?;
        Ok(Self {
            spacing,
            origin,
            direction,
            inverse_direction,
            region,
        })
    }

    /// Axis-aligned domain with unit spacing and zero origin.
    pub fn from_region(region: GridRegion<D>) -> Self {
        Self {
            spacing: Spacing::uniform(1.0),
            origin: Point::origin(),
            direction: Direction::identity(),
            inverse_direction: Direction::identity(),
            region,
        }
    }

    /// Grid spacing in physical units.
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Physical position of the grid origin (index zero).
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Orientation of the grid axes in physical space.
    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Evaluation region of the grid.
    pub fn region(&self) -> &GridRegion<D> {
        &self.region
    }

    /// Physical position of a grid index.
    pub fn index_to_point(&self, index: [i64; D]) -> Point<D> {
        let mut scaled = Vector::zeros();
        for d in 0..D {
            scaled[d] = index[d] as f64 * self.spacing[d];
        }
        self.origin + self.direction * scaled
    }

    /// Continuous grid index of a physical point.
    pub fn point_to_continuous_index(&self, point: &Point<D>) -> [f64; D] {
        let local = self.inverse_direction * (*point - self.origin);
        let mut index = [0.0; D];
        for d in 0..D {
            index[d] = local[d] / self.spacing[d];
        }
        index
    }

    /// Nearest grid index of a physical point.
    pub fn point_to_index(&self, point: &Point<D>) -> [i64; D] {
        let continuous = self.point_to_continuous_index(point);
        let mut index = [0i64; D];
        for d in 0..D {
            index[d] = continuous[d].round() as i64;
        }
        index
    }

    /// Whether the nearest grid index of `point` lies inside the region.
    pub fn is_inside_point(&self, point: &Point<D>) -> bool {
        self.region.contains(self.point_to_index(point))
    }

    /// Whether `index` lies inside the region.
    pub fn is_inside_index(&self, index: [i64; D]) -> bool {
        self.region.contains(index)
    }

    /// Offset into a linearly stored parameter array for a local-support
    /// transform: the linear region offset of `index`, scaled by the number
    /// of local parameters.
    pub fn parameter_offset_from_index(
        &self,
        index: [i64; D],
        num_local_parameters: usize,
    ) -> Result<usize> {
        let offset = self.region.linear_offset(index).ok_or_else(|| {
            RegistrationError::domain(format!(
                "index {index:?} lies outside the virtual region"
            ))
        })?;
        Ok(offset * num_local_parameters)
    }

    /// Parameter offset of the grid index nearest to a physical point.
    pub fn parameter_offset_from_point(
        &self,
        point: &Point<D>,
        num_local_parameters: usize,
    ) -> Result<usize> {
        self.parameter_offset_from_index(self.point_to_index(point), num_local_parameters)
    }
}
