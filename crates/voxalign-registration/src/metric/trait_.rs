//! Capability traits for similarity metrics.
//!
//! The optimizer never sees images, meshes or point sets: it drives any
//! object implementing [`CostMetric`], the dimension-free capability set.
//! Metrics that evaluate over a spatial grid additionally implement
//! [`ObjectMetric`], which adds virtual-domain bookkeeping.
//!
//! Sign convention: metrics return a value that optimization *decreases*,
//! and a derivative that improves the objective when *added* to the
//! parameters (after the optimizer applies scales and a learning rate).

use nalgebra::DVector;
use voxalign_core::{Direction, GridRegion, Point, Spacing};

use crate::domain::VirtualDomain;
use crate::error::{RegistrationError, Result};

/// Dimension-free capability set of a similarity metric.
///
/// The metric owns the moving transform; parameter reads and updates go
/// through it. Implementations decide what "parameters" mean (matrix
/// entries, displacement vectors, spline coefficients).
pub trait CostMetric: Send {
    /// Verify required inputs and prepare internal state.
    ///
    /// Fails when the metric is missing a transform, a domain, or input
    /// data it needs to evaluate.
    fn initialize(&mut self) -> Result<()>;

    /// Total number of free parameters of the moving transform.
    fn number_of_parameters(&self) -> usize;

    /// Number of parameters per spatial location for local-support
    /// transforms; equals [`number_of_parameters`](Self::number_of_parameters)
    /// for globally parameterized transforms.
    fn number_of_local_parameters(&self) -> usize {
        self.number_of_parameters()
    }

    /// View of the current transform parameters.
    fn parameters(&self) -> &[f64];

    /// Overwrite the transform parameters.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Evaluate the objective and its derivative at the current parameters.
    fn value_and_derivative(&mut self) -> Result<(f64, DVector<f64>)>;

    /// True when parameters are indexed per spatial location, requiring
    /// block-strided scale application.
    fn has_local_support(&self) -> bool {
        false
    }

    /// Apply `parameters += factor * derivative`, or the domain-specific
    /// equivalent for constrained transforms.
    fn update_transform_parameters(&mut self, derivative: &DVector<f64>, factor: f64)
        -> Result<()>;

    /// Number of evaluation points that contributed to the most recent
    /// value/derivative computation. Zero signals a degraded evaluation.
    fn number_of_valid_points(&self) -> usize;
}

/// Metric evaluated over a D-dimensional virtual grid.
///
/// Accessors report identity spacing/direction and a zero origin while no
/// domain is set; retrieving the region without a domain is an error.
pub trait ObjectMetric<const D: usize>: CostMetric {
    /// The virtual domain, when one has been assigned or synthesized.
    fn virtual_domain(&self) -> Option<&VirtualDomain<D>>;

    /// Assign the virtual domain. Immutable during a run; replace between
    /// runs only.
    fn set_virtual_domain(&mut self, domain: VirtualDomain<D>);

    /// True when every virtual-domain point corresponds to evaluable data
    /// (dense image metrics); false when only some do (point-set metrics).
    fn supports_arbitrary_virtual_domain_samples(&self) -> bool;

    /// Virtual grid spacing; unit spacing when no domain is set.
    fn virtual_spacing(&self) -> Spacing<D> {
        self.virtual_domain()
            .map(|d| *d.spacing())
            .unwrap_or_else(|| Spacing::uniform(1.0))
    }

    /// Virtual grid origin; zero when no domain is set.
    fn virtual_origin(&self) -> Point<D> {
        self.virtual_domain()
            .map(|d| *d.origin())
            .unwrap_or_else(Point::origin)
    }

    /// Virtual grid orientation; identity when no domain is set.
    fn virtual_direction(&self) -> Direction<D> {
        self.virtual_domain()
            .map(|d| *d.direction())
            .unwrap_or_else(Direction::identity)
    }

    /// Virtual evaluation region. Unlike the other accessors there is no
    /// meaningful default, so an unset domain is an error.
    fn virtual_region(&self) -> Result<&GridRegion<D>> {
        self.virtual_domain()
            .map(|d| d.region())
            .ok_or_else(|| RegistrationError::domain("no virtual domain has been set"))
    }

    /// Whether a physical point falls inside the virtual domain. Always
    /// true when no domain is set, so point-set metrics can run with an
    /// implicit domain.
    fn is_inside_virtual_domain_point(&self, point: &Point<D>) -> bool {
        self.virtual_domain()
            .map(|d| d.is_inside_point(point))
            .unwrap_or(true)
    }

    /// Whether a grid index falls inside the virtual domain.
    fn is_inside_virtual_domain_index(&self, index: [i64; D]) -> bool {
        self.virtual_domain()
            .map(|d| d.is_inside_index(index))
            .unwrap_or(true)
    }

    /// Offset into linearly stored local-support parameters for a virtual
    /// index.
    fn parameter_offset_from_virtual_index(
        &self,
        index: [i64; D],
        num_local_parameters: usize,
    ) -> Result<usize> {
        self.virtual_domain()
            .ok_or_else(|| RegistrationError::domain("no virtual domain has been set"))?
            .parameter_offset_from_index(index, num_local_parameters)
    }

    /// Offset into linearly stored local-support parameters for a physical
    /// point.
    fn parameter_offset_from_virtual_point(
        &self,
        point: &Point<D>,
        num_local_parameters: usize,
    ) -> Result<usize> {
        self.virtual_domain()
            .ok_or_else(|| RegistrationError::domain("no virtual domain has been set"))?
            .parameter_offset_from_point(point, num_local_parameters)
    }
}
