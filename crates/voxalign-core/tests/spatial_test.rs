//! Integration tests for spatial primitives and grid regions.

use voxalign_core::{Direction, GridRegion, Point, Spacing, Vector};

#[test]
fn test_point_vector_algebra_round_trip() {
    let a = Point::new([1.0, 2.0, 3.0]);
    let b = Point::new([4.0, 6.0, 8.0]);
    let displacement = b - a;
    assert_eq!(displacement, Vector::new([3.0, 4.0, 5.0]));
    assert_eq!(a + displacement, b);
    assert!((displacement.norm() - 50.0f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_rotated_axes_map_vectors() {
    // 90 degree rotation about the z axis
    let rotation = Direction::from_columns([
        [0.0, 1.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0],
    ]);
    assert!(rotation.is_orthogonal());
    let mapped = rotation * Vector::new([1.0, 0.0, 0.0]);
    assert!((mapped - Vector::new([0.0, 1.0, 0.0])).norm() < 1e-12);
}

#[test]
fn test_region_walks_first_axis_fastest() {
    let region = GridRegion::from_size([2, 2, 2]);
    let mut offsets = Vec::new();
    for z in 0..2 {
        for y in 0..2 {
            for x in 0..2 {
                offsets.push(region.linear_offset([x, y, z]).unwrap());
            }
        }
    }
    assert_eq!(offsets, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_spacing_serde_round_trip() {
    let spacing = Spacing::new([1.5, 0.5]);
    let json = serde_json::to_string(&spacing).unwrap();
    let back: Spacing<2> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spacing);
}
