//! Meshes shared by unit tests.

use nalgebra::Point3;

use crate::types::MeshObject;

pub(crate) const CUBE_VERTICES: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// Outward-facing triangles, two per side, sides in -z, +z, -y, +x, +y, -x order.
pub(crate) const CUBE_TRIANGLES: [[u32; 3]; 12] = [
    [0, 2, 1],
    [0, 3, 2],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [1, 2, 6],
    [1, 6, 5],
    [2, 3, 7],
    [2, 7, 6],
    [3, 0, 4],
    [3, 4, 7],
];

pub(crate) fn expand(vertices: &[[f64; 3]], triangles: &[[u32; 3]]) -> Vec<Point3<f64>> {
    triangles
        .iter()
        .flat_map(|t| t.iter().map(|&i| Point3::from(vertices[i as usize])))
        .collect()
}

/// Unit cube as a non-indexed mesh of 12 triangles.
pub(crate) fn create_test_cube() -> MeshObject {
    MeshObject::new("Cube", expand(&CUBE_VERTICES, &CUBE_TRIANGLES)).unwrap()
}

/// A flat 2x1 strip of four coplanar triangles in the z=0 plane, plus one
/// triangle folded up along the strip's far edge.
pub(crate) fn create_folded_strip() -> MeshObject {
    let vertices = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [2.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [2.0, 1.0, 0.0],
        [2.0, 0.5, 1.0],
    ];
    let triangles = [[0, 1, 4], [0, 4, 3], [1, 2, 5], [1, 5, 4], [2, 6, 5]];
    MeshObject::new("Strip", expand(&vertices, &triangles)).unwrap()
}
