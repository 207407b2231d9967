//! Map in-memory faces back to `<triangle>` elements of the model.
//!
//! Coordinates in the file may carry a different decimal precision than the
//! positions the caller painted on, and a file may repeat a position across
//! several vertices. For each corner of a face every file vertex within
//! [`POSITION_TOLERANCE`] is a candidate. A combination of candidates that
//! names an existing triangle with the same winding (the same corners in the
//! same cyclic order) is a match. Only when no triangle has that winding does
//! a triangle over the same corners in any order count, so the two sides of
//! a double-sided sheet resolve to their own triangles. When several
//! triangles match, the one that appears first in the document wins.
//!
//! A spatial hash over the vertices and maps from vertex-index triples to
//! triangles keep each lookup close to constant time.

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::error::{PaintError, PaintResult};
use crate::model::ModelObject;
use crate::types::{Face, POSITION_TOLERANCE, same_position};

type Cell = (i64, i64, i64);

fn pos_to_cell(p: &Point3<f64>, cell_size: f64) -> Cell {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

fn sorted(mut indices: [u32; 3]) -> [u32; 3] {
    indices.sort_unstable();
    indices
}

/// Smallest of the three rotations; equal for triangles with the same winding.
fn winding([a, b, c]: [u32; 3]) -> [u32; 3] {
    [[a, b, c], [b, c, a], [c, a, b]]
        .into_iter()
        .min()
        .unwrap_or([a, b, c])
}

/// Lookup structure over one object's vertices and triangles.
pub struct TriangleLocator<'a> {
    vertices: &'a [Point3<f64>],
    grid: HashMap<Cell, Vec<u32>>,
    by_winding: HashMap<[u32; 3], usize>,
    by_corners: HashMap<[u32; 3], usize>,
    cell_size: f64,
}

impl<'a> TriangleLocator<'a> {
    /// Index a vertex list and the triangles over it, in document order.
    pub fn new(vertices: &'a [Point3<f64>], triangles: impl IntoIterator<Item = [u32; 3]>) -> Self {
        let cell_size = POSITION_TOLERANCE * 2.0;

        let mut grid: HashMap<Cell, Vec<u32>> = HashMap::new();
        for (idx, vertex) in vertices.iter().enumerate() {
            grid.entry(pos_to_cell(vertex, cell_size))
                .or_default()
                .push(idx as u32);
        }

        let mut by_winding = HashMap::new();
        let mut by_corners = HashMap::new();
        for (t, indices) in triangles.into_iter().enumerate() {
            by_winding.entry(winding(indices)).or_insert(t);
            by_corners.entry(sorted(indices)).or_insert(t);
        }

        Self {
            vertices,
            grid,
            by_winding,
            by_corners,
            cell_size,
        }
    }

    /// Index the mesh of a model object.
    pub fn for_object(object: &'a ModelObject) -> Self {
        Self::new(&object.vertices, object.triangles.iter().map(|t| t.indices))
    }

    /// File vertices within tolerance of `target`, in ascending index order.
    pub fn candidates(&self, target: &Point3<f64>) -> Vec<u32> {
        let cell = pos_to_cell(target, self.cell_size);
        let mut found = Vec::new();

        // Check 3x3x3 neighborhood
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = (
                        cell.0.saturating_add(dx),
                        cell.1.saturating_add(dy),
                        cell.2.saturating_add(dz),
                    );
                    if let Some(indices) = self.grid.get(&neighbor) {
                        found.extend(
                            indices
                                .iter()
                                .copied()
                                .filter(|&i| same_position(&self.vertices[i as usize], target)),
                        );
                    }
                }
            }
        }

        found.sort_unstable();
        found.dedup();
        found
    }

    /// Index of the first triangle matching the face, preferring triangles
    /// wound the same way.
    pub fn find(&self, face: &Face) -> Option<usize> {
        let first = self.candidates(&face.v1);
        if first.is_empty() {
            return None;
        }
        let second = self.candidates(&face.v2);
        if second.is_empty() {
            return None;
        }
        let third = self.candidates(&face.v3);

        let lookup = |table: &HashMap<[u32; 3], usize>, key: fn([u32; 3]) -> [u32; 3]| {
            let mut best: Option<usize> = None;
            for &a in &first {
                for &b in &second {
                    for &c in &third {
                        if let Some(&t) = table.get(&key([a, b, c])) {
                            best = Some(best.map_or(t, |current| current.min(t)));
                        }
                    }
                }
            }
            best
        };

        lookup(&self.by_winding, winding).or_else(|| lookup(&self.by_corners, sorted))
    }
}

/// Find the triangle of `object` that corresponds to an in-memory face.
///
/// Builds a fresh [`TriangleLocator`]; callers resolving many faces of one
/// object should build the locator once instead.
pub fn find_triangle_index(object: &ModelObject, face: &Face) -> PaintResult<usize> {
    TriangleLocator::for_object(object)
        .find(face)
        .ok_or_else(|| PaintError::correspondence(object.display_name(), face.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDocument;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    fn quad_vertices() -> Vec<Point3<f64>> {
        vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_exact_match() {
        let vertices = quad_vertices();
        let locator = TriangleLocator::new(&vertices, [[0, 1, 2], [0, 2, 3]]);

        let face = Face::new(0, vertices[0], vertices[2], vertices[3]);
        assert_eq!(locator.find(&face), Some(1));
    }

    #[test]
    fn test_rotated_and_reversed_order_match() {
        let vertices = quad_vertices();
        let locator = TriangleLocator::new(&vertices, [[0, 1, 2], [0, 2, 3]]);

        let rotated = Face::new(7, vertices[2], vertices[3], vertices[0]);
        assert_eq!(locator.find(&rotated), Some(1));
        let reversed = Face::new(7, vertices[2], vertices[1], vertices[0]);
        assert_eq!(locator.find(&reversed), Some(0));
    }

    #[test]
    fn test_within_tolerance() {
        let vertices = quad_vertices();
        let locator = TriangleLocator::new(&vertices, [[0, 1, 2]]);

        let face = Face::new(0, p(0.00004, -0.00009, 0.0), p(0.99995, 0.0, 0.0), p(1.0, 1.00009, 0.0));
        assert_eq!(locator.find(&face), Some(0));

        let off = Face::new(0, p(0.0002, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0));
        assert_eq!(locator.find(&off), None);
    }

    #[test]
    fn test_double_sided_sheet() {
        // Front and back share corners but are wound opposite ways.
        let vertices = quad_vertices();
        let locator = TriangleLocator::new(&vertices, [[0, 1, 2], [0, 2, 1]]);

        let front = Face::new(0, vertices[0], vertices[1], vertices[2]);
        let back = Face::new(1, vertices[0], vertices[2], vertices[1]);
        assert_eq!(locator.find(&front), Some(0));
        assert_eq!(locator.find(&back), Some(1));

        let back_rotated = Face::new(1, vertices[1], vertices[0], vertices[2]);
        assert_eq!(locator.find(&back_rotated), Some(1));
    }

    #[test]
    fn test_winding_key() {
        assert_eq!(winding([2, 0, 1]), [0, 1, 2]);
        assert_eq!(winding([1, 2, 0]), [0, 1, 2]);
        assert_eq!(winding([2, 1, 0]), [0, 2, 1]);
        // Repeated indices still give one key per cyclic order
        assert_eq!(winding([0, 1, 0]), winding([0, 0, 1]));
    }

    #[test]
    fn test_duplicate_vertex_positions() {
        // Vertices 4 and 5 repeat positions 0 and 2; only triangle 1 uses them.
        let mut vertices = quad_vertices();
        vertices.push(p(0.0, 0.0, 0.0));
        vertices.push(p(1.0, 1.0, 0.0));
        let locator = TriangleLocator::new(&vertices, [[0, 1, 2], [4, 5, 3]]);

        assert_eq!(locator.candidates(&p(0.0, 0.0, 0.0)), vec![0, 4]);
        let face = Face::new(0, p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0));
        assert_eq!(locator.find(&face), Some(1));
    }

    #[test]
    fn test_first_triangle_wins() {
        let vertices = quad_vertices();
        let locator = TriangleLocator::new(&vertices, [[0, 2, 3], [0, 1, 2], [3, 2, 0]]);
        let face = Face::new(0, vertices[3], vertices[0], vertices[2]);
        assert_eq!(locator.find(&face), Some(0));
    }

    #[test]
    fn test_cell_boundaries() {
        // Positions straddling a grid cell boundary still match.
        let vertices = vec![p(0.00019999, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let locator = TriangleLocator::new(&vertices, [[0, 1, 2]]);
        let face = Face::new(0, p(0.00020001, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        assert_eq!(locator.find(&face), Some(0));
    }

    #[test]
    fn test_find_triangle_index_reports_object() {
        let xml = r#"<model><resources><object id="1" name="Tri"><mesh>
            <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles>
        </mesh></object></resources></model>"#;
        let doc = ModelDocument::parse(xml).unwrap();
        let object = &doc.objects()[0];

        let face = Face::new(0, p(0.0, 1.0, 0.0), p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
        assert_eq!(find_triangle_index(object, &face).unwrap(), 0);

        let stray = Face::new(4, p(5.0, 0.0, 0.0), p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
        match find_triangle_index(object, &stray).unwrap_err() {
            PaintError::Correspondence { object, face } => {
                assert_eq!(object, "Tri");
                assert_eq!(face, 4);
            }
            other => panic!("Expected Correspondence, got {:?}", other),
        }
    }
}
