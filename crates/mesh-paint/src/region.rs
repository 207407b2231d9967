//! Coplanar region selection by flood-fill over the face adjacency graph.
//!
//! Starting from a seed face, the fill spreads to neighbors whose unit
//! normal matches the seed's normal within a per-axis tolerance. Every
//! candidate is compared against the seed, not against the face it was
//! reached from, so a gently curved surface does not creep around a corner.
//!
//! Traversal is breadth-first with an explicit queue, so region size is
//! bounded by memory rather than stack depth.

use std::collections::VecDeque;

use crate::adjacency::AdjacencyGraph;
use crate::assignment::FaceColor;
use crate::error::{PaintError, PaintResult};
use crate::types::{Color, MeshObject, NORMAL_TOLERANCE, normals_match};

/// Criteria for flood-fill region selection.
#[derive(Debug, Clone)]
pub struct FloodFillCriteria {
    /// Per-axis tolerance between a candidate's unit normal and the seed's.
    /// Default: [`NORMAL_TOLERANCE`].
    pub normal_tolerance: f64,

    /// Maximum number of faces to include, seed included.
    /// None means no limit.
    pub max_faces: Option<usize>,
}

impl Default for FloodFillCriteria {
    fn default() -> Self {
        Self {
            normal_tolerance: NORMAL_TOLERANCE,
            max_faces: None,
        }
    }
}

impl FloodFillCriteria {
    /// Criteria with a custom normal tolerance.
    pub fn normal_tolerance(tolerance: f64) -> Self {
        Self {
            normal_tolerance: tolerance,
            ..Default::default()
        }
    }

    /// Create criteria with a face count limit.
    pub fn with_max_faces(mut self, count: usize) -> Self {
        self.max_faces = Some(count);
        self
    }
}

/// Select the faces reachable from `seed` across normal-compatible neighbors.
///
/// Returns face indices in visit order, seed first. A degenerate seed has no
/// normal and yields a region of just itself.
pub fn flood_fill(
    mesh: &MeshObject,
    graph: &AdjacencyGraph,
    seed: usize,
    criteria: &FloodFillCriteria,
) -> PaintResult<Vec<usize>> {
    let face_count = mesh.face_count();
    if graph.face_count() != face_count {
        return Err(PaintError::invalid_geometry(format!(
            "adjacency graph covers {} faces but {:?} has {}",
            graph.face_count(),
            mesh.name(),
            face_count
        )));
    }
    let seed_normal = mesh.try_face(seed)?.normal;

    let limit = criteria.max_faces.unwrap_or(usize::MAX).max(1);
    let mut visited = vec![false; face_count];
    let mut region = vec![seed];
    let mut queue = VecDeque::from([seed]);
    visited[seed] = true;

    'fill: while let Some(current) = queue.pop_front() {
        for &neighbor in graph.neighbors(current) {
            if visited[neighbor] {
                continue;
            }
            visited[neighbor] = true;

            let normal = mesh.face(neighbor).and_then(|f| f.normal);
            if !normals_match(
                seed_normal.as_ref(),
                normal.as_ref(),
                criteria.normal_tolerance,
            ) {
                continue;
            }

            region.push(neighbor);
            if region.len() >= limit {
                break 'fill;
            }
            queue.push_back(neighbor);
        }
    }

    tracing::debug!(
        object = mesh.name(),
        seed = seed,
        faces = region.len(),
        "Flood-fill region selected"
    );
    Ok(region)
}

/// Flood-fill and pair every selected face with `color`.
pub fn flood_fill_colors(
    mesh: &MeshObject,
    graph: &AdjacencyGraph,
    seed: usize,
    color: Color,
    criteria: &FloodFillCriteria,
) -> PaintResult<Vec<FaceColor>> {
    Ok(flood_fill(mesh, graph, seed, criteria)?
        .into_iter()
        .map(|face| FaceColor { face, color })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::build_adjacency;
    use crate::fixtures::{create_folded_strip, create_test_cube};
    use nalgebra::Point3;

    #[test]
    fn test_cube_side_fill() {
        let cube = create_test_cube();
        let graph = build_adjacency(&cube);

        for side in 0..6 {
            let seed = side * 2;
            let mut region = flood_fill(&cube, &graph, seed, &FloodFillCriteria::default()).unwrap();
            assert_eq!(region[0], seed);
            region.sort_unstable();
            assert_eq!(region, vec![seed, seed + 1]);
        }
    }

    #[test]
    fn test_fill_stops_at_fold() {
        let strip = create_folded_strip();
        let graph = build_adjacency(&strip);

        let mut region = flood_fill(&strip, &graph, 0, &FloodFillCriteria::default()).unwrap();
        region.sort_unstable();
        assert_eq!(region, vec![0, 1, 2, 3]);

        let region = flood_fill(&strip, &graph, 4, &FloodFillCriteria::default()).unwrap();
        assert_eq!(region, vec![4]);
    }

    #[test]
    fn test_visit_order_is_breadth_first() {
        let strip = create_folded_strip();
        let graph = build_adjacency(&strip);
        let region = flood_fill(&strip, &graph, 1, &FloodFillCriteria::default()).unwrap();
        assert_eq!(region, vec![1, 0, 3, 2]);
    }

    #[test]
    fn test_max_faces_limit() {
        let strip = create_folded_strip();
        let graph = build_adjacency(&strip);
        let criteria = FloodFillCriteria::default().with_max_faces(2);
        let region = flood_fill(&strip, &graph, 0, &criteria).unwrap();
        assert_eq!(region, vec![0, 1]);
    }

    #[test]
    fn test_loose_tolerance_crosses_fold() {
        let strip = create_folded_strip();
        let graph = build_adjacency(&strip);
        let region = flood_fill(&strip, &graph, 0, &FloodFillCriteria::normal_tolerance(2.0)).unwrap();
        assert_eq!(region.len(), 5);
    }

    #[test]
    fn test_degenerate_seed_selects_only_itself() {
        let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
        let mesh = MeshObject::new(
            "sliver",
            vec![
                p(0.0, 0.0),
                p(1.0, 0.0),
                p(2.0, 0.0),
                p(0.0, 0.0),
                p(1.0, 0.0),
                p(0.0, 1.0),
            ],
        )
        .unwrap();
        let graph = build_adjacency(&mesh);
        assert!(graph.are_adjacent(0, 1));

        assert_eq!(flood_fill(&mesh, &graph, 0, &FloodFillCriteria::default()).unwrap(), vec![0]);
        // A defined seed never pulls in a face without a normal.
        assert_eq!(flood_fill(&mesh, &graph, 1, &FloodFillCriteria::default()).unwrap(), vec![1]);
    }

    #[test]
    fn test_seed_out_of_range() {
        let cube = create_test_cube();
        let graph = build_adjacency(&cube);
        let err = flood_fill(&cube, &graph, 12, &FloodFillCriteria::default()).unwrap_err();
        assert!(matches!(err, PaintError::FaceOutOfRange { face: 12, face_count: 12 }));
    }

    #[test]
    fn test_graph_mismatch() {
        let cube = create_test_cube();
        let strip = create_folded_strip();
        let graph = build_adjacency(&strip);
        let err = flood_fill(&cube, &graph, 0, &FloodFillCriteria::default()).unwrap_err();
        assert!(matches!(err, PaintError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_colors_pair_every_face() {
        let cube = create_test_cube();
        let graph = build_adjacency(&cube);
        let red = Color::new(255, 0, 0);
        let pairs = flood_fill_colors(&cube, &graph, 4, red, &FloodFillCriteria::default()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], FaceColor { face: 4, color: red });
        assert!(pairs.iter().all(|p| p.color == red));
    }
}
