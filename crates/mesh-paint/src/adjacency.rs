//! Face adjacency for non-indexed triangle meshes.
//!
//! Two faces are neighbors when one of their undirected edges has exactly the
//! same endpoint positions. No tolerance is applied: the graph describes the
//! topology stored in the buffer, not what looks connected on screen.
//!
//! The default strategy buckets edges by a canonical key built from the bit
//! patterns of both endpoints, which runs in expected linear time. The
//! brute-force strategy compares every pair of faces and exists as the
//! reference definition; both produce identical graphs.
//!
//! # Example
//!
//! ```ignore
//! use mesh_paint::{MeshObject, build_adjacency};
//!
//! let graph = build_adjacency(&mesh);
//! for &n in graph.neighbors(0) {
//!     println!("face 0 touches face {}", n);
//! }
//! ```

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::error::{PaintError, PaintResult};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::tracing_ext::{OperationTimer, log_degenerate_faces, log_progress};
use crate::types::{Face, MeshObject};

/// How to find faces that share an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdjacencyStrategy {
    /// Hash edges by exact endpoint positions. Expected O(n).
    #[default]
    Bucketed,
    /// Compare every pair of faces. O(n²).
    BruteForce,
}

/// Parameters for adjacency construction.
#[derive(Debug, Clone)]
pub struct AdjacencyParams {
    /// Edge matching strategy.
    pub strategy: AdjacencyStrategy,

    /// Faces processed between progress reports and cancellation checks.
    pub batch_size: usize,
}

impl Default for AdjacencyParams {
    fn default() -> Self {
        Self {
            strategy: AdjacencyStrategy::Bucketed,
            batch_size: 1024,
        }
    }
}

impl AdjacencyParams {
    /// Pairwise comparison, mostly useful as a reference in tests.
    pub fn brute_force() -> Self {
        Self {
            strategy: AdjacencyStrategy::BruteForce,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: AdjacencyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Symmetric face-to-face neighbor relation.
///
/// Neighbor lists are sorted, free of duplicates and never contain the face
/// itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyGraph {
    neighbors: Vec<Vec<usize>>,
    degenerate: Vec<usize>,
}

impl AdjacencyGraph {
    #[inline]
    pub fn face_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbors of a face; empty for out-of-range indices.
    #[inline]
    pub fn neighbors(&self, face: usize) -> &[usize] {
        self.neighbors.get(face).map_or(&[], Vec::as_slice)
    }

    #[inline]
    pub fn degree(&self, face: usize) -> usize {
        self.neighbors(face).len()
    }

    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Faces sharing no edge with any other face.
    pub fn isolated_faces(&self) -> Vec<usize> {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of unordered neighbor pairs.
    pub fn edge_pair_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Zero-area faces, which have no normal. They still take part in the
    /// graph.
    pub fn degenerate_faces(&self) -> &[usize] {
        &self.degenerate
    }

    /// Check `j ∈ N(i) ⟺ i ∈ N(j)` and the absence of self-references.
    pub fn is_symmetric(&self) -> bool {
        self.neighbors.iter().enumerate().all(|(i, list)| {
            list.iter()
                .all(|&j| j != i && j < self.neighbors.len() && self.are_adjacent(j, i))
        })
    }

    /// Iterate over `(face, neighbors)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.neighbors
            .iter()
            .enumerate()
            .map(|(i, n)| (i, n.as_slice()))
    }
}

/// Bit pattern of a position with `-0.0` folded into `0.0`. Two positions
/// compare equal under `==` exactly when their keys are equal, so NaN
/// positions get no key.
type PositionKey = [u64; 3];
type EdgeKey = (PositionKey, PositionKey);

fn position_key(p: &Point3<f64>) -> Option<PositionKey> {
    let mut key = [0u64; 3];
    for (slot, &v) in key.iter_mut().zip(p.iter()) {
        if v.is_nan() {
            return None;
        }
        *slot = if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    }
    Some(key)
}

fn edge_key(a: &Point3<f64>, b: &Point3<f64>) -> Option<EdgeKey> {
    let ka = position_key(a)?;
    let kb = position_key(b)?;
    Some(if ka <= kb { (ka, kb) } else { (kb, ka) })
}

fn edges_match(e: &(Point3<f64>, Point3<f64>), f: &(Point3<f64>, Point3<f64>)) -> bool {
    (e.0 == f.0 && e.1 == f.1) || (e.0 == f.1 && e.1 == f.0)
}

fn faces_share_edge(a: &Face, b: &Face) -> bool {
    let eb = b.edges();
    a.edges().iter().any(|e| eb.iter().any(|f| edges_match(e, f)))
}

/// Incremental adjacency construction.
///
/// Each [`step`](Self::step) processes one batch of faces so callers can
/// report progress, yield, or abandon the build between batches. Dropping
/// the builder discards all partial work.
pub struct AdjacencyBuilder<'a> {
    mesh: &'a MeshObject,
    params: AdjacencyParams,
    faces: Vec<Face>,
    next: usize,
    buckets: HashMap<EdgeKey, Vec<usize>>,
    neighbors: Vec<Vec<usize>>,
    degenerate: Vec<usize>,
}

impl<'a> AdjacencyBuilder<'a> {
    pub fn new(mesh: &'a MeshObject, params: AdjacencyParams) -> Self {
        let face_count = mesh.face_count();
        let faces = match params.strategy {
            AdjacencyStrategy::BruteForce => mesh.faces().collect(),
            AdjacencyStrategy::Bucketed => Vec::new(),
        };
        Self {
            mesh,
            params,
            faces,
            next: 0,
            buckets: HashMap::with_capacity(face_count * 3 / 2),
            neighbors: vec![Vec::new(); face_count],
            degenerate: Vec::new(),
        }
    }

    /// Faces processed so far.
    #[inline]
    pub fn processed(&self) -> usize {
        self.next
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.next >= self.total()
    }

    /// Process the next batch. Returns the number of faces handled.
    pub fn step(&mut self) -> usize {
        let start = self.next;
        let end = (start + self.params.batch_size.max(1)).min(self.total());

        match self.params.strategy {
            AdjacencyStrategy::Bucketed => {
                for face in (start..end).filter_map(|i| self.mesh.face(i)) {
                    if face.is_degenerate() {
                        self.degenerate.push(face.index);
                    }
                    for (a, b) in face.edges() {
                        if let Some(key) = edge_key(&a, &b) {
                            let bucket = self.buckets.entry(key).or_default();
                            // A face can list the same edge twice when it is degenerate.
                            if bucket.last() != Some(&face.index) {
                                bucket.push(face.index);
                            }
                        }
                    }
                }
            }
            AdjacencyStrategy::BruteForce => {
                for i in start..end {
                    let a = &self.faces[i];
                    if a.is_degenerate() {
                        self.degenerate.push(i);
                    }
                    for j in (i + 1)..self.faces.len() {
                        if faces_share_edge(a, &self.faces[j]) {
                            self.neighbors[i].push(j);
                            self.neighbors[j].push(i);
                        }
                    }
                }
            }
        }

        self.next = end;
        end - start
    }

    /// Run any remaining batches and assemble the graph.
    pub fn finish(mut self) -> AdjacencyGraph {
        while !self.is_done() {
            self.step();
        }

        for bucket in self.buckets.values() {
            for (k, &i) in bucket.iter().enumerate() {
                for &j in &bucket[k + 1..] {
                    self.neighbors[i].push(j);
                    self.neighbors[j].push(i);
                }
            }
        }
        for list in &mut self.neighbors {
            list.sort_unstable();
            list.dedup();
        }

        AdjacencyGraph {
            neighbors: self.neighbors,
            degenerate: self.degenerate,
        }
    }
}

/// Build the adjacency graph with default parameters.
pub fn build_adjacency(mesh: &MeshObject) -> AdjacencyGraph {
    build_adjacency_with_params(mesh, &AdjacencyParams::default())
}

/// Build the adjacency graph with explicit parameters.
pub fn build_adjacency_with_params(mesh: &MeshObject, params: &AdjacencyParams) -> AdjacencyGraph {
    let _timer = OperationTimer::with_context("build_adjacency", mesh.name(), mesh.face_count());
    let graph = AdjacencyBuilder::new(mesh, params.clone()).finish();
    log_degenerate_faces(mesh.name(), graph.degenerate_faces());
    graph
}

/// Build the adjacency graph, reporting progress after every batch.
///
/// The callback returning `false` stops the build with
/// [`PaintError::Cancelled`]; no partial graph is returned.
pub fn build_adjacency_with_progress(
    mesh: &MeshObject,
    params: &AdjacencyParams,
    callback: Option<&ProgressCallback>,
) -> PaintResult<AdjacencyGraph> {
    let _timer = OperationTimer::with_context("build_adjacency", mesh.name(), mesh.face_count());
    let total = mesh.face_count();
    let tracker = ProgressTracker::new(total as u64);
    let mut builder = AdjacencyBuilder::new(mesh, params.clone());

    while !builder.is_done() {
        builder.step();
        let processed = builder.processed();
        tracker.set(processed as u64);
        log_progress("build_adjacency", processed, total, Some("edges"));

        if !tracker.maybe_callback(callback, format!("Face adjacency: {}/{} faces", processed, total))
        {
            return Err(PaintError::Cancelled {
                operation: "adjacency",
                processed,
                total,
            });
        }
    }

    let graph = builder.finish();
    log_degenerate_faces(mesh.name(), graph.degenerate_faces());
    Ok(graph)
}
