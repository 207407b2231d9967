//! Per-face color editing for 3MF packages.
//!
//! This crate loads mesh objects from a 3MF archive, lets a caller paint
//! whole objects, single faces or flat regions, and writes the colors back
//! into the archive as 3MF color groups. Everything in the archive except
//! the colored model entry passes through byte for byte.
//!
//! # Features
//!
//! - **Geometry**: non-indexed [`MeshObject`]s with on-demand [`Face`] normals
//! - **Adjacency**: edge-sharing face graphs, bucketed or brute force, with
//!   progress reporting and cancellation
//! - **Regions**: coplanar flood-fill from a seed face
//! - **Colors**: per-object base color plus per-face overrides, palettes
//!   with stable order and document-scoped group ids
//! - **Packages**: lossless model rewriting and entry-preserving archive copy
//!
//! # Units and Tolerances
//!
//! Geometry stays in file units. Display transforms (axis swaps, scaling to
//! scene units) belong on a separate copy; face positions handed to the
//! exporter must match the file within [`POSITION_TOLERANCE`] on every axis.
//!
//! - Adjacency compares edge endpoints exactly
//! - Flood-fill compares unit normals per axis within [`NORMAL_TOLERANCE`]
//! - Faces with area below [`DEGENERATE_AREA_EPSILON`] have no normal
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_paint::{
//!     ColorAssignments, FloodFillCriteria, PaintError, build_adjacency, change_colors,
//!     read_archive_file, read_mesh_objects, write_archive_file,
//! };
//!
//! fn main() -> Result<(), PaintError> {
//!     let source = read_archive_file("bracket.3mf")?;
//!     let meshes = read_mesh_objects(&source)?;
//!     let mesh = &meshes[0];
//!     let graph = build_adjacency(mesh);
//!
//!     let mut assignments = ColorAssignments::new();
//!     let colors = assignments.entry(mesh.name());
//!     colors.paint_mesh("#dddddd".parse()?);
//!     colors.paint_region(mesh, &graph, 0, "#ff6600".parse()?, &FloodFillCriteria::default())?;
//!
//!     let output = change_colors(&source, &assignments)?;
//!     write_archive_file("bracket-painted.3mf", &output)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Operations return [`PaintResult<T>`]. Every [`PaintError`] carries an
//! [`ErrorCode`] and a [`RecoverySuggestion`]; none are retried.

mod error;
mod types;
pub mod tracing_ext;

#[cfg(test)]
mod fixtures;

pub mod adjacency;
pub mod assignment;
pub mod color_group;
pub mod correspondence;
pub mod model;
pub mod package;
pub mod progress;
pub mod region;

// Re-export core types at crate root
pub use error::{ErrorCode, PaintError, PaintLocation, PaintResult, RecoverySuggestion};
pub use types::{
    Color, DEGENERATE_AREA_EPSILON, Face, MeshObject, NORMAL_TOLERANCE, POSITION_TOLERANCE,
    normals_match, same_position,
};

pub use adjacency::{
    AdjacencyBuilder, AdjacencyGraph, AdjacencyParams, AdjacencyStrategy, build_adjacency,
    build_adjacency_with_params, build_adjacency_with_progress,
};
pub use assignment::{ColorAssignment, ColorAssignments, FaceColor};
pub use color_group::{ColorPalette, ResourceIdAllocator, add_color_group};
pub use correspondence::{TriangleLocator, find_triangle_index};
pub use model::{ModelDocument, ModelObject, ModelTriangle};
pub use package::{
    EntryCompression, ExportParams, ExportReport, ObjectReport, change_colors,
    change_colors_with_report, read_archive_file, read_color_assignments, read_mesh_objects,
    read_model_document, write_archive_file,
};
pub use progress::{Progress, ProgressCallback, ProgressTracker};
pub use region::{FloodFillCriteria, flood_fill, flood_fill_colors};
