//! Tracing extensions for paint operations.
//!
//! Structured logging for adjacency builds, flood fills and package exports.
//! Install any `tracing` subscriber to see them; set
//! `RUST_LOG=mesh_paint=debug` for per-object detail.
//!
//! # Targets
//!
//! - `mesh_paint::timing`: operation durations
//! - `mesh_paint::progress`: batch progress of long operations
//! - `mesh_paint::mesh_state`: mesh dimensions and degenerate faces
//! - `mesh_paint::package`: archive and model rewriting

use std::time::Instant;
use tracing::{Span, debug, info, warn};

use crate::package::ExportReport;
use crate::types::MeshObject;

/// A performance timer that logs duration on drop.
///
/// ```rust,ignore
/// fn expensive_operation() {
///     let _timer = OperationTimer::new("expensive_operation");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("paint_operation", operation = name);
        debug!(target: "mesh_paint::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that records the mesh being worked on.
    pub fn with_context(name: &'static str, object: &str, face_count: usize) -> Self {
        let span = tracing::info_span!(
            "paint_operation",
            operation = name,
            object = object,
            faces = face_count
        );
        debug!(
            target: "mesh_paint::timing",
            operation = name,
            object = object,
            faces = face_count,
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "mesh_paint::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Operation completed"
        );
    }
}

/// Log mesh dimensions at debug level.
pub fn log_mesh_stats(mesh: &MeshObject, context: &str) {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for p in mesh.positions() {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    let dims: Vec<f64> = (0..3)
        .map(|axis| if mesh.vertex_count() == 0 { 0.0 } else { max[axis] - min[axis] })
        .collect();

    debug!(
        target: "mesh_paint::mesh_state",
        context = context,
        object = mesh.name(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.2} x {:.2} x {:.2}", dims[0], dims[1], dims[2]),
        "Mesh state"
    );
}

/// Warn about zero-area faces. They never join a flood-fill region.
pub fn log_degenerate_faces(object: &str, degenerate: &[usize]) {
    if degenerate.is_empty() {
        return;
    }
    warn!(
        target: "mesh_paint::mesh_state",
        object = object,
        count = degenerate.len(),
        first = degenerate[0],
        "Mesh has degenerate faces with no defined normal"
    );
    debug!(
        target: "mesh_paint::mesh_state",
        object = object,
        faces = ?degenerate,
        "Degenerate face indices"
    );
}

/// Log progress for a long-running operation.
pub fn log_progress(operation: &str, current: usize, total: usize, stage: Option<&str>) {
    let percent = if total > 0 {
        (current as f64 / total as f64 * 100.0) as u32
    } else {
        0
    };

    debug!(
        target: "mesh_paint::progress",
        operation = operation,
        current = current,
        total = total,
        percent = percent,
        stage = stage.unwrap_or("processing"),
        "Progress update"
    );
}

/// Log the outcome of a package rewrite.
pub fn log_export_summary(report: &ExportReport) {
    for object in &report.objects {
        debug!(
            target: "mesh_paint::package",
            object = object.name.as_str(),
            element_id = object.element_id.as_deref().unwrap_or("-"),
            color_group = object.color_group_id,
            colors = object.group_size,
            triangles = object.triangles_updated,
            fallback = object.used_fallback,
            "Object recolored"
        );
    }
    info!(
        target: "mesh_paint::package",
        model = report.model_entry.as_str(),
        objects = report.objects.len(),
        triangles = report.triangles_updated(),
        entries_copied = report.entries_copied,
        namespace_added = report.namespace_added,
        "Package rewritten"
    );
}
