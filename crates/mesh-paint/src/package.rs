//! 3MF package reading and color rewriting.
//!
//! A 3MF file is a ZIP archive whose model entry (usually
//! `3D/3dmodel.model`) holds the XML scene. Rewriting copies every other
//! entry through untouched, compressed bytes and CRC included, and replaces
//! only the model entry with the recolored document.
//!
//! An export either succeeds completely or returns an error. The output
//! buffer is discarded on failure, so a caller never sees an archive whose
//! colors are out of step with its geometry.
//!
//! # Example
//!
//! ```rust,ignore
//! use mesh_paint::{ColorAssignments, change_colors, read_archive_file};
//!
//! let source = read_archive_file("part.3mf")?;
//! let mut assignments = ColorAssignments::new();
//! assignments.entry("Bracket").paint_mesh("#3366ff".parse()?);
//! let output = change_colors(&source, &assignments)?;
//! ```

use serde::Serialize;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::assignment::{ColorAssignment, ColorAssignments};
use crate::color_group::add_color_group;
use crate::correspondence::TriangleLocator;
use crate::error::{PaintError, PaintResult};
use crate::model::{ModelDocument, ModelObject};
use crate::tracing_ext::{OperationTimer, log_export_summary, log_mesh_stats};
use crate::types::MeshObject;

/// Compression for the rewritten model entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryCompression {
    /// Reuse the source entry's method (deflate for anything but stored).
    #[default]
    Preserve,
    Deflated,
    Stored,
}

impl EntryCompression {
    fn method(self, source: CompressionMethod) -> CompressionMethod {
        match self {
            EntryCompression::Preserve if source == CompressionMethod::Stored => {
                CompressionMethod::Stored
            }
            EntryCompression::Preserve | EntryCompression::Deflated => CompressionMethod::Deflated,
            EntryCompression::Stored => CompressionMethod::Stored,
        }
    }
}

/// Parameters for [`change_colors_with_report`].
#[derive(Debug, Clone, Default)]
pub struct ExportParams {
    pub compression: EntryCompression,
}

impl ExportParams {
    pub fn with_compression(mut self, compression: EntryCompression) -> Self {
        self.compression = compression;
        self
    }
}

/// What an export did to one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectReport {
    /// Assignment name.
    pub name: String,
    /// `id` attribute of the `<object>` element that was recolored.
    pub element_id: Option<String>,
    /// Id of the color group created for the object, if it had any color.
    pub color_group_id: Option<u32>,
    pub group_size: usize,
    pub triangles_updated: usize,
    /// The name matched no object and the document's only object was used.
    pub used_fallback: bool,
}

/// Summary of one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub objects: Vec<ObjectReport>,
    /// Archive path of the model entry.
    pub model_entry: String,
    /// Entries copied through unchanged.
    pub entries_copied: usize,
    /// Whether the materials namespace had to be declared.
    pub namespace_added: bool,
}

impl ExportReport {
    /// Total triangle elements rewritten across all objects.
    pub fn triangles_updated(&self) -> usize {
        self.objects.iter().map(|o| o.triangles_updated).sum()
    }
}

/// True for archive paths that name a 3MF model part.
pub fn is_model_entry(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".model")
}

/// Find the model entry: a path ending in `3dmodel.model` if there is one,
/// else the first `.model` entry. Returns its index and path.
pub fn locate_model_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> PaintResult<(usize, String)> {
    let mut fallback = None;
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| PaintError::archive_read(format!("cannot read entry {}", i), e))?;
        let name = entry.name();
        if name.to_ascii_lowercase().ends_with("3dmodel.model") {
            return Ok((i, name.to_string()));
        }
        if fallback.is_none() && is_model_entry(name) {
            fallback = Some((i, name.to_string()));
        }
    }
    fallback.ok_or(PaintError::ModelNotFound {
        entries: archive.len(),
    })
}

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOCATION: u64 = 64 << 20;

/// Capacity to reserve for an entry that declares `declared` bytes.
/// The header is untrusted; larger entries grow the buffer while reading.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

fn open_archive(source: &[u8]) -> PaintResult<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(source))
        .map_err(|e| PaintError::archive_read("not a readable ZIP archive", e))
}

/// Read an entry as text. Returns the text and the entry's compression.
fn read_entry_text<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    name: &str,
) -> PaintResult<(String, CompressionMethod)> {
    let mut entry = archive
        .by_index(index)
        .map_err(|e| PaintError::archive_read(format!("cannot open {}", name), e))?;
    let method = entry.compression();
    let mut bytes = Vec::with_capacity(capacity_hint(entry.size()));
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| PaintError::ArchiveRead {
            details: format!("cannot decompress {}: {}", name, e),
            source: None,
        })?;
    let text = String::from_utf8(bytes)
        .map_err(|e| PaintError::xml(format!("{} is not UTF-8: {}", name, e)))?;
    Ok((text, method))
}

/// Open an archive and parse its model entry.
pub fn read_model_document(source: &[u8]) -> PaintResult<ModelDocument> {
    let mut archive = open_archive(source)?;
    let (index, name) = locate_model_entry(&mut archive)?;
    let (xml, _) = read_entry_text(&mut archive, index, &name)?;
    ModelDocument::parse(&xml)
}

/// Load every mesh object of a package as untransformed, non-indexed
/// geometry in triangle order.
pub fn read_mesh_objects(source: &[u8]) -> PaintResult<Vec<MeshObject>> {
    let _timer = OperationTimer::new("read_mesh_objects");
    let document = read_model_document(source)?;

    let mut meshes = Vec::new();
    for object in document.objects().iter().filter(|o| o.has_mesh) {
        let mesh = object.to_mesh_object()?;
        log_mesh_stats(&mesh, "loaded");
        meshes.push(mesh);
    }
    Ok(meshes)
}

/// Colors already present in a package, as assignments keyed by object name.
///
/// Object-level `pid`/`pindex` becomes the mesh color and triangle-level
/// `pid`/`p1` become overrides. References into resources other than color
/// groups are skipped. When two objects share a name the first one wins.
pub fn read_color_assignments(source: &[u8]) -> PaintResult<ColorAssignments> {
    let document = read_model_document(source)?;
    let mut assignments = ColorAssignments::new();

    for object in document.objects() {
        let name = object.display_name();
        if assignments.contains(&name) {
            tracing::warn!(
                target: "mesh_paint::package",
                object = name.as_str(),
                "Duplicate object name; keeping colors of the first"
            );
            continue;
        }
        let assignment = import_colors(&document, object);
        if !assignment.is_empty() {
            assignments.insert(name, assignment);
        }
    }
    Ok(assignments)
}

fn import_colors(document: &ModelDocument, object: &ModelObject) -> ColorAssignment {
    let lookup = |pid: Option<u32>, index: Option<usize>| {
        document.color_group(pid?).and_then(|g| g.color(index?))
    };

    let mut assignment = ColorAssignment::new();
    assignment.set_mesh_color(lookup(object.pid, object.pindex));
    for (face, triangle) in object.triangles.iter().enumerate() {
        if triangle.pid.is_none() && triangle.p1.is_none() {
            continue;
        }
        let color = lookup(
            triangle.pid.or(object.pid),
            triangle.p1.or(object.pindex),
        );
        if let Some(color) = color {
            assignment.paint_face(face, color);
        }
    }
    assignment
}

/// Rewrite a package with new colors. See [`change_colors_with_report`].
pub fn change_colors(source: &[u8], assignments: &ColorAssignments) -> PaintResult<Vec<u8>> {
    change_colors_with_report(source, assignments, &[], &ExportParams::default())
        .map(|(bytes, _)| bytes)
}

/// Rewrite a package with new colors and report what changed.
///
/// Override face indices are resolved against `geometry`, matched to
/// assignments by name. Assignments without a matching entry use the
/// geometry of their own `<object>`, which is what [`read_mesh_objects`]
/// returns for that file. Either way the positions must be in file units;
/// display transforms have to be undone by the caller.
pub fn change_colors_with_report(
    source: &[u8],
    assignments: &ColorAssignments,
    geometry: &[MeshObject],
    params: &ExportParams,
) -> PaintResult<(Vec<u8>, ExportReport)> {
    let _timer = OperationTimer::new("change_colors");

    let mut archive = open_archive(source)?;
    let (model_index, model_entry) = locate_model_entry(&mut archive)?;
    let (xml, source_method) = read_entry_text(&mut archive, model_index, &model_entry)?;

    let mut document = ModelDocument::parse(&xml)?;
    let namespace_added = document.ensure_material_namespace()?;
    let mut objects = Vec::with_capacity(assignments.len());
    for (name, assignment) in assignments.iter() {
        objects.push(recolor_object(&mut document, name, assignment, geometry)?);
    }
    let model_xml = document.to_xml()?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(source.len())));
    let mut entries_copied = 0;
    for i in 0..archive.len() {
        if i == model_index {
            let options = SimpleFileOptions::default()
                .compression_method(params.compression.method(source_method));
            writer
                .start_file(model_entry.as_str(), options)
                .map_err(|e| PaintError::archive_write(format!("cannot add {}", model_entry), e))?;
            writer
                .write_all(model_xml.as_bytes())
                .map_err(|e| PaintError::ArchiveWrite {
                    details: format!("cannot write {}: {}", model_entry, e),
                    source: None,
                })?;
        } else {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| PaintError::archive_read(format!("cannot read entry {}", i), e))?;
            let name = entry.name().to_string();
            writer
                .raw_copy_file(entry)
                .map_err(|e| PaintError::archive_write(format!("cannot copy {}", name), e))?;
            entries_copied += 1;
        }
    }
    let bytes = writer
        .finish()
        .map_err(|e| PaintError::archive_write("cannot finish archive", e))?
        .into_inner();

    let report = ExportReport {
        objects,
        model_entry,
        entries_copied,
        namespace_added,
    };
    log_export_summary(&report);
    Ok((bytes, report))
}

/// Apply one assignment to the document.
///
/// Every override is resolved before the document is touched, so a face
/// without a matching triangle leaves the document unchanged.
fn recolor_object(
    document: &mut ModelDocument,
    name: &str,
    assignment: &ColorAssignment,
    geometry: &[MeshObject],
) -> PaintResult<ObjectReport> {
    let found = document.find_object(name)?;
    let object = document
        .object(found.index)
        .ok_or_else(|| PaintError::xml(format!("no object at index {}", found.index)))?;
    if found.fallback {
        tracing::warn!(
            target: "mesh_paint::package",
            requested = name,
            using = %object.display_name(),
            "No object with this name; using the only object in the model"
        );
    }

    let mut report = ObjectReport {
        name: name.to_string(),
        element_id: object.id.clone(),
        used_fallback: found.fallback,
        ..Default::default()
    };
    if assignment.is_empty() {
        return Ok(report);
    }

    let loaded;
    let mesh = match geometry.iter().find(|m| m.name() == name) {
        Some(mesh) => mesh,
        None => {
            loaded = object.to_mesh_object()?;
            &loaded
        }
    };
    assignment.validate_faces(mesh.face_count())?;

    let mut palette = assignment.palette();
    let locator = TriangleLocator::for_object(object);
    let mut updates = Vec::with_capacity(assignment.overrides().len());
    for o in assignment.overrides() {
        let face = mesh.try_face(o.face)?;
        let triangle = locator
            .find(&face)
            .ok_or_else(|| PaintError::correspondence(name, o.face))?;
        updates.push((triangle, palette.insert(o.color)));
    }
    let base = assignment.mesh_color().map(|c| palette.insert(c));

    let group = add_color_group(document, &palette)?;
    if let Some(pindex) = base {
        document.set_object_color(found.index, group, pindex)?;
    }
    for &(triangle, p1) in &updates {
        document.set_triangle_color(found.index, triangle, group, p1)?;
    }

    report.color_group_id = Some(group);
    report.group_size = palette.len();
    report.triangles_updated = updates.len();
    Ok(report)
}

/// Read a package from disk.
pub fn read_archive_file(path: impl AsRef<Path>) -> PaintResult<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| PaintError::io_read(path, e))
}

/// Write a package to disk.
pub fn write_archive_file(path: impl AsRef<Path>, bytes: &[u8]) -> PaintResult<()> {
    let path = path.as_ref();
    std::fs::write(path, bytes).map_err(|e| PaintError::io_write(path, e))
}
