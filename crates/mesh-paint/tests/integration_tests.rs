//! End-to-end tests for mesh-paint.
//!
//! These exercise the full path from archive -> geometry -> adjacency ->
//! painting -> rewritten archive, and read the colors back.

use mesh_paint::{
    AdjacencyParams, Color, ColorAssignments, ExportParams, FloodFillCriteria, MeshObject,
    ModelDocument, PaintError, build_adjacency, build_adjacency_with_params, change_colors,
    change_colors_with_report, find_triangle_index, flood_fill, read_color_assignments,
    read_mesh_objects, read_model_document,
};
use nalgebra::Point3;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const RED: Color = Color::new(255, 0, 0);
const GREEN: Color = Color::new(0, 255, 0);
const GREY: Color = Color::new(0x80, 0x80, 0x80);

// =============================================================================
// Package helpers
// =============================================================================

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/></Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/></Relationships>"#;

/// 10 mm cube shifted `offset` along x, two triangles per side, written with
/// `decimals` digits after the point.
fn cube_object(id: u32, name: &str, offset: f64, decimals: usize) -> String {
    let corners = [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
        (0.0, 1.0, 1.0),
    ];
    let triangles = [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];

    let mut xml = format!("  <object id=\"{}\" name=\"{}\" type=\"model\">\n   <mesh>\n    <vertices>\n", id, name);
    for (x, y, z) in corners {
        xml.push_str(&format!(
            "     <vertex x=\"{:.*}\" y=\"{:.*}\" z=\"{:.*}\"/>\n",
            decimals,
            x * 10.0 + offset,
            decimals,
            y * 10.0,
            decimals,
            z * 10.0
        ));
    }
    xml.push_str("    </vertices>\n    <triangles>\n");
    for [a, b, c] in triangles {
        xml.push_str(&format!("     <triangle v1=\"{}\" v2=\"{}\" v3=\"{}\"/>\n", a, b, c));
    }
    xml.push_str("    </triangles>\n   </mesh>\n  </object>\n");
    xml
}

fn model(objects: &[String]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<model unit=\"millimeter\" xmlns=\"http://schemas.microsoft.com/3dmanufacturing/core/2015/02\">\n <resources>\n",
    );
    for object in objects {
        xml.push_str(object);
    }
    xml.push_str(" </resources>\n <build>\n");
    for i in 0..objects.len() {
        xml.push_str(&format!("  <item objectid=\"{}\"/>\n", i + 1));
    }
    xml.push_str(" </build>\n</model>\n");
    xml
}

fn package(model: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    writer.start_file("[Content_Types].xml", deflated).unwrap();
    writer.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    writer.start_file("_rels/.rels", deflated).unwrap();
    writer.write_all(RELS.as_bytes()).unwrap();
    writer.add_directory("Metadata/", stored).unwrap();
    writer.start_file("Metadata/thumbnail.png", stored).unwrap();
    writer.write_all(&[0x89, b'P', b'N', b'G', 13, 10, 26, 10]).unwrap();
    writer.start_file("3D/3dmodel.model", deflated).unwrap();
    writer.write_all(model.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn entry_text(archive: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut text = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
    text
}

fn two_cubes() -> Vec<u8> {
    package(&model(&[
        cube_object(1, "Left", 0.0, 0),
        cube_object(2, "Right", 20.0, 0),
    ]))
}

// =============================================================================
// Workflows
// =============================================================================

#[test]
fn test_load_paint_export_reload() {
    let source = two_cubes();
    let meshes = read_mesh_objects(&source).unwrap();
    assert_eq!(meshes.len(), 2);

    let right = meshes.iter().find(|m| m.name() == "Right").unwrap();
    let graph = build_adjacency(right);
    assert!(graph.is_symmetric());
    assert!(graph.isolated_faces().is_empty());

    let mut assignments = ColorAssignments::new();
    assignments.entry("Left").paint_mesh(GREY);
    let painted = assignments
        .entry("Right")
        .paint_region(right, &graph, 2, RED, &FloodFillCriteria::default())
        .unwrap();
    assert_eq!(painted, 2);

    let (output, report) =
        change_colors_with_report(&source, &assignments, &meshes, &ExportParams::default())
            .unwrap();
    assert_eq!(report.objects.len(), 2);
    assert_eq!(report.triangles_updated(), 2);
    assert_eq!(report.entries_copied, 4);

    // Groups are allocated in name order: Left, then Right.
    assert_eq!(report.objects[0].color_group_id, Some(3));
    assert_eq!(report.objects[1].color_group_id, Some(4));

    let colors = read_color_assignments(&output).unwrap();
    assert_eq!(colors.get("Left").unwrap().mesh_color(), Some(GREY));
    let right_colors = colors.get("Right").unwrap();
    assert_eq!(right_colors.mesh_color(), None);
    assert_eq!(right_colors.face_color(2), RED);
    assert_eq!(right_colors.face_color(3), RED);
    assert_eq!(right_colors.face_color(4), Color::WHITE);

    // Geometry is untouched.
    assert_eq!(read_mesh_objects(&output).unwrap(), meshes);
}

#[test]
fn test_repaint_on_top_of_existing_colors() {
    let source = two_cubes();
    let mut first = ColorAssignments::new();
    first.entry("Left").paint_face(0, RED);
    let painted = change_colors(&source, &first).unwrap();

    let mut assignments = read_color_assignments(&painted).unwrap();
    assert_eq!(assignments.get("Left").unwrap().override_for(0), Some(RED));
    assignments.entry("Left").paint_face(1, GREEN);
    let repainted = change_colors(&painted, &assignments).unwrap();

    let colors = read_color_assignments(&repainted).unwrap();
    let left = colors.get("Left").unwrap();
    assert_eq!(left.face_color(0), RED);
    assert_eq!(left.face_color(1), GREEN);

    let document = read_model_document(&repainted).unwrap();
    let ids: Vec<u32> = document.color_groups().iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![3, 4]);
}

#[test]
fn test_display_copy_does_not_drive_export() {
    let source = two_cubes();
    let meshes = read_mesh_objects(&source).unwrap();
    let left = &meshes[0];

    // A scene copy scaled to metres is only good for picking faces.
    let display = MeshObject::new(
        left.name(),
        left.positions().iter().map(|p| Point3::from(p.coords * 0.01)).collect(),
    )
    .unwrap();
    let graph = build_adjacency(&display);
    let region = flood_fill(&display, &graph, 8, &FloodFillCriteria::default()).unwrap();

    let mut assignments = ColorAssignments::new();
    for &face in &region {
        assignments.entry("Left").paint_face(face, GREEN);
    }

    let err = change_colors_with_report(
        &source,
        &assignments,
        std::slice::from_ref(&display),
        &ExportParams::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PaintError::Correspondence { .. }));

    // Face indices carry over; the file-unit geometry resolves them.
    let (output, report) =
        change_colors_with_report(&source, &assignments, &meshes, &ExportParams::default())
            .unwrap();
    assert_eq!(report.triangles_updated(), 2);
    let colors = read_color_assignments(&output).unwrap();
    assert_eq!(colors.get("Left").unwrap().face_color(9), GREEN);
}

#[test]
fn test_precision_mismatch_resolves() {
    // The file stores four decimals; the caller's geometry is nudged by less
    // than the position tolerance.
    let source = package(&model(&[cube_object(1, "Fine", 0.33333, 4)]));
    let meshes = read_mesh_objects(&source).unwrap();
    let nudged: Vec<Point3<f64>> = meshes[0]
        .positions()
        .iter()
        .map(|p| Point3::new(p.x + 0.00003, p.y, p.z - 0.00005))
        .collect();
    let geometry = [MeshObject::new("Fine", nudged).unwrap()];

    let mut assignments = ColorAssignments::new();
    for face in 0..12 {
        assignments.entry("Fine").paint_face(face, RED);
    }
    let (output, report) =
        change_colors_with_report(&source, &assignments, &geometry, &ExportParams::default())
            .unwrap();
    assert_eq!(report.triangles_updated(), 12);
    let xml = entry_text(&output, "3D/3dmodel.model");
    assert_eq!(xml.matches(r#"pid="2" p1="0""#).count(), 12);
}

#[test]
fn test_every_face_resolves_to_its_triangle() {
    let xml = model(&[cube_object(1, "Cube", 0.0, 2)]);
    let document = ModelDocument::parse(&xml).unwrap();
    let object = &document.objects()[0];
    let mesh = object.to_mesh_object().unwrap();

    for face in mesh.faces() {
        let first = find_triangle_index(object, &face).unwrap();
        assert_eq!(first, face.index);
        assert_eq!(find_triangle_index(object, &face).unwrap(), first);
    }
}

#[test]
fn test_non_model_entries_survive() {
    let source = two_cubes();
    let mut assignments = ColorAssignments::new();
    assignments.entry("Right").paint_mesh(GREEN);
    let output = change_colors(&source, &assignments).unwrap();

    assert_eq!(entry_text(&output, "[Content_Types].xml"), CONTENT_TYPES);
    assert_eq!(entry_text(&output, "_rels/.rels"), RELS);

    let mut archive = ZipArchive::new(Cursor::new(output.as_slice())).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.contains(&"Metadata/".to_string()));
    let mut png = Vec::new();
    archive
        .by_name("Metadata/thumbnail.png")
        .unwrap()
        .read_to_end(&mut png)
        .unwrap();
    assert_eq!(png, [0x89, b'P', b'N', b'G', 13, 10, 26, 10]);
}

#[test]
fn test_failed_export_returns_no_archive() {
    let source = two_cubes();
    let mut assignments = ColorAssignments::new();
    assignments.entry("Left").paint_mesh(RED);
    assignments.entry("Missing").paint_mesh(GREEN);

    let err = change_colors(&source, &assignments).unwrap_err();
    assert_eq!(err.code().as_str(), "PAINT-3002");
}

#[test]
fn test_brute_force_matches_bucketed_on_loaded_mesh() {
    let meshes = read_mesh_objects(&two_cubes()).unwrap();
    for mesh in &meshes {
        let bucketed = build_adjacency(mesh);
        let brute = build_adjacency_with_params(mesh, &AdjacencyParams::brute_force());
        assert_eq!(bucketed, brute);
    }
}
