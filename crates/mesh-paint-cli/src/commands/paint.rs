//! meshpaint paint command - apply a paint plan and export.
//!
//! A plan is a JSON document keyed by object name:
//!
//! ```json
//! {
//!   "objects": {
//!     "Cube": {
//!       "mesh_color": "#ffffff",
//!       "fills": [{ "seed": 0, "color": "#ff0000" }],
//!       "faces": [{ "face": 4, "color": "#00ff00" }]
//!     }
//!   }
//! }
//! ```
//!
//! Base colors apply first, then fills, then single faces, so a single face
//! always wins over a region that covers it.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use mesh_paint::{
    Color, ColorAssignments, ExportParams, FloodFillCriteria, MeshObject, build_adjacency,
    change_colors_with_report, read_archive_file, read_color_assignments, read_mesh_objects,
    read_model_document, write_archive_file,
};
use serde::{Deserialize, Serialize};

use crate::{Cli, OutputFormat, output};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaintPlan {
    objects: BTreeMap<String, ObjectPlan>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectPlan {
    #[serde(default)]
    mesh_color: Option<Color>,
    #[serde(default)]
    fills: Vec<FillPlan>,
    #[serde(default)]
    faces: Vec<FacePlan>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FillPlan {
    seed: usize,
    color: Color,
    #[serde(default)]
    max_faces: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FacePlan {
    face: usize,
    color: Color,
}

#[derive(Serialize)]
struct PaintSummary {
    input: String,
    output: String,
    objects: Vec<ObjectSummary>,
    triangles_updated: usize,
    entries_copied: usize,
}

#[derive(Serialize)]
struct ObjectSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_group_id: Option<u32>,
    colors: usize,
    filled_faces: usize,
    painted_faces: usize,
    triangles_updated: usize,
}

fn load_plan(path: &Path) -> Result<PaintPlan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read paint plan {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid paint plan {:?}", path))
}

/// Colors already in the file, minus those of names that several objects
/// share. Export cannot tell such objects apart, so carrying their colors
/// over would fail the whole export.
fn import_existing(source: &[u8]) -> Result<ColorAssignments> {
    let document = read_model_document(source)?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for object in document.objects() {
        *counts.entry(object.display_name()).or_insert(0) += 1;
    }

    let mut assignments = read_color_assignments(source)?;
    for (name, &count) in counts.iter().filter(|(_, c)| **c > 1) {
        if assignments.remove(name).is_some() {
            tracing::warn!(
                object = %name,
                count = count,
                "Several objects share this name; their colors are not carried over"
            );
        }
    }
    Ok(assignments)
}

/// Map a plan name onto a mesh. A plan for a single-object file may use any
/// name.
fn resolve<'a>(meshes: &'a [MeshObject], name: &str) -> Result<&'a MeshObject> {
    if let Some(mesh) = meshes.iter().find(|m| m.name() == name) {
        return Ok(mesh);
    }
    match meshes {
        [only] => {
            tracing::warn!(
                requested = name,
                using = only.name(),
                "No object with this name; painting the only object in the file"
            );
            Ok(only)
        }
        _ => {
            let names: Vec<&str> = meshes.iter().map(|m| m.name()).collect();
            bail!(
                "paint plan names {:?} but the file has no such object (available: {})",
                name,
                names.join(", ")
            )
        }
    }
}

/// Apply `plan` on top of `existing` and return the painted assignments with
/// the number of faces each object's fills selected.
fn apply_plan(
    plan: &PaintPlan,
    meshes: &[MeshObject],
    mut existing: ColorAssignments,
    normal_tolerance: f64,
) -> Result<(ColorAssignments, BTreeMap<String, usize>)> {
    let mut filled = BTreeMap::new();

    for (plan_name, object_plan) in &plan.objects {
        let mesh = resolve(meshes, plan_name)?;
        let assignment = existing.entry(mesh.name());

        if let Some(color) = object_plan.mesh_color {
            assignment.paint_mesh(color);
        }

        let mut filled_faces = 0;
        if !object_plan.fills.is_empty() {
            let graph = build_adjacency(mesh);
            for fill in &object_plan.fills {
                let mut criteria = FloodFillCriteria::normal_tolerance(normal_tolerance);
                if let Some(max) = fill.max_faces {
                    criteria = criteria.with_max_faces(max);
                }
                filled_faces += assignment
                    .paint_region(mesh, &graph, fill.seed, fill.color, &criteria)
                    .with_context(|| {
                        format!("Fill from face {} of {:?} failed", fill.seed, mesh.name())
                    })?;
            }
        }

        for face in &object_plan.faces {
            assignment.paint_face(face.face, face.color);
        }
        assignment
            .validate_faces(mesh.face_count())
            .with_context(|| format!("Paint plan for {:?} is out of range", mesh.name()))?;

        *filled.entry(mesh.name().to_string()).or_insert(0) += filled_faces;
    }

    Ok((existing, filled))
}

pub fn run(
    input: &Path,
    output_path: &Path,
    plan_path: &Path,
    replace: bool,
    normal_tolerance: f64,
    cli: &Cli,
) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let source = read_archive_file(input)?;
    let meshes = read_mesh_objects(&source)?;
    let existing = if replace {
        ColorAssignments::new()
    } else {
        import_existing(&source)?
    };

    output::info(
        &format!("Applying paint plan to {} object(s)...", plan.objects.len()),
        cli.format,
        cli.quiet,
    );
    let (assignments, filled) = apply_plan(&plan, &meshes, existing, normal_tolerance)?;

    let (bytes, report) =
        change_colors_with_report(&source, &assignments, &meshes, &ExportParams::default())?;
    write_archive_file(output_path, &bytes)?;

    let objects = report
        .objects
        .iter()
        .map(|object| ObjectSummary {
            name: object.name.clone(),
            color_group_id: object.color_group_id,
            colors: object.group_size,
            filled_faces: filled.get(&object.name).copied().unwrap_or(0),
            painted_faces: assignments
                .get(&object.name)
                .map_or(0, |a| a.overrides().len()),
            triangles_updated: object.triangles_updated,
        })
        .collect();
    let summary = PaintSummary {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        objects,
        triangles_updated: report.triangles_updated(),
        entries_copied: report.entries_copied,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Paint Results".bold().underline());
                for object in &summary.objects {
                    println!();
                    println!("  {}", object.name.bold());
                    match object.color_group_id {
                        Some(id) => println!(
                            "    {}: {} ({} colors)",
                            "Color group".cyan(),
                            id,
                            object.colors
                        ),
                        None => println!("    {}: {}", "Color group".cyan(), "none".dimmed()),
                    }
                    println!("    {}: {}", "Filled faces".cyan(), object.filled_faces);
                    println!("    {}: {}", "Painted faces".cyan(), object.painted_faces);
                    println!(
                        "    {}: {}",
                        "Triangles updated".cyan(),
                        object.triangles_updated
                    );
                }
                println!();
                println!(
                    "  {}: {}",
                    "Entries copied".cyan(),
                    summary.entries_copied
                );
            }
            output::success(
                &format!("Saved to {}", output_path.display()),
                cli.format,
                cli.quiet,
            );
        }
    }

    Ok(())
}
