//! meshpaint info command - list objects and their colors.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_paint::{read_archive_file, read_color_assignments, read_model_document};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct PackageInfo {
    path: String,
    color_groups: usize,
    objects: Vec<ObjectInfo>,
}

#[derive(Serialize)]
struct ObjectInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    vertices: usize,
    faces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh_color: Option<String>,
    painted_faces: usize,
    colors: Vec<String>,
}

pub fn run(input: &Path, cli: &Cli) -> Result<()> {
    let source = read_archive_file(input)?;
    let document = read_model_document(&source)
        .with_context(|| format!("Failed to read model from {:?}", input))?;
    let assignments = read_color_assignments(&source)?;

    let objects = document
        .objects()
        .iter()
        .map(|object| {
            let name = object.display_name();
            let colors = assignments.get(&name);
            ObjectInfo {
                id: object.id.clone(),
                vertices: object.vertices.len(),
                faces: object.triangles.len(),
                mesh_color: colors.and_then(|c| c.mesh_color()).map(|c| c.to_hex()),
                painted_faces: colors.map_or(0, |c| c.overrides().len()),
                colors: colors
                    .map(|c| c.palette().colors().iter().map(|c| c.to_hex()).collect())
                    .unwrap_or_default(),
                name,
            }
        })
        .collect();

    let info = PackageInfo {
        path: input.display().to_string(),
        color_groups: document.color_groups().len(),
        objects,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Package Information".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!("  {}: {}", "Color groups".cyan(), info.color_groups);

                for object in &info.objects {
                    println!();
                    println!("  {}", object.name.bold());
                    if let Some(ref id) = object.id {
                        println!("    {}: {}", "Id".cyan(), id);
                    }
                    println!("    {}: {}", "Vertices".cyan(), object.vertices);
                    println!("    {}: {}", "Faces".cyan(), object.faces);
                    println!(
                        "    {}: {}",
                        "Mesh color".cyan(),
                        object.mesh_color.as_deref().unwrap_or("none")
                    );
                    println!("    {}: {}", "Painted faces".cyan(), object.painted_faces);
                    if !object.colors.is_empty() {
                        println!("    {}: {}", "Colors".cyan(), object.colors.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}
