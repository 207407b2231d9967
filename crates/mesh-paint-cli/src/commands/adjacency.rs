//! meshpaint adjacency command - face adjacency statistics.

use std::io::Write;
use std::path::Path;

use anyhow::{Result, bail};
use colored::Colorize;
use mesh_paint::{
    AdjacencyParams, AdjacencyStrategy, MeshObject, Progress, ProgressCallback,
    build_adjacency_with_progress, read_archive_file, read_mesh_objects,
};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

/// Degenerate and isolated face lists are cut to this many entries in text mode.
const LIST_LIMIT: usize = 16;

#[derive(Serialize)]
struct AdjacencyInfo {
    object: String,
    faces: usize,
    edge_pairs: usize,
    max_degree: usize,
    symmetric: bool,
    isolated_faces: Vec<usize>,
    degenerate_faces: Vec<usize>,
}

fn select<'a>(meshes: &'a [MeshObject], object: Option<&str>) -> Result<Vec<&'a MeshObject>> {
    let Some(name) = object else {
        return Ok(meshes.iter().collect());
    };
    let selected: Vec<&MeshObject> = meshes.iter().filter(|m| m.name() == name).collect();
    if selected.is_empty() {
        let names: Vec<&str> = meshes.iter().map(|m| m.name()).collect();
        bail!("no mesh object named {:?} (available: {})", name, names.join(", "));
    }
    Ok(selected)
}

/// One progress line, redrawn in place. The caller ends the line once the
/// build returns, since throttling may skip the final report.
fn progress_line(name: &str, p: &Progress) -> String {
    format!("\r  {} {:>3}% ({}/{} faces)", name.dimmed(), p.percent(), p.current, p.total)
}

fn progress_bar(name: String) -> ProgressCallback {
    Box::new(move |p: &Progress| {
        eprint!("{}", progress_line(&name, p));
        let _ = std::io::stderr().flush();
        true
    })
}

pub fn run(
    input: &Path,
    object: Option<&str>,
    brute_force: bool,
    batch_size: usize,
    cli: &Cli,
) -> Result<()> {
    let source = read_archive_file(input)?;
    let meshes = read_mesh_objects(&source)?;
    let strategy = if brute_force {
        AdjacencyStrategy::BruteForce
    } else {
        AdjacencyStrategy::Bucketed
    };
    let params = AdjacencyParams::default()
        .with_strategy(strategy)
        .with_batch_size(batch_size);
    let show_progress = !cli.quiet && matches!(cli.format, OutputFormat::Text);

    let mut results = Vec::new();
    for mesh in select(&meshes, object)? {
        output::info(
            &format!("Building adjacency for {} ({} faces)...", mesh.name(), mesh.face_count()),
            cli.format,
            cli.quiet,
        );
        let callback = show_progress.then(|| progress_bar(mesh.name().to_string()));
        let built = build_adjacency_with_progress(mesh, &params, callback.as_ref());
        if callback.is_some() {
            eprintln!();
        }
        let graph = built?;

        results.push(AdjacencyInfo {
            object: mesh.name().to_string(),
            faces: graph.face_count(),
            edge_pairs: graph.edge_pair_count(),
            max_degree: (0..graph.face_count())
                .map(|i| graph.degree(i))
                .max()
                .unwrap_or(0),
            symmetric: graph.is_symmetric(),
            isolated_faces: graph.isolated_faces(),
            degenerate_faces: graph.degenerate_faces().to_vec(),
        });
    }

    match cli.format {
        OutputFormat::Json => {
            output::print(&results, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Face Adjacency".bold().underline());
                for info in &results {
                    println!();
                    println!("  {}", info.object.bold());
                    println!("    {}: {}", "Faces".cyan(), info.faces);
                    println!("    {}: {}", "Adjacent pairs".cyan(), info.edge_pairs);
                    println!("    {}: {}", "Max neighbors".cyan(), info.max_degree);
                    println!(
                        "    {}: {}",
                        "Symmetric".cyan(),
                        if info.symmetric { "yes" } else { "no" }
                    );
                    print_faces("Isolated faces", &info.isolated_faces);
                    print_faces("Degenerate faces", &info.degenerate_faces);
                }
                for info in results.iter().filter(|i| !i.degenerate_faces.is_empty()) {
                    output::warning(
                        &format!(
                            "{} has {} zero-area faces; they never join a region",
                            info.object,
                            info.degenerate_faces.len()
                        ),
                        cli.format,
                        cli.quiet,
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_faces(label: &str, faces: &[usize]) {
    if faces.is_empty() {
        println!("    {}: {}", label.cyan(), "none".green());
        return;
    }
    let shown: Vec<String> = faces.iter().take(LIST_LIMIT).map(usize::to_string).collect();
    let more = if faces.len() > LIST_LIMIT {
        format!(" (+{} more)", faces.len() - LIST_LIMIT)
    } else {
        String::new()
    };
    println!(
        "    {}: {} [{}]{}",
        label.cyan(),
        faces.len().to_string().yellow(),
        shown.join(", "),
        more
    );
}
