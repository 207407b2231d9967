//! Per-object color assignments: a base color plus per-face overrides.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::adjacency::AdjacencyGraph;
use crate::color_group::ColorPalette;
use crate::error::{PaintError, PaintResult};
use crate::region::{FloodFillCriteria, flood_fill_colors};
use crate::types::{Color, MeshObject};

/// One face painted with one color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceColor {
    pub face: usize,
    pub color: Color,
}

/// Colors of one mesh object.
///
/// Overrides behave as a map keyed by face index that remembers insertion
/// order: painting a face that already has an override replaces the color
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorAssignment {
    mesh_color: Option<Color>,
    overrides: Vec<FaceColor>,
    positions: HashMap<usize, usize>,
}

impl ColorAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An assignment with only a base color.
    pub fn with_mesh_color(color: Color) -> Self {
        Self {
            mesh_color: Some(color),
            ..Default::default()
        }
    }

    #[inline]
    pub fn mesh_color(&self) -> Option<Color> {
        self.mesh_color
    }

    /// Set or clear the base color without touching overrides.
    pub fn set_mesh_color(&mut self, color: Option<Color>) {
        self.mesh_color = color;
    }

    /// Repaint the whole object: set the base color and drop all overrides.
    pub fn paint_mesh(&mut self, color: Color) {
        self.mesh_color = Some(color);
        self.clear_overrides();
    }

    /// Overrides in the order they were first painted.
    #[inline]
    pub fn overrides(&self) -> &[FaceColor] {
        &self.overrides
    }

    pub fn override_for(&self, face: usize) -> Option<Color> {
        self.positions.get(&face).map(|&i| self.overrides[i].color)
    }

    /// Insert or replace the override of one face. Returns the previous
    /// override color.
    pub fn paint_face(&mut self, face: usize, color: Color) -> Option<Color> {
        match self.positions.get(&face) {
            Some(&i) => Some(std::mem::replace(&mut self.overrides[i].color, color)),
            None => {
                self.positions.insert(face, self.overrides.len());
                self.overrides.push(FaceColor { face, color });
                None
            }
        }
    }

    /// Paint a face unless it already carries exactly this color, in which
    /// case its override is removed. Returns whether the face is now
    /// overridden.
    pub fn toggle_face(&mut self, face: usize, color: Color) -> bool {
        if self.override_for(face) == Some(color) {
            self.clear_face(face);
            false
        } else {
            self.paint_face(face, color);
            true
        }
    }

    /// Remove the override of one face. Returns its color.
    pub fn clear_face(&mut self, face: usize) -> Option<Color> {
        let index = self.positions.remove(&face)?;
        let removed = self.overrides.remove(index);
        for entry in &self.overrides[index..] {
            if let Some(pos) = self.positions.get_mut(&entry.face) {
                *pos -= 1;
            }
        }
        Some(removed.color)
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
        self.positions.clear();
    }

    /// Flood-fill from `seed` and paint every face of the region.
    /// Returns the number of faces painted.
    pub fn paint_region(
        &mut self,
        mesh: &MeshObject,
        graph: &AdjacencyGraph,
        seed: usize,
        color: Color,
        criteria: &FloodFillCriteria,
    ) -> PaintResult<usize> {
        let region = flood_fill_colors(mesh, graph, seed, color, criteria)?;
        let painted = region.len();
        self.extend(region);
        Ok(painted)
    }

    /// The color a face displays: its override, else the base color, else
    /// white.
    pub fn face_color(&self, face: usize) -> Color {
        self.override_for(face)
            .or(self.mesh_color)
            .unwrap_or(Color::WHITE)
    }

    /// True when nothing is painted.
    pub fn is_empty(&self) -> bool {
        self.mesh_color.is_none() && self.overrides.is_empty()
    }

    /// Distinct colors in group order: base color first, then overrides in
    /// the order they were painted.
    pub fn palette(&self) -> ColorPalette {
        self.mesh_color
            .into_iter()
            .chain(self.overrides.iter().map(|o| o.color))
            .collect()
    }

    /// Check every override against the face count of the mesh it targets.
    pub fn validate_faces(&self, face_count: usize) -> PaintResult<()> {
        match self.overrides.iter().find(|o| o.face >= face_count) {
            Some(o) => Err(PaintError::face_out_of_range(o.face, face_count)),
            None => Ok(()),
        }
    }
}

impl Extend<FaceColor> for ColorAssignment {
    fn extend<I: IntoIterator<Item = FaceColor>>(&mut self, iter: I) {
        for FaceColor { face, color } in iter {
            self.paint_face(face, color);
        }
    }
}

/// Assignments for every painted object, keyed by object name.
///
/// Iteration is ordered by name, which makes the color-group ids allocated
/// during export depend only on the document and the assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorAssignments {
    objects: BTreeMap<String, ColorAssignment>,
}

impl ColorAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ColorAssignment> {
        self.objects.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ColorAssignment> {
        self.objects.get_mut(name)
    }

    /// The assignment for `name`, created empty if missing.
    pub fn entry(&mut self, name: impl Into<String>) -> &mut ColorAssignment {
        self.objects.entry(name.into()).or_default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        assignment: ColorAssignment,
    ) -> Option<ColorAssignment> {
        self.objects.insert(name.into(), assignment)
    }

    pub fn remove(&mut self, name: &str) -> Option<ColorAssignment> {
        self.objects.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColorAssignment)> {
        self.objects.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<(String, ColorAssignment)> for ColorAssignments {
    fn from_iter<I: IntoIterator<Item = (String, ColorAssignment)>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}
