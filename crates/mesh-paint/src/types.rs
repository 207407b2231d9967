//! Core value types: colors, mesh objects and faces.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PaintError, PaintResult};

/// Per-axis tolerance for matching in-memory positions against file vertices.
///
/// Used by the correspondence resolver and [`same_position`]. Face adjacency
/// deliberately uses exact equality instead.
pub const POSITION_TOLERANCE: f64 = 1e-4;

/// Per-axis tolerance when comparing unit normals during flood-fill.
pub const NORMAL_TOLERANCE: f64 = 0.01;

/// Triangles with an area at or below this have no defined normal.
pub const DEGENERATE_AREA_EPSILON: f64 = 1e-12;

/// An 8-bit-per-channel RGB color.
///
/// The canonical text form is `#rrggbb` in lowercase. Parsing accepts
/// `#rgb`, `#rrggbb` and `#rrggbbaa` (alpha is dropped) in any case, with or
/// without the leading `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Unpainted faces display as white.
    pub const WHITE: Color = Color::new(0xff, 0xff, 0xff);

    /// Create a new color from RGB components.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from floating point values in [0, 1] range.
    #[inline]
    pub fn from_float(r: f32, g: f32, b: f32) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }

    /// Convert to floating point values in [0, 1] range.
    #[inline]
    pub fn to_float(&self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }

    /// Canonical `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = PaintError;

    fn from_str(s: &str) -> PaintResult<Self> {
        let invalid = || PaintError::InvalidColor {
            value: s.to_string(),
        };
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !hex.is_ascii() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|v| v * 17)
                .map_err(|_| invalid())
        };

        match hex.len() {
            3 => Ok(Color::new(nibble(0)?, nibble(1)?, nibble(2)?)),
            6 | 8 => Ok(Color::new(byte(0)?, byte(2)?, byte(4)?)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = PaintError;

    fn try_from(value: String) -> PaintResult<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Whether two positions agree within [`POSITION_TOLERANCE`] on every axis.
#[inline]
pub fn same_position(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    (a.x - b.x).abs() <= POSITION_TOLERANCE
        && (a.y - b.y).abs() <= POSITION_TOLERANCE
        && (a.z - b.z).abs() <= POSITION_TOLERANCE
}

/// Whether two face normals agree within `tolerance` on every axis.
///
/// An undefined normal (degenerate face) matches nothing, not even another
/// undefined normal.
#[inline]
pub fn normals_match(a: Option<&Vector3<f64>>, b: Option<&Vector3<f64>>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            (a.x - b.x).abs() <= tolerance
                && (a.y - b.y).abs() <= tolerance
                && (a.z - b.z).abs() <= tolerance
        }
        _ => false,
    }
}

/// A named mesh with a non-indexed position buffer.
///
/// Every three consecutive positions form one triangle, so face `i` starts at
/// position `3 * i`. Positions are kept in file units; display transforms
/// belong on a separate copy.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshObject {
    name: String,
    positions: Vec<Point3<f64>>,
}

impl MeshObject {
    /// Create a mesh object, validating that positions come in triples.
    pub fn new(name: impl Into<String>, positions: Vec<Point3<f64>>) -> PaintResult<Self> {
        let name = name.into();
        if positions.len() % 3 != 0 {
            return Err(PaintError::invalid_geometry(format!(
                "{:?} has {} positions, not a multiple of 3",
                name,
                positions.len()
            )));
        }
        Ok(Self { name, positions })
    }

    /// Create a mesh object from a flat `[x, y, z, x, y, z, ...]` buffer,
    /// the layout GPU position attributes use.
    pub fn from_flat(name: impl Into<String>, coords: &[f32]) -> PaintResult<Self> {
        let name = name.into();
        if coords.len() % 9 != 0 {
            return Err(PaintError::invalid_geometry(format!(
                "{:?} has {} coordinates, not a multiple of 9",
                name,
                coords.len()
            )));
        }
        let positions = coords
            .chunks_exact(3)
            .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64))
            .collect();
        Ok(Self { name, positions })
    }

    /// Object name, the join key against `<object name="...">`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All positions, three per face.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Geometry of one face, or `None` past the end.
    pub fn face(&self, index: usize) -> Option<Face> {
        let a = index.checked_mul(3)?;
        let tri = self.positions.get(a..a.checked_add(3)?)?;
        Some(Face::new(index, tri[0], tri[1], tri[2]))
    }

    /// Like [`face`](Self::face) but reports an out-of-range index as an error.
    pub fn try_face(&self, index: usize) -> PaintResult<Face> {
        self.face(index)
            .ok_or_else(|| PaintError::face_out_of_range(index, self.face_count()))
    }

    /// Iterate over all faces in order.
    pub fn faces(&self) -> impl Iterator<Item = Face> + '_ {
        self.positions
            .chunks_exact(3)
            .enumerate()
            .map(|(i, tri)| Face::new(i, tri[0], tri[1], tri[2]))
    }
}

/// A triangle of a [`MeshObject`], derived on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Face index within the mesh.
    pub index: usize,
    /// Vertex offsets into the position buffer (`3i`, `3i+1`, `3i+2`).
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
    pub v3: Point3<f64>,
    /// Unit normal, `None` for zero-area triangles.
    pub normal: Option<Vector3<f64>>,
}

impl Face {
    /// Build a face and compute its normal by the right-hand rule.
    pub fn new(index: usize, v1: Point3<f64>, v2: Point3<f64>, v3: Point3<f64>) -> Self {
        let n = (v2 - v1).cross(&(v3 - v1));
        let len = n.norm();
        // NaN lengths fail this comparison too.
        let normal = if len * 0.5 > DEGENERATE_AREA_EPSILON {
            Some(n / len)
        } else {
            None
        };
        Self {
            index,
            a: index * 3,
            b: index * 3 + 1,
            c: index * 3 + 2,
            v1,
            v2,
            v3,
            normal,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.normal.is_none()
    }

    #[inline]
    pub fn vertices(&self) -> [Point3<f64>; 3] {
        [self.v1, self.v2, self.v3]
    }

    /// The three undirected edges as position pairs.
    pub fn edges(&self) -> [(Point3<f64>, Point3<f64>); 3] {
        [(self.v1, self.v2), (self.v2, self.v3), (self.v3, self.v1)]
    }

    #[inline]
    pub fn area(&self) -> f64 {
        (self.v2 - self.v1).cross(&(self.v3 - self.v1)).norm() * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn test_color_parse() {
        assert_eq!("#ff0000".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("#F00".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("00FF80".parse::<Color>().unwrap(), Color::new(0, 255, 128));
        assert_eq!("#11223344".parse::<Color>().unwrap(), Color::new(0x11, 0x22, 0x33));
        assert_eq!("#abc".parse::<Color>().unwrap(), Color::new(0xaa, 0xbb, 0xcc));
    }

    #[test]
    fn test_color_parse_rejects_garbage() {
        for bad in ["", "#", "#ff00", "#gg0000", "red", "#ff00000", "#ＦＦ0"] {
            let err = bad.parse::<Color>().unwrap_err();
            assert!(matches!(err, PaintError::InvalidColor { .. }), "{bad}");
        }
    }

    #[test]
    fn test_color_canonical_lowercase() {
        let c: Color = "#ABCDEF".parse().unwrap();
        assert_eq!(c.to_string(), "#abcdef");
        assert_eq!(c.to_hex(), "#abcdef");
        assert_eq!(Color::default(), Color::WHITE);
    }

    #[test]
    fn test_color_float_conversion() {
        let c = Color::from_float(1.0, 0.5, -2.0);
        assert_eq!(c, Color::new(255, 128, 0));
        let (r, g, b) = Color::new(255, 0, 51).to_float();
        assert_relative_eq!(r, 1.0);
        assert_relative_eq!(g, 0.0);
        assert_relative_eq!(b, 0.2);
    }

    #[test]
    fn test_color_serde_as_string() {
        let text = String::from(Color::new(1, 2, 3));
        assert_eq!(text, "#010203");
        let back = Color::try_from(text).unwrap();
        assert_eq!(back, Color::new(1, 2, 3));
    }

    #[test]
    fn test_mesh_object_validates_triples() {
        let err = MeshObject::new("bad", vec![p(0.0, 0.0, 0.0); 4]).unwrap_err();
        assert!(matches!(err, PaintError::InvalidGeometry { .. }));

        let err = MeshObject::from_flat("bad", &[0.0; 6]).unwrap_err();
        assert!(matches!(err, PaintError::InvalidGeometry { .. }));

        let mesh = MeshObject::from_flat("ok", &[0.0; 18]).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn test_face_accessor() {
        let mesh = MeshObject::new(
            "tri",
            vec![
                p(0.0, 0.0, 0.0),
                p(1.0, 0.0, 0.0),
                p(0.0, 1.0, 0.0),
                p(0.0, 0.0, 0.0),
                p(0.0, 1.0, 0.0),
                p(1.0, 0.0, 0.0),
            ],
        )
        .unwrap();

        let face = mesh.face(1).unwrap();
        assert_eq!((face.a, face.b, face.c), (3, 4, 5));
        assert_eq!(face.v2, p(0.0, 1.0, 0.0));
        let n = mesh.face(0).unwrap().normal.unwrap();
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, 1.0));
        let n = face.normal.unwrap();
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(face.area(), 0.5);

        assert!(mesh.face(2).is_none());
        assert!(matches!(
            mesh.try_face(2),
            Err(PaintError::FaceOutOfRange {
                face: 2,
                face_count: 2
            })
        ));
        assert_eq!(mesh.faces().count(), 2);
    }

    #[test]
    fn test_degenerate_face_has_no_normal() {
        let collinear = Face::new(0, p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0));
        assert!(collinear.is_degenerate());

        let point = Face::new(0, p(1.0, 1.0, 1.0), p(1.0, 1.0, 1.0), p(1.0, 1.0, 1.0));
        assert!(point.is_degenerate());

        let nan = Face::new(0, p(f64::NAN, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        assert!(nan.is_degenerate());
    }

    #[test]
    fn test_normals_match() {
        let up = Vector3::new(0.0, 0.0, 1.0);
        let nearly = Vector3::new(0.005, 0.0, 0.99999);
        let side = Vector3::new(1.0, 0.0, 0.0);
        assert!(normals_match(Some(&up), Some(&nearly), NORMAL_TOLERANCE));
        assert!(!normals_match(Some(&up), Some(&side), NORMAL_TOLERANCE));
        assert!(!normals_match(None, Some(&up), NORMAL_TOLERANCE));
        assert!(!normals_match(None, None, NORMAL_TOLERANCE));
    }

    #[test]
    fn test_same_position() {
        assert!(same_position(&p(1.0, 2.0, 3.0), &p(1.00005, 2.0, 2.99995)));
        assert!(!same_position(&p(1.0, 2.0, 3.0), &p(1.001, 2.0, 3.0)));
    }
}
