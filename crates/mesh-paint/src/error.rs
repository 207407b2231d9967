//! Error types for color editing with rich diagnostics.
//!
//! Every failure carries:
//! - A machine-readable error code for programmatic handling
//! - Context (which object, which face, which archive entry)
//! - A recovery suggestion
//! - Terminal rendering via miette
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `PAINT-XXXX`:
//! - `PAINT-1xxx`: archive and file I/O errors
//! - `PAINT-2xxx`: model XML errors
//! - `PAINT-3xxx`: geometry and correspondence errors
//! - `PAINT-4xxx`: input validation errors
//!
//! None of these are retried. Export failures abort the whole export and no
//! partial archive is produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use mesh_paint::{PaintError, ErrorCode};
//!
//! let err = PaintError::correspondence("Cube", 7);
//! assert_eq!(err.code(), ErrorCode::Correspondence);
//! println!("{}", err.recovery_suggestion());
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for color editing operations.
pub type PaintResult<T> = Result<T, PaintError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Archive and I/O errors (1xxx)
    /// PAINT-1001: Failed to read file
    IoRead = 1001,
    /// PAINT-1002: Failed to write file
    IoWrite = 1002,
    /// PAINT-1003: Archive could not be opened or an entry could not be read
    ArchiveRead = 1003,
    /// PAINT-1004: Output archive could not be written
    ArchiveWrite = 1004,
    /// PAINT-1005: Archive has no model entry
    ModelNotFound = 1005,

    // Model XML errors (2xxx)
    /// PAINT-2001: Model XML is malformed
    XmlParse = 2001,

    // Geometry and correspondence errors (3xxx)
    /// PAINT-3001: In-memory face has no matching triangle element
    Correspondence = 3001,
    /// PAINT-3002: Object name matches zero or several objects
    AmbiguousObject = 3002,
    /// PAINT-3003: Geometry buffer is malformed
    InvalidGeometry = 3003,
    /// PAINT-3004: Operation was cancelled through its progress callback
    Cancelled = 3004,

    // Input validation errors (4xxx)
    /// PAINT-4001: Face index beyond the mesh
    FaceOutOfRange = 4001,
    /// PAINT-4002: Color literal could not be parsed
    InvalidColor = 4002,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `PAINT-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "PAINT-1001",
            ErrorCode::IoWrite => "PAINT-1002",
            ErrorCode::ArchiveRead => "PAINT-1003",
            ErrorCode::ArchiveWrite => "PAINT-1004",
            ErrorCode::ModelNotFound => "PAINT-1005",
            ErrorCode::XmlParse => "PAINT-2001",
            ErrorCode::Correspondence => "PAINT-3001",
            ErrorCode::AmbiguousObject => "PAINT-3002",
            ErrorCode::InvalidGeometry => "PAINT-3003",
            ErrorCode::Cancelled => "PAINT-3004",
            ErrorCode::FaceOutOfRange => "PAINT-4001",
            ErrorCode::InvalidColor => "PAINT-4002",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for paint errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export the package from the authoring software.
    ReexportFile,
    /// Check filesystem preconditions.
    CheckFile { checks: Vec<String> },
    /// Reload geometry from the same file before exporting.
    ReloadGeometry,
    /// Give the object a unique name.
    RenameObject { name: String },
    /// Fix the offending input value.
    FixInput { description: String },
    /// Nothing to do; the caller asked for this outcome.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile => {
                write!(f, "Try re-exporting the 3MF file from the original software")
            }
            RecoverySuggestion::CheckFile { checks } => {
                write!(f, "Check the file for: {}", checks.join(", "))
            }
            RecoverySuggestion::ReloadGeometry => write!(
                f,
                "Reload the model from this exact file; painted geometry must come from the file being rewritten"
            ),
            RecoverySuggestion::RenameObject { name } => {
                write!(f, "Give the object {:?} a unique name in the source file", name)
            }
            RecoverySuggestion::FixInput { description } => write!(f, "{}", description),
            RecoverySuggestion::None => write!(f, "No recovery needed"),
        }
    }
}

/// Location information for paint errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintLocation {
    /// A face of a named object.
    Face { object: String, index: usize },
    /// An object in the model document.
    Object { name: String },
    /// A byte offset in the model XML.
    Xml { offset: u64 },
    /// A file on disk.
    File { path: PathBuf },
}

impl std::fmt::Display for PaintLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaintLocation::Face { object, index } => write!(f, "face {} of {:?}", index, object),
            PaintLocation::Object { name } => write!(f, "object {:?}", name),
            PaintLocation::Xml { offset } => write!(f, "model XML at byte {}", offset),
            PaintLocation::File { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Errors that can occur while reading, painting or rewriting a package.
#[derive(Debug, Error, Diagnostic)]
pub enum PaintError {
    /// Error reading from a file.
    #[error("failed to read {path}")]
    #[diagnostic(code(paint::io::read), help("Check that the file exists and is readable"))]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write {path}")]
    #[diagnostic(
        code(paint::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive, or one of its entries, could not be read.
    #[error("failed to read 3MF archive: {details}")]
    #[diagnostic(
        code(paint::archive::read),
        help("The file is not a readable ZIP container. Try re-exporting it.")
    )]
    ArchiveRead {
        details: String,
        #[source]
        source: Option<zip::result::ZipError>,
    },

    /// The output archive could not be produced.
    #[error("failed to write 3MF archive: {details}")]
    #[diagnostic(code(paint::archive::write))]
    ArchiveWrite {
        details: String,
        #[source]
        source: Option<zip::result::ZipError>,
    },

    /// No model entry in the archive.
    #[error("no 3D model entry found in archive ({entries} entries)")]
    #[diagnostic(
        code(paint::archive::model_not_found),
        help("A 3MF package stores its model at 3D/3dmodel.model")
    )]
    ModelNotFound { entries: usize },

    /// Malformed model XML.
    #[error("malformed model XML: {details}")]
    #[diagnostic(code(paint::xml::parse))]
    XmlParse { details: String, offset: Option<u64> },

    /// An in-memory face has no counterpart among the triangle elements.
    #[error("could not map geometry to file: face {face} of {object:?} has no matching triangle")]
    #[diagnostic(
        code(paint::geometry::correspondence),
        help("The painted geometry must be loaded from the file being rewritten")
    )]
    Correspondence { object: String, face: usize },

    /// An assignment names zero or several objects with no safe fallback.
    #[error("object name {name:?} matches {matches} of {object_count} objects")]
    #[diagnostic(code(paint::geometry::ambiguous_object))]
    AmbiguousObject {
        name: String,
        matches: usize,
        object_count: usize,
    },

    /// Geometry buffer could not be interpreted as triangles.
    #[error("invalid geometry: {details}")]
    #[diagnostic(code(paint::geometry::invalid))]
    InvalidGeometry { details: String },

    /// The operation was cancelled through its progress callback.
    #[error("{operation} cancelled after {processed} of {total} faces")]
    #[diagnostic(code(paint::cancelled))]
    Cancelled {
        operation: &'static str,
        processed: usize,
        total: usize,
    },

    /// A face index beyond the end of the mesh.
    #[error("face {face} out of range: mesh has {face_count} faces")]
    #[diagnostic(code(paint::input::face_out_of_range))]
    FaceOutOfRange { face: usize, face_count: usize },

    /// A color literal that is not `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
    #[error("invalid color {value:?}")]
    #[diagnostic(
        code(paint::input::color),
        help("Colors are written as #RGB or #RRGGBB hex literals")
    )]
    InvalidColor { value: String },
}

impl PaintError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PaintError::IoRead { .. } => ErrorCode::IoRead,
            PaintError::IoWrite { .. } => ErrorCode::IoWrite,
            PaintError::ArchiveRead { .. } => ErrorCode::ArchiveRead,
            PaintError::ArchiveWrite { .. } => ErrorCode::ArchiveWrite,
            PaintError::ModelNotFound { .. } => ErrorCode::ModelNotFound,
            PaintError::XmlParse { .. } => ErrorCode::XmlParse,
            PaintError::Correspondence { .. } => ErrorCode::Correspondence,
            PaintError::AmbiguousObject { .. } => ErrorCode::AmbiguousObject,
            PaintError::InvalidGeometry { .. } => ErrorCode::InvalidGeometry,
            PaintError::Cancelled { .. } => ErrorCode::Cancelled,
            PaintError::FaceOutOfRange { .. } => ErrorCode::FaceOutOfRange,
            PaintError::InvalidColor { .. } => ErrorCode::InvalidColor,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            PaintError::IoRead { .. } => RecoverySuggestion::CheckFile {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            PaintError::IoWrite { .. } => RecoverySuggestion::CheckFile {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            PaintError::ArchiveRead { .. }
            | PaintError::ModelNotFound { .. }
            | PaintError::XmlParse { .. } => RecoverySuggestion::ReexportFile,
            PaintError::ArchiveWrite { .. } => RecoverySuggestion::CheckFile {
                checks: vec!["available memory".into()],
            },
            PaintError::Correspondence { .. } => RecoverySuggestion::ReloadGeometry,
            PaintError::AmbiguousObject { name, .. } => {
                RecoverySuggestion::RenameObject { name: name.clone() }
            }
            PaintError::InvalidGeometry { .. } => RecoverySuggestion::FixInput {
                description: "Supply three positions per triangle".into(),
            },
            PaintError::Cancelled { .. } => RecoverySuggestion::None,
            PaintError::FaceOutOfRange { face_count, .. } => RecoverySuggestion::FixInput {
                description: format!("Use a face index below {}", face_count),
            },
            PaintError::InvalidColor { .. } => RecoverySuggestion::FixInput {
                description: "Write colors as #RGB or #RRGGBB".into(),
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<PaintLocation> {
        match self {
            PaintError::Correspondence { object, face } => Some(PaintLocation::Face {
                object: object.clone(),
                index: *face,
            }),
            PaintError::AmbiguousObject { name, .. } => {
                Some(PaintLocation::Object { name: name.clone() })
            }
            PaintError::XmlParse {
                offset: Some(offset),
                ..
            } => Some(PaintLocation::Xml { offset: *offset }),
            PaintError::IoRead { path, .. } | PaintError::IoWrite { path, .. } => {
                Some(PaintLocation::File { path: path.clone() })
            }
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PaintError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PaintError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create an ArchiveRead error wrapping a zip error.
    pub fn archive_read(details: impl Into<String>, source: zip::result::ZipError) -> Self {
        PaintError::ArchiveRead {
            details: details.into(),
            source: Some(source),
        }
    }

    /// Create an ArchiveWrite error wrapping a zip error.
    pub fn archive_write(details: impl Into<String>, source: zip::result::ZipError) -> Self {
        PaintError::ArchiveWrite {
            details: details.into(),
            source: Some(source),
        }
    }

    /// Create an XmlParse error without position information.
    pub fn xml(details: impl Into<String>) -> Self {
        PaintError::XmlParse {
            details: details.into(),
            offset: None,
        }
    }

    /// Create an XmlParse error at a byte offset of the model XML.
    pub fn xml_at(details: impl Into<String>, offset: u64) -> Self {
        PaintError::XmlParse {
            details: details.into(),
            offset: Some(offset),
        }
    }

    /// Create a Correspondence error.
    pub fn correspondence(object: impl Into<String>, face: usize) -> Self {
        PaintError::Correspondence {
            object: object.into(),
            face,
        }
    }

    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(details: impl Into<String>) -> Self {
        PaintError::InvalidGeometry {
            details: details.into(),
        }
    }

    /// Create a FaceOutOfRange error.
    pub fn face_out_of_range(face: usize, face_count: usize) -> Self {
        PaintError::FaceOutOfRange { face, face_count }
    }
}
