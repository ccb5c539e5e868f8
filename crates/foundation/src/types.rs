//! Core value types
//!
//! Every piece of data a pipeline script manipulates is text until the
//! moment it is consumed. These types describe what the text is allowed
//! to mean: the closed set of value kinds, parsed values, and the
//! geographic extent record.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a literal does not parse as its declared kind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("invalid {kind} literal '{literal}': {reason}")]
    InvalidLiteral {
        kind: &'static str,
        literal: String,
        reason: String,
    },
}

impl ValueError {
    fn invalid(kind: &'static str, literal: &str, reason: impl Into<String>) -> Self {
        ValueError::InvalidLiteral {
            kind,
            literal: literal.to_string(),
            reason: reason.into(),
        }
    }
}

/// Whether a declared argument is consumed or produced by its callee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Signature keyword for this direction
    pub const fn keyword(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Direction> {
        match word {
            "IN" => Some(Direction::In),
            "OUT" => Some(Direction::Out),
            _ => None,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Direction::In)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Execution phases in order
///
/// A launch walks the same command tree twice: once to prove it can run
/// without touching storage, once to actually run it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Check,
    Execute,
}

impl Phase {
    pub fn is_check(&self) -> bool {
        matches!(self, Phase::Check)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Check => write!(f, "check"),
            Phase::Execute => write!(f, "execute"),
        }
    }
}

/// Rectangular geographic extent in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// The full geographic world
    pub const WORLD: Extent = Extent::new(-180.0, -90.0, 180.0, 90.0);

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Extent {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl std::str::FromStr for Extent {
    type Err = ValueError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(ValueError::invalid(
                "EXTENT",
                text,
                format!("expected 4 comma-separated numbers, found {}", parts.len()),
            ));
        }
        let mut coords = [0.0_f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = parse_finite("EXTENT", text, part)?;
        }
        let extent = Extent::new(coords[0], coords[1], coords[2], coords[3]);
        if extent.min_x >= extent.max_x {
            return Err(ValueError::invalid("EXTENT", text, "min x must be below max x"));
        }
        if extent.min_y >= extent.max_y {
            return Err(ValueError::invalid("EXTENT", text, "min y must be below max y"));
        }
        Ok(extent)
    }
}

/// The closed set of kinds a variable, constant or argument may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Integer,
    Float,
    Str,
    CellSize,
    Extent,
    Directory,
    File,
    Raster,
    RasterList,
    Vector,
}

impl TypeKind {
    /// Every kind, in declaration-keyword order
    pub const ALL: [TypeKind; 11] = [
        TypeKind::Boolean,
        TypeKind::Integer,
        TypeKind::Float,
        TypeKind::Str,
        TypeKind::CellSize,
        TypeKind::Extent,
        TypeKind::Directory,
        TypeKind::File,
        TypeKind::Raster,
        TypeKind::RasterList,
        TypeKind::Vector,
    ];

    /// Script keyword that declares this kind
    pub const fn keyword(&self) -> &'static str {
        match self {
            TypeKind::Boolean => "BOOLEAN",
            TypeKind::Integer => "INTEGER",
            TypeKind::Float => "FLOAT",
            TypeKind::Str => "STRING",
            TypeKind::CellSize => "CELLSIZE",
            TypeKind::Extent => "EXTENT",
            TypeKind::Directory => "DIR",
            TypeKind::File => "FILE",
            TypeKind::Raster => "RASTER",
            TypeKind::RasterList => "RASTERLIST",
            TypeKind::Vector => "VECTOR",
        }
    }

    /// True for kinds whose value names a single stored resource
    pub const fn is_path(&self) -> bool {
        matches!(
            self,
            TypeKind::Directory | TypeKind::File | TypeKind::Raster | TypeKind::Vector
        )
    }

    /// True for kinds whose value names a sequence of stored resources
    pub const fn is_path_list(&self) -> bool {
        matches!(self, TypeKind::RasterList)
    }

    /// Parse a literal into a value of this kind.
    ///
    /// Pure text-to-value conversion: no storage is consulted and no
    /// range constraint applied. Callers layer those checks on top.
    pub fn parse_literal(&self, literal: &str) -> Result<Value, ValueError> {
        let keyword = self.keyword();
        match self {
            TypeKind::Boolean => match literal.trim().to_ascii_uppercase().as_str() {
                "TRUE" => Ok(Value::Boolean(true)),
                "FALSE" => Ok(Value::Boolean(false)),
                _ => Err(ValueError::invalid(keyword, literal, "expected TRUE or FALSE")),
            },
            TypeKind::Integer => literal
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| ValueError::invalid(keyword, literal, e.to_string())),
            TypeKind::Float => parse_finite(keyword, literal, literal).map(Value::Float),
            TypeKind::Str => Ok(Value::Str(literal.to_string())),
            TypeKind::CellSize => {
                let size = parse_finite(keyword, literal, literal)?;
                if size <= 0.0 {
                    return Err(ValueError::invalid(keyword, literal, "cell size must be positive"));
                }
                Ok(Value::CellSize(size))
            }
            TypeKind::Extent => literal.parse::<Extent>().map(Value::Extent),
            TypeKind::Directory | TypeKind::File | TypeKind::Raster | TypeKind::Vector => {
                let trimmed = literal.trim();
                if trimmed.is_empty() {
                    return Err(ValueError::invalid(keyword, literal, "path must not be empty"));
                }
                Ok(Value::Path(PathBuf::from(trimmed)))
            }
            TypeKind::RasterList => {
                // Empty slots are preserved; a calculation decides what
                // a placeholder element means.
                let paths = literal
                    .split('|')
                    .map(|part| PathBuf::from(part.trim()))
                    .collect();
                Ok(Value::PathList(paths))
            }
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A parsed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    CellSize(f64),
    Extent(Extent),
    Path(PathBuf),
    PathList(Vec<PathBuf>),
}

impl Value {
    /// Short name of this value's shape, for diagnostics
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::CellSize(_) => "CELLSIZE",
            Value::Extent(_) => "EXTENT",
            Value::Path(_) => "PATH",
            Value::PathList(_) => "PATHLIST",
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers widen to float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) | Value::CellSize(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_extent(&self) -> Option<Extent> {
        match self {
            Value::Extent(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            Value::Path(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_path_list(&self) -> Option<&[PathBuf]> {
        match self {
            Value::PathList(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) | Value::CellSize(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Extent(v) => write!(f, "{v}"),
            Value::Path(v) => write!(f, "{}", v.display()),
            Value::PathList(v) => {
                for (i, path) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", path.display())?;
                }
                Ok(())
            }
        }
    }
}

fn parse_finite(kind: &'static str, literal: &str, part: &str) -> Result<f64, ValueError> {
    let value = part
        .trim()
        .parse::<f64>()
        .map_err(|e| ValueError::invalid(kind, literal, e.to_string()))?;
    if !value.is_finite() {
        return Err(ValueError::invalid(kind, literal, "not a finite number"));
    }
    Ok(value)
}
