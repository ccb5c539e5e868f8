//! Type registry and contextual validation
//!
//! The registry maps declaration keywords to value kinds. Parsing a
//! literal is pure; everything storage- or range-aware happens here,
//! where the phase, the argument direction and the probe are known.

use indexmap::IndexMap;

use gridflow_calc::ValueRange;
use gridflow_foundation::{
    Direction, Phase, ScriptLocation, StorageProbe, TypeKind, Value,
};

use crate::error::{Error, Result};

/// Keyword-indexed registry of declarable kinds
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    kinds: IndexMap<String, TypeKind>,
}

impl TypeRegistry {
    /// Registry holding every built-in kind under its keyword
    pub fn with_builtins() -> Self {
        let mut kinds = IndexMap::new();
        for kind in TypeKind::ALL {
            kinds.insert(kind.keyword().to_string(), kind);
        }
        TypeRegistry { kinds }
    }

    /// Register an alias keyword; keywords are exclusive.
    pub fn register(&mut self, keyword: &str, kind: TypeKind) -> Result<()> {
        let keyword = keyword.to_ascii_uppercase();
        if self.kinds.contains_key(&keyword) {
            return Err(Error::DuplicateName {
                name: keyword,
                location: ScriptLocation::internal("type registry"),
            });
        }
        self.kinds.insert(keyword, kind);
        Ok(())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.kinds.contains_key(&keyword.to_ascii_uppercase())
    }

    pub fn get(&self, keyword: &str, location: &ScriptLocation) -> Result<TypeKind> {
        self.kinds
            .get(&keyword.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| Error::UnknownType {
                name: keyword.to_string(),
                location: location.clone(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeKind)> {
        self.kinds.iter().map(|(keyword, kind)| (keyword.as_str(), *kind))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Everything contextual a validation needs to know about one argument
pub struct ValidationCtx<'a> {
    pub phase: Phase,
    pub direction: Direction,
    /// Source variable was marked as virtually created by the check phase
    pub simulate_created: bool,
    pub create_output_dirs: bool,
    pub probe: &'a dyn StorageProbe,
    pub location: &'a ScriptLocation,
}

/// Parse a resolved literal as `kind`, then apply contextual checks.
pub fn validate_literal(
    kind: TypeKind,
    name: &str,
    literal: &str,
    range: Option<&ValueRange>,
    ctx: &ValidationCtx<'_>,
) -> Result<Value> {
    let value = kind.parse_literal(literal).map_err(|source| Error::TypeParseFailure {
        source,
        location: ctx.location.clone(),
    })?;
    validate_value(kind, name, &value, range, ctx)?;
    Ok(value)
}

/// Contextual checks for an already parsed value: numeric range,
/// input existence, output directory policy.
pub fn validate_value(
    kind: TypeKind,
    name: &str,
    value: &Value,
    range: Option<&ValueRange>,
    ctx: &ValidationCtx<'_>,
) -> Result<()> {
    if let Some(range) = range
        && let Some(number) = value.as_float()
        && !range.contains(number)
    {
        return Err(Error::RangeViolation {
            name: name.to_string(),
            value: number,
            range: *range,
            location: ctx.location.clone(),
        });
    }
    match ctx.direction {
        Direction::In => {
            if kind.is_path()
                && let Some(path) = value.as_path()
            {
                require_exists(kind, path, ctx)?;
            }
            if kind.is_path_list()
                && let Some(paths) = value.as_path_list()
            {
                for path in paths {
                    // Empty slots are placeholders; the calculation decides.
                    if path.as_os_str().is_empty() {
                        continue;
                    }
                    require_exists(kind, path, ctx)?;
                }
            }
        }
        Direction::Out => {
            if kind.is_path()
                && let Some(path) = value.as_path()
            {
                provide_parent(path, ctx)?;
            }
            if kind.is_path_list()
                && let Some(paths) = value.as_path_list()
            {
                for path in paths {
                    if path.as_os_str().is_empty() {
                        continue;
                    }
                    provide_parent(path, ctx)?;
                }
            }
        }
    }
    Ok(())
}

fn require_exists(kind: TypeKind, path: &std::path::Path, ctx: &ValidationCtx<'_>) -> Result<()> {
    if ctx.phase.is_check() && ctx.simulate_created {
        return Ok(());
    }
    let present = match kind {
        TypeKind::Directory => ctx.probe.is_directory(path),
        _ => ctx.probe.exists(path),
    };
    if !present {
        return Err(Error::MissingResource {
            kind: kind.keyword(),
            path: path.to_path_buf(),
            location: ctx.location.clone(),
        });
    }
    Ok(())
}

fn provide_parent(path: &std::path::Path, ctx: &ValidationCtx<'_>) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    // A bare file name lands in the working directory.
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    if ctx.probe.is_directory(parent) {
        return Ok(());
    }
    if !ctx.create_output_dirs {
        return Err(Error::MissingOutputDirectory {
            path: parent.to_path_buf(),
            reason: "missing and directory creation is disabled".into(),
            location: ctx.location.clone(),
        });
    }
    // The check phase only proves intent; execute materializes it.
    if ctx.phase.is_check() {
        return Ok(());
    }
    ctx.probe
        .create_directory(parent)
        .map_err(|err| Error::MissingOutputDirectory {
            path: parent.to_path_buf(),
            reason: err.to_string(),
            location: ctx.location.clone(),
        })
}
