//! Constant registry
//!
//! Named, immutable values visible to every script scope. A `$Name`
//! reference falls back to constants after variable lookup fails, and
//! no variable may ever take a constant's name.

use indexmap::IndexMap;

use gridflow_foundation::{Extent, ScriptLocation, TypeKind, Value};

use crate::error::{Error, Result};
use crate::types::TypeRegistry;

/// A named immutable value
#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
    description: String,
    kind: TypeKind,
    raw: String,
    value: Value,
}

impl Constant {
    fn new(name: &str, description: &str, kind: TypeKind, value: Value) -> Self {
        Constant {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            raw: value.to_string(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Literal text substituted for `$Name` references
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Name-indexed registry of constants
#[derive(Debug, Clone, Default)]
pub struct ConstantRegistry {
    constants: IndexMap<String, Constant>,
}

impl ConstantRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the stock geographic constants
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(Constant::new(
            "EXTENT_WORLD",
            "Global geographic extent in decimal degrees",
            TypeKind::Extent,
            Value::Extent(Extent::WORLD),
        ));
        registry.insert(Constant::new(
            "CELLSIZE_10SEC",
            "10 arc-second cell size in decimal degrees",
            TypeKind::CellSize,
            Value::CellSize(10.0 / 3600.0),
        ));
        registry.insert(Constant::new(
            "CELLSIZE_30SEC",
            "30 arc-second cell size in decimal degrees",
            TypeKind::CellSize,
            Value::CellSize(30.0 / 3600.0),
        ));
        registry.insert(Constant::new(
            "CELLSIZE_30MIN",
            "30 arc-minute cell size in decimal degrees",
            TypeKind::CellSize,
            Value::CellSize(0.5),
        ));
        registry.insert(Constant::new(
            "NODATA_VALUE",
            "Marker for cells carrying no data",
            TypeKind::Float,
            Value::Float(-999.0),
        ));
        registry
    }

    /// Register a constant from a literal; names are exclusive.
    pub fn add(
        &mut self,
        types: &TypeRegistry,
        name: &str,
        description: &str,
        type_name: &str,
        literal: &str,
    ) -> Result<()> {
        let location = ScriptLocation::internal("constant registry");
        if self.constants.contains_key(name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                location,
            });
        }
        let kind = types.get(type_name, &location)?;
        let value = kind.parse_literal(literal).map_err(|source| Error::TypeParseFailure {
            source,
            location,
        })?;
        self.constants.insert(
            name.to_string(),
            Constant {
                name: name.to_string(),
                description: description.to_string(),
                kind,
                raw: literal.to_string(),
                value,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    /// Constants in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.values()
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn insert(&mut self, constant: Constant) {
        self.constants.insert(constant.name.clone(), constant);
    }
}
