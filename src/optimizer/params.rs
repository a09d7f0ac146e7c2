//! Hyperparameter values, parameter tables and the configuration validator

use crate::error::{RaError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

/// Declared element type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Int,
    Float,
    Str,
    Bool,
    None,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "str",
            ParamKind::Bool => "bool",
            ParamKind::None => "None",
        };
        f.write_str(name)
    }
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::None => ParamKind::None,
        }
    }

    /// Get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamValue::Int(_) | ParamValue::Float(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{:?}", v),
            ParamValue::Str(v) => write!(f, "'{}'", v),
            ParamValue::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            ParamValue::None => f.write_str("None"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::None, Into::into)
    }
}

/// Name-keyed mapping that keeps insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for ParamMap<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> ParamMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced entry keeps its position
    pub fn insert(&mut self, name: impl Into<String>, value: V) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParamMap<ParamValue> {
    /// Builder-style insert for override maps
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value.into());
        self
    }
}

impl ParamMap<Vec<ParamValue>> {
    /// Builder-style insert for grid override maps
    pub fn with_values<T: Into<ParamValue>>(mut self, name: impl Into<String>, values: Vec<T>) -> Self {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }
}

impl<V> FromIterator<(String, V)> for ParamMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl<V> IntoIterator for ParamMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: fmt::Display> fmt::Display for ParamMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}': {}", name, value)?;
        }
        f.write_str("}")
    }
}

impl<V: Serialize> Serialize for ParamMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct ParamMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for ParamMapVisitor<V> {
    type Value = ParamMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of parameter names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut map = ParamMap::new();
        while let Some((name, value)) = access.next_entry::<String, V>()? {
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for ParamMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ParamMapVisitor(PhantomData))
    }
}

/// Fully resolved scalar configuration handed to an estimator builder
pub type FitConfiguration = ParamMap<ParamValue>;

/// Candidate values per parameter handed to grid search
pub type GridConfiguration = ParamMap<Vec<ParamValue>>;

/// Specification of one hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Accepted element kinds
    pub kinds: Vec<ParamKind>,
    pub default: ParamValue,
    /// Default candidate values for grid search
    pub grid: Vec<ParamValue>,
    /// Excluded from grid expansion unless overridden
    pub locked: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kinds: &[ParamKind], default: impl Into<ParamValue>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            kinds: kinds.to_vec(),
            grid: vec![default.clone()],
            default,
            locked: false,
        }
    }

    pub fn with_grid(mut self, grid: Vec<ParamValue>) -> Self {
        self.grid = grid;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Whether `value`'s kind is accepted; an integer is a valid float
    pub fn accepts(&self, value: &ParamValue) -> bool {
        let kind = value.kind();
        self.kinds.contains(&kind) || (kind == ParamKind::Int && self.kinds.contains(&ParamKind::Float))
    }

    /// Widen an integer supplied for a float-only slot
    fn coerce(&self, value: &ParamValue) -> ParamValue {
        match value {
            ParamValue::Int(v) if !self.kinds.contains(&ParamKind::Int) => ParamValue::Float(*v as f64),
            other => other.clone(),
        }
    }

    fn type_name(&self) -> String {
        self.kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn mismatch(&self, value: &ParamValue) -> RaError {
        RaError::TypeMismatch {
            name: self.name.clone(),
            expected: self.type_name(),
            actual: format!("{} ({})", value.kind(), value),
        }
    }
}

/// Ordered parameter table of one estimator kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamTable {
    specs: Vec<ParamSpec>,
}

impl ParamTable {
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    pub fn locked_params(&self) -> Vec<&str> {
        self.specs.iter().filter(|s| s.locked).map(|s| s.name.as_str()).collect()
    }

    pub fn non_locked_params(&self) -> Vec<&str> {
        self.specs.iter().filter(|s| !s.locked).map(|s| s.name.as_str()).collect()
    }

    pub fn default_types(&self) -> ParamMap<Vec<ParamKind>> {
        self.specs.iter().map(|s| (s.name.clone(), s.kinds.clone())).collect()
    }

    pub fn default_values(&self) -> FitConfiguration {
        self.specs.iter().map(|s| (s.name.clone(), s.default.clone())).collect()
    }

    pub fn default_grid(&self) -> GridConfiguration {
        self.specs.iter().map(|s| (s.name.clone(), s.grid.clone())).collect()
    }

    fn spec(&self, name: &str) -> Result<&ParamSpec> {
        self.get(name).ok_or_else(|| RaError::UnknownParameter(name.to_string()))
    }

    /// Validate one scalar override
    pub fn check_param(&self, name: &str, value: &ParamValue) -> Result<&ParamSpec> {
        let spec = self.spec(name)?;
        if !spec.accepts(value) {
            return Err(spec.mismatch(value));
        }
        Ok(spec)
    }

    /// Validate one grid override; every element must be accepted
    pub fn check_grid_param(&self, name: &str, values: &[ParamValue]) -> Result<&ParamSpec> {
        let spec = self.spec(name)?;
        if values.is_empty() {
            return Err(RaError::InvalidParameter {
                name: name.to_string(),
                value: "[]".to_string(),
                reason: "a grid needs at least one candidate".to_string(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !spec.accepts(v)) {
            return Err(spec.mismatch(bad));
        }
        Ok(spec)
    }

    /// Merge validated overrides onto a copy of the defaults
    pub fn resolve_fit(&self, overrides: Option<&FitConfiguration>) -> Result<FitConfiguration> {
        let mut config = self.default_values();
        if let Some(overrides) = overrides {
            for (name, value) in overrides.iter() {
                let spec = self.check_param(name, value)?;
                config.insert(name, spec.coerce(value));
            }
        }
        Ok(config)
    }

    /// Validate grid overrides, widening integers where needed
    pub fn resolve_grid_overrides(&self, overrides: &GridConfiguration) -> Result<GridConfiguration> {
        overrides
            .iter()
            .map(|(name, values)| {
                let spec = self.check_grid_param(name, values)?;
                Ok((name.to_string(), values.iter().map(|v| spec.coerce(v)).collect()))
            })
            .collect()
    }
}
