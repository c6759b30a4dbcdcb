//! Filter operand values.
//!
//! A statement's right-hand side starts out as a literal or a variable
//! reference. Binding replaces references with a literal, a [`ValueSet`],
//! or the explicit [`FilterValue::Undefined`] marker.

use indexmap::IndexSet;
use serde_json::{Number, Value};

use crate::var_ref::{is_value_variable, VarRef, VarRefError};

/// A hashable JSON scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// `None` for arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(Scalar::Number(n.clone())),
            Value::String(s) => Some(Scalar::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Deduplicated set of scalars, iterated in first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    items: IndexSet<Scalar>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the value was already present.
    pub fn insert(&mut self, value: Scalar) -> bool {
        self.items.insert(value)
    }

    pub fn contains(&self, value: &Scalar) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scalar> {
        self.items.iter()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(Scalar::to_json).collect())
    }
}

// Set semantics: order is not part of equality.
impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl Eq for ValueSet {}

impl FromIterator<Scalar> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Scalar>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Scalar;
    type IntoIter = indexmap::set::Iter<'a, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Right-hand side of a filter statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// A concrete value: scalar, literal array, or record. Build from JSON
    /// with [`FilterValue::from_json`] so `$`-strings are not taken literally.
    Literal(Value),
    /// An unbound variable reference.
    Variable(VarRef),
    /// A bound, deduplicated set (from an array-shaped resolution).
    Set(ValueSet),
    /// A well-formed reference that did not resolve to anything.
    Undefined,
}

impl FilterValue {
    /// Decode a wire value: `$`-strings become variable references.
    pub fn from_json(value: Value) -> Result<Self, VarRefError> {
        if is_value_variable(&value) {
            let token = value.as_str().unwrap_or_default();
            return Ok(FilterValue::Variable(VarRef::parse(token)?));
        }
        Ok(FilterValue::Literal(value))
    }

    /// Wire form. `Set` becomes an array and `Undefined` becomes `null`.
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Literal(value) => value.clone(),
            FilterValue::Variable(var) => Value::String(var.token().to_string()),
            FilterValue::Set(set) => set.to_json(),
            FilterValue::Undefined => Value::Null,
        }
    }

    pub fn as_variable(&self) -> Option<&VarRef> {
        match self {
            FilterValue::Variable(var) => Some(var),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, FilterValue::Variable(_))
    }
}

/// `$`-strings become variable references, as on the wire.
impl TryFrom<Value> for FilterValue {
    type Error = VarRefError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        FilterValue::from_json(value)
    }
}

impl From<VarRef> for FilterValue {
    fn from(value: VarRef) -> Self {
        FilterValue::Variable(value)
    }
}

impl From<ValueSet> for FilterValue {
    fn from(value: ValueSet) -> Self {
        FilterValue::Set(value)
    }
}
