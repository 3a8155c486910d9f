// oxidemap-aggregation/src/field.rs
// Field references and the exposed-field sets used for scope resolution

use crate::error::{AggregationError, Result};

/// Name of the identifier field every document carries
pub const UNDERSCORE_ID: &str = "_id";

/// Symbolic reference to a document field.
///
/// The `name` is what the caller wrote; the `target` is the wire-level key
/// the reference ultimately points at. The two differ after aliasing
/// (`and("foo").alias("bar")` keeps name `bar`, target `foo`) or after a
/// schema rename (`id` stored as `_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    target: String,
}

impl Field {
    /// Create a reference where name and target coincide
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::with_target(name.clone(), name)
    }

    /// Create a reference pointing at a differently named wire key
    pub fn with_target(name: impl Into<String>, target: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let target = target.into();

        if name.is_empty() {
            return Err(AggregationError::InvalidArgument(
                "field name must not be empty".to_string(),
            ));
        }
        if target.is_empty() {
            return Err(AggregationError::InvalidArgument(
                "field target must not be empty".to_string(),
            ));
        }

        Ok(Field { name, target })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the reference points at a wire key other than its own name
    pub fn is_aliased(&self) -> bool {
        self.name != self.target
    }
}

/// A field made resolvable by some scope.
///
/// Synthetic fields are variable bindings introduced by `$let`/`$filter`
/// rather than genuine document fields; they render with the `$$` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedField {
    field: Field,
    synthetic: bool,
}

impl ExposedField {
    /// Expose a genuine document field
    pub fn new(field: Field) -> Self {
        ExposedField {
            field,
            synthetic: false,
        }
    }

    /// Expose a variable binding
    pub fn synthetic(field: Field) -> Self {
        ExposedField {
            field,
            synthetic: true,
        }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn target(&self) -> &str {
        self.field.target()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// The renderable form of this exposed field
    pub fn reference(&self) -> FieldReference {
        FieldReference {
            exposed: self.clone(),
        }
    }
}

/// Ordered set of fields visible at one scope.
///
/// Names are unique; ordering is insignificant for lookup and kept only so
/// diagnostics stay stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposedFields {
    fields: Vec<ExposedField>,
}

impl ExposedFields {
    pub fn none() -> Self {
        Self::default()
    }

    /// Expose the given document fields
    pub fn from_fields<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Field>,
    {
        let mut exposed = ExposedFields::none();
        for field in fields {
            exposed.expose(ExposedField::new(field));
        }
        exposed
    }

    /// Expose the given names as variable bindings
    pub fn synthetic(names: &[&str]) -> Result<Self> {
        let mut exposed = ExposedFields::none();
        for name in names {
            exposed.expose(ExposedField::synthetic(Field::new(*name)?));
        }
        Ok(exposed)
    }

    /// Add a field; a duplicate name replaces the earlier entry in place
    pub fn expose(&mut self, field: ExposedField) {
        match self.fields.iter_mut().find(|f| f.name() == field.name()) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Look up an exposed field by name
    pub fn lookup(&self, name: &str) -> Option<&ExposedField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExposedField> {
        self.fields.iter()
    }
}

/// A fully resolved field reference, ready to render.
///
/// Variable bindings render as `$$name` (raw binding name, never remapped);
/// everything else renders as `$target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    exposed: ExposedField,
}

impl FieldReference {
    pub fn target(&self) -> &str {
        self.exposed.target()
    }

    pub fn is_synthetic(&self) -> bool {
        self.exposed.is_synthetic()
    }

    /// The wire-level string form of this reference
    pub fn to_wire(&self) -> String {
        if self.exposed.is_synthetic() {
            format!("$${}", self.exposed.name())
        } else {
            format!("${}", self.exposed.target())
        }
    }
}
