// oxidemap-aggregation/src/projection.rs
//! `$project` stage builder
//!
//! A [`Projection`] collects clause entries in order and renders them into
//! `{ "$project": { ... } }`. Per-field builders start from
//! [`Projection::and_field`] and keep the fluent chain going; every call
//! consumes the builder and returns a new immutable one.
//!
//! Wire shapes:
//! - plain include renders `field: 1`
//! - an include whose resolved wire key differs from its symbolic name
//!   (alias or schema rename) renders `alias: "$target"`
//! - exclusion renders `_id: 0` and is legal only for the identifier field
//! - computed entries render `alias: <expression document>`

use serde_json::{Map, Value};

use crate::context::ResolutionContext;
use crate::error::{AggregationError, Result};
use crate::expression::operators::DatePart;
use crate::expression::Expression;
use crate::field::{Field, UNDERSCORE_ID};
use crate::log_debug;
use crate::render::render;

#[derive(Debug, Clone, PartialEq)]
enum ProjectionEntry {
    Include(Field),
    Exclude(Field),
    Computed {
        target: String,
        expression: Expression,
    },
}

/// Ordered collection of `$project` clause entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    entries: Vec<ProjectionEntry>,
}

impl Projection {
    /// Start an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a projection including the given fields.
    ///
    /// An empty collection is rejected: a `$project` stage with no clause
    /// entries is not a valid stage.
    pub fn of(names: &[&str]) -> Result<Self> {
        if names.is_empty() {
            return Err(AggregationError::InvalidArgument(
                "projection requires at least one field".to_string(),
            ));
        }
        let mut projection = Projection::new();
        for name in names {
            projection
                .entries
                .push(ProjectionEntry::Include(Field::new(*name)?));
        }
        Ok(projection)
    }

    /// Start a per-field builder for the named document field
    pub fn and_field(self, name: &str) -> Result<ProjectedField> {
        Ok(ProjectedField {
            projection: self,
            field: Field::new(name)?,
            expression: None,
        })
    }

    /// Add a computed entry; the expression must be given an alias
    pub fn and(self, expression: impl Into<Expression>) -> ProjectedExpression {
        ProjectedExpression {
            projection: self,
            expression: expression.into(),
        }
    }

    /// Include the given fields as-is
    pub fn and_include(mut self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.entries
                .push(ProjectionEntry::Include(Field::new(*name)?));
        }
        Ok(self)
    }

    /// Suppress a field. Only the identifier field may be excluded; the
    /// projection stage has no syntax for excluding anything else alongside
    /// inclusions.
    pub fn and_exclude(mut self, name: &str) -> Result<Self> {
        if name != UNDERSCORE_ID {
            return Err(AggregationError::InvalidArgument(format!(
                "only the {} field can be excluded, found {}",
                UNDERSCORE_ID, name
            )));
        }
        self.entries
            .push(ProjectionEntry::Exclude(Field::new(name)?));
        Ok(self)
    }

    /// Render the `$project` stage document against a resolution context
    pub fn to_document(&self, context: &dyn ResolutionContext) -> Result<Value> {
        log_debug!("rendering $project with {} clause entries", self.entries.len());

        let mut clause = Map::new();
        for entry in &self.entries {
            match entry {
                ProjectionEntry::Include(field) => {
                    let reference = context.resolve(field)?;
                    if reference.target() != field.name() {
                        clause.insert(
                            field.name().to_string(),
                            Value::String(reference.to_wire()),
                        );
                    } else {
                        clause.insert(field.name().to_string(), Value::from(1));
                    }
                }
                ProjectionEntry::Exclude(field) => {
                    clause.insert(field.name().to_string(), Value::from(0));
                }
                ProjectionEntry::Computed { target, expression } => {
                    clause.insert(target.clone(), render(expression, context)?);
                }
            }
        }

        let mut stage = Map::new();
        stage.insert("$project".to_string(), Value::Object(clause));
        Ok(Value::Object(stage))
    }
}

/// Per-field fluent builder started by [`Projection::and_field`].
///
/// Until an operator is applied the entry is a plain include; applying one
/// turns it into a computed entry. Committing without an alias keys the
/// computed entry under the source field's own name.
pub struct ProjectedField {
    projection: Projection,
    field: Field,
    expression: Option<Expression>,
}

impl ProjectedField {
    fn map(self, f: impl FnOnce(Expression) -> Expression) -> Self {
        let ProjectedField {
            projection,
            field,
            expression,
        } = self;
        let current = expression.unwrap_or_else(|| Expression::FieldRef(field.clone()));
        ProjectedField {
            projection,
            field,
            expression: Some(f(current)),
        }
    }

    fn try_map(self, f: impl FnOnce(Expression) -> Result<Expression>) -> Result<Self> {
        let ProjectedField {
            projection,
            field,
            expression,
        } = self;
        let current = expression.unwrap_or_else(|| Expression::FieldRef(field.clone()));
        Ok(ProjectedField {
            projection,
            field,
            expression: Some(f(current)?),
        })
    }

    fn commit(self) -> Projection {
        let mut projection = self.projection;
        match self.expression {
            None => projection.entries.push(ProjectionEntry::Include(self.field)),
            Some(expression) => projection.entries.push(ProjectionEntry::Computed {
                target: self.field.name().to_string(),
                expression,
            }),
        }
        projection
    }

    // ========== Arithmetic ==========

    pub fn add(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.add(rhs))
    }

    pub fn subtract(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.subtract(rhs))
    }

    pub fn multiply(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.multiply(rhs))
    }

    pub fn divide(self, rhs: impl Into<Expression>) -> Result<Self> {
        self.try_map(|e| e.divide(rhs))
    }

    pub fn modulo(self, rhs: impl Into<Expression>) -> Result<Self> {
        self.try_map(|e| e.modulo(rhs))
    }

    pub fn pow(self, exponent: impl Into<Expression>) -> Self {
        self.map(|e| e.pow(exponent))
    }

    pub fn log(self, base: impl Into<Expression>) -> Self {
        self.map(|e| e.log(base))
    }

    pub fn abs(self) -> Self {
        self.map(Expression::abs)
    }

    pub fn ceil(self) -> Self {
        self.map(Expression::ceil)
    }

    pub fn exp(self) -> Self {
        self.map(Expression::exp)
    }

    pub fn floor(self) -> Self {
        self.map(Expression::floor)
    }

    pub fn ln(self) -> Self {
        self.map(Expression::ln)
    }

    pub fn log10(self) -> Self {
        self.map(Expression::log10)
    }

    pub fn sqrt(self) -> Self {
        self.map(Expression::sqrt)
    }

    pub fn trunc(self) -> Self {
        self.map(Expression::trunc)
    }

    // ========== Comparison ==========

    pub fn cmp(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.cmp(rhs))
    }

    pub fn eq(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.eq(rhs))
    }

    pub fn gt(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.gt(rhs))
    }

    pub fn gte(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.gte(rhs))
    }

    pub fn lt(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.lt(rhs))
    }

    pub fn lte(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.lte(rhs))
    }

    pub fn ne(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.ne(rhs))
    }

    // ========== Set operators ==========

    pub fn equals_array(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.set_equals(rhs))
    }

    pub fn intersects_arrays(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.set_intersection(rhs))
    }

    pub fn union_arrays(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.set_union(rhs))
    }

    pub fn difference_to_array(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.set_difference(rhs))
    }

    pub fn subset_of_array(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.set_is_subset(rhs))
    }

    pub fn any_element_true(self) -> Self {
        self.map(Expression::any_element_true)
    }

    pub fn all_elements_true(self) -> Self {
        self.map(Expression::all_elements_true)
    }

    // ========== Strings ==========

    pub fn concat(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.concat(rhs))
    }

    pub fn substring(self, start: i64, length: i64) -> Self {
        self.map(|e| e.substring(start, length))
    }

    pub fn to_lower(self) -> Self {
        self.map(Expression::to_lower)
    }

    pub fn to_upper(self) -> Self {
        self.map(Expression::to_upper)
    }

    pub fn strcasecmp(self, rhs: impl Into<Expression>) -> Self {
        self.map(|e| e.strcasecmp(rhs))
    }

    // ========== Arrays and dates ==========

    pub fn size(self) -> Self {
        self.map(Expression::size)
    }

    pub fn slice(self, count: i64) -> Self {
        self.map(|e| e.slice(count))
    }

    pub fn slice_at(self, position: i64, count: i64) -> Self {
        self.map(|e| e.slice_at(position, count))
    }

    pub fn extract(self, part: DatePart) -> Self {
        self.map(|e| e.extract(part))
    }

    // ========== Terminals ==========

    /// Key this entry under a different name
    pub fn alias(self, name: &str) -> Result<Projection> {
        let mut projection = self.projection;
        let entry = match self.expression {
            // A renamed plain field always renders the explicit reference.
            None => ProjectionEntry::Include(Field::with_target(name, self.field.target())?),
            Some(expression) => ProjectionEntry::Computed {
                target: Field::new(name)?.name().to_string(),
                expression,
            },
        };
        projection.entries.push(entry);
        Ok(projection)
    }

    /// Commit this entry and start the next field
    pub fn and_field(self, name: &str) -> Result<ProjectedField> {
        self.commit().and_field(name)
    }

    /// Commit this entry and start a computed entry
    pub fn and(self, expression: impl Into<Expression>) -> ProjectedExpression {
        self.commit().and(expression)
    }

    /// Commit this entry and include further fields
    pub fn and_include(self, names: &[&str]) -> Result<Projection> {
        self.commit().and_include(names)
    }

    /// Commit this entry and exclude the identifier field
    pub fn and_exclude(self, name: &str) -> Result<Projection> {
        self.commit().and_exclude(name)
    }

    /// Commit this entry, keying computed results under the field's name
    pub fn build(self) -> Projection {
        self.commit()
    }

    /// Commit and render in one step
    pub fn to_document(self, context: &dyn ResolutionContext) -> Result<Value> {
        self.commit().to_document(context)
    }
}

/// Computed entry builder started by [`Projection::and`]; the only terminal
/// is [`ProjectedExpression::alias`], so an unnamed computed entry cannot be
/// built.
pub struct ProjectedExpression {
    projection: Projection,
    expression: Expression,
}

impl ProjectedExpression {
    pub fn alias(self, name: &str) -> Result<Projection> {
        let mut projection = self.projection;
        projection.entries.push(ProjectionEntry::Computed {
            target: Field::new(name)?.name().to_string(),
            expression: self.expression,
        });
        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UntypedContext;
    use serde_json::json;

    #[test]
    fn test_empty_field_collection_is_rejected() {
        assert!(matches!(
            Projection::of(&[]),
            Err(AggregationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_plain_include_renders_one() {
        let document = Projection::of(&["foo"])
            .unwrap()
            .to_document(&UntypedContext)
            .unwrap();
        assert_eq!(document, json!({"$project": {"foo": 1}}));
    }

    #[test]
    fn test_aliased_field_renders_reference() {
        let document = Projection::new()
            .and_field("foo")
            .unwrap()
            .alias("bar")
            .unwrap()
            .to_document(&UntypedContext)
            .unwrap();
        assert_eq!(document, json!({"$project": {"bar": "$foo"}}));
    }

    #[test]
    fn test_unaliased_computed_entry_keys_under_field_name() {
        let document = Projection::new()
            .and_field("a")
            .unwrap()
            .add(1)
            .to_document(&UntypedContext)
            .unwrap();
        assert_eq!(document, json!({"$project": {"a": {"$add": ["$a", 1]}}}));
    }

    #[test]
    fn test_exclude_rejects_everything_but_id() {
        assert!(matches!(
            Projection::new().and_exclude("foo"),
            Err(AggregationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_exclude_id_renders_zero() {
        let document = Projection::new()
            .and_exclude(UNDERSCORE_ID)
            .unwrap()
            .to_document(&UntypedContext)
            .unwrap();
        assert_eq!(document, json!({"$project": {"_id": 0}}));
    }

    #[test]
    fn test_divide_by_zero_aborts_the_chain() {
        let result = Projection::new().and_field("a").unwrap().divide(0);
        assert!(matches!(
            result,
            Err(AggregationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_entry_order_is_preserved() {
        let projection = Projection::of(&["first"])
            .unwrap()
            .and_field("second")
            .unwrap()
            .add(1)
            .and_include(&["third"])
            .unwrap();

        let document = projection.to_document(&UntypedContext).unwrap();
        let clause = document.get("$project").unwrap().as_object().unwrap();
        assert_eq!(clause.len(), 3);
    }
}
