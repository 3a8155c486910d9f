// oxidemap-aggregation/src/context.rs
//! Resolution context chain for field references
//!
//! A context turns a symbolic [`Field`] into its renderable
//! [`FieldReference`]. Contexts form a singly linked chain: each
//! `$let`/`$filter` scope wraps the caller's context in a
//! [`VariableScope`], and lookup walks outward from the innermost scope.
//!
//! Resolution is local-first: a binding introduced by the scope shadows an
//! enclosing field of the same spelling. Only a local miss delegates to the
//! enclosing context; a genuine error from deeper in the chain propagates
//! unchanged. The root context is the only one allowed to report an
//! unresolved reference.

use crate::error::{AggregationError, Result};
use crate::field::{ExposedField, ExposedFields, Field, FieldReference};
use crate::log_trace;

/// Scope used to turn a symbolic field reference into its wire rendering
pub trait ResolutionContext {
    fn resolve(&self, field: &Field) -> Result<FieldReference>;
}

/// Root context that accepts any field name and renders it verbatim.
///
/// Used when no schema for the pipeline input document is available; every
/// reference is taken at face value.
#[derive(Debug, Clone, Copy, Default)]
pub struct UntypedContext;

impl ResolutionContext for UntypedContext {
    fn resolve(&self, field: &Field) -> Result<FieldReference> {
        Ok(ExposedField::new(field.clone()).reference())
    }
}

/// Root context backed by the known fields of the pipeline input document.
///
/// Field names can carry a wire rename (e.g. `id` stored as `_id`). A name
/// matching nothing fails with
/// [`AggregationError::UnresolvedReference`]; this is the only context that
/// surfaces the failure.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    known: ExposedFields,
}

impl SchemaContext {
    /// Create a context knowing the given document fields
    pub fn new(names: &[&str]) -> Result<Self> {
        let mut known = ExposedFields::none();
        for name in names {
            known.expose(ExposedField::new(Field::new(*name)?));
        }
        Ok(SchemaContext { known })
    }

    /// Register a field stored under a different wire key
    pub fn with_renamed(mut self, name: &str, target: &str) -> Result<Self> {
        self.known
            .expose(ExposedField::new(Field::with_target(name, target)?));
        Ok(self)
    }
}

impl ResolutionContext for SchemaContext {
    fn resolve(&self, field: &Field) -> Result<FieldReference> {
        match self.known.lookup(field.target()) {
            Some(exposed) => Ok(exposed.reference()),
            None => Err(AggregationError::UnresolvedReference(
                field.target().to_string(),
            )),
        }
    }
}

/// One nested operator scope, wrapping the enclosing context.
///
/// Created fresh per `$let`/`$filter` render and discarded afterwards.
/// Nested operator operands render against this same scope; no additional
/// exposure layer is introduced for them.
pub struct VariableScope<'a> {
    exposed: ExposedFields,
    parent: &'a dyn ResolutionContext,
}

impl<'a> VariableScope<'a> {
    pub fn new(exposed: ExposedFields, parent: &'a dyn ResolutionContext) -> Self {
        VariableScope { exposed, parent }
    }

    /// Scope exposing the given names as variable bindings
    pub fn with_variables(names: &[&str], parent: &'a dyn ResolutionContext) -> Result<Self> {
        Ok(VariableScope::new(ExposedFields::synthetic(names)?, parent))
    }
}

impl ResolutionContext for VariableScope<'_> {
    fn resolve(&self, field: &Field) -> Result<FieldReference> {
        // Local bindings shadow enclosing fields of the same spelling.
        match self.exposed.lookup(field.target()) {
            Some(exposed) => Ok(exposed.reference()),
            None => {
                log_trace!(
                    "no local binding for '{}', delegating to enclosing scope",
                    field.target()
                );
                self.parent.resolve(field)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Field {
        Field::new(name).unwrap()
    }

    // ========== Root context tests ==========

    #[test]
    fn test_untyped_context_resolves_anything() {
        let ctx = UntypedContext;
        assert_eq!(ctx.resolve(&field("whatever")).unwrap().to_wire(), "$whatever");
    }

    #[test]
    fn test_schema_context_resolves_known_field() {
        let ctx = SchemaContext::new(&["price", "tax"]).unwrap();
        assert_eq!(ctx.resolve(&field("price")).unwrap().to_wire(), "$price");
    }

    #[test]
    fn test_schema_context_rejects_unknown_field() {
        let ctx = SchemaContext::new(&["price"]).unwrap();
        assert_eq!(
            ctx.resolve(&field("missing")),
            Err(AggregationError::UnresolvedReference("missing".to_string()))
        );
    }

    #[test]
    fn test_schema_context_applies_rename() {
        let ctx = SchemaContext::new(&["price"])
            .unwrap()
            .with_renamed("id", "_id")
            .unwrap();

        assert_eq!(ctx.resolve(&field("id")).unwrap().to_wire(), "$_id");
    }

    // ========== Scope chain tests ==========

    #[test]
    fn test_scope_resolves_local_binding_as_variable() {
        let root = SchemaContext::new(&["tags"]).unwrap();
        let scope = VariableScope::with_variables(&["x"], &root).unwrap();

        assert_eq!(scope.resolve(&field("x")).unwrap().to_wire(), "$$x");
    }

    #[test]
    fn test_scope_delegates_to_enclosing_context() {
        let root = SchemaContext::new(&["tags"]).unwrap();
        let scope = VariableScope::with_variables(&["x"], &root).unwrap();

        assert_eq!(scope.resolve(&field("tags")).unwrap().to_wire(), "$tags");
    }

    #[test]
    fn test_local_binding_shadows_enclosing_field() {
        let root = SchemaContext::new(&["x"]).unwrap();
        let scope = VariableScope::with_variables(&["x"], &root).unwrap();

        assert_eq!(scope.resolve(&field("x")).unwrap().to_wire(), "$$x");
    }

    #[test]
    fn test_unresolved_reference_propagates_from_root() {
        let root = SchemaContext::new(&["tags"]).unwrap();
        let inner = VariableScope::with_variables(&["x"], &root).unwrap();
        let innermost = VariableScope::with_variables(&["y"], &inner).unwrap();

        assert_eq!(
            innermost.resolve(&field("missing")),
            Err(AggregationError::UnresolvedReference("missing".to_string()))
        );
    }

    #[test]
    fn test_chain_walks_through_multiple_scopes() {
        let root = SchemaContext::new(&["price"]).unwrap();
        let outer = VariableScope::with_variables(&["a"], &root).unwrap();
        let inner = VariableScope::with_variables(&["b"], &outer).unwrap();

        assert_eq!(inner.resolve(&field("b")).unwrap().to_wire(), "$$b");
        assert_eq!(inner.resolve(&field("a")).unwrap().to_wire(), "$$a");
        assert_eq!(inner.resolve(&field("price")).unwrap().to_wire(), "$price");
    }
}
