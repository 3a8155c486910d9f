// oxidemap-aggregation/src/let_binding.rs
// Typestate builder for the $let expression

use crate::error::Result;
use crate::expression::Expression;
use crate::field::Field;

/// One named variable binding of a `$let`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    name: String,
    expression: Expression,
}

impl Binding {
    pub fn new(name: impl Into<String>, expression: impl Into<Expression>) -> Result<Binding> {
        // Field::new carries the non-empty check
        let name = Field::new(name)?;
        Ok(Binding {
            name: name.name().to_string(),
            expression: expression.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// Entry point for building a `$let` expression.
///
/// The fluent form alternates expression and name, holding the
/// not-yet-named expression in an explicit [`PendingBinding`] until
/// `as_var` arrives:
///
/// ```ignore
/// let expr = Let::bind(total_expr).as_var("total")?
///     .and(discount_expr).as_var("discounted")?
///     .in_expr(body);
/// ```
///
/// Bindings cannot reference each other; each binding's expression is
/// rendered against the enclosing context, only the `in` body sees the
/// variables.
pub struct Let;

impl Let {
    /// Start with the expression for the first variable
    pub fn bind(expression: impl Into<Expression>) -> PendingBinding {
        PendingBinding {
            vars: Vec::new(),
            expression: expression.into(),
        }
    }

    /// Supply all bindings at once
    pub fn vars(bindings: Vec<Binding>) -> LetVars {
        let mut vars = LetVars { vars: Vec::new() };
        for binding in bindings {
            vars.push(binding);
        }
        vars
    }
}

/// An expression waiting for its variable name
pub struct PendingBinding {
    vars: Vec<Binding>,
    expression: Expression,
}

impl PendingBinding {
    /// Name the pending expression
    pub fn as_var(self, name: impl Into<String>) -> Result<LetVars> {
        let binding = Binding::new(name, self.expression)?;
        let mut vars = LetVars { vars: self.vars };
        vars.push(binding);
        Ok(vars)
    }
}

/// Accumulated bindings; add another or supply the body
pub struct LetVars {
    vars: Vec<Binding>,
}

impl LetVars {
    /// Start another binding
    pub fn and(self, expression: impl Into<Expression>) -> PendingBinding {
        PendingBinding {
            vars: self.vars,
            expression: expression.into(),
        }
    }

    /// Set the expression evaluated with the variables in scope
    pub fn in_expr(self, body: impl Into<Expression>) -> Expression {
        Expression::Let {
            vars: self.vars,
            body: Box::new(body.into()),
        }
    }

    // Re-binding a name replaces the earlier binding in place, keeping its
    // original position.
    fn push(&mut self, binding: Binding) {
        match self.vars.iter_mut().find(|b| b.name() == binding.name()) {
            Some(existing) => *existing = binding,
            None => self.vars.push(binding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregationError;

    fn field(name: &str) -> Expression {
        Expression::field(name).unwrap()
    }

    #[test]
    fn test_fluent_form_collects_bindings_in_order() {
        let expr = Let::bind(field("price").add(field("tax")))
            .as_var("total")
            .unwrap()
            .and(field("applyDiscount"))
            .as_var("discounted")
            .unwrap()
            .in_expr(field("total").multiply(field("discounted")));

        match expr {
            Expression::Let { vars, .. } => {
                let names: Vec<&str> = vars.iter().map(|b| b.name()).collect();
                assert_eq!(names, vec!["total", "discounted"]);
            }
            other => panic!("expected $let, got {:?}", other),
        }
    }

    #[test]
    fn test_bulk_form() {
        let bindings = vec![
            Binding::new("a", field("x")).unwrap(),
            Binding::new("b", field("y")).unwrap(),
        ];
        let expr = Let::vars(bindings).in_expr(field("a").add(field("b")));

        match expr {
            Expression::Let { vars, .. } => assert_eq!(vars.len(), 2),
            other => panic!("expected $let, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_variable_name_fails() {
        assert!(matches!(
            Let::bind(field("x")).as_var(""),
            Err(AggregationError::InvalidArgument(_))
        ));
        assert!(matches!(
            Binding::new("", field("x")),
            Err(AggregationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rebinding_replaces_in_place() {
        let expr = Let::bind(field("x"))
            .as_var("a")
            .unwrap()
            .and(field("y"))
            .as_var("b")
            .unwrap()
            .and(field("z"))
            .as_var("a")
            .unwrap()
            .in_expr(field("a"));

        match expr {
            Expression::Let { vars, .. } => {
                let names: Vec<&str> = vars.iter().map(|b| b.name()).collect();
                assert_eq!(names, vec!["a", "b"]);
                assert_eq!(vars[0].expression(), &field("z"));
            }
            other => panic!("expected $let, got {:?}", other),
        }
    }
}
