// oxidemap-aggregation/src/filter.rs
// Typestate builder for the $filter expression

use serde_json::Value;

use crate::error::Result;
use crate::expression::Expression;
use crate::field::Field;

/// Entry point for building a `$filter` expression.
///
/// Construction runs through three phases, one type per phase, so a filter
/// without an input, variable name, or condition does not compile:
///
/// ```ignore
/// let expr = Filter::field("tags")?
///     .as_var("x")?
///     .by(Expression::field("x")?.gte(5));
/// ```
pub struct Filter;

impl Filter {
    /// Filter the array held by the given document field
    pub fn field(name: impl Into<String>) -> Result<FilterAs> {
        Ok(FilterAs {
            input: Expression::FieldRef(Field::new(name)?),
        })
    }

    /// Filter the result of an arbitrary expression
    pub fn input(input: impl Into<Expression>) -> FilterAs {
        FilterAs {
            input: input.into(),
        }
    }

    /// Filter a literal array of values
    pub fn array(values: Vec<Value>) -> FilterAs {
        FilterAs {
            input: Expression::Literal(Value::Array(values)),
        }
    }
}

/// Filter with its input set; waiting for the iteration-variable name
pub struct FilterAs {
    input: Expression,
}

impl FilterAs {
    /// Name the variable each array element is bound to while the condition
    /// is evaluated
    pub fn as_var(self, name: impl Into<String>) -> Result<FilterBy> {
        // Field::new carries the non-empty check
        let variable = Field::new(name)?;
        Ok(FilterBy {
            input: self.input,
            variable: variable.name().to_string(),
        })
    }
}

/// Filter with input and variable; waiting for the condition
pub struct FilterBy {
    input: Expression,
    variable: String,
}

impl FilterBy {
    /// Set the condition deciding which elements are kept
    pub fn by(self, condition: impl Into<Expression>) -> Expression {
        Expression::Filter {
            input: Box::new(self.input),
            variable: self.variable,
            condition: Box::new(condition.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregationError;
    use serde_json::json;

    #[test]
    fn test_builder_assembles_all_parts() {
        let condition = Expression::field("x").unwrap().gte(5);
        let expr = Filter::field("tags").unwrap().as_var("x").unwrap().by(condition);

        match expr {
            Expression::Filter {
                input, variable, ..
            } => {
                assert!(matches!(*input, Expression::FieldRef(_)));
                assert_eq!(variable, "x");
            }
            other => panic!("expected $filter, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_field_name_fails() {
        assert!(matches!(
            Filter::field(""),
            Err(AggregationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_variable_name_fails() {
        assert!(matches!(
            Filter::field("tags").unwrap().as_var(""),
            Err(AggregationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_literal_array_input() {
        let expr = Filter::array(vec![json!(1), json!(2), json!(3)])
            .as_var("n")
            .unwrap()
            .by(Expression::field("n").unwrap().gt(1));

        match expr {
            Expression::Filter { input, .. } => {
                assert_eq!(*input, Expression::Literal(json!([1, 2, 3])));
            }
            other => panic!("expected $filter, got {:?}", other),
        }
    }
}
