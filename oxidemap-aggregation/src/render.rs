// oxidemap-aggregation/src/render.rs
//! Recursive rendering of expression trees into wire documents
//!
//! [`render`] is a pure function: no side effects beyond allocation, and
//! structurally identical output for identical input. The walk is bounded
//! by tree depth; trees are acyclic by construction so no runtime cycle
//! guard exists.
//!
//! Operand-count contracts are re-checked here defensively. The builders
//! make violations impossible through their typed surface, so a failure is
//! reported as [`AggregationError::TypeMismatch`] (a construction bug)
//! rather than user error.

use serde_json::{Map, Value};

use crate::context::{ResolutionContext, VariableScope};
use crate::error::{AggregationError, Result};
use crate::expression::operators::{ArrayOp, StringOp};
use crate::expression::Expression;

/// Render an expression tree against a resolution context
pub fn render(expression: &Expression, context: &dyn ResolutionContext) -> Result<Value> {
    match expression {
        Expression::Literal(value) => Ok(value.clone()),

        Expression::FieldRef(field) => Ok(Value::String(context.resolve(field)?.to_wire())),

        Expression::Arithmetic(op, operands) => {
            if op.is_binary_only() {
                expect_operands(op.as_str(), operands, 2, Some(2))?;
            } else {
                expect_operands(op.as_str(), operands, 2, None)?;
            }
            sequence_op(op.as_str(), operands, context)
        }

        Expression::Unary(op, operand) => Ok(single_op(op.as_str(), render(operand, context)?)),

        Expression::Comparison(op, operands) => {
            expect_operands(op.as_str(), operands, 2, Some(2))?;
            sequence_op(op.as_str(), operands, context)
        }

        Expression::Set(op, operands) => {
            if op.is_unary() {
                expect_operands(op.as_str(), operands, 1, Some(1))?;
            } else {
                expect_operands(op.as_str(), operands, 2, None)?;
            }
            sequence_op(op.as_str(), operands, context)
        }

        Expression::String(op, operands) => match op {
            StringOp::Concat => {
                expect_operands(op.as_str(), operands, 2, None)?;
                sequence_op(op.as_str(), operands, context)
            }
            StringOp::Substr => {
                expect_operands(op.as_str(), operands, 3, Some(3))?;
                sequence_op(op.as_str(), operands, context)
            }
            StringOp::ToLower | StringOp::ToUpper => {
                expect_operands(op.as_str(), operands, 1, Some(1))?;
                Ok(single_op(op.as_str(), render(&operands[0], context)?))
            }
            StringOp::StrCaseCmp => {
                expect_operands(op.as_str(), operands, 2, Some(2))?;
                sequence_op(op.as_str(), operands, context)
            }
        },

        Expression::Array(op, operands) => {
            match op {
                ArrayOp::Size => expect_operands(op.as_str(), operands, 1, Some(1))?,
                ArrayOp::Slice => expect_operands(op.as_str(), operands, 2, Some(3))?,
            }
            sequence_op(op.as_str(), operands, context)
        }

        Expression::DateExtract(part, operand) => {
            let rendered = render(operand, context)?;
            Ok(wrap(part.as_str(), Value::Array(vec![rendered])))
        }

        Expression::Cond {
            condition,
            then_value,
            otherwise,
        } => {
            let mut branches = Map::new();
            branches.insert("if".to_string(), render(condition, context)?);
            branches.insert("then".to_string(), render(then_value, context)?);
            branches.insert("else".to_string(), render(otherwise, context)?);
            Ok(wrap("$cond", Value::Object(branches)))
        }

        Expression::Filter {
            input,
            variable,
            condition,
        } => {
            // The input sees the enclosing scope only; the condition sees
            // the bound variable shadowing it.
            let scope = VariableScope::with_variables(&[variable.as_str()], context)?;

            let mut filter = Map::new();
            filter.insert("input".to_string(), render(input, context)?);
            filter.insert("as".to_string(), Value::String(variable.clone()));
            filter.insert("cond".to_string(), render(condition, &scope)?);
            Ok(wrap("$filter", Value::Object(filter)))
        }

        Expression::Let { vars, body } => {
            let names: Vec<&str> = vars.iter().map(|b| b.name()).collect();
            let scope = VariableScope::with_variables(&names, context)?;

            // Bindings cannot see each other: each one renders against the
            // enclosing context, only the body renders inside the scope.
            let mut rendered_vars = Map::new();
            for binding in vars {
                rendered_vars.insert(
                    binding.name().to_string(),
                    render(binding.expression(), context)?,
                );
            }

            let mut let_expression = Map::new();
            let_expression.insert("vars".to_string(), Value::Object(rendered_vars));
            let_expression.insert("in".to_string(), render(body, &scope)?);
            Ok(wrap("$let", Value::Object(let_expression)))
        }
    }
}

/// `{ key: [rendered operands...] }`, order preserved exactly as supplied
fn sequence_op(
    key: &str,
    operands: &[Expression],
    context: &dyn ResolutionContext,
) -> Result<Value> {
    let mut rendered = Vec::with_capacity(operands.len());
    for operand in operands {
        rendered.push(render(operand, context)?);
    }
    Ok(wrap(key, Value::Array(rendered)))
}

/// `{ key: operand }`, not sequence-wrapped
fn single_op(key: &str, operand: Value) -> Value {
    wrap(key, operand)
}

fn wrap(key: &str, value: Value) -> Value {
    let mut document = Map::new();
    document.insert(key.to_string(), value);
    Value::Object(document)
}

fn expect_operands(
    key: &str,
    operands: &[Expression],
    min: usize,
    max: Option<usize>,
) -> Result<()> {
    let count = operands.len();
    if count < min || max.map_or(false, |max| count > max) {
        return Err(AggregationError::TypeMismatch(format!(
            "{} expects {} operand(s), found {}",
            key,
            match max {
                Some(max) if max == min => format!("{}", min),
                Some(max) => format!("{} to {}", min, max),
                None => format!("at least {}", min),
            },
            count
        )));
    }
    Ok(())
}
