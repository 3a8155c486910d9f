// oxidemap-aggregation/src/expression.rs
//! Expression node trees and their fluent construction surface
//!
//! An [`Expression`] is a closed tagged union over the operator kinds. Trees
//! are built top-down by the combinator methods below (and the typestate
//! builders in [`crate::filter`] and [`crate::let_binding`]), are strictly
//! acyclic, and are never mutated after the terminal builder call returns.
//!
//! Chaining the same n-ary operator appends an operand to the existing node
//! (`value.multiply(a).multiply(b)` is one `$multiply` with three operands);
//! chaining a different operator nests.

pub mod operators;

use serde_json::Value;

use crate::context::ResolutionContext;
use crate::error::{AggregationError, Result};
use crate::field::Field;
use crate::let_binding::Binding;
use operators::{ArithmeticOp, ArrayOp, ComparisonOp, DatePart, SetOp, StringOp, UnaryOp};

/// One node of an aggregation expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Opaque passthrough value
    Literal(Value),
    /// Reference to a document field or bound variable
    FieldRef(Field),
    /// `{ "$add"/"$subtract"/...: [a, b, ...] }`
    Arithmetic(ArithmeticOp, Vec<Expression>),
    /// `{ "$abs"/"$ceil"/...: operand }`
    Unary(UnaryOp, Box<Expression>),
    /// `{ "$eq"/"$gt"/...: [left, right] }`
    Comparison(ComparisonOp, Vec<Expression>),
    /// `{ "$setEquals"/...: [a, b, ...] }`
    Set(SetOp, Vec<Expression>),
    /// `{ "$concat"/...: ... }`, shape depends on the operator
    String(StringOp, Vec<Expression>),
    /// `{ "$size"/"$slice": [...] }`
    Array(ArrayOp, Vec<Expression>),
    /// `{ "$hour"/...: [operand] }`
    DateExtract(DatePart, Box<Expression>),
    /// `{ "$cond": { "if": ..., "then": ..., "else": ... } }`
    Cond {
        condition: Box<Expression>,
        then_value: Box<Expression>,
        otherwise: Box<Expression>,
    },
    /// `{ "$filter": { "input": ..., "as": ..., "cond": ... } }`
    Filter {
        input: Box<Expression>,
        variable: String,
        condition: Box<Expression>,
    },
    /// `{ "$let": { "vars": { ... }, "in": ... } }`
    Let {
        vars: Vec<Binding>,
        body: Box<Expression>,
    },
}

impl Expression {
    /// Reference a document field by name
    pub fn field(name: impl Into<String>) -> Result<Expression> {
        Ok(Expression::FieldRef(Field::new(name)?))
    }

    /// Wrap a plain value
    pub fn literal(value: impl Into<Value>) -> Expression {
        Expression::Literal(value.into())
    }

    /// Render this tree against a resolution context
    pub fn to_document(&self, context: &dyn ResolutionContext) -> Result<Value> {
        crate::render::render(self, context)
    }

    // ========== Arithmetic ==========

    pub fn add(self, rhs: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Add, rhs.into())
    }

    pub fn subtract(self, rhs: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Subtract, rhs.into())
    }

    pub fn multiply(self, rhs: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Multiply, rhs.into())
    }

    /// Fails fast when the divisor is a literal zero
    pub fn divide(self, rhs: impl Into<Expression>) -> Result<Expression> {
        let rhs = rhs.into();
        reject_zero(&rhs, "divisor")?;
        Ok(self.arithmetic(ArithmeticOp::Divide, rhs))
    }

    /// Fails fast when the modulus is a literal zero
    pub fn modulo(self, rhs: impl Into<Expression>) -> Result<Expression> {
        let rhs = rhs.into();
        reject_zero(&rhs, "modulus")?;
        Ok(self.arithmetic(ArithmeticOp::Mod, rhs))
    }

    pub fn pow(self, exponent: impl Into<Expression>) -> Expression {
        Expression::Arithmetic(ArithmeticOp::Pow, vec![self, exponent.into()])
    }

    pub fn log(self, base: impl Into<Expression>) -> Expression {
        Expression::Arithmetic(ArithmeticOp::Log, vec![self, base.into()])
    }

    fn arithmetic(self, op: ArithmeticOp, rhs: Expression) -> Expression {
        match self {
            Expression::Arithmetic(current, mut operands)
                if current == op && !op.is_binary_only() =>
            {
                operands.push(rhs);
                Expression::Arithmetic(current, operands)
            }
            other => Expression::Arithmetic(op, vec![other, rhs]),
        }
    }

    // ========== Unary math ==========

    pub fn abs(self) -> Expression {
        self.unary(UnaryOp::Abs)
    }

    pub fn ceil(self) -> Expression {
        self.unary(UnaryOp::Ceil)
    }

    pub fn exp(self) -> Expression {
        self.unary(UnaryOp::Exp)
    }

    pub fn floor(self) -> Expression {
        self.unary(UnaryOp::Floor)
    }

    pub fn ln(self) -> Expression {
        self.unary(UnaryOp::Ln)
    }

    pub fn log10(self) -> Expression {
        self.unary(UnaryOp::Log10)
    }

    pub fn sqrt(self) -> Expression {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn trunc(self) -> Expression {
        self.unary(UnaryOp::Trunc)
    }

    fn unary(self, op: UnaryOp) -> Expression {
        Expression::Unary(op, Box::new(self))
    }

    // ========== Comparison ==========

    pub fn cmp(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Cmp, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Eq, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Gt, rhs.into())
    }

    pub fn gte(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Gte, rhs.into())
    }

    pub fn lt(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Lt, rhs.into())
    }

    pub fn lte(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Lte, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<Expression>) -> Expression {
        self.comparison(ComparisonOp::Ne, rhs.into())
    }

    fn comparison(self, op: ComparisonOp, rhs: Expression) -> Expression {
        Expression::Comparison(op, vec![self, rhs])
    }

    // ========== Set operators ==========

    pub fn set_equals(self, rhs: impl Into<Expression>) -> Expression {
        self.set(SetOp::Equals, rhs.into())
    }

    pub fn set_intersection(self, rhs: impl Into<Expression>) -> Expression {
        self.set(SetOp::Intersection, rhs.into())
    }

    pub fn set_union(self, rhs: impl Into<Expression>) -> Expression {
        self.set(SetOp::Union, rhs.into())
    }

    pub fn set_difference(self, rhs: impl Into<Expression>) -> Expression {
        self.set(SetOp::Difference, rhs.into())
    }

    pub fn set_is_subset(self, rhs: impl Into<Expression>) -> Expression {
        self.set(SetOp::IsSubset, rhs.into())
    }

    pub fn any_element_true(self) -> Expression {
        Expression::Set(SetOp::AnyElementTrue, vec![self])
    }

    pub fn all_elements_true(self) -> Expression {
        Expression::Set(SetOp::AllElementsTrue, vec![self])
    }

    fn set(self, op: SetOp, rhs: Expression) -> Expression {
        match self {
            Expression::Set(current, mut operands) if current == op && op.accumulates() => {
                operands.push(rhs);
                Expression::Set(current, operands)
            }
            other => Expression::Set(op, vec![other, rhs]),
        }
    }

    // ========== String operators ==========

    pub fn concat(self, rhs: impl Into<Expression>) -> Expression {
        match self {
            Expression::String(StringOp::Concat, mut operands) => {
                operands.push(rhs.into());
                Expression::String(StringOp::Concat, operands)
            }
            other => Expression::String(StringOp::Concat, vec![other, rhs.into()]),
        }
    }

    pub fn substring(self, start: i64, length: i64) -> Expression {
        Expression::String(
            StringOp::Substr,
            vec![self, Expression::literal(start), Expression::literal(length)],
        )
    }

    pub fn to_lower(self) -> Expression {
        Expression::String(StringOp::ToLower, vec![self])
    }

    pub fn to_upper(self) -> Expression {
        Expression::String(StringOp::ToUpper, vec![self])
    }

    pub fn strcasecmp(self, rhs: impl Into<Expression>) -> Expression {
        Expression::String(StringOp::StrCaseCmp, vec![self, rhs.into()])
    }

    // ========== Array operators ==========

    pub fn size(self) -> Expression {
        Expression::Array(ArrayOp::Size, vec![self])
    }

    /// First `count` elements of the array
    pub fn slice(self, count: i64) -> Expression {
        Expression::Array(ArrayOp::Slice, vec![self, Expression::literal(count)])
    }

    /// `count` elements starting at `position`
    pub fn slice_at(self, position: i64, count: i64) -> Expression {
        Expression::Array(
            ArrayOp::Slice,
            vec![
                self,
                Expression::literal(position),
                Expression::literal(count),
            ],
        )
    }

    // ========== Date extraction ==========

    pub fn extract(self, part: DatePart) -> Expression {
        Expression::DateExtract(part, Box::new(self))
    }
}

/// Literal zero divisors/moduli are a construction error, caught before any
/// rendering is attempted. Non-literal operands cannot be checked here.
fn reject_zero(value: &Expression, what: &str) -> Result<()> {
    if let Expression::Literal(literal) = value {
        if literal.as_f64() == Some(0.0) {
            return Err(AggregationError::InvalidArgument(format!(
                "{} must not be zero",
                what
            )));
        }
    }
    Ok(())
}

impl From<Field> for Expression {
    fn from(field: Field) -> Self {
        Expression::FieldRef(field)
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expression {
                fn from(value: $ty) -> Self {
                    Expression::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(i32, i64, u32, u64, f64, bool, &str, String);

/// Typestate builder for `$cond`.
///
/// `Cond::when(c).then(t).otherwise(e)` yields the finished expression; the
/// intermediate types make it impossible to omit a branch.
pub struct Cond;

impl Cond {
    pub fn when(condition: impl Into<Expression>) -> CondThen {
        CondThen {
            condition: condition.into(),
        }
    }
}

pub struct CondThen {
    condition: Expression,
}

impl CondThen {
    pub fn then(self, value: impl Into<Expression>) -> CondOtherwise {
        CondOtherwise {
            condition: self.condition,
            then_value: value.into(),
        }
    }
}

pub struct CondOtherwise {
    condition: Expression,
    then_value: Expression,
}

impl CondOtherwise {
    pub fn otherwise(self, value: impl Into<Expression>) -> Expression {
        Expression::Cond {
            condition: Box::new(self.condition),
            then_value: Box::new(self.then_value),
            otherwise: Box::new(value.into()),
        }
    }
}
