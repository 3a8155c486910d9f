// oxidemap-aggregation/src/render_property_tests.rs
//! Property tests for the renderer: determinism, operand-order
//! preservation, and the zero-divisor guard.

use proptest::prelude::*;
use serde_json::Value;

use crate::context::UntypedContext;
use crate::expression::operators::{ArithmeticOp, ComparisonOp};
use crate::expression::{Cond, Expression};
use crate::render::render;

fn arb_expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        any::<i32>().prop_map(|value| Expression::literal(value)),
        "[a-z]{1,6}".prop_map(|name| Expression::field(name).unwrap()),
    ];

    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Expression::Arithmetic(ArithmeticOp::Add, vec![a, b])),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Expression::Comparison(ComparisonOp::Gte, vec![a, b])),
            inner.clone().prop_map(Expression::abs),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, t, e)| Cond::when(c).then(t).otherwise(e)),
        ]
    })
}

proptest! {
    #[test]
    fn prop_rendering_is_deterministic(expression in arb_expression()) {
        let first = render(&expression, &UntypedContext).unwrap();
        let second = render(&expression, &UntypedContext).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_operand_order_is_preserved(values in proptest::collection::vec(any::<i64>(), 2..6)) {
        let operands: Vec<Expression> = values.iter().map(|v| Expression::literal(*v)).collect();
        let expression = Expression::Arithmetic(ArithmeticOp::Multiply, operands);

        let rendered = render(&expression, &UntypedContext).unwrap();
        let sequence = rendered.get("$multiply").unwrap().as_array().unwrap();
        let expected: Vec<Value> = values.iter().map(|v| Value::from(*v)).collect();
        prop_assert_eq!(sequence, &expected);
    }

    #[test]
    fn prop_zero_divisor_always_rejected(value in any::<i64>()) {
        let result = Expression::field("a").unwrap().divide(value);
        if value == 0 {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }
}
