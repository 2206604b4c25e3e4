//! Conversion of JSON values into literal expressions.

use serde_json::{Number, Value};
use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{
    ArrayLit, Bool, Expr, ExprOrSpread, KeyValueProp, Lit, Null, ObjectLit, Prop, PropName,
    PropOrSpread, Str, UnaryExpr, UnaryOp,
};

/// Build a literal expression that evaluates to `value`.
///
/// Object keys are always emitted as string literals, in the map's own
/// order, so keys such as `$schema` or `Partial<B>` need no quoting rules.
/// Negative numbers become a unary minus applied to a positive literal.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use ts_json_schema_transform::{encode, static_value};
///
/// let schema = json!({ "type": "object", "properties": { "a": { "type": "string" } } });
/// assert_eq!(static_value(&encode(&schema)), Some(schema));
/// ```
pub fn encode(value: &Value) -> Expr {
    match value {
        Value::Null => Expr::Lit(Lit::Null(Null { span: DUMMY_SP })),
        Value::Bool(value) => Expr::Lit(Lit::Bool(Bool {
            span: DUMMY_SP,
            value: *value,
        })),
        Value::Number(number) => encode_number(number),
        Value::String(s) => Expr::Lit(Lit::Str(string(s))),
        Value::Array(items) => Expr::Array(ArrayLit {
            span: DUMMY_SP,
            elems: items
                .iter()
                .map(|item| {
                    Some(ExprOrSpread {
                        spread: None,
                        expr: Box::new(encode(item)),
                    })
                })
                .collect(),
        }),
        Value::Object(map) => Expr::Object(ObjectLit {
            span: DUMMY_SP,
            props: map
                .iter()
                .map(|(key, value)| {
                    PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                        key: PropName::Str(string(key)),
                        value: Box::new(encode(value)),
                    })))
                })
                .collect(),
        }),
    }
}

fn string(s: &str) -> Str {
    Str {
        span: DUMMY_SP,
        value: s.into(),
        raw: None,
    }
}

fn encode_number(number: &Number) -> Expr {
    // Every number serde_json produces without arbitrary precision fits an f64.
    let value = number.as_f64().unwrap_or_default();
    let literal = |value: f64| {
        Expr::Lit(Lit::Num(swc_core::ecma::ast::Number {
            span: DUMMY_SP,
            value,
            raw: None,
        }))
    };

    if value.is_sign_negative() && value != 0.0 {
        Expr::Unary(UnaryExpr {
            span: DUMMY_SP,
            op: UnaryOp::Minus,
            arg: Box::new(literal(-value)),
        })
    } else {
        literal(value)
    }
}
