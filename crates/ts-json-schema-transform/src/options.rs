//! Static extraction of configuration literals.
//!
//! Configuration is read from the syntax tree as written, never evaluated.
//! The same extractor reads call-site options (`fromType<A>({ required: true })`)
//! and relaxed JSON documents such as `tsconfig.json`.

use serde_json::{Map, Number, Value};
use swc_core::ecma::ast::{CallExpr, Expr, Lit, Prop, PropName, PropOrSpread, UnaryOp};

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Extract a JSON value from literal syntax.
///
/// Accepts strings, numbers (with unary `-`/`+`), booleans, `null`, template
/// literals without substitutions, arrays and object literals keyed by
/// identifiers, strings or numbers. Parentheses and `as`, `as const` and
/// `satisfies` wrappers are looked through. Anything else makes the whole
/// extraction fail.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use swc_core::common::DUMMY_SP;
/// use swc_core::ecma::ast::{Expr, Lit, Bool};
/// use ts_json_schema_transform::static_value;
///
/// let expr = Expr::Lit(Lit::Bool(Bool { span: DUMMY_SP, value: true }));
/// assert_eq!(static_value(&expr), Some(json!(true)));
/// ```
pub fn static_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Lit(lit) => match lit {
            Lit::Str(s) => Some(Value::String(s.value.to_string())),
            Lit::Num(n) => number(n.value),
            Lit::Bool(b) => Some(Value::Bool(b.value)),
            Lit::Null(_) => Some(Value::Null),
            _ => None,
        },
        Expr::Unary(unary) => {
            let Expr::Lit(Lit::Num(n)) = strip_wrappers(&unary.arg) else {
                return None;
            };
            match unary.op {
                UnaryOp::Minus => number(-n.value),
                UnaryOp::Plus => number(n.value),
                _ => None,
            }
        }
        // An invalid escape leaves no cooked text.
        Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
            .quasis
            .iter()
            .map(|q| q.cooked.as_ref().map(|cooked| cooked.to_string()))
            .collect::<Option<String>>()
            .map(Value::String),
        Expr::Array(array) => array
            .elems
            .iter()
            .map(|elem| {
                let elem = elem.as_ref()?;
                if elem.spread.is_some() {
                    return None;
                }
                static_value(&elem.expr)
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Expr::Object(object) => {
            let mut map = Map::new();
            for prop in &object.props {
                let PropOrSpread::Prop(prop) = prop else {
                    return None;
                };
                let Prop::KeyValue(kv) = &**prop else {
                    return None;
                };
                map.insert(prop_name(&kv.key)?, static_value(&kv.value)?);
            }
            Some(Value::Object(map))
        }
        Expr::Paren(_) | Expr::TsAs(_) | Expr::TsConstAssertion(_) | Expr::TsSatisfies(_) => {
            static_value(strip_wrappers(expr))
        }
        _ => None,
    }
}

/// Options written at a call site.
///
/// A missing first argument (or a literal `undefined`) gives the empty
/// default. An argument that is not a static object literal is recovered
/// from: a warning is logged and the default is used.
pub fn call_options(call: &CallExpr) -> Map<String, Value> {
    let Some(first) = call.args.first() else {
        return Map::new();
    };
    if first.spread.is_some() {
        tracing::warn!("spread configuration argument ignored, using default options");
        return Map::new();
    }
    if let Expr::Ident(ident) = strip_wrappers(&first.expr)
        && &*ident.sym == "undefined"
    {
        return Map::new();
    }

    match static_value(&first.expr) {
        Some(Value::Object(map)) => map,
        Some(other) => {
            tracing::warn!(value = %other, "configuration argument is not an object, using default options");
            Map::new()
        }
        None => {
            tracing::warn!("configuration argument is not a static literal, using default options");
            Map::new()
        }
    }
}

/// `overrides` laid over `defaults`; keys from `overrides` win and keep
/// their position when already present in `defaults`.
pub fn merge_options(defaults: &Map<String, Value>, overrides: Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    merged.extend(overrides);
    merged
}

fn strip_wrappers(expr: &Expr) -> &Expr {
    let mut current = expr;
    loop {
        current = match current {
            Expr::Paren(e) => &e.expr,
            Expr::TsAs(e) => &e.expr,
            Expr::TsConstAssertion(e) => &e.expr,
            Expr::TsSatisfies(e) => &e.expr,
            _ => return current,
        };
    }
}

fn prop_name(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => Some(s.value.to_string()),
        PropName::Num(n) => Some(match number(n.value)? {
            Value::Number(n) => n.to_string(),
            _ => return None,
        }),
        _ => None,
    }
}

/// Integral values become JSON integers so `1` reads back as `1`, not `1.0`.
pub(crate) fn number(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::from(value as i64));
    }
    Number::from_f64(value).map(Value::Number)
}
