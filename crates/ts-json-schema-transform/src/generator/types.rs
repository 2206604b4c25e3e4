//! Type model for the schema generator.
//!
//! Declarations are lowered from the swc syntax tree into [`TypeDef`] once per
//! program. References stay unresolved names; the schema builder resolves them
//! against the scope of the declaration they appear in.

use serde_json::Value;

use crate::options;

/// A TypeScript type as written in a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    // Keywords
    String,
    Number,
    Boolean,
    BigInt,
    Null,
    Undefined,
    Void,
    Any,
    Unknown,
    Never,
    Object,

    Literal(Literal),

    // Composite types
    Array(Box<TypeDef>),
    Tuple(Vec<TupleElement>),
    Union(Vec<TypeDef>),
    Intersection(Vec<TypeDef>),
    TypeLit(ObjectDef),

    /// `keyof T`
    KeyOf(Box<TypeDef>),

    /// A named type, e.g. `Api.User` or `Partial<B>`.
    Reference {
        name: Vec<String>,
        args: Vec<TypeDef>,
    },

    /// A type form the generator cannot describe (function types, `typeof`,
    /// conditional and mapped types, ...).
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub ty: TypeDef,
    pub optional: bool,
}

/// Members of an interface, class or type literal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDef {
    pub properties: Vec<Property>,
    /// Value type of a `[key: string]: T` index signature.
    pub index: Option<Box<TypeDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub ty: TypeDef,
    pub optional: bool,
}

impl TypeDef {
    /// A reference to a single-segment name without type arguments.
    pub fn named(name: impl Into<String>) -> Self {
        TypeDef::Reference {
            name: vec![name.into()],
            args: Vec::new(),
        }
    }

    /// JSON type name of a primitive keyword, if it has exactly one.
    pub fn primitive_json_type(&self) -> Option<&'static str> {
        match self {
            TypeDef::String => Some("string"),
            TypeDef::Boolean => Some("boolean"),
            TypeDef::Null => Some("null"),
            TypeDef::BigInt => Some("integer"),
            TypeDef::Object => Some("object"),
            _ => None,
        }
    }

    /// Render as TypeScript type syntax.
    ///
    /// ```
    /// use ts_json_schema_transform::generator::TypeDef;
    ///
    /// let ty = TypeDef::Reference {
    ///     name: vec!["Partial".into()],
    ///     args: vec![TypeDef::named("B")],
    /// };
    /// assert_eq!(ty.to_ts_type(), "Partial<B>");
    /// ```
    pub fn to_ts_type(&self) -> String {
        self.render_with(&|_| None)
    }

    /// Render as TypeScript type syntax, replacing single-segment names for
    /// which `substitute` returns a rendering.
    pub fn render_with(&self, substitute: &dyn Fn(&str) -> Option<String>) -> String {
        let join = |items: &[TypeDef], sep: &str| {
            items
                .iter()
                .map(|t| t.render_with(substitute))
                .collect::<Vec<_>>()
                .join(sep)
        };
        match self {
            TypeDef::String => "string".to_string(),
            TypeDef::Number => "number".to_string(),
            TypeDef::Boolean => "boolean".to_string(),
            TypeDef::BigInt => "bigint".to_string(),
            TypeDef::Null => "null".to_string(),
            TypeDef::Undefined => "undefined".to_string(),
            TypeDef::Void => "void".to_string(),
            TypeDef::Any => "any".to_string(),
            TypeDef::Unknown => "unknown".to_string(),
            TypeDef::Never => "never".to_string(),
            TypeDef::Object => "object".to_string(),
            TypeDef::Literal(literal) => literal.to_ts_type(),
            TypeDef::Array(inner) => match &**inner {
                TypeDef::Union(_) | TypeDef::Intersection(_) => {
                    format!("({})[]", inner.render_with(substitute))
                }
                _ => format!("{}[]", inner.render_with(substitute)),
            },
            TypeDef::Tuple(elements) => {
                let parts: Vec<String> = elements
                    .iter()
                    .map(|e| {
                        let ty = e.ty.render_with(substitute);
                        if e.optional { format!("{ty}?") } else { ty }
                    })
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            TypeDef::Union(members) => join(members, " | "),
            TypeDef::Intersection(members) => join(members, " & "),
            TypeDef::TypeLit(object) => {
                let mut parts: Vec<String> = object
                    .properties
                    .iter()
                    .map(|p| {
                        let opt = if p.optional { "?" } else { "" };
                        format!("{}{opt}: {}", p.name, p.ty.render_with(substitute))
                    })
                    .collect();
                if let Some(index) = &object.index {
                    parts.push(format!("[key: string]: {}", index.render_with(substitute)));
                }
                if parts.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {}; }}", parts.join("; "))
                }
            }
            TypeDef::KeyOf(inner) => format!("keyof {}", inner.render_with(substitute)),
            TypeDef::Reference { name, args } => {
                if let [single] = name.as_slice()
                    && args.is_empty()
                    && let Some(rendered) = substitute(single)
                {
                    return rendered;
                }
                let base = name.join(".");
                if args.is_empty() {
                    base
                } else {
                    format!("{base}<{}>", join(args, ", "))
                }
            }
            TypeDef::Unsupported(detail) => detail.clone(),
        }
    }
}

impl Literal {
    pub fn json_type(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Number(_) => "number",
            Literal::Boolean(_) => "boolean",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => options::number(*n).unwrap_or(Value::Null),
            Literal::Boolean(b) => Value::Bool(*b),
        }
    }

    fn to_ts_type(&self) -> String {
        match self {
            Literal::String(s) => Value::String(s.clone()).to_string(),
            Literal::Number(_) => self.to_value().to_string(),
            Literal::Boolean(b) => b.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference(name: &str, args: Vec<TypeDef>) -> TypeDef {
        TypeDef::Reference {
            name: name.split('.').map(String::from).collect(),
            args,
        }
    }

    #[test]
    fn test_render_generic_instantiation() {
        let ty = reference("Box", vec![TypeDef::String]);
        assert_eq!(ty.to_ts_type(), "Box<string>");

        let ty = reference(
            "Pick",
            vec![
                TypeDef::named("A"),
                TypeDef::Union(vec![
                    TypeDef::Literal(Literal::String("a".into())),
                    TypeDef::Literal(Literal::String("b".into())),
                ]),
            ],
        );
        assert_eq!(ty.to_ts_type(), r#"Pick<A, "a" | "b">"#);
    }

    #[test]
    fn test_render_qualified_and_arrays() {
        let ty = TypeDef::Array(Box::new(TypeDef::Union(vec![
            reference("Api.User", vec![]),
            TypeDef::Null,
        ])));
        assert_eq!(ty.to_ts_type(), "(Api.User | null)[]");

        let tuple = TypeDef::Tuple(vec![
            TupleElement { ty: TypeDef::Number, optional: false },
            TupleElement { ty: TypeDef::Literal(Literal::Number(1.0)), optional: true },
        ]);
        assert_eq!(tuple.to_ts_type(), "[number, 1?]");
    }

    #[test]
    fn test_render_with_substitution() {
        let ty = reference("Partial", vec![TypeDef::named("T")]);
        let rendered = ty.render_with(&|name| (name == "T").then(|| "User".to_string()));
        assert_eq!(rendered, "Partial<User>");
    }

    #[test]
    fn test_literal_values() {
        assert_eq!(Literal::Number(2.0).to_value(), json!(2));
        assert_eq!(Literal::Number(-0.5).to_value(), json!(-0.5));
        assert_eq!(Literal::String("x".into()).json_type(), "string");
    }
}
