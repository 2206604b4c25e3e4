//! Lowering of swc type declarations into the generator's [`TypeDef`] model.
//!
//! Every interface, type alias, enum and class in a [`Program`] is lowered
//! once into a [`SchemaIndex`], keyed both by declaration and by its dotted
//! qualified name (`Api.V1.User`). Method members, call signatures and
//! computed keys carry no data shape and are skipped.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use swc_core::ecma::ast::{
    Class, ClassMember, Expr, Lit, MemberProp, ParamOrTsParamProp, PropName, TsEnumDecl,
    TsEnumMemberId, TsExprWithTypeArgs, TsFnParam, TsKeywordTypeKind, TsLit, TsParamPropParam,
    TsType, TsTypeAnn, TsTypeElement, TsTypeOperatorOp, TsTypeParamDecl,
    TsTypeParamInstantiation, TsUnionOrIntersectionType,
};

use crate::checker::entity_segments;
use crate::options::static_value;
use crate::program::{DeclRef, ModuleRef, Program, TypeDecl};

use super::types::{Literal, ObjectDef, Property, TupleElement, TypeDef};

#[derive(Debug, Clone)]
pub(crate) struct TypeParam {
    pub name: String,
    pub default: Option<TypeDef>,
}

#[derive(Debug, Clone)]
pub(crate) enum DeclKind {
    /// Interfaces (merged) and classes.
    Object {
        extends: Vec<TypeDef>,
        body: ObjectDef,
    },
    Alias(TypeDef),
    /// Member values in declaration order.
    Enum(Vec<Value>),
}

#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    pub id: DeclRef,
    pub type_params: Vec<TypeParam>,
    pub kind: DeclKind,
}

/// All type declarations of one program in lowered form.
#[derive(Debug, Default)]
pub(crate) struct SchemaIndex {
    declarations: HashMap<DeclRef, Declaration>,
    by_name: IndexMap<String, Vec<DeclRef>>,
}

impl SchemaIndex {
    pub fn build(program: &Program) -> Self {
        let mut index = SchemaIndex::default();
        for id in program.type_declarations() {
            let Some(decl) = program.type_decl(&id) else {
                continue;
            };
            let (type_params, kind) = lower_declaration(decl);
            index
                .by_name
                .entry(id.qualified_name())
                .or_default()
                .push(id.clone());
            index.declarations.insert(
                id.clone(),
                Declaration {
                    id,
                    type_params,
                    kind,
                },
            );
        }
        tracing::debug!(
            program = ?program.id(),
            declarations = index.len(),
            "schema index built"
        );
        index
    }

    pub fn get(&self, id: &DeclRef) -> Option<&Declaration> {
        self.declarations.get(id)
    }

    /// First declaration (in load order) with the dotted name `qualified`.
    pub fn find(&self, qualified: &str) -> Option<&Declaration> {
        self.by_name
            .get(qualified)?
            .first()
            .and_then(|id| self.declarations.get(id))
    }

    /// The declaration with the dotted name `qualified` made in `module`.
    pub fn find_in(&self, module: &ModuleRef, qualified: &str) -> Option<&Declaration> {
        self.by_name
            .get(qualified)?
            .iter()
            .find(|id| id.scope.module == *module)
            .and_then(|id| self.declarations.get(id))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }
}

fn lower_declaration(decl: &TypeDecl) -> (Vec<TypeParam>, DeclKind) {
    match decl {
        TypeDecl::Interface(decls) => {
            let type_params = decls
                .first()
                .map(|d| lower_type_params(d.type_params.as_deref()))
                .unwrap_or_default();
            let mut extends = Vec::new();
            let mut body = ObjectDef::default();
            for d in decls {
                extends.extend(d.extends.iter().filter_map(lower_heritage));
                let members = lower_members(&d.body.body);
                merge_object(&mut body, members);
            }
            (type_params, DeclKind::Object { extends, body })
        }
        TypeDecl::Alias(alias) => (
            lower_type_params(alias.type_params.as_deref()),
            DeclKind::Alias(lower_type(&alias.type_ann)),
        ),
        TypeDecl::Enum(e) => (Vec::new(), DeclKind::Enum(lower_enum(e))),
        TypeDecl::Class(class) => (
            lower_type_params(class.type_params.as_deref()),
            lower_class(class),
        ),
    }
}

/// Later declarations of a merged interface only add new properties.
fn merge_object(target: &mut ObjectDef, source: ObjectDef) {
    for property in source.properties {
        if !target.properties.iter().any(|p| p.name == property.name) {
            target.properties.push(property);
        }
    }
    if target.index.is_none() {
        target.index = source.index;
    }
}

fn lower_type_params(params: Option<&TsTypeParamDecl>) -> Vec<TypeParam> {
    params
        .map(|decl| {
            decl.params
                .iter()
                .map(|p| TypeParam {
                    name: p.name.sym.to_string(),
                    default: p.default.as_deref().map(lower_type),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn lower_heritage(heritage: &TsExprWithTypeArgs) -> Option<TypeDef> {
    Some(TypeDef::Reference {
        name: expr_segments(&heritage.expr)?,
        args: lower_type_args(heritage.type_args.as_deref()),
    })
}

fn lower_type_args(args: Option<&TsTypeParamInstantiation>) -> Vec<TypeDef> {
    args.map(|a| a.params.iter().map(|t| lower_type(t)).collect())
        .unwrap_or_default()
}

/// `Base` or `ns.Base` in an `extends` clause.
fn expr_segments(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Ident(ident) => Some(vec![ident.sym.to_string()]),
        Expr::Member(member) => {
            let MemberProp::Ident(prop) = &member.prop else {
                return None;
            };
            let mut segments = expr_segments(&member.obj)?;
            segments.push(prop.sym.to_string());
            Some(segments)
        }
        _ => None,
    }
}

fn lower_members(members: &[TsTypeElement]) -> ObjectDef {
    let mut object = ObjectDef::default();
    for member in members {
        match member {
            TsTypeElement::TsPropertySignature(prop) => {
                if prop.computed {
                    continue;
                }
                let Some(name) = key_name(&prop.key) else {
                    continue;
                };
                object.properties.push(Property {
                    name,
                    ty: lower_annotation(prop.type_ann.as_deref()),
                    optional: prop.optional,
                });
            }
            TsTypeElement::TsGetterSignature(getter) => {
                if getter.computed {
                    continue;
                }
                let Some(name) = key_name(&getter.key) else {
                    continue;
                };
                object.properties.push(Property {
                    name,
                    ty: lower_annotation(getter.type_ann.as_deref()),
                    optional: false,
                });
            }
            TsTypeElement::TsIndexSignature(index) => {
                let value = lower_annotation(index.type_ann.as_deref());
                let keyed_by_string = index.params.iter().any(|p| match p {
                    TsFnParam::Ident(ident) => ident
                        .type_ann
                        .as_deref()
                        .map(|ann| lower_type(&ann.type_ann))
                        .is_some_and(|ty| matches!(ty, TypeDef::String | TypeDef::Number)),
                    _ => false,
                });
                if keyed_by_string {
                    object.index = Some(Box::new(value));
                }
            }
            _ => {}
        }
    }
    object
}

fn lower_class(class: &Class) -> DeclKind {
    let mut body = ObjectDef::default();
    for member in &class.body {
        match member {
            ClassMember::ClassProp(prop) if !prop.is_static => {
                let name = match &prop.key {
                    PropName::Ident(ident) => ident.sym.to_string(),
                    PropName::Str(s) => s.value.to_string(),
                    _ => continue,
                };
                body.properties.push(Property {
                    name,
                    ty: lower_annotation(prop.type_ann.as_deref()),
                    optional: prop.is_optional,
                });
            }
            ClassMember::Constructor(ctor) => {
                for param in &ctor.params {
                    let ParamOrTsParamProp::TsParamProp(prop) = param else {
                        continue;
                    };
                    let TsParamPropParam::Ident(binding) = &prop.param else {
                        continue;
                    };
                    body.properties.push(Property {
                        name: binding.id.sym.to_string(),
                        ty: lower_annotation(binding.type_ann.as_deref()),
                        optional: binding.id.optional,
                    });
                }
            }
            _ => {}
        }
    }

    let extends = class
        .super_class
        .as_deref()
        .and_then(expr_segments)
        .map(|name| TypeDef::Reference {
            name,
            args: lower_type_args(class.super_type_params.as_deref()),
        })
        .into_iter()
        .collect();
    DeclKind::Object { extends, body }
}

fn lower_enum(decl: &TsEnumDecl) -> Vec<Value> {
    let mut next = 0.0;
    let mut values = Vec::new();
    for member in &decl.members {
        let value = match member.init.as_deref().map(static_value) {
            None => Value::from(next),
            Some(Some(Value::Number(n))) => {
                let value = n.as_f64().unwrap_or_default();
                next = value;
                Value::Number(n)
            }
            Some(Some(Value::String(s))) => Value::String(s),
            Some(_) => {
                let name = match &member.id {
                    TsEnumMemberId::Ident(ident) => ident.sym.to_string(),
                    TsEnumMemberId::Str(s) => s.value.to_string(),
                };
                tracing::warn!(enum = %decl.id.sym, member = %name, "computed enum member skipped");
                continue;
            }
        };
        next += 1.0;
        values.push(normalize_number(value));
    }
    values
}

/// `Value::from(2.0)` is a float; enum values read back as integers.
fn normalize_number(value: Value) -> Value {
    match &value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .and_then(crate::options::number)
            .unwrap_or(value),
        _ => value,
    }
}

fn key_name(key: &Expr) -> Option<String> {
    match key {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
        Expr::Lit(Lit::Num(_)) => match static_value(key)? {
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// A missing annotation is implicitly `any`.
fn lower_annotation(ann: Option<&TsTypeAnn>) -> TypeDef {
    ann.map_or(TypeDef::Any, |ann| lower_type(&ann.type_ann))
}

/// Lower a type node.
pub(crate) fn lower_type(ty: &TsType) -> TypeDef {
    match ty {
        TsType::TsKeywordType(keyword) => match keyword.kind {
            TsKeywordTypeKind::TsStringKeyword => TypeDef::String,
            TsKeywordTypeKind::TsNumberKeyword => TypeDef::Number,
            TsKeywordTypeKind::TsBooleanKeyword => TypeDef::Boolean,
            TsKeywordTypeKind::TsBigIntKeyword => TypeDef::BigInt,
            TsKeywordTypeKind::TsNullKeyword => TypeDef::Null,
            TsKeywordTypeKind::TsUndefinedKeyword => TypeDef::Undefined,
            TsKeywordTypeKind::TsVoidKeyword => TypeDef::Void,
            TsKeywordTypeKind::TsAnyKeyword => TypeDef::Any,
            TsKeywordTypeKind::TsUnknownKeyword => TypeDef::Unknown,
            TsKeywordTypeKind::TsNeverKeyword => TypeDef::Never,
            TsKeywordTypeKind::TsObjectKeyword => TypeDef::Object,
            TsKeywordTypeKind::TsSymbolKeyword => TypeDef::Unsupported("symbol".to_string()),
            _ => TypeDef::Unsupported("intrinsic".to_string()),
        },
        TsType::TsTypeRef(reference) => TypeDef::Reference {
            name: entity_segments(&reference.type_name),
            args: lower_type_args(reference.type_params.as_deref()),
        },
        TsType::TsTypeLit(lit) => TypeDef::TypeLit(lower_members(&lit.members)),
        TsType::TsArrayType(array) => TypeDef::Array(Box::new(lower_type(&array.elem_type))),
        TsType::TsTupleType(tuple) => TypeDef::Tuple(
            tuple
                .elem_types
                .iter()
                .map(|element| match &*element.ty {
                    TsType::TsOptionalType(optional) => TupleElement {
                        ty: lower_type(&optional.type_ann),
                        optional: true,
                    },
                    ty => TupleElement {
                        ty: lower_type(ty),
                        optional: false,
                    },
                })
                .collect(),
        ),
        TsType::TsOptionalType(optional) => lower_type(&optional.type_ann),
        TsType::TsParenthesizedType(paren) => lower_type(&paren.type_ann),
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(union)) => {
            TypeDef::Union(union.types.iter().map(|t| lower_type(t)).collect())
        }
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsIntersectionType(
            intersection,
        )) => TypeDef::Intersection(intersection.types.iter().map(|t| lower_type(t)).collect()),
        TsType::TsTypeOperator(op) => match op.op {
            TsTypeOperatorOp::KeyOf => TypeDef::KeyOf(Box::new(lower_type(&op.type_ann))),
            TsTypeOperatorOp::ReadOnly => lower_type(&op.type_ann),
            _ => TypeDef::Unsupported("unique symbol".to_string()),
        },
        TsType::TsLitType(lit) => match &lit.lit {
            TsLit::Str(s) => TypeDef::Literal(Literal::String(s.value.to_string())),
            TsLit::Number(n) => TypeDef::Literal(Literal::Number(n.value)),
            TsLit::Bool(b) => TypeDef::Literal(Literal::Boolean(b.value)),
            TsLit::BigInt(_) => TypeDef::BigInt,
            // Template literal types
            _ => TypeDef::String,
        },
        TsType::TsTypePredicate(_) => TypeDef::Boolean,
        TsType::TsFnOrConstructorType(_) => TypeDef::Unsupported("function type".to_string()),
        TsType::TsTypeQuery(_) => TypeDef::Unsupported("typeof query".to_string()),
        TsType::TsConditionalType(_) => TypeDef::Unsupported("conditional type".to_string()),
        TsType::TsMappedType(_) => TypeDef::Unsupported("mapped type".to_string()),
        TsType::TsIndexedAccessType(_) => {
            TypeDef::Unsupported("indexed access type".to_string())
        }
        _ => TypeDef::Unsupported("type".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use serde_json::json;

    fn index(source: &str) -> (Program, SchemaIndex) {
        let fs = MemoryFs::new().with_file("/index.ts", source);
        let program = Program::builder(fs).root("/index.ts").build().unwrap();
        let index = SchemaIndex::build(&program);
        (program, index)
    }

    fn object(decl: &Declaration) -> (&[TypeDef], &ObjectDef) {
        match &decl.kind {
            DeclKind::Object { extends, body } => (extends, body),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_lower_interface_members() {
        let (_, index) = index(
            r#"
            interface A extends Base<string> {
                a: string;
                "quoted-key"?: number[];
                readonly [key: string]: unknown;
                method(): void;
                get size(): number;
            }
            "#,
        );
        let (extends, body) = object(index.find("A").unwrap());
        assert_eq!(extends[0].to_ts_type(), "Base<string>");
        let names: Vec<&str> = body.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "quoted-key", "size"]);
        assert!(body.properties[1].optional);
        assert_eq!(body.properties[1].ty, TypeDef::Array(Box::new(TypeDef::Number)));
        assert_eq!(body.index.as_deref(), Some(&TypeDef::Unknown));
    }

    #[test]
    fn test_merged_interfaces_keep_first_property() {
        let (_, index) = index("interface A { a: string } interface A { a: string; b: number }");
        let (_, body) = object(index.find("A").unwrap());
        assert_eq!(body.properties.len(), 2);
    }

    #[test]
    fn test_lower_enum_values() {
        let (_, index) = index(
            r#"
            enum Color { Red, Green = 5, Blue }
            enum Mode { On = "on", Off = "off" }
            "#,
        );
        let DeclKind::Enum(values) = &index.find("Color").unwrap().kind else {
            panic!("expected enum");
        };
        assert_eq!(values, &vec![json!(0), json!(5), json!(6)]);
        let DeclKind::Enum(values) = &index.find("Mode").unwrap().kind else {
            panic!("expected enum");
        };
        assert_eq!(values, &vec![json!("on"), json!("off")]);
    }

    #[test]
    fn test_lower_class_fields() {
        let (_, index) = index(
            r#"
            class Point extends Base {
                static origin: Point;
                x: number;
                label?: string;
                constructor(public readonly z: number, plain: string) { super(); }
                length(): number { return 0; }
            }
            "#,
        );
        let (extends, body) = object(index.find("Point").unwrap());
        assert_eq!(extends, &[TypeDef::named("Base")]);
        let names: Vec<&str> = body.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["x", "label", "z"]);
    }

    #[test]
    fn test_lower_alias_and_generics() {
        let (_, index) = index(
            r#"
            type Pair<T, U = string> = [T, U?];
            type Keys = keyof Pair<number>;
            namespace Api { export type Id = string | number; }
            "#,
        );
        let pair = index.find("Pair").unwrap();
        assert_eq!(pair.type_params.len(), 2);
        assert_eq!(pair.type_params[1].default, Some(TypeDef::String));
        let DeclKind::Alias(ty) = &pair.kind else { panic!("expected alias") };
        assert_eq!(ty.to_ts_type(), "[T, U?]");

        let DeclKind::Alias(keys) = &index.find("Keys").unwrap().kind else {
            panic!("expected alias")
        };
        assert_eq!(keys.to_ts_type(), "keyof Pair<number>");
        assert!(index.find("Api.Id").is_some());
        assert!(index.find("Id").is_none());
    }

    #[test]
    fn test_unsupported_forms_are_marked() {
        let (_, index) = index("type F = (a: string) => void; type M = { [K in 'a']: K };");
        for name in ["F", "M"] {
            let DeclKind::Alias(ty) = &index.find(name).unwrap().kind else {
                panic!("expected alias")
            };
            assert!(matches!(ty, TypeDef::Unsupported(_)), "{name}: {ty:?}");
        }
    }

    #[test]
    fn test_find_in_declaring_module() {
        let fs = MemoryFs::new()
            .with_file("/a.ts", "export interface User { wrong: string }")
            .with_file("/b.ts", "export interface User { right: number }");
        let program = Program::builder(fs).root("/a.ts").root("/b.ts").build().unwrap();
        let index = SchemaIndex::build(&program);

        let (_, first) = object(index.find("User").unwrap());
        assert_eq!(first.properties[0].name, "wrong");
        let (_, own) = object(index.find_in(&ModuleRef::file("/b.ts"), "User").unwrap());
        assert_eq!(own.properties[0].name, "right");
        assert!(index.find_in(&ModuleRef::file("/c.ts"), "User").is_none());
    }
}
