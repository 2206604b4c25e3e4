//! The host capabilities the transform relies on.
//!
//! [`TypeChecker`] is the seam between the transform visitor and whatever
//! toolchain owns parsing and type resolution. [`ProgramChecker`] is the
//! adapter over this crate's own [`Program`].

use std::path::Path;

use swc_core::common::Spanned;
use swc_core::ecma::ast::{
    CallExpr, Callee, Expr, MemberProp, TsEntityName, TsKeywordTypeKind, TsType,
    TsUnionOrIntersectionType,
};

use crate::program::{Binding, DeclRef, Meaning, ModuleRef, Program, TypeDecl, ValueDecl, file_scope};

/// How many alias hops are followed when looking for the aliased symbol.
const MAX_ALIAS_DEPTH: usize = 8;

/// A resolved call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Module that declares the callee.
    pub declaration: ModuleRef,
    /// Declared name of the callee (not the local alias it was called by).
    pub name: String,
}

/// A declared, named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Namespace path plus name, e.g. `["Api", "User"]`.
    pub qualified: Vec<String>,
    pub declaration: ModuleRef,
}

/// What a type argument resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// The declared type itself (interface, class, enum, or the target of an alias).
    pub symbol: Option<Symbol>,
    /// The type alias the reference went through, if any.
    pub alias_symbol: Option<Symbol>,
    /// The reference was written with type arguments, e.g. `Partial<A>`.
    pub instantiated: bool,
}

impl TypeDescriptor {
    /// The alias symbol when present, the direct symbol otherwise.
    pub fn preferred_symbol(&self) -> Option<&Symbol> {
        self.alias_symbol.as_ref().or(self.symbol.as_ref())
    }
}

/// Type resolution and module information supplied by the host toolchain.
pub trait TypeChecker {
    /// Resolve the declaration a call expression targets.
    fn resolve_call_signature(&self, file: &Path, call: &CallExpr) -> Option<Signature>;

    /// Resolve a type node as written in `file`.
    fn type_from_type_node(&self, file: &Path, node: &TsType) -> TypeDescriptor;

    /// Dotted name of a symbol including its namespaces.
    fn fully_qualified_name(&self, symbol: &Symbol) -> String {
        symbol.qualified.join(".")
    }

    /// A type node as written in `file`.
    fn type_to_string(&self, _file: &Path, node: &TsType) -> String {
        describe_type_node(node)
    }

    /// Resolve an import specifier as written in `file`.
    fn resolve_import(&self, file: &Path, specifier: &str) -> Option<ModuleRef>;

    /// `name` of the nearest `package.json` above `path`.
    fn package_name_of(&self, path: &Path) -> Option<String>;
}

/// [`TypeChecker`] over a [`Program`].
///
/// Names are resolved through the module-level symbol tables only; a local
/// variable shadowing an imported name is not detected.
#[derive(Debug, Clone, Copy)]
pub struct ProgramChecker<'p> {
    program: &'p Program,
}

impl<'p> ProgramChecker<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    fn symbol(decl: &DeclRef) -> Symbol {
        Symbol {
            name: decl.name.clone(),
            qualified: decl.qualified_segments(),
            declaration: decl.scope.module.clone(),
        }
    }

    fn describe_decl(&self, decl: &DeclRef, depth: usize) -> TypeDescriptor {
        let Some(TypeDecl::Alias(alias)) = self.program.type_decl(decl) else {
            return TypeDescriptor {
                symbol: Some(Self::symbol(decl)),
                ..TypeDescriptor::default()
            };
        };

        // An alias of another named type also carries that type's symbol.
        let target = match strip_parens(&alias.type_ann) {
            TsType::TsTypeRef(reference) if depth < MAX_ALIAS_DEPTH => {
                let segments = entity_segments(&reference.type_name);
                match self.program.resolve_path(&decl.scope, &segments, Meaning::Type) {
                    Some(Binding::Type(target)) => {
                        self.describe_decl(&target, depth + 1).preferred_symbol().cloned()
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        TypeDescriptor {
            symbol: target,
            alias_symbol: Some(Self::symbol(decl)),
            instantiated: false,
        }
    }
}

impl TypeChecker for ProgramChecker<'_> {
    fn resolve_call_signature(&self, file: &Path, call: &CallExpr) -> Option<Signature> {
        let Callee::Expr(callee) = &call.callee else {
            return None;
        };
        let segments = callee_segments(callee)?;
        let binding = self
            .program
            .resolve_path(&file_scope(file), &segments, Meaning::Value)?;
        let Binding::Value(decl) = binding else {
            return None;
        };
        let ValueDecl::Function = self.program.value_decl(&decl)? else {
            return None;
        };
        Some(Signature {
            declaration: decl.scope.module.clone(),
            name: decl.name,
        })
    }

    fn type_from_type_node(&self, file: &Path, node: &TsType) -> TypeDescriptor {
        let TsType::TsTypeRef(reference) = strip_parens(node) else {
            return TypeDescriptor::default();
        };
        let segments = entity_segments(&reference.type_name);
        let instantiated = reference.type_params.is_some();
        match self
            .program
            .resolve_path(&file_scope(file), &segments, Meaning::Type)
        {
            Some(Binding::Type(decl)) => TypeDescriptor {
                instantiated,
                ..self.describe_decl(&decl, 0)
            },
            // Library generics such as `Partial` are declared outside the program.
            None if instantiated => TypeDescriptor {
                symbol: None,
                alias_symbol: Some(Symbol {
                    name: segments.last().cloned().unwrap_or_default(),
                    qualified: segments,
                    declaration: ModuleRef::file(file),
                }),
                instantiated,
            },
            _ => TypeDescriptor::default(),
        }
    }

    fn type_to_string(&self, _file: &Path, node: &TsType) -> String {
        self.program
            .source_text(node.span())
            .unwrap_or_else(|| describe_type_node(node))
    }

    fn resolve_import(&self, file: &Path, specifier: &str) -> Option<ModuleRef> {
        self.program.resolve_module(specifier, file)
    }

    fn package_name_of(&self, path: &Path) -> Option<String> {
        self.program.package_name_of(path)
    }
}

/// Segments of a qualified type name, root first: `A.B.C` gives `[A, B, C]`.
pub fn entity_segments(name: &TsEntityName) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = name;
    loop {
        match current {
            TsEntityName::Ident(ident) => {
                segments.push(ident.sym.to_string());
                break;
            }
            TsEntityName::TsQualifiedName(qualified) => {
                segments.push(qualified.right.sym.to_string());
                current = &qualified.left;
            }
        }
    }
    segments.reverse();
    segments
}

/// Segments of a callee made of identifiers and dotted member accesses.
fn callee_segments(callee: &Expr) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = callee;
    loop {
        match current {
            Expr::Ident(ident) => {
                segments.push(ident.sym.to_string());
                break;
            }
            Expr::Member(member) => {
                let MemberProp::Ident(prop) = &member.prop else {
                    return None;
                };
                segments.push(prop.sym.to_string());
                current = &member.obj;
            }
            Expr::Paren(paren) => current = &paren.expr,
            _ => return None,
        }
    }
    segments.reverse();
    Some(segments)
}

fn strip_parens(node: &TsType) -> &TsType {
    let mut current = node;
    while let TsType::TsParenthesizedType(paren) = current {
        current = &paren.type_ann;
    }
    current
}

/// Short human-readable description of a type node for error messages.
pub fn describe_type_node(node: &TsType) -> String {
    match strip_parens(node) {
        TsType::TsTypeRef(reference) => entity_segments(&reference.type_name).join("."),
        TsType::TsKeywordType(keyword) => match keyword.kind {
            TsKeywordTypeKind::TsStringKeyword => "string".to_string(),
            TsKeywordTypeKind::TsNumberKeyword => "number".to_string(),
            TsKeywordTypeKind::TsBooleanKeyword => "boolean".to_string(),
            TsKeywordTypeKind::TsNullKeyword => "null".to_string(),
            TsKeywordTypeKind::TsUndefinedKeyword => "undefined".to_string(),
            TsKeywordTypeKind::TsAnyKeyword => "any".to_string(),
            TsKeywordTypeKind::TsUnknownKeyword => "unknown".to_string(),
            _ => "keyword type".to_string(),
        },
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(_)) => {
            "union type".to_string()
        }
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsIntersectionType(_)) => {
            "intersection type".to_string()
        }
        TsType::TsTypeLit(_) => "type literal".to_string(),
        TsType::TsLitType(_) => "literal type".to_string(),
        TsType::TsArrayType(_) => "array type".to_string(),
        _ => "anonymous type".to_string(),
    }
}
