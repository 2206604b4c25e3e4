//! The call-site rewriting pass.
//!
//! [`Transformer`] walks one source file of a [`Program`], replaces every
//! `fromType<T>(options)` call whose target is the marker function with the
//! literal schema of `T`, and drops the marker imports that are no longer
//! referenced.
//!
//! # Example
//!
//! ```
//! use ts_json_schema_transform::{MemoryFs, Program, Transformer};
//!
//! let fs = MemoryFs::new().with_marker_package("/").with_file(
//!     "/index.ts",
//!     r#"
//!     import { fromType } from "ts-transform-json-schema";
//!     interface A { a: string }
//!     export const schema = fromType<A>();
//!     "#,
//! );
//! let program = Program::builder(fs).root("/index.ts").build().unwrap();
//!
//! let output = Transformer::new(&program).transform_to_string("/index.ts").unwrap();
//! assert!(!output.contains("ts-transform-json-schema"));
//! assert!(output.contains(r#""type": "string""#));
//! ```

use std::path::Path;

use serde_json::Value;
use swc_core::common::DUMMY_SP;
use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{CallExpr, Expr, ImportDecl, Module, ModuleDecl, ModuleItem, ParenExpr};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use crate::checker::{ProgramChecker, TypeChecker, describe_type_node};
use crate::config::{TransformConfig, UnresolvedSymbolPolicy};
use crate::error::TransformError;
use crate::generator::{SchemaGenerator, TypeScriptGenerator};
use crate::literal::encode;
use crate::options::{call_options, merge_options};
use crate::program::{ModuleRef, Program};

/// Rewrites marker calls of a program's source files.
///
/// The checker and generator are replaceable; by default names are resolved
/// with [`ProgramChecker`] and schemas come from [`TypeScriptGenerator`].
/// One transformer can be used for many files of the same program, which
/// lets the generator reuse its per-program index.
pub struct Transformer<'p, C = ProgramChecker<'p>, G = TypeScriptGenerator> {
    program: &'p Program,
    checker: C,
    generator: G,
    config: TransformConfig,
}

impl<'p> Transformer<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            checker: ProgramChecker::new(program),
            generator: TypeScriptGenerator::new(),
            config: TransformConfig::default(),
        }
    }
}

impl<'p, C: TypeChecker, G: SchemaGenerator> Transformer<'p, C, G> {
    pub fn with_checker<C2: TypeChecker>(self, checker: C2) -> Transformer<'p, C2, G> {
        Transformer {
            program: self.program,
            checker,
            generator: self.generator,
            config: self.config,
        }
    }

    pub fn with_generator<G2: SchemaGenerator>(self, generator: G2) -> Transformer<'p, C, G2> {
        Transformer {
            program: self.program,
            checker: self.checker,
            generator,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Transform the file at `path` and return the rewritten module.
    ///
    /// The program itself is left untouched. Any error aborts the whole file;
    /// no partially rewritten module is returned.
    pub fn transform(&self, path: impl AsRef<Path>) -> Result<Module, TransformError> {
        let path = path.as_ref();
        let source = self
            .program
            .source_file(path)
            .ok_or_else(|| TransformError::UnknownFile {
                path: path.to_path_buf(),
            })?;

        let mut module = source.module().clone();
        let mut visitor = MarkerVisitor {
            file: source.path(),
            program: self.program,
            checker: &self.checker,
            generator: &self.generator,
            config: &self.config,
            replaced: 0,
            passed_through: 0,
            error: None,
        };
        module.visit_mut_with(&mut visitor);
        if let Some(error) = visitor.error {
            return Err(error);
        }

        tracing::debug!(
            file = %source.path().display(),
            replaced = visitor.replaced,
            passed_through = visitor.passed_through,
            "transformed"
        );
        Ok(module)
    }

    /// Transform the file at `path` and print it back to source.
    pub fn transform_to_string(&self, path: impl AsRef<Path>) -> Result<String, TransformError> {
        let module = self.transform(path)?;
        Ok(self.program.emit(&module))
    }
}

/// Transform one file with the default checker, generator and configuration.
pub fn transform(program: &Program, path: impl AsRef<Path>) -> Result<Module, TransformError> {
    Transformer::new(program).transform(path)
}

struct MarkerVisitor<'t, C, G> {
    file: &'t Path,
    program: &'t Program,
    checker: &'t C,
    generator: &'t G,
    config: &'t TransformConfig,
    replaced: usize,
    passed_through: usize,
    /// First fatal error; once set the walk stops descending.
    error: Option<TransformError>,
}

impl<C: TypeChecker, G: SchemaGenerator> MarkerVisitor<'_, C, G> {
    fn is_marker(&self, site: &ModuleRef) -> bool {
        self.config
            .marker
            .matches(site, |path| self.checker.package_name_of(path))
    }

    /// The schema that replaces `call`, or `None` when `call` is left alone.
    fn substitute(&mut self, call: &CallExpr) -> Result<Option<Value>, TransformError> {
        let Some(type_args) = &call.type_args else {
            return Ok(None);
        };
        let Some(signature) = self.checker.resolve_call_signature(self.file, call) else {
            return Ok(None);
        };
        if !self.is_marker(&signature.declaration) {
            return Ok(None);
        }
        let [type_arg] = type_args.params.as_slice() else {
            return Ok(None);
        };

        let descriptor = self.checker.type_from_type_node(self.file, type_arg);
        let Some(symbol) = descriptor.preferred_symbol() else {
            let type_text = describe_type_node(type_arg);
            return match self.config.on_unresolved_symbol {
                UnresolvedSymbolPolicy::Error => Err(TransformError::SymbolNotFound {
                    file: self.file.to_path_buf(),
                    type_text,
                }),
                UnresolvedSymbolPolicy::PassThrough => {
                    tracing::warn!(
                        file = %self.file.display(),
                        %type_text,
                        "no symbol for type argument, leaving call in place"
                    );
                    self.passed_through += 1;
                    Ok(None)
                }
            };
        };

        // Instantiations written at the call site (`Partial<A>`) are generated
        // as written, in the calling module.
        let (module, type_name) = if descriptor.instantiated {
            (
                ModuleRef::file(self.file),
                self.checker.type_to_string(self.file, type_arg),
            )
        } else {
            (
                symbol.declaration.clone(),
                self.checker.fully_qualified_name(symbol),
            )
        };
        let options = merge_options(&self.config.defaults, call_options(call));
        let schema = self
            .generator
            .generate_in(self.program, &module, &type_name, &options)
            .map_err(|source| TransformError::Generate {
                type_name: type_name.clone(),
                source,
            })?
            .ok_or_else(|| TransformError::EmptySchema {
                type_name: type_name.clone(),
            })?;

        tracing::debug!(file = %self.file.display(), %type_name, "replaced marker call");
        self.replaced += 1;
        Ok(Some(schema))
    }

    /// Whether `import` brings in the marker module.
    ///
    /// An import naming the marker package is a marker import wherever the
    /// package's entry point leads. Naming it without any declarations being
    /// reachable is an error: calls through such an import could never be
    /// resolved.
    fn is_marker_import(&self, import: &ImportDecl) -> Result<bool, TransformError> {
        let specifier = import.src.value.to_string();
        let resolved = self.checker.resolve_import(self.file, &specifier);
        if self.config.marker.is_package_specifier(&specifier) {
            return match resolved {
                Some(_) => Ok(true),
                None => Err(TransformError::MissingMarkerDeclaration {
                    file: self.file.to_path_buf(),
                    specifier,
                }),
            };
        }
        Ok(resolved.is_some_and(|site| self.is_marker(&site)))
    }
}

impl<C: TypeChecker, G: SchemaGenerator> VisitMut for MarkerVisitor<'_, C, G> {
    fn visit_mut_module(&mut self, module: &mut Module) {
        // Imports are checked up front so a missing marker declaration is
        // reported before any schema is generated.
        let mut marker_imports = Vec::new();
        for (i, item) in module.body.iter().enumerate() {
            if let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item {
                match self.is_marker_import(import) {
                    Ok(true) => marker_imports.push(i),
                    Ok(false) => {}
                    Err(error) => {
                        self.error = Some(error);
                        return;
                    }
                }
            }
        }

        module.visit_mut_children_with(self);
        if self.error.is_some() || self.passed_through > 0 {
            return;
        }

        let mut index = 0;
        module.body.retain(|_| {
            let keep = !marker_imports.contains(&index);
            index += 1;
            keep
        });
        if !marker_imports.is_empty() {
            tracing::debug!(
                file = %self.file.display(),
                count = marker_imports.len(),
                "removed marker imports"
            );
        }
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if self.error.is_some() {
            return;
        }
        if let Expr::Call(call) = expr {
            match self.substitute(call) {
                Ok(Some(schema)) => {
                    *expr = parenthesize(encode(&schema));
                    return;
                }
                Ok(None) => {}
                Err(error) => {
                    self.error = Some(error);
                    return;
                }
            }
        }
        expr.visit_mut_children_with(self);
    }
}

/// Object literals are wrapped so they never print as a block, e.g. as an
/// arrow body or at the start of a statement.
fn parenthesize(mut expr: Expr) -> Expr {
    if !expr.is_object() {
        return expr;
    }
    Expr::Paren(ParenExpr {
        span: DUMMY_SP,
        expr: Box::new(expr.take()),
    })
}
