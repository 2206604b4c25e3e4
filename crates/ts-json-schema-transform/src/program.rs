//! A set of parsed TypeScript files plus the module graph between them.
//!
//! The [`Program`] plays the part of the host compiler: it parses files with
//! swc, follows imports transitively from the root files, resolves module
//! specifiers and keeps a per-file symbol table that the
//! [`ProgramChecker`](crate::ProgramChecker) and the built-in schema
//! generator consult.
//!
//! ## Symbol tables
//!
//! Every file (and every ambient `declare module "name" { ... }` block) gets
//! a [`Scope`] holding its type declarations, function declarations,
//! namespaces, import bindings and export table. Namespaces nest as child
//! scopes, so `namespace A.B { interface C {} }` is reachable through the
//! path `["A", "B"]`.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::Deserialize;
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, SourceMap, SourceMapper, Span};
use swc_core::ecma::ast::{
    Class, Decl, DefaultDecl, ExportSpecifier, Expr, ImportSpecifier, Module, ModuleDecl,
    ModuleExportName, ModuleItem, Stmt, TsEnumDecl, TsInterfaceDecl, TsModuleName,
    TsNamespaceBody, TsType, TsTypeAliasDecl,
};
use swc_core::ecma::codegen::to_code_default;
use swc_core::ecma::parser::{Parser, StringInput, Syntax, TsSyntax};
use walkdir::WalkDir;

use crate::error::ProgramError;
use crate::fs::{FileSystem, normalize_path};

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Maximum number of re-export hops followed while resolving an export.
const MAX_EXPORT_DEPTH: usize = 16;

/// Identity of one [`Program`] instance, used as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> Self {
        ProgramId(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A module: either a whole file, or an ambient `declare module "name"`
/// block inside a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    pub file: PathBuf,
    pub ambient: Option<String>,
}

impl ModuleRef {
    /// A module that is a whole file.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            file: normalize_path(path.as_ref()),
            ambient: None,
        }
    }
}

/// A scope inside a module, addressed by its namespace path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ScopeId {
    pub module: ModuleRef,
    pub path: Vec<String>,
}

impl ScopeId {
    fn root(module: ModuleRef) -> Self {
        Self {
            module,
            path: Vec::new(),
        }
    }

    fn child(&self, name: &str) -> Self {
        let mut path = self.path.clone();
        path.push(name.to_string());
        Self {
            module: self.module.clone(),
            path,
        }
    }

    fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        let mut path = self.path.clone();
        path.pop();
        Some(Self {
            module: self.module.clone(),
            path,
        })
    }
}

/// A named declaration in a specific scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct DeclRef {
    pub scope: ScopeId,
    pub name: String,
}

impl DeclRef {
    /// Dotted name of the declaration: namespace path plus the name.
    pub fn qualified_name(&self) -> String {
        self.qualified_segments().join(".")
    }

    pub fn qualified_segments(&self) -> Vec<String> {
        let mut segments = self.scope.path.clone();
        segments.push(self.name.clone());
        segments
    }
}

/// What a name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Binding {
    Type(DeclRef),
    Value(DeclRef),
    Namespace(ScopeId),
}

/// Which declaration space a lookup is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Meaning {
    Type,
    Value,
    Namespace,
}

/// A type-level declaration.
#[derive(Debug, Clone)]
pub(crate) enum TypeDecl {
    /// All declarations of a merged interface, in source order.
    Interface(Vec<TsInterfaceDecl>),
    Alias(Box<TsTypeAliasDecl>),
    Enum(Box<TsEnumDecl>),
    Class(Box<Class>),
}

/// A value-level declaration the checker cares about.
#[derive(Debug, Clone)]
pub(crate) enum ValueDecl {
    Function,
    Class,
}

#[derive(Debug, Clone)]
pub(crate) enum ImportKind {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone)]
pub(crate) struct ImportBinding {
    pub specifier: String,
    pub kind: ImportKind,
}

#[derive(Debug, Clone)]
pub(crate) enum ExportTarget {
    Local(String),
    Reexport { specifier: String, name: String },
    ReexportNamespace { specifier: String },
}

/// Declarations, imports and exports of one module or namespace body.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub types: IndexMap<String, TypeDecl>,
    pub values: IndexMap<String, ValueDecl>,
    pub namespaces: IndexMap<String, Scope>,
    pub imports: HashMap<String, ImportBinding>,
    pub exports: HashMap<String, ExportTarget>,
    pub export_all: Vec<String>,
    /// `import "./polyfill"` style imports without bindings.
    pub bare_imports: Vec<String>,
    /// Ambient module blocks export every declaration implicitly.
    pub exports_everything: bool,
}

/// One parsed file of a program.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    module: Module,
    pub(crate) scope: Scope,
    pub(crate) ambient_modules: IndexMap<String, Scope>,
    specifiers: Vec<String>,
}

impl SourceFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed syntax tree.
    pub fn module(&self) -> &Module {
        &self.module
    }
}

#[derive(Debug, Deserialize, Default)]
struct PackageJson {
    name: Option<String>,
    types: Option<String>,
    typings: Option<String>,
    main: Option<String>,
}

/// Module specifier resolution over a [`FileSystem`].
struct Resolver {
    fs: Box<dyn FileSystem>,
    packages: HashMap<String, PathBuf>,
    ambient: HashMap<String, PathBuf>,
}

impl Resolver {
    fn resolve(&self, specifier: &str, from: &Path) -> Option<ModuleRef> {
        if is_path_specifier(specifier) {
            let base = from.parent().unwrap_or(Path::new("/")).join(specifier);
            return self.locate(&normalize_path(&base)).map(ModuleRef::file);
        }

        if let Some(path) = self.packages.get(specifier) {
            return Some(ModuleRef::file(path));
        }

        if let Some(file) = self.ambient.get(specifier) {
            return Some(ModuleRef {
                file: file.clone(),
                ambient: Some(specifier.to_string()),
            });
        }

        self.resolve_node_modules(specifier, from)
            .map(ModuleRef::file)
    }

    fn resolve_node_modules(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let (package, subpath) = split_package_specifier(specifier);
        let types_package = match package.strip_prefix('@') {
            Some(scoped) => format!("@types/{}", scoped.replacen('/', "__", 1)),
            None => format!("@types/{package}"),
        };

        for dir in from.parent()?.ancestors() {
            let node_modules = dir.join("node_modules");
            for name in [package, types_package.as_str()] {
                let package_dir = node_modules.join(name);
                let found = match subpath {
                    Some(sub) => self.locate(&package_dir.join(sub)),
                    None => self.locate_package_dir(&package_dir),
                };
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }

    fn locate_package_dir(&self, dir: &Path) -> Option<PathBuf> {
        let manifest = dir.join("package.json");
        if self.fs.is_file(&manifest) {
            let package = self.read_package_json(&manifest).unwrap_or_default();
            for entry in [package.types, package.typings, package.main]
                .into_iter()
                .flatten()
            {
                if let Some(found) = self.locate(&normalize_path(&dir.join(entry))) {
                    return Some(found);
                }
            }
        }
        self.locate_index(dir)
    }

    /// Find a TypeScript file for `base`, trying the usual extensions.
    fn locate(&self, base: &Path) -> Option<PathBuf> {
        let text = base.to_string_lossy();
        if is_typescript_path(&text) && self.fs.is_file(base) {
            return Some(base.to_path_buf());
        }

        // `./foo.js` in ESM-style TypeScript points at `./foo.ts`.
        let stem = text
            .strip_suffix(".js")
            .or_else(|| text.strip_suffix(".mjs"))
            .or_else(|| text.strip_suffix(".cjs"))
            .unwrap_or(&text);
        for ext in [".ts", ".tsx", ".d.ts"] {
            let candidate = PathBuf::from(format!("{stem}{ext}"));
            if self.fs.is_file(&candidate) {
                return Some(candidate);
            }
        }

        if self.fs.is_file(&base.join("package.json")) {
            return self.locate_package_dir(base);
        }
        self.locate_index(base)
    }

    fn locate_index(&self, dir: &Path) -> Option<PathBuf> {
        ["index.ts", "index.tsx", "index.d.ts"]
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| self.fs.is_file(candidate))
    }

    fn read_package_json(&self, path: &Path) -> Option<PackageJson> {
        let text = self.fs.read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn package_name_of(&self, path: &Path) -> Option<String> {
        let dir = path.parent()?;
        for ancestor in dir.ancestors() {
            let manifest = ancestor.join("package.json");
            if self.fs.is_file(&manifest) {
                return self.read_package_json(&manifest).and_then(|p| p.name);
            }
        }
        None
    }
}

/// Builder for [`Program`].
pub struct ProgramBuilder {
    fs: Box<dyn FileSystem>,
    roots: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    packages: HashMap<String, PathBuf>,
}

impl ProgramBuilder {
    /// Add a root file.
    pub fn root(mut self, path: impl AsRef<Path>) -> Self {
        self.roots.push(normalize_path(path.as_ref()));
        self
    }

    /// Add every TypeScript file below `dir` as a root.
    ///
    /// The walk runs against the operating system's file system; files under
    /// `node_modules` are skipped.
    pub fn roots_from_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dirs.push(dir.as_ref().to_path_buf());
        self
    }

    /// Resolve the bare specifier `name` to `path`.
    pub fn package(mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.packages
            .insert(name.into(), normalize_path(path.as_ref()));
        self
    }

    /// Parse the roots and everything they import.
    pub fn build(self) -> Result<Program, ProgramError> {
        let mut roots = self.roots;
        for dir in &self.dirs {
            for entry in WalkDir::new(dir)
                .into_iter()
                .filter_entry(|e| e.file_name() != "node_modules")
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if entry.file_type().is_file() && is_typescript_path(&path.to_string_lossy()) {
                    roots.push(normalize_path(path));
                }
            }
        }

        let mut program = Program {
            id: ProgramId::next(),
            cm: Lrc::new(SourceMap::default()),
            resolver: Resolver {
                fs: self.fs,
                packages: self.packages,
                ambient: HashMap::new(),
            },
            files: IndexMap::new(),
            roots: Vec::new(),
        };

        for root in &roots {
            if !program.files.contains_key(root) {
                program.load_file(root)?;
            }
            if !program.roots.contains(root) {
                program.roots.push(root.clone());
            }
        }

        // Follow imports breadth-first. Ambient modules declared by any root
        // are registered before the walk so bare specifiers can see them.
        let mut queue: VecDeque<PathBuf> = program.files.keys().cloned().collect();
        while let Some(path) = queue.pop_front() {
            let specifiers = program.files[&path].specifiers.clone();
            for specifier in specifiers {
                let Some(target) = program.resolver.resolve(&specifier, &path) else {
                    tracing::trace!(%specifier, from = %path.display(), "unresolved import");
                    continue;
                };
                if !program.files.contains_key(&target.file) {
                    program.load_file(&target.file)?;
                    queue.push_back(target.file);
                }
            }
        }

        tracing::debug!(
            program = program.id.0,
            files = program.files.len(),
            "program loaded"
        );
        Ok(program)
    }
}

/// A loaded set of TypeScript files.
pub struct Program {
    id: ProgramId,
    cm: Lrc<SourceMap>,
    resolver: Resolver,
    files: IndexMap<PathBuf, SourceFile>,
    roots: Vec<PathBuf>,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("roots", &self.roots)
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Program {
    /// Start building a program that reads files through `fs`.
    ///
    /// # Example
    ///
    /// ```
    /// use ts_json_schema_transform::{MemoryFs, Program};
    ///
    /// let fs = MemoryFs::new()
    ///     .with_file("/index.ts", "import { B } from './b'; export interface A { b: B }")
    ///     .with_file("/b.ts", "export interface B { name: string }");
    /// let program = Program::builder(fs).root("/index.ts").build().unwrap();
    /// assert_eq!(program.files().count(), 2);
    /// ```
    pub fn builder(fs: impl FileSystem + 'static) -> ProgramBuilder {
        ProgramBuilder {
            fs: Box::new(fs),
            roots: Vec::new(),
            dirs: Vec::new(),
            packages: HashMap::new(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Root files in the order they were added.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// All loaded files in load order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn source_file(&self, path: impl AsRef<Path>) -> Option<&SourceFile> {
        self.files.get(&normalize_path(path.as_ref()))
    }

    /// Resolve an import specifier as written in `from`.
    pub fn resolve_module(&self, specifier: &str, from: impl AsRef<Path>) -> Option<ModuleRef> {
        self.resolver.resolve(specifier, from.as_ref())
    }

    /// `name` of the nearest `package.json` above `path`.
    pub fn package_name_of(&self, path: impl AsRef<Path>) -> Option<String> {
        self.resolver.package_name_of(path.as_ref())
    }

    /// Print a module back to TypeScript source.
    pub fn emit(&self, module: &Module) -> String {
        to_code_default(self.cm.clone(), None, module)
    }

    /// Source text covered by `span` in one of the loaded files.
    pub fn source_text(&self, span: Span) -> Option<String> {
        self.cm.span_to_snippet(span).ok()
    }

    fn load_file(&mut self, path: &Path) -> Result<(), ProgramError> {
        let source = self
            .resolver
            .fs
            .read_to_string(path)
            .map_err(|source| ProgramError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let module = parse_module(&self.cm, path, source)?;

        let mut scope = Scope::default();
        let mut ambient_modules = IndexMap::new();
        collect_items(&module.body, &mut scope, &mut ambient_modules);
        for name in ambient_modules.keys() {
            self.resolver
                .ambient
                .entry(name.clone())
                .or_insert_with(|| path.to_path_buf());
        }

        let mut specifiers = Vec::new();
        collect_specifiers(&scope, &mut specifiers);
        for ambient in ambient_modules.values() {
            collect_specifiers(ambient, &mut specifiers);
        }

        tracing::trace!(path = %path.display(), "parsed");
        self.files.insert(
            path.to_path_buf(),
            SourceFile {
                path: path.to_path_buf(),
                module,
                scope,
                ambient_modules,
                specifiers,
            },
        );
        Ok(())
    }

    // ── Symbol lookup ──────────────────────────────────────────────────

    pub(crate) fn scope(&self, id: &ScopeId) -> Option<&Scope> {
        let file = self.files.get(&id.module.file)?;
        let mut scope = match &id.module.ambient {
            None => &file.scope,
            Some(name) => file.ambient_modules.get(name)?,
        };
        for segment in &id.path {
            scope = scope.namespaces.get(segment)?;
        }
        Some(scope)
    }

    pub(crate) fn type_decl(&self, decl: &DeclRef) -> Option<&TypeDecl> {
        self.scope(&decl.scope)?.types.get(&decl.name)
    }

    pub(crate) fn value_decl(&self, decl: &DeclRef) -> Option<&ValueDecl> {
        self.scope(&decl.scope)?.values.get(&decl.name)
    }

    /// Resolve `name` as seen from `scope`, searching enclosing namespaces
    /// outwards and then the scope's imports.
    pub(crate) fn resolve_name(&self, scope: &ScopeId, name: &str, meaning: Meaning) -> Option<Binding> {
        let mut current = Some(scope.clone());
        while let Some(id) = current {
            if let Some(found) = self.lookup_in_scope(&id, name, meaning, 0) {
                return Some(found);
            }
            current = id.parent();
        }
        None
    }

    /// Resolve a dotted chain (`A.B.C`), the last segment with `meaning`.
    pub(crate) fn resolve_path(&self, scope: &ScopeId, segments: &[String], meaning: Meaning) -> Option<Binding> {
        let (last, init) = segments.split_last()?;
        if init.is_empty() {
            return self.resolve_name(scope, last, meaning);
        }

        let mut binding = self.resolve_name(scope, &init[0], Meaning::Namespace)?;
        for segment in &init[1..] {
            binding = self.resolve_member(&binding, segment, Meaning::Namespace)?;
        }
        self.resolve_member(&binding, last, meaning)
    }

    /// Resolve `name` as a member of a namespace binding.
    pub(crate) fn resolve_member(&self, binding: &Binding, name: &str, meaning: Meaning) -> Option<Binding> {
        let Binding::Namespace(id) = binding else {
            return None;
        };
        if id.path.is_empty() {
            self.resolve_export(&id.module, name, meaning, 0)
        } else {
            self.lookup_declared(id, name, meaning)
        }
    }

    /// Resolve the export `name` of `module`, following re-exports.
    pub(crate) fn resolve_export(
        &self,
        module: &ModuleRef,
        name: &str,
        meaning: Meaning,
        depth: usize,
    ) -> Option<Binding> {
        if depth > MAX_EXPORT_DEPTH {
            tracing::warn!(module = %module.file.display(), %name, "re-export chain too deep");
            return None;
        }

        let root = ScopeId::root(module.clone());
        let scope = self.scope(&root)?;

        if scope.exports_everything
            && let Some(found) = self.lookup_in_scope(&root, name, meaning, depth + 1)
        {
            return Some(found);
        }

        match scope.exports.get(name) {
            Some(ExportTarget::Local(local)) => {
                return self.lookup_in_scope(&root, local, meaning, depth + 1);
            }
            Some(ExportTarget::Reexport { specifier, name }) => {
                let target = self.resolve_module(specifier, &module.file)?;
                return self.resolve_export(&target, name, meaning, depth + 1);
            }
            Some(ExportTarget::ReexportNamespace { specifier }) => {
                let target = self.resolve_module(specifier, &module.file)?;
                return (meaning == Meaning::Namespace).then(|| Binding::Namespace(ScopeId::root(target)));
            }
            None => {}
        }

        scope.export_all.iter().find_map(|specifier| {
            let target = self.resolve_module(specifier, &module.file)?;
            self.resolve_export(&target, name, meaning, depth + 1)
        })
    }

    /// Look `name` up among the declarations and imports of exactly one scope.
    fn lookup_in_scope(&self, id: &ScopeId, name: &str, meaning: Meaning, depth: usize) -> Option<Binding> {
        if let Some(found) = self.lookup_declared(id, name, meaning) {
            return Some(found);
        }

        let import = self.scope(id)?.imports.get(name)?;
        let target = self.resolve_module(&import.specifier, &id.module.file)?;
        match &import.kind {
            ImportKind::Namespace => {
                (meaning == Meaning::Namespace).then(|| Binding::Namespace(ScopeId::root(target)))
            }
            ImportKind::Named(imported) => self.resolve_export(&target, imported, meaning, depth),
            ImportKind::Default => self.resolve_export(&target, "default", meaning, depth),
        }
    }

    fn lookup_declared(&self, id: &ScopeId, name: &str, meaning: Meaning) -> Option<Binding> {
        let scope = self.scope(id)?;
        let decl = || DeclRef {
            scope: id.clone(),
            name: name.to_string(),
        };
        match meaning {
            Meaning::Type if scope.types.contains_key(name) => Some(Binding::Type(decl())),
            Meaning::Value if scope.values.contains_key(name) => Some(Binding::Value(decl())),
            Meaning::Namespace if scope.namespaces.contains_key(name) => {
                Some(Binding::Namespace(id.child(name)))
            }
            _ => None,
        }
    }

    /// Every type declaration in the program, in load order, namespaces
    /// depth-first.
    pub(crate) fn type_declarations(&self) -> Vec<DeclRef> {
        fn walk(scope: &Scope, id: ScopeId, out: &mut Vec<DeclRef>) {
            for name in scope.types.keys() {
                out.push(DeclRef {
                    scope: id.clone(),
                    name: name.clone(),
                });
            }
            for (name, child) in &scope.namespaces {
                walk(child, id.child(name), out);
            }
        }

        let mut out = Vec::new();
        for file in self.files.values() {
            walk(&file.scope, ScopeId::root(ModuleRef::file(&file.path)), &mut out);
            for (name, scope) in &file.ambient_modules {
                let module = ModuleRef {
                    file: file.path.clone(),
                    ambient: Some(name.clone()),
                };
                walk(scope, ScopeId::root(module), &mut out);
            }
        }
        out
    }
}

/// Root scope of a file.
pub(crate) fn file_scope(path: &Path) -> ScopeId {
    ScopeId::root(ModuleRef::file(path))
}

fn parse_module(cm: &Lrc<SourceMap>, path: &Path, source: String) -> Result<Module, ProgramError> {
    let name = path.to_string_lossy();
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: name.ends_with(".tsx"),
        dts: name.ends_with(".d.ts"),
        decorators: true,
        ..Default::default()
    });
    let fm = cm.new_source_file(FileName::Real(path.to_path_buf()).into(), source);
    let mut parser = Parser::new(syntax, StringInput::from(&*fm), None);

    let module = parser.parse_module().map_err(|err| ProgramError::Parse {
        path: path.to_path_buf(),
        message: format!("{:?}", err.kind()),
    })?;

    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(ProgramError::Parse {
            path: path.to_path_buf(),
            message: format!("{:?}", err.kind()),
        });
    }
    Ok(module)
}

/// Parse a standalone type expression such as `Partial<A>`.
pub(crate) fn parse_type(text: &str) -> Option<Box<TsType>> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Anon.into(), format!("type __Type = {text};"));
    let mut parser = Parser::new(
        Syntax::Typescript(TsSyntax::default()),
        StringInput::from(&*fm),
        None,
    );
    let module = parser.parse_module().ok()?;
    if !parser.take_errors().is_empty() {
        return None;
    }
    match module.body.as_slice() {
        [ModuleItem::Stmt(Stmt::Decl(Decl::TsTypeAlias(alias)))] => Some(alias.type_ann.clone()),
        _ => None,
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/') || specifier == "." || specifier == ".."
}

fn is_typescript_path(path: &str) -> bool {
    path.ends_with(".ts") || path.ends_with(".tsx")
}

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `Some("sub/path")`).
fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let package_len = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(i, _)| i)
            .unwrap_or(specifier.len())
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };
    let (package, rest) = specifier.split_at(package_len);
    let subpath = rest.strip_prefix('/').filter(|s| !s.is_empty());
    (package, subpath)
}

fn collect_specifiers(scope: &Scope, out: &mut Vec<String>) {
    let mut push = |s: &String| {
        if !out.contains(s) {
            out.push(s.clone());
        }
    };
    for import in scope.imports.values() {
        push(&import.specifier);
    }
    for export in scope.exports.values() {
        match export {
            ExportTarget::Reexport { specifier, .. } | ExportTarget::ReexportNamespace { specifier } => {
                push(specifier)
            }
            ExportTarget::Local(_) => {}
        }
    }
    for specifier in scope.export_all.iter().chain(&scope.bare_imports) {
        push(specifier);
    }
    for child in scope.namespaces.values() {
        collect_specifiers(child, out);
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

fn collect_items(items: &[ModuleItem], scope: &mut Scope, ambient: &mut IndexMap<String, Scope>) {
    for item in items {
        match item {
            ModuleItem::Stmt(Stmt::Decl(decl)) => collect_decl(decl, false, scope, ambient),
            ModuleItem::Stmt(_) => {}
            ModuleItem::ModuleDecl(module_decl) => collect_module_decl(module_decl, scope, ambient),
        }
    }
}

fn collect_module_decl(decl: &ModuleDecl, scope: &mut Scope, ambient: &mut IndexMap<String, Scope>) {
    match decl {
        ModuleDecl::Import(import) => {
            let specifier = import.src.value.to_string();
            if import.specifiers.is_empty() {
                scope.bare_imports.push(specifier.clone());
            }
            for spec in &import.specifiers {
                let (local, kind) = match spec {
                    ImportSpecifier::Named(named) => {
                        let imported = named
                            .imported
                            .as_ref()
                            .map(export_name)
                            .unwrap_or_else(|| named.local.sym.to_string());
                        (named.local.sym.to_string(), ImportKind::Named(imported))
                    }
                    ImportSpecifier::Default(default) => {
                        (default.local.sym.to_string(), ImportKind::Default)
                    }
                    ImportSpecifier::Namespace(ns) => (ns.local.sym.to_string(), ImportKind::Namespace),
                };
                scope.imports.insert(
                    local,
                    ImportBinding {
                        specifier: specifier.clone(),
                        kind,
                    },
                );
            }
        }
        ModuleDecl::ExportDecl(export) => collect_decl(&export.decl, true, scope, ambient),
        ModuleDecl::ExportNamed(named) => {
            let source = named
                .src
                .as_ref()
                .map(|s| s.value.to_string());
            for spec in &named.specifiers {
                match (spec, &source) {
                    (ExportSpecifier::Named(n), None) => {
                        let orig = export_name(&n.orig);
                        let exported = n.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                        scope.exports.insert(exported, ExportTarget::Local(orig));
                    }
                    (ExportSpecifier::Named(n), Some(specifier)) => {
                        let orig = export_name(&n.orig);
                        let exported = n.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                        scope.exports.insert(
                            exported,
                            ExportTarget::Reexport {
                                specifier: specifier.clone(),
                                name: orig,
                            },
                        );
                    }
                    (ExportSpecifier::Namespace(ns), Some(specifier)) => {
                        scope.exports.insert(
                            export_name(&ns.name),
                            ExportTarget::ReexportNamespace {
                                specifier: specifier.clone(),
                            },
                        );
                    }
                    (ExportSpecifier::Default(default), Some(specifier)) => {
                        scope.exports.insert(
                            default.exported.sym.to_string(),
                            ExportTarget::Reexport {
                                specifier: specifier.clone(),
                                name: "default".to_string(),
                            },
                        );
                    }
                    _ => {}
                }
            }
        }
        ModuleDecl::ExportDefaultDecl(export) => match &export.decl {
            DefaultDecl::Fn(f) => {
                let name = f.ident.as_ref().map_or_else(|| "default".to_string(), |i| i.sym.to_string());
                scope.values.insert(name.clone(), ValueDecl::Function);
                scope.exports.insert("default".to_string(), ExportTarget::Local(name));
            }
            DefaultDecl::Class(c) => {
                let name = c.ident.as_ref().map_or_else(|| "default".to_string(), |i| i.sym.to_string());
                scope.types.insert(name.clone(), TypeDecl::Class(c.class.clone()));
                scope.values.insert(name.clone(), ValueDecl::Class);
                scope.exports.insert("default".to_string(), ExportTarget::Local(name));
            }
            DefaultDecl::TsInterfaceDecl(i) => {
                let name = i.id.sym.to_string();
                insert_interface(scope, &name, i);
                scope.exports.insert("default".to_string(), ExportTarget::Local(name));
            }
        },
        ModuleDecl::ExportDefaultExpr(export) => {
            if let Expr::Ident(ident) = &*export.expr {
                scope
                    .exports
                    .insert("default".to_string(), ExportTarget::Local(ident.sym.to_string()));
            }
        }
        ModuleDecl::ExportAll(all) => {
            scope
                .export_all
                .push(all.src.value.to_string());
        }
        _ => {}
    }
}

fn insert_interface(scope: &mut Scope, name: &str, decl: &TsInterfaceDecl) {
    match scope.types.get_mut(name) {
        Some(TypeDecl::Interface(decls)) => decls.push(decl.clone()),
        _ => {
            scope
                .types
                .insert(name.to_string(), TypeDecl::Interface(vec![decl.clone()]));
        }
    }
}

fn collect_decl(decl: &Decl, exported: bool, scope: &mut Scope, ambient: &mut IndexMap<String, Scope>) {
    let name = match decl {
        Decl::TsInterface(i) => {
            let name = i.id.sym.to_string();
            insert_interface(scope, &name, i);
            name
        }
        Decl::TsTypeAlias(a) => {
            let name = a.id.sym.to_string();
            scope.types.insert(name.clone(), TypeDecl::Alias(a.clone()));
            name
        }
        Decl::TsEnum(e) => {
            let name = e.id.sym.to_string();
            scope.types.insert(name.clone(), TypeDecl::Enum(e.clone()));
            name
        }
        Decl::Class(c) => {
            let name = c.ident.sym.to_string();
            scope.types.insert(name.clone(), TypeDecl::Class(c.class.clone()));
            scope.values.insert(name.clone(), ValueDecl::Class);
            name
        }
        Decl::Fn(f) => {
            let name = f.ident.sym.to_string();
            scope.values.insert(name.clone(), ValueDecl::Function);
            name
        }
        Decl::TsModule(m) => {
            match &m.id {
                TsModuleName::Str(s) => {
                    let module_name = s.value.to_string();
                    let block = ambient.entry(module_name).or_insert_with(|| Scope {
                        exports_everything: true,
                        ..Scope::default()
                    });
                    if let Some(body) = &m.body {
                        let mut nested = IndexMap::new();
                        collect_namespace_body(body, block, &mut nested);
                    }
                    return;
                }
                TsModuleName::Ident(_) if m.global => {
                    if let Some(body) = &m.body {
                        collect_namespace_body(body, scope, ambient);
                    }
                    return;
                }
                TsModuleName::Ident(ident) => {
                    let name = ident.sym.to_string();
                    let child = scope.namespaces.entry(name.clone()).or_default();
                    if let Some(body) = &m.body {
                        collect_namespace_body(body, child, ambient);
                    }
                    name
                }
            }
        }
        _ => return,
    };

    if exported {
        scope.exports.insert(name.clone(), ExportTarget::Local(name));
    }
}

fn collect_namespace_body(body: &TsNamespaceBody, scope: &mut Scope, ambient: &mut IndexMap<String, Scope>) {
    match body {
        TsNamespaceBody::TsModuleBlock(block) => collect_items(&block.body, scope, ambient),
        TsNamespaceBody::TsNamespaceDecl(decl) => {
            let child = scope.namespaces.entry(decl.id.sym.to_string()).or_default();
            collect_namespace_body(&decl.body, child, ambient);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    fn build(fs: MemoryFs, root: &str) -> Program {
        Program::builder(fs).root(root).build().unwrap()
    }

    #[test]
    fn test_follows_relative_imports() {
        let fs = MemoryFs::new()
            .with_file("/src/index.ts", "import { B } from './lib/b';")
            .with_file("/src/lib/b.ts", "import { C } from '../c'; export interface B { c: C }")
            .with_file("/src/c.d.ts", "export interface C {}");
        let program = build(fs, "/src/index.ts");
        let paths: Vec<_> = program.files().map(|f| f.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/src/index.ts"),
                PathBuf::from("/src/lib/b.ts"),
                PathBuf::from("/src/c.d.ts"),
            ]
        );
    }

    #[test]
    fn test_resolves_index_and_js_extension() {
        let fs = MemoryFs::new()
            .with_file("/index.ts", "import './dir'; import './x.js';")
            .with_file("/dir/index.ts", "")
            .with_file("/x.ts", "");
        let program = build(fs, "/index.ts");
        assert_eq!(
            program.resolve_module("./dir", "/index.ts"),
            Some(ModuleRef::file("/dir/index.ts"))
        );
        assert_eq!(
            program.resolve_module("./x.js", "/index.ts"),
            Some(ModuleRef::file("/x.ts"))
        );
    }

    #[test]
    fn test_resolves_node_modules_types_entry() {
        let fs = MemoryFs::new()
            .with_file("/app/src/index.ts", "import { fromType } from 'ts-transform-json-schema';")
            .with_marker_package("/app");
        let program = build(fs, "/app/src/index.ts");
        assert_eq!(
            program.resolve_module("ts-transform-json-schema", "/app/src/index.ts"),
            Some(ModuleRef::file(
                "/app/node_modules/ts-transform-json-schema/from-type.d.ts"
            ))
        );
        assert_eq!(
            program.package_name_of("/app/node_modules/ts-transform-json-schema/from-type.d.ts"),
            Some("ts-transform-json-schema".to_string())
        );
    }

    #[test]
    fn test_resolves_ambient_module() {
        let fs = MemoryFs::new()
            .with_file("/index.ts", "import { something } from 'b';")
            .with_file("/b.d.ts", "declare module 'b' { export function something(): any; }");
        let program = Program::builder(fs)
            .root("/b.d.ts")
            .root("/index.ts")
            .build()
            .unwrap();
        let module = program.resolve_module("b", "/index.ts").unwrap();
        assert_eq!(module.file, PathBuf::from("/b.d.ts"));
        assert_eq!(module.ambient.as_deref(), Some("b"));
        let binding = program.resolve_export(&module, "something", Meaning::Value, 0);
        assert!(matches!(binding, Some(Binding::Value(_))));
    }

    #[test]
    fn test_resolves_qualified_namespace_path() {
        let fs = MemoryFs::new().with_file(
            "/index.ts",
            "export namespace Outer.Inner { export interface Leaf { a: string } }",
        );
        let program = build(fs, "/index.ts");
        let segments: Vec<String> = ["Outer", "Inner", "Leaf"].iter().map(|s| s.to_string()).collect();
        let Some(Binding::Type(decl)) =
            program.resolve_path(&file_scope(Path::new("/index.ts")), &segments, Meaning::Type)
        else {
            panic!("Leaf should resolve");
        };
        assert_eq!(decl.qualified_name(), "Outer.Inner.Leaf");
    }

    #[test]
    fn test_follows_reexports() {
        let fs = MemoryFs::new()
            .with_file("/index.ts", "import { Renamed } from './barrel';")
            .with_file("/barrel.ts", "export { A as Renamed } from './a'; export * from './b';")
            .with_file("/a.ts", "export interface A {}")
            .with_file("/b.ts", "export interface B {}");
        let program = build(fs, "/index.ts");
        let scope = file_scope(Path::new("/index.ts"));
        let Some(Binding::Type(decl)) = program.resolve_name(&scope, "Renamed", Meaning::Type) else {
            panic!("Renamed should resolve");
        };
        assert_eq!(decl.name, "A");
        assert_eq!(decl.scope.module.file, PathBuf::from("/a.ts"));

        let barrel = ModuleRef::file("/barrel.ts");
        assert!(program.resolve_export(&barrel, "B", Meaning::Type, 0).is_some());
    }

    #[test]
    fn test_merges_interface_declarations() {
        let fs = MemoryFs::new().with_file(
            "/index.ts",
            "interface A { a: string } interface A { b: number }",
        );
        let program = build(fs, "/index.ts");
        let file = program.source_file("/index.ts").unwrap();
        assert!(matches!(file.scope.types.get("A"), Some(TypeDecl::Interface(d)) if d.len() == 2));
    }

    #[test]
    fn test_parse_error_names_file() {
        let fs = MemoryFs::new().with_file("/broken.ts", "export interface {");
        let err = Program::builder(fs).root("/broken.ts").build().unwrap_err();
        assert!(matches!(err, ProgramError::Parse { ref path, .. } if path == Path::new("/broken.ts")));
    }

    #[test]
    fn test_split_package_specifier() {
        assert_eq!(split_package_specifier("pkg"), ("pkg", None));
        assert_eq!(split_package_specifier("pkg/sub/x"), ("pkg", Some("sub/x")));
        assert_eq!(split_package_specifier("@s/pkg"), ("@s/pkg", None));
        assert_eq!(split_package_specifier("@s/pkg/x"), ("@s/pkg", Some("x")));
    }

    #[test]
    fn test_program_ids_are_unique() {
        let a = build(MemoryFs::new().with_file("/a.ts", ""), "/a.ts");
        let b = build(MemoryFs::new().with_file("/a.ts", ""), "/a.ts");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_parse_type() {
        let ty = parse_type("Partial<A>").unwrap();
        assert!(matches!(*ty, TsType::TsTypeRef(_)));
        assert!(parse_type("A; type B = C").is_none());
        assert!(parse_type("<<").is_none());
    }
}
