//! JSON schema construction from lowered declarations.
//!
//! One [`SchemaBuilder`] produces one root schema. Named types are collected
//! into `definitions` and referenced through `$ref`; generic instantiations
//! and the object utility types are keyed by their rendered text, e.g.
//! `Box<string>` or `Partial<B>`.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};

use crate::error::GenerateError;
use crate::program::{Binding, Meaning, ModuleRef, Program, ScopeId, parse_type};

use super::GeneratorArgs;
use super::extractor::{DeclKind, Declaration, SchemaIndex, lower_type};
use super::registry::TypeRegistry;
use super::types::{ObjectDef, TypeDef};

/// Value of the `$schema` key of every generated root.
pub const SCHEMA_VERSION: &str = "http://json-schema.org/draft-07/schema#";

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// A type parameter bound at an instantiation.
#[derive(Debug, Clone)]
struct Bound {
    schema: Value,
    /// The argument as written, used in definition keys.
    text: String,
}

type Env = HashMap<String, Bound>;

/// Where a type is written: the scope its names resolve in, plus the type
/// parameters in effect.
#[derive(Clone, Copy)]
struct Ctx<'c> {
    scope: &'c ScopeId,
    env: &'c Env,
}

impl Ctx<'_> {
    fn render(&self, ty: &TypeDef) -> String {
        ty.render_with(&|name| self.env.get(name).map(|b| b.text.clone()))
    }
}

/// Properties, required names and additional properties of an object
/// schema being assembled from several parts.
#[derive(Default)]
struct ObjectParts {
    properties: Map<String, Value>,
    required: Vec<String>,
    additional: Option<Value>,
}

impl ObjectParts {
    fn absorb(&mut self, mut schema: Map<String, Value>) {
        if let Some(Value::Object(properties)) = schema.remove("properties") {
            self.properties.extend(properties);
        }
        if let Some(Value::Array(required)) = schema.remove("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !self.required.iter().any(|r| r == name) {
                    self.required.push(name.to_string());
                }
            }
        }
        if let Some(additional) = schema.remove("additionalProperties") {
            self.additional = Some(additional);
        }
    }
}

pub(crate) struct SchemaBuilder<'a> {
    program: &'a Program,
    index: &'a SchemaIndex,
    registry: &'a TypeRegistry,
    args: &'a GeneratorArgs,
    definitions: Map<String, Value>,
    in_progress: HashSet<String>,
    recursive: HashSet<String>,
    /// Qualified name of the declaration being built, for error messages.
    current: String,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(
        program: &'a Program,
        index: &'a SchemaIndex,
        registry: &'a TypeRegistry,
        args: &'a GeneratorArgs,
    ) -> Self {
        Self {
            program,
            index,
            registry,
            args,
            definitions: Map::new(),
            in_progress: HashSet::new(),
            recursive: HashSet::new(),
            current: String::new(),
        }
    }

    /// Build the root schema for `type_name`.
    ///
    /// With a `module`, the name is looked up among that module's
    /// declarations first; a type expression such as `Partial<A>` is then
    /// built as if written there. Without one, the first declaration of the
    /// name in load order is used.
    pub fn generate(mut self, module: Option<&ModuleRef>, type_name: &str) -> Result<Value, GenerateError> {
        let index = self.index;
        let declaration = match module {
            Some(module) => index.find_in(module, type_name),
            None => index.find(type_name),
        };
        let root = match (declaration, module) {
            (Some(declaration), _) => self.declaration_root(declaration)?,
            (None, Some(module)) => {
                let ty = parse_type(type_name)
                    .ok_or_else(|| GenerateError::UnknownSymbol(type_name.to_string()))?;
                let scope = ScopeId {
                    module: module.clone(),
                    path: Vec::new(),
                };
                self.type_root(&lower_type(&ty), &scope)?
            }
            (None, None) => return Err(GenerateError::UnknownSymbol(type_name.to_string())),
        };

        let mut output = match root {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("allOf".to_string(), json!([other]));
                map
            }
        };
        if !self.definitions.is_empty() {
            output.insert(
                "definitions".to_string(),
                Value::Object(std::mem::take(&mut self.definitions)),
            );
        }
        output.insert("$schema".to_string(), json!(SCHEMA_VERSION));
        Ok(Value::Object(output))
    }

    fn declaration_root(&mut self, declaration: &'a Declaration) -> Result<Value, GenerateError> {
        let empty = Env::new();
        let ctx = Ctx {
            scope: &declaration.id.scope,
            env: &empty,
        };
        let env = self.bind(declaration, &[], ctx)?;
        let key = instantiation_key(declaration, &env);

        if self.args.top_ref {
            return self.named(key, |this| this.build_declaration(declaration, &env));
        }
        let body = self.with_progress(&key, |this| this.build_declaration(declaration, &env))?;
        if self.recursive.contains(&key) {
            self.definitions.insert(key, body.clone());
        }
        Ok(body)
    }

    /// Root schema of a type expression. Unless `topRef` is set, a root that
    /// is only a reference to its own definition is inlined.
    fn type_root(&mut self, ty: &TypeDef, scope: &ScopeId) -> Result<Value, GenerateError> {
        let empty = Env::new();
        let ctx = Ctx { scope, env: &empty };
        self.current = ctx.render(ty);
        let schema = self.build(ty, ctx)?;

        if !self.args.top_ref
            && let Some(key) = schema
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix(DEFINITIONS_PREFIX))
            && !self.recursive.contains(key)
            && let Some(body) = self.definitions.shift_remove(key)
        {
            return Ok(body);
        }
        Ok(schema)
    }

    // ── Named types ────────────────────────────────────────────────────

    /// Describe a named type: a `$ref` into `definitions` when `ref` is on,
    /// the inlined body otherwise. Recursion always goes through `$ref`.
    fn named(
        &mut self,
        key: String,
        build: impl FnOnce(&mut Self) -> Result<Value, GenerateError>,
    ) -> Result<Value, GenerateError> {
        if self.in_progress.contains(&key) {
            self.recursive.insert(key.clone());
            return Ok(reference(&key));
        }

        if self.args.use_ref {
            if !self.definitions.contains_key(&key) {
                // Reserve the slot so definitions appear in first-use order.
                self.definitions.insert(key.clone(), Value::Null);
                let body = self.with_progress(&key, build)?;
                self.definitions.insert(key.clone(), body);
            }
            return Ok(reference(&key));
        }

        let body = self.with_progress(&key, build)?;
        if self.recursive.contains(&key) {
            self.definitions.insert(key, body.clone());
        }
        Ok(body)
    }

    fn with_progress(
        &mut self,
        key: &str,
        build: impl FnOnce(&mut Self) -> Result<Value, GenerateError>,
    ) -> Result<Value, GenerateError> {
        self.in_progress.insert(key.to_string());
        let result = build(self);
        self.in_progress.remove(key);
        result
    }

    fn build_declaration(&mut self, declaration: &'a Declaration, env: &Env) -> Result<Value, GenerateError> {
        let previous = std::mem::replace(&mut self.current, declaration.id.qualified_name());
        let ctx = Ctx {
            scope: &declaration.id.scope,
            env,
        };
        let result = match &declaration.kind {
            DeclKind::Object { extends, body } => {
                self.object_schema(body, extends, ctx).map(Value::Object)
            }
            DeclKind::Alias(ty) => self.build(ty, ctx),
            DeclKind::Enum(values) => Ok(enum_schema(values)),
        };
        self.current = previous;

        let mut schema = result?;
        if self.args.titles
            && let Value::Object(map) = &mut schema
            && !map.contains_key("$ref")
        {
            map.insert("title".to_string(), json!(declaration.id.name));
        }
        Ok(schema)
    }

    /// Bind the type parameters of `declaration` to `args` (written in
    /// `ctx`), falling back to declared defaults and then to `any`.
    fn bind(&mut self, declaration: &Declaration, args: &[TypeDef], ctx: Ctx<'_>) -> Result<Env, GenerateError> {
        let mut env = Env::new();
        for (i, param) in declaration.type_params.iter().enumerate() {
            let bound = match (args.get(i), &param.default) {
                (Some(arg), _) => Bound {
                    schema: self.build(arg, ctx)?,
                    text: ctx.render(arg),
                },
                // Defaults live in the declaration's scope and may use earlier parameters.
                (None, Some(default)) => {
                    let own = Ctx {
                        scope: &declaration.id.scope,
                        env: &env,
                    };
                    Bound {
                        schema: self.build(default, own)?,
                        text: own.render(default),
                    }
                }
                (None, None) => Bound {
                    schema: json!({}),
                    text: "any".to_string(),
                },
            };
            env.insert(param.name.clone(), bound);
        }
        Ok(env)
    }

    fn lookup(&self, name: &[String], ctx: Ctx<'_>) -> Option<&'a Declaration> {
        let index = self.index;
        match self.program.resolve_path(ctx.scope, name, Meaning::Type)? {
            Binding::Type(decl) => index.get(&decl),
            _ => None,
        }
    }

    // ── Types ──────────────────────────────────────────────────────────

    fn build(&mut self, ty: &TypeDef, ctx: Ctx<'_>) -> Result<Value, GenerateError> {
        Ok(match ty {
            TypeDef::String => json!({ "type": "string" }),
            TypeDef::Number => json!({ "type": self.args.default_number_type.as_str() }),
            TypeDef::Boolean => json!({ "type": "boolean" }),
            TypeDef::BigInt => json!({ "type": "integer" }),
            TypeDef::Null => json!({ "type": "null" }),
            TypeDef::Object => json!({ "type": "object" }),
            TypeDef::Undefined | TypeDef::Void | TypeDef::Any | TypeDef::Unknown => json!({}),
            TypeDef::Never => json!({ "not": {} }),
            TypeDef::Literal(literal) => json!({
                "type": literal.json_type(),
                "enum": [literal.to_value()],
            }),
            TypeDef::Array(items) => json!({
                "type": "array",
                "items": self.build(items, ctx)?,
            }),
            TypeDef::Tuple(elements) => {
                let items = elements
                    .iter()
                    .map(|e| self.build(&e.ty, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let min_items = elements.iter().filter(|e| !e.optional).count();
                json!({
                    "type": "array",
                    "items": items,
                    "minItems": min_items,
                    "maxItems": elements.len(),
                })
            }
            TypeDef::Union(members) => return self.union(members, ctx),
            TypeDef::Intersection(members) => {
                let all_of = members
                    .iter()
                    .map(|m| self.build(m, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "allOf": all_of })
            }
            TypeDef::TypeLit(object) => Value::Object(self.object_schema(object, &[], ctx)?),
            TypeDef::KeyOf(target) => {
                let object = self.resolve_object(target, ctx)?;
                let keys: Vec<Value> = match object.get("properties") {
                    Some(Value::Object(properties)) => properties.keys().map(|k| json!(k)).collect(),
                    _ => Vec::new(),
                };
                json!({ "type": "string", "enum": keys })
            }
            TypeDef::Reference { name, args } => return self.build_reference(name, args, ctx),
            TypeDef::Unsupported(detail) => return self.unsupported(detail.clone()),
        })
    }

    fn object_schema(
        &mut self,
        body: &ObjectDef,
        extends: &[TypeDef],
        ctx: Ctx<'_>,
    ) -> Result<Map<String, Value>, GenerateError> {
        let mut parts = ObjectParts::default();
        for base in extends {
            let base = self.resolve_object(base, ctx)?;
            parts.absorb(base);
        }
        for property in &body.properties {
            let schema = self.build(&property.ty, ctx)?;
            parts.properties.insert(property.name.clone(), schema);
            parts.required.retain(|r| r != &property.name);
            if !property.optional {
                parts.required.push(property.name.clone());
            }
        }
        if let Some(index) = &body.index {
            parts.additional = Some(self.build(index, ctx)?);
        }
        Ok(self.finish_object(parts))
    }

    fn finish_object(&self, parts: ObjectParts) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("type".to_string(), json!("object"));
        map.insert("properties".to_string(), Value::Object(parts.properties));
        if self.args.required && !parts.required.is_empty() {
            map.insert("required".to_string(), json!(parts.required));
        }
        match parts.additional {
            Some(additional) => {
                map.insert("additionalProperties".to_string(), additional);
            }
            None if self.args.no_extra_props => {
                map.insert("additionalProperties".to_string(), json!(false));
            }
            None => {}
        }
        map
    }

    fn union(&mut self, members: &[TypeDef], ctx: Ctx<'_>) -> Result<Value, GenerateError> {
        let mut flat = Vec::new();
        flatten_union(members, &mut flat);
        flat.retain(|m| match m {
            TypeDef::Undefined | TypeDef::Void => false,
            TypeDef::Null => self.args.strict_null_checks,
            _ => true,
        });
        let mut unique: Vec<&TypeDef> = Vec::with_capacity(flat.len());
        for member in flat {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }

        match unique.as_slice() {
            [] => return Ok(json!({})),
            [single] => return self.build(single, ctx),
            _ => {}
        }

        // Literal unions collapse into one enum.
        if unique
            .iter()
            .all(|m| matches!(m, TypeDef::Literal(_) | TypeDef::Null))
        {
            let mut types = Vec::new();
            let mut values = Vec::new();
            for member in &unique {
                let (json_type, value) = match member {
                    TypeDef::Literal(literal) => (literal.json_type(), literal.to_value()),
                    _ => ("null", Value::Null),
                };
                if !types.contains(&json_type) {
                    types.push(json_type);
                }
                values.push(value);
            }
            return Ok(json!({ "type": one_or_many(types), "enum": values }));
        }

        // Bare primitives collapse into a type list.
        let primitive_types: Option<Vec<&str>> = unique
            .iter()
            .map(|m| match m {
                TypeDef::Number => Some(self.args.default_number_type.as_str()),
                other => other.primitive_json_type(),
            })
            .collect();
        if let Some(types) = primitive_types {
            let mut deduped = Vec::new();
            for t in types {
                if !deduped.contains(&t) {
                    deduped.push(t);
                }
            }
            return Ok(json!({ "type": one_or_many(deduped) }));
        }

        let any_of = unique
            .iter()
            .map(|m| self.build(m, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({ "anyOf": any_of }))
    }

    // ── References ─────────────────────────────────────────────────────

    fn build_reference(&mut self, name: &[String], args: &[TypeDef], ctx: Ctx<'_>) -> Result<Value, GenerateError> {
        if let [single] = name
            && args.is_empty()
            && let Some(bound) = ctx.env.get(single)
        {
            return Ok(bound.schema.clone());
        }

        if let Some(declaration) = self.lookup(name, ctx) {
            let env = self.bind(declaration, args, ctx)?;
            let key = instantiation_key(declaration, &env);
            return self.named(key, |this| this.build_declaration(declaration, &env));
        }

        if let [single] = name {
            if let Some(schema) = self.builtin(single, args, ctx)? {
                return Ok(schema);
            }
            if let Some(schema) = self.registry.get(single) {
                return Ok(schema.clone());
            }
        }

        let name = name.join(".");
        if self.args.ignore_errors {
            tracing::debug!(%name, from = %self.current, "unresolved type replaced by empty schema");
            return Ok(json!({}));
        }
        Err(GenerateError::UnresolvedType {
            name,
            from: self.current.clone(),
        })
    }

    /// Standard library generics the program never declares.
    fn builtin(&mut self, name: &str, args: &[TypeDef], ctx: Ctx<'_>) -> Result<Option<Value>, GenerateError> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(TypeDef::Any);
        let schema = match name {
            "Array" | "ReadonlyArray" => json!({
                "type": "array",
                "items": self.build(&arg(0), ctx)?,
            }),
            "Readonly" => self.build(&arg(0), ctx)?,
            "Record" => self.record(&arg(0), &arg(1), ctx)?,
            "Partial" | "Required" | "Pick" | "Omit" => {
                let key = ctx.render(&TypeDef::Reference {
                    name: vec![name.to_string()],
                    args: args.to_vec(),
                });
                self.named(key, |this| this.utility(name, args, ctx).map(Value::Object))?
            }
            _ => return Ok(None),
        };
        Ok(Some(schema))
    }

    fn utility(&mut self, name: &str, args: &[TypeDef], ctx: Ctx<'_>) -> Result<Map<String, Value>, GenerateError> {
        let target = args.first().cloned().unwrap_or(TypeDef::Any);
        let mut object = self.resolve_object(&target, ctx)?;
        match name {
            "Partial" => {
                object.remove("required");
            }
            "Required" => {
                let names: Vec<Value> = match object.get("properties") {
                    Some(Value::Object(properties)) => properties.keys().map(|k| json!(k)).collect(),
                    _ => Vec::new(),
                };
                object.remove("required");
                if self.args.required && !names.is_empty() {
                    object.insert("required".to_string(), Value::Array(names));
                }
            }
            _ => {
                let keys = self.literal_keys(args.get(1), ctx)?;
                let pick = name == "Pick";
                let keep = |key: &str| keys.contains(key) == pick;
                if let Some(Value::Object(properties)) = object.get_mut("properties") {
                    properties.retain(|key, _| keep(key.as_str()));
                }
                let no_required = match object.get_mut("required") {
                    Some(Value::Array(required)) => {
                        required.retain(|v| v.as_str().is_some_and(keep));
                        required.is_empty()
                    }
                    _ => false,
                };
                if no_required {
                    object.remove("required");
                }
            }
        }
        Ok(object)
    }

    fn record(&mut self, key: &TypeDef, value: &TypeDef, ctx: Ctx<'_>) -> Result<Value, GenerateError> {
        let value = self.build(value, ctx)?;
        let key_schema = self.build(key, ctx)?;
        match self.deref(key_schema).get("enum") {
            Some(Value::Array(keys)) => {
                let mut parts = ObjectParts::default();
                for key in keys.iter().map(key_string) {
                    parts.properties.insert(key.clone(), value.clone());
                    parts.required.push(key);
                }
                Ok(Value::Object(self.finish_object(parts)))
            }
            _ => Ok(json!({ "type": "object", "additionalProperties": value })),
        }
    }

    fn literal_keys(&mut self, ty: Option<&TypeDef>, ctx: Ctx<'_>) -> Result<HashSet<String>, GenerateError> {
        let Some(ty) = ty else {
            return Ok(HashSet::new());
        };
        let schema = self.build(ty, ctx)?;
        match self.deref(schema).get("enum") {
            Some(Value::Array(keys)) => Ok(keys.iter().map(key_string).collect()),
            _ => Err(GenerateError::Unsupported {
                from: self.current.clone(),
                detail: format!("expected literal keys, found `{}`", ctx.render(ty)),
            }),
        }
    }

    /// The object schema a type describes, with references and `allOf`
    /// parts resolved. Used for `extends`, utility types and `keyof`.
    fn resolve_object(&mut self, ty: &TypeDef, ctx: Ctx<'_>) -> Result<Map<String, Value>, GenerateError> {
        let schema = match ty {
            // A declared type is built in place so it does not need a definition of its own.
            TypeDef::Reference { name, args }
                if !(name.len() == 1 && args.is_empty() && ctx.env.contains_key(&name[0])) =>
            {
                match self.lookup(name, ctx) {
                    Some(declaration) => {
                        let env = self.bind(declaration, args, ctx)?;
                        self.build_declaration(declaration, &env)?
                    }
                    None => self.build(ty, ctx)?,
                }
            }
            other => self.build(other, ctx)?,
        };
        self.as_object(schema, ty, ctx)
    }

    fn as_object(&self, schema: Value, ty: &TypeDef, ctx: Ctx<'_>) -> Result<Map<String, Value>, GenerateError> {
        match self.deref(schema) {
            Value::Object(mut map) if map.contains_key("allOf") => {
                let mut parts = ObjectParts::default();
                if let Some(Value::Array(members)) = map.remove("allOf") {
                    for member in members {
                        parts.absorb(self.as_object(member, ty, ctx)?);
                    }
                }
                Ok(self.finish_object(parts))
            }
            Value::Object(map) if map.get("type") == Some(&json!("object")) => Ok(map),
            _ => Err(GenerateError::Unsupported {
                from: self.current.clone(),
                detail: format!("`{}` is not an object type", ctx.render(ty)),
            }),
        }
    }

    /// Follow `$ref`s into already built definitions.
    fn deref(&self, mut schema: Value) -> Value {
        while let Some(target) = schema
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|r| r.strip_prefix(DEFINITIONS_PREFIX))
            .and_then(|key| self.definitions.get(key))
            .filter(|body| !body.is_null())
        {
            schema = target.clone();
        }
        schema
    }

    fn unsupported(&self, detail: String) -> Result<Value, GenerateError> {
        if self.args.ignore_errors {
            return Ok(json!({}));
        }
        Err(GenerateError::Unsupported {
            from: self.current.clone(),
            detail,
        })
    }
}

fn instantiation_key(declaration: &Declaration, env: &Env) -> String {
    let base = declaration.id.qualified_name();
    if declaration.type_params.is_empty() {
        return base;
    }
    let args: Vec<&str> = declaration
        .type_params
        .iter()
        .map(|p| env.get(&p.name).map_or("any", |b| b.text.as_str()))
        .collect();
    format!("{base}<{}>", args.join(", "))
}

fn reference(key: &str) -> Value {
    json!({ "$ref": format!("{DEFINITIONS_PREFIX}{key}") })
}

fn enum_schema(values: &[Value]) -> Value {
    let mut types = Vec::new();
    for value in values {
        let json_type = if value.is_string() { "string" } else { "number" };
        if !types.contains(&json_type) {
            types.push(json_type);
        }
    }
    json!({ "type": one_or_many(types), "enum": values })
}

fn one_or_many(types: Vec<&str>) -> Value {
    match types.as_slice() {
        [single] => json!(single),
        _ => json!(types),
    }
}

fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten_union<'t>(members: &'t [TypeDef], out: &mut Vec<&'t TypeDef>) {
    for member in members {
        match member {
            TypeDef::Union(inner) => flatten_union(inner, out),
            other => out.push(other),
        }
    }
}
