//! Schema generation.
//!
//! The transform only depends on the [`SchemaGenerator`] trait: a pure
//! function from a program, a type name and an open options map to a JSON
//! value. [`TypeScriptGenerator`] is the built-in implementation and emits
//! JSON Schema draft-07 documents.
//!
//! # Example
//!
//! ```
//! use serde_json::{Map, json};
//! use ts_json_schema_transform::{MemoryFs, Program, SchemaGenerator, TypeScriptGenerator};
//!
//! let fs = MemoryFs::new().with_file("/index.ts", "export interface A { a: string }");
//! let program = Program::builder(fs).root("/index.ts").build().unwrap();
//!
//! let schema = TypeScriptGenerator::new()
//!     .generate(&program, "A", &Map::new())
//!     .unwrap();
//! assert_eq!(
//!     schema,
//!     Some(json!({
//!         "type": "object",
//!         "properties": { "a": { "type": "string" } },
//!         "$schema": "http://json-schema.org/draft-07/schema#"
//!     }))
//! );
//! ```

mod extractor;
mod registry;
mod schema;
mod types;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::GenerateError;
use crate::program::{ModuleRef, Program, ProgramId};

use extractor::SchemaIndex;
use schema::SchemaBuilder;

pub use registry::TypeRegistry;
pub use schema::SCHEMA_VERSION;
pub use types::{Literal, ObjectDef, Property, TupleElement, TypeDef};

/// Produces a schema for a named type of a program.
///
/// Implementations must be deterministic for a given program and type name.
/// `Ok(None)` means the generator has nothing to offer for the type; the
/// transform treats that as an error at the call site.
pub trait SchemaGenerator {
    fn generate(
        &self,
        program: &Program,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError>;

    /// Like [`generate`](Self::generate), for `type_name` as declared in
    /// (or, for a written instantiation like `Partial<A>`, as written in)
    /// `module`. Several modules may declare the same name.
    fn generate_in(
        &self,
        program: &Program,
        _module: &ModuleRef,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError> {
        self.generate(program, type_name, options)
    }
}

impl<G: SchemaGenerator + ?Sized> SchemaGenerator for &G {
    fn generate(
        &self,
        program: &Program,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError> {
        (**self).generate(program, type_name, options)
    }

    fn generate_in(
        &self,
        program: &Program,
        module: &ModuleRef,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError> {
        (**self).generate_in(program, module, type_name, options)
    }
}

/// JSON type used for `number`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultNumberType {
    #[default]
    Number,
    Integer,
}

impl DefaultNumberType {
    pub fn as_str(self) -> &'static str {
        match self {
            DefaultNumberType::Number => "number",
            DefaultNumberType::Integer => "integer",
        }
    }
}

/// Options understood by [`TypeScriptGenerator`]. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorArgs {
    /// Emit `required` for non-optional properties.
    pub required: bool,
    /// Emit `additionalProperties: false` for objects without an index signature.
    pub no_extra_props: bool,
    /// Keep `null` members of unions.
    pub strict_null_checks: bool,
    /// Describe unresolvable and unsupported types as `{}` instead of failing.
    pub ignore_errors: bool,
    /// Put named types into `definitions` and refer to them with `$ref`.
    #[serde(rename = "ref")]
    pub use_ref: bool,
    /// Make the root itself a `$ref` into `definitions`.
    pub top_ref: bool,
    /// Add a `title` with the declaration name to named types.
    pub titles: bool,
    pub default_number_type: DefaultNumberType,
}

impl Default for GeneratorArgs {
    fn default() -> Self {
        Self {
            required: false,
            no_extra_props: false,
            strict_null_checks: false,
            ignore_errors: false,
            use_ref: true,
            top_ref: false,
            titles: false,
            default_number_type: DefaultNumberType::Number,
        }
    }
}

impl GeneratorArgs {
    pub fn from_options(options: &Map<String, Value>) -> Result<Self, GenerateError> {
        Ok(serde_json::from_value(Value::Object(options.clone()))?)
    }
}

/// Lowered declarations per program, built on first use.
///
/// The cache belongs to one generator instance; dropping the generator
/// drops the cache.
#[derive(Debug, Default)]
pub struct GeneratorCache {
    indexes: RefCell<HashMap<ProgramId, Rc<SchemaIndex>>>,
}

impl GeneratorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, program: &Program) -> Rc<SchemaIndex> {
        self.indexes
            .borrow_mut()
            .entry(program.id())
            .or_insert_with(|| Rc::new(SchemaIndex::build(program)))
            .clone()
    }

    /// Number of programs with a cached index.
    pub fn len(&self) -> usize {
        self.indexes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.indexes.borrow_mut().clear();
    }
}

/// Built-in generator for TypeScript declarations.
#[derive(Debug)]
pub struct TypeScriptGenerator {
    registry: TypeRegistry,
    cache: GeneratorCache,
}

impl Default for TypeScriptGenerator {
    fn default() -> Self {
        Self {
            registry: TypeRegistry::with_builtins(),
            cache: GeneratorCache::new(),
        }
    }
}

impl TypeScriptGenerator {
    /// Create a generator with the built-in global type mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a global type name to a fixed schema.
    pub fn register_type(&mut self, name: impl Into<String>, schema: Value) -> &mut Self {
        self.registry.register(name, schema);
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &GeneratorCache {
        &self.cache
    }
}

impl TypeScriptGenerator {
    fn generate_at(
        &self,
        program: &Program,
        module: Option<&ModuleRef>,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError> {
        let args = GeneratorArgs::from_options(options)?;
        let index = self.cache.index(program);
        let schema = SchemaBuilder::new(program, &index, &self.registry, &args).generate(module, type_name)?;
        tracing::trace!(%type_name, "schema generated");
        Ok(Some(schema))
    }
}

impl SchemaGenerator for TypeScriptGenerator {
    fn generate(
        &self,
        program: &Program,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError> {
        self.generate_at(program, None, type_name, options)
    }

    fn generate_in(
        &self,
        program: &Program,
        module: &ModuleRef,
        type_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Option<Value>, GenerateError> {
        self.generate_at(program, Some(module), type_name, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use serde_json::json;

    fn program(source: &str) -> Program {
        let fs = MemoryFs::new().with_file("/index.ts", source);
        Program::builder(fs).root("/index.ts").build().unwrap()
    }

    fn generate_with(source: &str, type_name: &str, options: Value) -> Result<Value, GenerateError> {
        let Value::Object(options) = options else {
            panic!("options must be an object");
        };
        let program = program(source);
        TypeScriptGenerator::new()
            .generate(&program, type_name, &options)
            .map(|schema| schema.unwrap())
    }

    fn generate(source: &str, type_name: &str, options: Value) -> Value {
        generate_with(source, type_name, options).unwrap()
    }

    #[test]
    fn test_basic_interface() {
        let schema = generate("interface A { a: string }", "A", json!({}));
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": { "a": { "type": "string" } },
                "$schema": SCHEMA_VERSION
            })
        );
    }

    #[test]
    fn test_required_lists_only_mandatory_properties() {
        let schema = generate(
            "interface A { ab: string; cd?: string }",
            "A",
            json!({ "required": true }),
        );
        assert_eq!(schema["required"], json!(["ab"]));
    }

    #[test]
    fn test_null_property() {
        let schema = generate("interface A { a: null }", "A", json!({}));
        assert_eq!(schema["properties"]["a"], json!({ "type": "null" }));
    }

    #[test]
    fn test_union_of_interfaces_in_declaration_order() {
        let schema = generate(
            "interface A { a: string } interface B { b: number } type U = A | B;",
            "U",
            json!({}),
        );
        assert_eq!(
            schema["anyOf"],
            json!([{ "$ref": "#/definitions/A" }, { "$ref": "#/definitions/B" }])
        );
        let definitions = schema["definitions"].as_object().unwrap();
        assert_eq!(definitions.keys().collect::<Vec<_>>(), ["A", "B"]);
    }

    #[test]
    fn test_partial_definition() {
        let schema = generate(
            r#"
            export interface A { a: string; b?: Partial<B>; }
            export interface B { b: string; }
            "#,
            "A",
            json!({ "required": true }),
        );
        assert_eq!(schema["properties"]["b"], json!({ "$ref": "#/definitions/Partial<B>" }));
        assert_eq!(
            schema["definitions"]["Partial<B>"],
            json!({ "type": "object", "properties": { "b": { "type": "string" } } })
        );
        assert_eq!(schema["required"], json!(["a"]));
    }

    #[test]
    fn test_output_key_order() {
        let schema = generate(
            "interface A { b: B } interface B { x: string }",
            "A",
            json!({}),
        );
        let keys: Vec<&String> = schema.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["type", "properties", "definitions", "$schema"]);
    }

    #[test]
    fn test_nullable_unions() {
        let source = "interface A { a: string | null; b?: number | undefined }";
        let loose = generate(source, "A", json!({}));
        assert_eq!(loose["properties"]["a"], json!({ "type": "string" }));
        assert_eq!(loose["properties"]["b"], json!({ "type": "number" }));

        let strict = generate(source, "A", json!({ "strictNullChecks": true }));
        assert_eq!(strict["properties"]["a"], json!({ "type": ["string", "null"] }));
    }

    #[test]
    fn test_literal_unions_and_enums() {
        let schema = generate(
            r#"
            enum Color { Red, Green = "green" }
            interface A { kind: "a" | "b"; one: 1; color: Color; flag: true | false }
            "#,
            "A",
            json!({ "ref": false }),
        );
        let properties = &schema["properties"];
        assert_eq!(properties["kind"], json!({ "type": "string", "enum": ["a", "b"] }));
        assert_eq!(properties["one"], json!({ "type": "number", "enum": [1] }));
        assert_eq!(
            properties["color"],
            json!({ "type": ["number", "string"], "enum": [0, "green"] })
        );
        assert_eq!(properties["flag"], json!({ "type": "boolean", "enum": [true, false] }));
        assert!(schema.get("definitions").is_none());
    }

    #[test]
    fn test_arrays_tuples_and_records() {
        let schema = generate(
            r#"
            interface A {
                list: string[];
                generic: Array<number>;
                pair: [string, number?];
                map: Record<string, boolean>;
                fixed: Record<"x" | "y", number>;
                when: Date;
            }
            "#,
            "A",
            json!({ "defaultNumberType": "integer" }),
        );
        let p = &schema["properties"];
        assert_eq!(p["list"], json!({ "type": "array", "items": { "type": "string" } }));
        assert_eq!(p["generic"], json!({ "type": "array", "items": { "type": "integer" } }));
        assert_eq!(
            p["pair"],
            json!({
                "type": "array",
                "items": [{ "type": "string" }, { "type": "integer" }],
                "minItems": 1,
                "maxItems": 2
            })
        );
        assert_eq!(
            p["map"],
            json!({ "type": "object", "additionalProperties": { "type": "boolean" } })
        );
        assert_eq!(
            p["fixed"]["properties"],
            json!({ "x": { "type": "integer" }, "y": { "type": "integer" } })
        );
        assert_eq!(p["when"], json!({ "type": "string", "format": "date-time" }));
    }

    #[test]
    fn test_extends_and_no_extra_props() {
        let schema = generate(
            r#"
            interface Base { id: string }
            interface A extends Base { name: string }
            "#,
            "A",
            json!({ "required": true, "noExtraProps": true }),
        );
        assert_eq!(
            schema["properties"].as_object().unwrap().keys().collect::<Vec<_>>(),
            ["id", "name"]
        );
        assert_eq!(schema["required"], json!(["id", "name"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert!(schema.get("definitions").is_none());
    }

    #[test]
    fn test_generic_instantiation_key() {
        let schema = generate(
            r#"
            interface Box<T> { value: T }
            interface A { boxed: Box<string> }
            "#,
            "A",
            json!({}),
        );
        assert_eq!(schema["properties"]["boxed"], json!({ "$ref": "#/definitions/Box<string>" }));
        assert_eq!(
            schema["definitions"]["Box<string>"]["properties"]["value"],
            json!({ "type": "string" })
        );
    }

    #[test]
    fn test_pick_omit_and_keyof() {
        let schema = generate(
            r#"
            interface User { id: string; name: string; age: number }
            type Keys = keyof User;
            interface A { picked: Pick<User, "id" | "name">; rest: Omit<User, "id">; key: Keys }
            "#,
            "A",
            json!({ "required": true }),
        );
        let definitions = &schema["definitions"];
        assert_eq!(
            definitions[r#"Pick<User, "id" | "name">"#]["required"],
            json!(["id", "name"])
        );
        assert_eq!(
            definitions[r#"Omit<User, "id">"#]["properties"]
                .as_object()
                .unwrap()
                .keys()
                .collect::<Vec<_>>(),
            ["name", "age"]
        );
        assert_eq!(
            definitions["Keys"],
            json!({ "type": "string", "enum": ["id", "name", "age"] })
        );
    }

    #[test]
    fn test_recursive_type_inlined_without_ref() {
        let schema = generate(
            "interface Node { children: Node[] }",
            "Node",
            json!({ "ref": false }),
        );
        assert_eq!(
            schema["properties"]["children"]["items"],
            json!({ "$ref": "#/definitions/Node" })
        );
        assert!(schema["definitions"].get("Node").is_some());
    }

    #[test]
    fn test_top_ref_and_titles() {
        let schema = generate("interface A { a: string }", "A", json!({ "topRef": true, "titles": true }));
        assert_eq!(schema["$ref"], json!("#/definitions/A"));
        assert_eq!(schema["definitions"]["A"]["title"], json!("A"));
    }

    #[test]
    fn test_namespaced_and_imported_types() {
        let fs = MemoryFs::new()
            .with_file(
                "/index.ts",
                r#"
                import { Address } from "./address";
                export namespace Api { export interface User { home: Address } }
                "#,
            )
            .with_file("/address.ts", "export interface Address { street: string }");
        let program = Program::builder(fs).root("/index.ts").build().unwrap();
        let schema = TypeScriptGenerator::new()
            .generate(&program, "Api.User", &Map::new())
            .unwrap()
            .unwrap();
        assert_eq!(schema["properties"]["home"], json!({ "$ref": "#/definitions/Address" }));
    }

    #[test]
    fn test_unknown_and_unresolved_types() {
        let err = generate_with("interface A { a: string }", "Missing", json!({})).unwrap_err();
        assert!(matches!(err, GenerateError::UnknownSymbol(ref name) if name == "Missing"));

        let source = "interface A { a: Elsewhere }";
        let err = generate_with(source, "A", json!({})).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::UnresolvedType { ref name, ref from } if name == "Elsewhere" && from == "A"
        ));

        let schema = generate(source, "A", json!({ "ignoreErrors": true }));
        assert_eq!(schema["properties"]["a"], json!({}));
    }

    #[test]
    fn test_unsupported_type_names_declaration() {
        let err = generate_with("interface A { f: () => void }", "A", json!({})).unwrap_err();
        assert!(matches!(err, GenerateError::Unsupported { ref from, .. } if from == "A"));
    }

    #[test]
    fn test_invalid_args_rejected_unknown_ignored() {
        let err = generate_with("interface A {}", "A", json!({ "required": "yes" })).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidArgs(_)));
        assert!(generate_with("interface A {}", "A", json!({ "somethingElse": 1 })).is_ok());
    }

    #[test]
    fn test_cache_is_per_program() {
        let generator = TypeScriptGenerator::new();
        let first = program("interface A { a: string }");
        let second = program("interface A { b: string }");
        generator.generate(&first, "A", &Map::new()).unwrap();
        generator.generate(&first, "A", &Map::new()).unwrap();
        assert_eq!(generator.cache().len(), 1);

        let schema = generator.generate(&second, "A", &Map::new()).unwrap().unwrap();
        assert!(schema["properties"].get("b").is_some());
        assert_eq!(generator.cache().len(), 2);

        generator.cache().clear();
        assert!(generator.cache().is_empty());
    }

    #[test]
    fn test_registered_type_overrides_builtin() {
        let mut generator = TypeScriptGenerator::new();
        generator.register_type("Date", json!({ "type": "integer" }));
        let program = program("interface A { at: Date }");
        let schema = generator.generate(&program, "A", &Map::new()).unwrap().unwrap();
        assert_eq!(schema["properties"]["at"], json!({ "type": "integer" }));
    }

    #[test]
    fn test_generate_in_declaring_module() {
        let fs = MemoryFs::new()
            .with_file("/a.ts", "export interface User { wrong: string }")
            .with_file("/b.ts", "export interface User { right: number }");
        let program = Program::builder(fs).root("/a.ts").root("/b.ts").build().unwrap();
        let generator = TypeScriptGenerator::new();

        let schema = generator
            .generate_in(&program, &ModuleRef::file("/b.ts"), "User", &Map::new())
            .unwrap()
            .unwrap();
        assert_eq!(schema["properties"], json!({ "right": { "type": "number" } }));
    }

    #[test]
    fn test_generate_in_written_instantiation() {
        let program = program(
            r#"
            interface A { a: string; b?: number }
            interface Box<T> { value: T }
            "#,
        );
        let generator = TypeScriptGenerator::new();
        let module = ModuleRef::file("/index.ts");
        let options = json!({ "required": true });
        let Value::Object(options) = options else { unreachable!() };

        let partial = generator
            .generate_in(&program, &module, "Partial<A>", &options)
            .unwrap()
            .unwrap();
        assert_eq!(
            partial,
            json!({
                "type": "object",
                "properties": { "a": { "type": "string" }, "b": { "type": "number" } },
                "$schema": SCHEMA_VERSION
            })
        );

        let boxed = generator
            .generate_in(&program, &module, "Box<string>", &options)
            .unwrap()
            .unwrap();
        assert_eq!(boxed["properties"]["value"], json!({ "type": "string" }));
        assert_eq!(boxed["required"], json!(["value"]));
        assert!(boxed.get("definitions").is_none());

        let err = generator
            .generate_in(&program, &module, "Missing<A>", &options)
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnresolvedType { ref name, .. } if name == "Missing"));
    }
}
