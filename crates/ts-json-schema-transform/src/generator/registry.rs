//! Registry of well-known global types with fixed schemas.
//!
//! Types such as `Date` come from the TypeScript standard library, which is
//! never part of a [`Program`](crate::Program). The registry tells the
//! generator what to emit for them instead. Declarations in the program always
//! take precedence: a user-defined `interface Date` is described structurally.

use std::collections::HashMap;

use serde_json::{Value, json};

/// Global type name -> schema associations.
///
/// # Built-in mappings
///
/// | Type | Schema |
/// |------|--------|
/// | `Date` | `{ "type": "string", "format": "date-time" }` |
/// | `RegExp` | `{ "type": "string", "format": "regex" }` |
/// | `URL` | `{ "type": "string", "format": "uri" }` |
/// | `Object` | `{ "type": "object" }` |
/// | `String`, `Number`, `Boolean` | the matching primitive |
/// | `Uint8Array` and the other typed arrays | `{ "type": "array", "items": { "type": "number" } }` |
/// | `ArrayBuffer`, `Function`, `Symbol` | `{}` |
///
/// # Custom mappings
///
/// ```
/// use serde_json::json;
/// use ts_json_schema_transform::generator::TypeRegistry;
///
/// let mut registry = TypeRegistry::with_builtins();
/// registry.register("Decimal", json!({ "type": "string", "pattern": "^-?[0-9]+(\\.[0-9]+)?$" }));
/// assert!(registry.contains("Decimal"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    mappings: HashMap<String, Value>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in mappings.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    pub fn register_builtins(&mut self) {
        self.register("Date", json!({ "type": "string", "format": "date-time" }));
        self.register("RegExp", json!({ "type": "string", "format": "regex" }));
        self.register("URL", json!({ "type": "string", "format": "uri" }));
        self.register("Object", json!({ "type": "object" }));
        self.register("String", json!({ "type": "string" }));
        self.register("Number", json!({ "type": "number" }));
        self.register("Boolean", json!({ "type": "boolean" }));

        for typed_array in [
            "Uint8Array",
            "Uint8ClampedArray",
            "Int8Array",
            "Uint16Array",
            "Int16Array",
            "Uint32Array",
            "Int32Array",
            "Float32Array",
            "Float64Array",
        ] {
            self.register(
                typed_array,
                json!({ "type": "array", "items": { "type": "number" } }),
            );
        }

        for opaque in ["ArrayBuffer", "Function", "Symbol"] {
            self.register(opaque, json!({}));
        }
    }

    /// Add or replace a mapping.
    pub fn register(&mut self, name: impl Into<String>, schema: Value) {
        self.mappings.insert(name.into(), schema);
    }

    /// Remove a mapping, returning it.
    pub fn unregister(&mut self, name: &str) -> Option<Value> {
        self.mappings.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.mappings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mappings.contains_key(name)
    }
}
