//! # ts-json-schema-transform
//!
//! Compile-time TypeScript transform that turns `fromType<T>()` calls into
//! literal JSON schemas, so no schema generator or reflection ships with the
//! compiled output.
//!
//! ## Usage
//!
//! ### 1. Call the marker in TypeScript
//!
//! ```typescript
//! import { fromType } from "ts-transform-json-schema";
//!
//! interface User {
//!   name: string;
//!   email?: string;
//! }
//!
//! export const userSchema = fromType<User>({ required: true });
//! ```
//!
//! ### 2. Transform the program
//!
//! ```rust
//! use ts_json_schema_transform::{MemoryFs, Program, Transformer};
//!
//! let fs = MemoryFs::new().with_marker_package("/").with_file(
//!     "/user.ts",
//!     r#"
//!     import { fromType } from "ts-transform-json-schema";
//!     interface User { name: string; email?: string }
//!     export const userSchema = fromType<User>({ required: true });
//!     "#,
//! );
//! let program = Program::builder(fs).root("/user.ts").build().unwrap();
//! let output = Transformer::new(&program).transform_to_string("/user.ts").unwrap();
//!
//! assert!(!output.contains("fromType"));
//! assert!(output.contains(r#""required": ["#));
//! ```
//!
//! The marker call is recognized by where `fromType` is declared, so local
//! aliases and namespace imports work. The marker import is removed from the
//! output; every other import is left as written.
//!
//! Schemas come from a [`SchemaGenerator`]; the built-in
//! [`TypeScriptGenerator`] emits JSON Schema draft-07.

mod checker;
mod config;
mod error;
mod fs;
pub mod generator;
mod literal;
mod marker;
mod options;
mod program;
mod transform;

pub use checker::{
    ProgramChecker, Signature, Symbol, TypeChecker, TypeDescriptor, describe_type_node,
    entity_segments,
};
pub use config::{ProjectConfig, TransformConfig, UnresolvedSymbolPolicy};
pub use error::{ConfigError, GenerateError, ProgramError, TransformError};
pub use fs::{FileSystem, MemoryFs, OsFs, normalize_path};
pub use generator::{
    DefaultNumberType, GeneratorArgs, GeneratorCache, SchemaGenerator, TypeScriptGenerator,
};
pub use literal::encode;
pub use marker::{
    DECLARATION_SOURCE, DEFAULT_PACKAGE_NAME, IMPLEMENTATION_SOURCE, MarkerIdentity, PACKAGE_JSON,
};
pub use options::{call_options, merge_options, static_value};
pub use program::{ModuleRef, Program, ProgramBuilder, ProgramId, SourceFile};
pub use transform::{Transformer, transform};
