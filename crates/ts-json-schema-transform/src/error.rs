use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a [`Program`](crate::Program).
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Errors raised by a [`SchemaGenerator`](crate::SchemaGenerator).
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("No type named `{0}` was found in the program")]
    UnknownSymbol(String),

    #[error("Type `{name}` referenced from `{from}` could not be resolved")]
    UnresolvedType { name: String, from: String },

    #[error("Unsupported type in `{from}`: {detail}")]
    Unsupported { from: String, detail: String },

    #[error("Invalid generator options: {0}")]
    InvalidArgs(#[from] serde_json::Error),
}

/// Errors that abort the transform of one source file.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{} is not part of the program", path.display())]
    UnknownFile { path: PathBuf },

    #[error("Could not find symbol for passed type `{type_text}` in {}", file.display())]
    SymbolNotFound { file: PathBuf, type_text: String },

    #[error("Could not generate a JSON schema for `{type_name}`: {source}")]
    Generate {
        type_name: String,
        #[source]
        source: GenerateError,
    },

    #[error("The schema generator returned no schema for `{type_name}`")]
    EmptySchema { type_name: String },

    #[error(
        "`{specifier}` is imported by {} but no declaration of the marker module was found; \
         make sure its type declarations are part of the program",
        file.display()
    )]
    MissingMarkerDeclaration { file: PathBuf, specifier: String },
}

/// Errors raised while reading transform configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a static JSON-like document", path.display())]
    NotStatic { path: PathBuf },

    #[error("Invalid transform configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}
