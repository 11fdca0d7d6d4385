//! # Spec Module
//!
//! OpenAPI 3.1 document loading and indexing.
//!
//! The raw document tree stays intact (`serde_json::Value`, insertion
//! order preserved) so that every reported keyword location resolves
//! inside the original document. Indexing derives, once per load:
//!
//! - the path-template index: one anchored regex per template with its
//!   capture names and per-method operation metadata, in document order
//! - the operation index: `operationId` to its operation
//! - the server base path, for optional base-path matching
//!
//! `$ref` parameters, request bodies and responses are resolved at index
//! time; the stored pointers address the resolved targets. Structural
//! problems (duplicate capture names within a template, duplicate
//! `operationId`s) fail construction with [`LoadError`].
//!
//! ## Loading
//!
//! ```rust,ignore
//! use wirecheck::spec::{load_document, Document};
//!
//! // From a YAML or JSON file; the path becomes the document URI.
//! let doc = load_document("openapi.yaml")?;
//!
//! // From an already-parsed tree with an explicit identifier.
//! let doc = Document::from_value(value, "https://api.example.com/openapi.json")?;
//! ```

mod build;
mod load;
mod types;

pub use load::load_document;
pub use types::{
    Document, LoadError, OperationMeta, ParameterLocation, ParameterMeta, ParameterStyle,
    TemplateMeta,
};
