use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Location where a parameter appears in an HTTP message.
///
/// Corresponds to the OpenAPI `in` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        };
        write!(f, "{s}")
    }
}

/// Serialization style for parameters as defined by OpenAPI.
///
/// Only `simple` (path, header) and `form` (query) are projected back to
/// values; the remaining styles are recognized so they can be skipped
/// deliberately rather than misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    /// The default style for a location, per the OpenAPI specification.
    pub(crate) fn default_for(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        }
    }
}

impl std::fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        write!(f, "{s}")
    }
}

/// Metadata for one declared parameter, indexed at document load.
///
/// All pointers address the original document tree; `$ref` parameters are
/// resolved at index time so the pointers land on the resolved target.
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
    /// JSON pointer to the parameter object.
    pub pointer: String,
    /// JSON pointer to `schema`, when the parameter declares one.
    pub schema_pointer: Option<String>,
    /// Single declared media type key, when the parameter uses `content`.
    pub content_type: Option<String>,
    /// JSON pointer to `content/<type>/schema`, when `content` is used.
    pub content_schema_pointer: Option<String>,
}

impl ParameterMeta {
    /// The style that applies, declared or location default.
    pub fn effective_style(&self) -> ParameterStyle {
        self.style
            .unwrap_or_else(|| ParameterStyle::default_for(self.location))
    }
}

/// Metadata for one operation (path item plus method).
#[derive(Debug, Clone)]
pub struct OperationMeta {
    /// Lower-cased HTTP method.
    pub method: String,
    /// JSON pointer to the operation object.
    pub pointer: String,
    pub operation_id: Option<String>,
    /// Path-level parameters merged with operation-level ones; the
    /// operation wins on a `(name, in)` collision.
    pub parameters: Vec<ParameterMeta>,
    /// JSON pointer to the `requestBody` object, `$ref` resolved.
    pub request_body_pointer: Option<String>,
    pub request_body_required: bool,
    /// `(status key, pointer)` pairs in document order; the key is a
    /// status code string or the literal `default`.
    pub responses: Vec<(String, String)>,
}

impl OperationMeta {
    /// Select the response entry for a status code: exact match first,
    /// then the `default` entry.
    pub fn response_pointer(&self, status: u16) -> Option<&str> {
        let code = status.to_string();
        self.responses
            .iter()
            .find(|(key, _)| *key == code)
            .or_else(|| self.responses.iter().find(|(key, _)| key == "default"))
            .map(|(_, ptr)| ptr.as_str())
    }
}

/// One indexed path template.
#[derive(Debug)]
pub struct TemplateMeta {
    /// The template as written, e.g. `/pets/{petId}`.
    pub template: String,
    /// JSON pointer to the path item.
    pub pointer: String,
    pub(crate) regex: Regex,
    /// Capture names in template order.
    pub capture_names: Vec<String>,
    pub(crate) operations: Vec<OperationMeta>,
}

impl TemplateMeta {
    pub fn operation(&self, method: &str) -> Option<&OperationMeta> {
        self.operations.iter().find(|op| op.method == method)
    }

    pub fn operations(&self) -> &[OperationMeta] {
        &self.operations
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// An immutable, indexed OpenAPI document.
///
/// Loaded once, indexed once, read-only thereafter; safe to share across
/// threads.
#[derive(Debug)]
pub struct Document {
    pub(crate) root: Arc<Value>,
    pub(crate) openapi_uri: String,
    pub(crate) templates: Vec<TemplateMeta>,
    /// `operationId` to `(template index, method)`.
    pub(crate) operation_index: HashMap<String, (usize, String)>,
    /// Path component of `servers[0].url`, when one is declared.
    pub(crate) base_path: Option<String>,
}

impl Document {
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub(crate) fn root_arc(&self) -> Arc<Value> {
        Arc::clone(&self.root)
    }

    /// The document identifier; may be relative.
    pub fn openapi_uri(&self) -> &str {
        &self.openapi_uri
    }

    pub fn templates(&self) -> &[TemplateMeta] {
        &self.templates
    }

    pub fn template_index(&self, template: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.template == template)
    }

    pub fn operation_by_id(&self, operation_id: &str) -> Option<(usize, &str)> {
        self.operation_index
            .get(operation_id)
            .map(|(idx, method)| (*idx, method.as_str()))
    }

    pub fn server_base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// Resolve a JSON pointer against the document root.
    pub fn resolve(&self, pointer: &str) -> Option<&Value> {
        self.root.pointer(pointer)
    }
}

/// Structural errors detected while indexing a document. Fatal to
/// construction.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("duplicate capture name `{name}` in path template `{template}`")]
    DuplicateCaptureName { template: String, name: String },
    #[error("duplicate operationId `{id}`")]
    DuplicateOperationId { id: String },
    #[error("document has no `paths` object")]
    MissingPaths,
    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
