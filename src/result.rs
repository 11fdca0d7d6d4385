//! # Result Model
//!
//! Validation outcomes are a tagged sum: either the message conformed
//! (possibly with annotations collected from schema evaluation) or it did
//! not, in which case one or more error records describe what failed and
//! where. Every error carries two synchronized JSON pointers: an instance
//! location inside the synthetic `/request/...` or `/response/...` tree, and
//! a keyword location inside the OpenAPI document.
//!
//! Callers must go through [`ValidationResult::is_valid`]; a result never
//! doubles as a boolean.

use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};
use serde_json::Value;

use crate::uri;

/// Classification of a validation error.
///
/// The serialized result does not include the kind; it exists for
/// programmatic matching on the Rust side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No path template matched the request URI.
    NoPathMatch,
    /// The matched path item has no operation for the request method.
    NoMatchingOperation,
    /// A caller-supplied `path_template` is not in the document.
    PathTemplateUnknown,
    /// A caller-supplied `operation_id` is not in the document.
    OperationIdUnknown,
    /// A caller-supplied capture does not equal the request URI segment.
    PathCaptureMismatch,
    /// Caller-supplied hints contradict each other or the request.
    OptionsInconsistent,
    /// A required parameter is absent from the message.
    MissingRequiredParameter,
    /// A parameter value failed schema evaluation.
    ParameterSchema,
    /// A GET or HEAD request carried a body without a declared requestBody.
    UnexpectedBody,
    /// The request body is required but empty.
    MissingRequiredBody,
    /// No media type entry matched the message Content-Type.
    NoMatchingContentType,
    /// The selected response has no entry for the status code or `default`.
    NoMatchingResponse,
    /// The payload could not be decoded by the selected decoder.
    DecodingFailed,
    /// The body failed schema evaluation.
    BodySchema,
    /// The media type entry's schema is the `false` schema.
    EntityForbidden,
    /// A `readOnly: true` value appeared in a request body.
    ReadOnlyInRequest,
    /// A `writeOnly: true` value appeared in a response body.
    WriteOnlyInResponse,
    /// Schema evaluation re-entered the same (schema, instance) pair.
    InfiniteRecursion,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoPathMatch => "no-path-match",
            ErrorKind::NoMatchingOperation => "no-matching-operation",
            ErrorKind::PathTemplateUnknown => "path-template-unknown",
            ErrorKind::OperationIdUnknown => "operation-id-unknown",
            ErrorKind::PathCaptureMismatch => "path-capture-mismatch",
            ErrorKind::OptionsInconsistent => "options-inconsistent-with-request",
            ErrorKind::MissingRequiredParameter => "missing-required-parameter",
            ErrorKind::ParameterSchema => "parameter-schema-failure",
            ErrorKind::UnexpectedBody => "unexpected-body-for-get-head",
            ErrorKind::MissingRequiredBody => "missing-required-body",
            ErrorKind::NoMatchingContentType => "no-matching-content-type",
            ErrorKind::NoMatchingResponse => "no-matching-response",
            ErrorKind::DecodingFailed => "decoding-failed",
            ErrorKind::BodySchema => "body-schema-failure",
            ErrorKind::EntityForbidden => "entity-forbidden",
            ErrorKind::ReadOnlyInRequest => "read-only-in-request",
            ErrorKind::WriteOnlyInResponse => "write-only-in-response",
            ErrorKind::InfiniteRecursion => "infinite-recursion",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation error with synchronized locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub kind: ErrorKind,
    /// JSON pointer into the synthetic `/request/...` or `/response/...` tree.
    pub instance_location: String,
    /// JSON pointer into the OpenAPI document.
    pub keyword_location: String,
    /// Document URI plus encoded fragment, when the document URI is known.
    pub absolute_keyword_location: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        kind: ErrorKind,
        instance_location: impl Into<String>,
        keyword_location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            kind,
            instance_location: instance_location.into(),
            keyword_location: keyword_location.into(),
            absolute_keyword_location: None,
            message: message.into(),
        }
    }

    /// Stamp the absolute keyword location from a resolved document URI.
    pub(crate) fn resolved_against(mut self, document_uri: &str) -> Self {
        self.absolute_keyword_location = Some(uri::absolute_keyword_location(
            document_uri,
            &self.keyword_location,
        ));
        self
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("instanceLocation", &self.instance_location)?;
        map.serialize_entry("keywordLocation", &self.keyword_location)?;
        if let Some(abs) = &self.absolute_keyword_location {
            map.serialize_entry("absoluteKeywordLocation", abs)?;
        }
        map.serialize_entry("error", &self.message)?;
        map.end()
    }
}

/// An annotation collected from a successful schema evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub instance_location: String,
    pub keyword_location: String,
    pub absolute_keyword_location: Option<String>,
    pub value: Value,
}

impl Serialize for Annotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("instanceLocation", &self.instance_location)?;
        map.serialize_entry("keywordLocation", &self.keyword_location)?;
        if let Some(abs) = &self.absolute_keyword_location {
            map.serialize_entry("absoluteKeywordLocation", abs)?;
        }
        map.serialize_entry("annotation", &self.value)?;
        map.end()
    }
}

/// Outcome of validating one message against one operation.
///
/// Errors appear in evaluation order: path parameters, then query
/// parameters by declaration order, then headers in case-folded sorted
/// order, then the body.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid { annotations: Vec<Annotation> },
    Invalid { errors: Vec<ValidationError> },
}

impl ValidationResult {
    pub fn valid() -> Self {
        ValidationResult::Valid {
            annotations: Vec::new(),
        }
    }

    /// A result is valid iff it carries no error records.
    pub fn from_parts(errors: Vec<ValidationError>, annotations: Vec<Annotation>) -> Self {
        if errors.is_empty() {
            ValidationResult::Valid { annotations }
        } else {
            ValidationResult::Invalid { errors }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidationResult::Valid { .. } => &[],
            ValidationResult::Invalid { errors } => errors,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        match self {
            ValidationResult::Valid { annotations } => annotations,
            ValidationResult::Invalid { .. } => &[],
        }
    }

    /// Serialize to the stable `{valid, errors, annotations?}` shape.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).expect("result serialization is infallible")
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValidationResult::Valid { annotations } => {
                let with_annotations = !annotations.is_empty();
                let mut st =
                    serializer.serialize_struct("ValidationResult", 2 + usize::from(with_annotations))?;
                st.serialize_field("valid", &true)?;
                st.serialize_field("errors", &[] as &[ValidationError])?;
                if with_annotations {
                    st.serialize_field("annotations", annotations)?;
                }
                st.end()
            }
            ValidationResult::Invalid { errors } => {
                let mut st = serializer.serialize_struct("ValidationResult", 2)?;
                st.serialize_field("valid", &false)?;
                st.serialize_field("errors", errors)?;
                st.end()
            }
        }
    }
}

/// Builders for the synthetic instance-location tree.
pub mod location {
    use crate::uri::escape_token;

    pub fn request_path() -> String {
        "/request/uri/path".to_string()
    }

    pub fn request_query(name: &str) -> String {
        format!("/request/uri/query/{}", escape_token(name))
    }

    pub fn request_header(name: &str) -> String {
        format!("/request/header/{}", escape_token(name))
    }

    pub fn request_body() -> String {
        "/request/body".to_string()
    }

    pub fn response_header(name: &str) -> String {
        format!("/response/header/{}", escape_token(name))
    }

    pub fn response_body() -> String {
        "/response/body".to_string()
    }
}
