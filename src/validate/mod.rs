//! # Validation Module
//!
//! Composes the path router, parameter projection and body dispatch into
//! the two public conformance checks: `validate_request` and
//! `validate_response`.
//!
//! The entry point is [`SpecValidator`], built once per document and
//! shareable across threads. A typical paired validation:
//!
//! ```rust,ignore
//! use wirecheck::{PathHints, SpecValidator};
//!
//! let validator = SpecValidator::new(document);
//! let path = validator.find_path(Some(&request), &PathHints::new())?;
//! let req_result = validator.validate_request(&request, Some(&path));
//! let resp_result = validator.validate_response(&response, &path);
//! ```
//!
//! The [`PathMatch`](crate::router::PathMatch) returned by `find_path` is
//! the memoization channel between the request and response sides; holding
//! it avoids re-matching and carries the resolved document URI for
//! `absoluteKeywordLocation` reporting.

mod body;
mod params;
mod request;
mod response;

use std::env;

use crate::eval::{EvalOutcome, SchemaEvaluator};
use crate::media::MediaTypeRegistry;
use crate::message::{HttpRequest, HttpResponse};
use crate::result::{Annotation, ErrorKind, ValidationError, ValidationResult};
use crate::router::{self, PathHints, PathMatch};
use crate::spec::{Document, OperationMeta};
use crate::uri;

/// Runtime behavior toggles.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    /// Strip the `servers[0]` base path from request paths before template
    /// matching. Off by default: matching considers `paths` only.
    pub match_server_base_path: bool,
    /// Collect annotations from successful schema evaluations.
    pub collect_annotations: bool,
    /// Cache compiled schema validators per subschema pointer.
    pub cache_schemas: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            match_server_base_path: false,
            collect_annotations: true,
            cache_schemas: true,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from environment variables:
    /// `WIRECHECK_MATCH_BASE_PATH` (default off),
    /// `WIRECHECK_ANNOTATIONS` (default on),
    /// `WIRECHECK_SCHEMA_CACHE` (default on).
    pub fn from_env() -> Self {
        ValidatorConfig {
            match_server_base_path: env_flag("WIRECHECK_MATCH_BASE_PATH", false),
            collect_annotations: env_flag("WIRECHECK_ANNOTATIONS", true),
            cache_schemas: env_flag("WIRECHECK_SCHEMA_CACHE", true),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "on" | "true" | "yes"
        ),
        Err(_) => default,
    }
}

/// Validates HTTP requests and responses against one OpenAPI document.
///
/// Stateless per call; the only interior mutability is the schema
/// validator cache, which is write-once per subschema.
pub struct SpecValidator {
    document: Document,
    evaluator: SchemaEvaluator,
    media_types: MediaTypeRegistry,
    config: ValidatorConfig,
}

impl SpecValidator {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, ValidatorConfig::default())
    }

    pub fn with_config(document: Document, config: ValidatorConfig) -> Self {
        let evaluator = SchemaEvaluator::new(document.root_arc(), config.cache_schemas);
        SpecValidator {
            document,
            evaluator,
            media_types: MediaTypeRegistry::default(),
            config,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn media_types(&self) -> &MediaTypeRegistry {
        &self.media_types
    }

    /// Register custom media type decoders before validating.
    pub fn media_types_mut(&mut self) -> &mut MediaTypeRegistry {
        &mut self.media_types
    }

    pub(crate) fn evaluator(&self) -> &SchemaEvaluator {
        &self.evaluator
    }

    pub(crate) fn strip_base(&self) -> Option<&str> {
        if self.config.match_server_base_path {
            self.document.server_base_path()
        } else {
            None
        }
    }

    /// Resolve a request (and/or caller hints) to an operation.
    ///
    /// On success every output field of the [`PathMatch`] is populated;
    /// on failure the error list explains why, with caller-supplied hints
    /// cross-checked against the request rather than silently trusted.
    pub fn find_path<R: HttpRequest>(
        &self,
        request: Option<&R>,
        hints: &PathHints,
    ) -> Result<PathMatch, Vec<ValidationError>> {
        router::find_path_in(&self.document, request, hints, self.strip_base())
    }

    /// [`SpecValidator::find_path`] without a request, for callers that
    /// know the template or operation up front.
    pub fn find_path_from_hints(&self, hints: &PathHints) -> Result<PathMatch, Vec<ValidationError>> {
        router::find_path_in::<http::Request<Vec<u8>>>(&self.document, None, hints, self.strip_base())
    }

    /// Validate the request side of an operation: path, query and header
    /// parameters, then the body.
    ///
    /// With `path: None` the operation is resolved from the request; a
    /// supplied [`PathMatch`] is verified against the request first.
    pub fn validate_request<R: HttpRequest>(
        &self,
        request: &R,
        path: Option<&PathMatch>,
    ) -> ValidationResult {
        request::validate_request_impl(self, request, path)
    }

    /// Validate the response side of an operation: response selection by
    /// status code (with `default` fallback), declared headers, then the
    /// body.
    pub fn validate_response<S: HttpResponse>(
        &self,
        response: &S,
        path: &PathMatch,
    ) -> ValidationResult {
        response::validate_response_impl(self, response, path)
    }
}

/// Look up the operation a [`PathMatch`] refers to, guarding against a
/// match memoized from a different document.
pub(crate) fn operation_for<'a>(v: &'a SpecValidator, path: &PathMatch) -> Option<&'a OperationMeta> {
    v.document()
        .templates()
        .get(path.template_index)
        .filter(|t| t.template == path.path_template)
        .and_then(|t| t.operation(&path.method))
}

pub(crate) fn stale_match_error(path: &PathMatch) -> ValidationResult {
    ValidationResult::from_parts(
        vec![ValidationError::new(
            ErrorKind::OptionsInconsistent,
            "",
            "/paths",
            "memoized path match does not correspond to this document",
        )
        .resolved_against(&path.document_uri)],
        Vec::new(),
    )
}

/// Fold a schema evaluation outcome into the error and annotation streams,
/// prefixing instance locations and stamping absolute keyword locations.
pub(crate) fn absorb_outcome(
    outcome: EvalOutcome,
    kind: ErrorKind,
    instance_prefix: &str,
    document_uri: &str,
    errors: &mut Vec<ValidationError>,
    annotations: &mut Vec<Annotation>,
) {
    for e in outcome.errors {
        errors.push(
            ValidationError::new(
                kind,
                format!("{instance_prefix}{}", e.instance),
                e.keyword,
                e.message,
            )
            .resolved_against(document_uri),
        );
    }
    for a in outcome.annotations {
        let absolute = uri::absolute_keyword_location(document_uri, &a.keyword);
        annotations.push(Annotation {
            instance_location: format!("{instance_prefix}{}", a.instance),
            keyword_location: a.keyword,
            absolute_keyword_location: Some(absolute),
            value: a.value,
        });
    }
}
