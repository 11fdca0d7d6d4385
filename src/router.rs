//! Path router: reverse-maps a concrete request URI onto a templated path
//! item with captured variables.
//!
//! Each template is compiled once at index time into an anchored regex with
//! one non-slash capture group per `{name}` segment. Matching tries caller
//! hints first (`path_template`, then `operation_id`), then scans the
//! indexed templates in document order; the first match wins. Caller hints
//! are cross-checked against the request rather than silently trusted.

use percent_encoding::percent_decode_str;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::message::HttpRequest;
use crate::result::{location, ErrorKind, ValidationError};
use crate::spec::{Document, LoadError};
use crate::uri;

/// Maximum number of path captures before heap allocation. Most REST APIs
/// stay at or below four.
pub const MAX_INLINE_CAPTURES: usize = 8;

/// Stack-allocated capture storage. Names come from the static template
/// index, values are per-request.
pub type CaptureVec = SmallVec<[(Arc<str>, String); MAX_INLINE_CAPTURES]>;

/// Caller-supplied hints for path resolution. Any subset may be present;
/// every supplied field is verified against the request.
#[derive(Debug, Clone, Default)]
pub struct PathHints {
    pub path_template: Option<String>,
    pub operation_id: Option<String>,
    /// Case-insensitive; `GET` and `get` are the same hint.
    pub method: Option<String>,
    /// URL-decoded capture values keyed by template variable name.
    pub path_captures: Option<Vec<(String, String)>>,
}

impl PathHints {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of resolving a message to an operation.
///
/// This value replaces the mutable options hash of older validators: it is
/// returned by `find_path`, accepted by both `validate_request` and
/// `validate_response`, and memoizes the resolved document URI for
/// `absoluteKeywordLocation` reporting.
#[derive(Debug, Clone)]
pub struct PathMatch {
    pub path_template: String,
    /// Lower-cased HTTP method.
    pub method: String,
    /// Empty string when the operation declares no `operationId`.
    pub operation_id: String,
    /// URL-decoded captures in template order.
    pub path_captures: CaptureVec,
    pub(crate) template_index: usize,
    pub(crate) operation_pointer: String,
    pub(crate) document_uri: String,
}

impl PathMatch {
    /// Look up a capture by name. Last occurrence wins should a document
    /// slip duplicate names past indexing.
    #[must_use]
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.path_captures
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Captures as an owned map. Allocates; prefer [`PathMatch::capture`]
    /// for lookups.
    #[must_use]
    pub fn captures_map(&self) -> HashMap<String, String> {
        self.path_captures
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Compile a path template into an anchored regex and its capture names.
///
/// `{name}` segments become `([^/]+)` groups. Duplicate capture names in
/// one template are rejected.
pub(crate) fn path_to_regex(template: &str) -> Result<(Regex, Vec<String>), LoadError> {
    if template == "/" {
        let regex = Regex::new(r"^/$").map_err(|e| LoadError::InvalidTemplate {
            template: template.to_string(),
            reason: e.to_string(),
        })?;
        return Ok((regex, Vec::new()));
    }

    let mut pattern = String::with_capacity(template.len() + 8);
    pattern.push('^');
    let mut capture_names = Vec::new();

    for segment in template.split('/') {
        if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
            let name = segment[1..segment.len() - 1].to_string();
            if capture_names.contains(&name) {
                return Err(LoadError::DuplicateCaptureName {
                    template: template.to_string(),
                    name,
                });
            }
            pattern.push_str("/([^/]+)");
            capture_names.push(name);
        } else if !segment.is_empty() {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push('$');
    let regex = Regex::new(&pattern).map_err(|e| LoadError::InvalidTemplate {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok((regex, capture_names))
}

fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn stamped(errors: Vec<ValidationError>, document_uri: &str) -> Vec<ValidationError> {
    errors
        .into_iter()
        .map(|e| e.resolved_against(document_uri))
        .collect()
}

/// Resolve a request (and/or hints) to an operation in the document.
pub(crate) fn find_path_in<R: HttpRequest>(
    doc: &Document,
    request: Option<&R>,
    hints: &PathHints,
    strip_base: Option<&str>,
) -> Result<PathMatch, Vec<ValidationError>> {
    let document_uri =
        uri::resolve_document_uri(doc.openapi_uri(), request.and_then(|r| r.host()));
    let mut errors = Vec::new();

    // Method: the hint must agree with the request when both exist.
    let hint_method = hints.method.as_deref().map(str::to_ascii_lowercase);
    let request_method = request.map(|r| r.method().as_str().to_ascii_lowercase());
    if let (Some(hinted), Some(actual)) = (&hint_method, &request_method) {
        if hinted != actual {
            errors.push(ValidationError::new(
                ErrorKind::OptionsInconsistent,
                location::request_path(),
                "/paths",
                format!("supplied method `{hinted}` does not match request method `{actual}`"),
            ));
        }
    }
    let method = match request_method.or(hint_method) {
        Some(m) => m,
        None => {
            errors.push(ValidationError::new(
                ErrorKind::NoMatchingOperation,
                location::request_path(),
                "/paths",
                "method is undetermined: neither a request nor a method hint was supplied",
            ));
            return Err(stamped(errors, &document_uri));
        }
    };
    if !errors.is_empty() {
        return Err(stamped(errors, &document_uri));
    }

    let request_path = request.map(|r| {
        let path = r.uri().path();
        match strip_base {
            Some(base) if !base.is_empty() && path.starts_with(base) => &path[base.len()..],
            _ => path,
        }
        .to_string()
    });

    debug!(
        method = %method,
        path = request_path.as_deref().unwrap_or("<none>"),
        template_hint = hints.path_template.as_deref(),
        operation_hint = hints.operation_id.as_deref(),
        "Path match attempt"
    );

    let template_index = if let Some(template) = &hints.path_template {
        let Some(idx) = doc.template_index(template) else {
            errors.push(ValidationError::new(
                ErrorKind::PathTemplateUnknown,
                location::request_path(),
                "/paths",
                format!("path template `{template}` is not declared in the document"),
            ));
            return Err(stamped(errors, &document_uri));
        };
        // Both hints supplied: they must name the same path item.
        if let Some(operation_id) = &hints.operation_id {
            match doc.operation_by_id(operation_id) {
                None => errors.push(ValidationError::new(
                    ErrorKind::OperationIdUnknown,
                    location::request_path(),
                    "/paths",
                    format!("operationId `{operation_id}` is not declared in the document"),
                )),
                Some((other_idx, _)) if other_idx != idx => {
                    errors.push(ValidationError::new(
                        ErrorKind::OptionsInconsistent,
                        location::request_path(),
                        doc.templates()[idx].pointer.clone(),
                        format!(
                            "supplied path template `{template}` does not contain operationId `{operation_id}`"
                        ),
                    ));
                    errors.push(ValidationError::new(
                        ErrorKind::OptionsInconsistent,
                        location::request_path(),
                        doc.templates()[other_idx].pointer.clone(),
                        format!(
                            "operationId `{operation_id}` resolves to path template `{}`",
                            doc.templates()[other_idx].template
                        ),
                    ));
                }
                _ => {}
            }
            if !errors.is_empty() {
                return Err(stamped(errors, &document_uri));
            }
        }
        idx
    } else if let Some(operation_id) = &hints.operation_id {
        match doc.operation_by_id(operation_id) {
            Some((idx, _)) => idx,
            None => {
                errors.push(ValidationError::new(
                    ErrorKind::OperationIdUnknown,
                    location::request_path(),
                    "/paths",
                    format!("operationId `{operation_id}` is not declared in the document"),
                ));
                return Err(stamped(errors, &document_uri));
            }
        }
    } else {
        let Some(path) = request_path.as_deref() else {
            errors.push(ValidationError::new(
                ErrorKind::NoPathMatch,
                location::request_path(),
                "/paths",
                "no request URI and no path template or operationId hint",
            ));
            return Err(stamped(errors, &document_uri));
        };
        match doc
            .templates()
            .iter()
            .position(|t| t.regex().is_match(path))
        {
            Some(idx) => idx,
            None => {
                warn!(method = %method, path = %path, "No path template matched");
                errors.push(ValidationError::new(
                    ErrorKind::NoPathMatch,
                    location::request_path(),
                    "/paths",
                    format!("no path template matches `{path}`"),
                ));
                return Err(stamped(errors, &document_uri));
            }
        }
    };

    let template = &doc.templates()[template_index];

    // Captures come from the request URI when one is available, otherwise
    // from the caller's hints.
    let mut captures = CaptureVec::new();
    if let Some(path) = request_path.as_deref() {
        match template.regex().captures(path) {
            Some(caps) => {
                for (i, name) in template.capture_names.iter().enumerate() {
                    let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
                    captures.push((Arc::from(name.as_str()), decode_segment(raw)));
                }
            }
            None => {
                errors.push(ValidationError::new(
                    ErrorKind::OptionsInconsistent,
                    location::request_path(),
                    template.pointer.clone(),
                    format!(
                        "request path `{path}` does not match supplied template `{}`",
                        template.template
                    ),
                ));
                return Err(stamped(errors, &document_uri));
            }
        }
    } else if let Some(supplied) = &hints.path_captures {
        for name in &template.capture_names {
            if let Some((_, value)) = supplied.iter().find(|(n, _)| n == name) {
                captures.push((Arc::from(name.as_str()), value.clone()));
            }
        }
    }

    // Supplied captures are verified, never trusted over the URI.
    if let (Some(supplied), true) = (&hints.path_captures, request_path.is_some()) {
        for (name, value) in supplied {
            match captures.iter().rfind(|(n, _)| n.as_ref() == name.as_str()) {
                Some((_, derived)) if derived == value => {}
                Some((_, derived)) => errors.push(ValidationError::new(
                    ErrorKind::PathCaptureMismatch,
                    location::request_path(),
                    template.pointer.clone(),
                    format!("capture `{name}` is `{derived}` in the request URI, not `{value}`"),
                )),
                None => errors.push(ValidationError::new(
                    ErrorKind::PathCaptureMismatch,
                    location::request_path(),
                    template.pointer.clone(),
                    format!(
                        "capture `{name}` is not defined by template `{}`",
                        template.template
                    ),
                )),
            }
        }
    }

    let Some(operation) = template.operation(&method) else {
        errors.push(ValidationError::new(
            ErrorKind::NoMatchingOperation,
            location::request_path(),
            template.pointer.clone(),
            format!("no `{method}` operation on `{}`", template.template),
        ));
        return Err(stamped(errors, &document_uri));
    };

    if let Some(operation_id) = &hints.operation_id {
        if operation.operation_id.as_deref() != Some(operation_id.as_str()) {
            errors.push(ValidationError::new(
                ErrorKind::OptionsInconsistent,
                location::request_path(),
                operation.pointer.clone(),
                format!(
                    "the `{method}` operation on `{}` does not carry operationId `{operation_id}`",
                    template.template
                ),
            ));
        }
    }

    if !errors.is_empty() {
        return Err(stamped(errors, &document_uri));
    }

    debug!(
        method = %method,
        template = %template.template,
        operation_id = operation.operation_id.as_deref().unwrap_or(""),
        captures = ?captures,
        "Path matched"
    );

    Ok(PathMatch {
        path_template: template.template.clone(),
        method,
        operation_id: operation.operation_id.clone().unwrap_or_default(),
        path_captures: captures,
        template_index,
        operation_pointer: operation.pointer.clone(),
        document_uri,
    })
}

/// Cross-check a caller-held [`PathMatch`] against a request before reuse.
pub(crate) fn verify_match_against_request<R: HttpRequest>(
    doc: &Document,
    path: &PathMatch,
    request: &R,
    strip_base: Option<&str>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let Some(template) = doc
        .templates()
        .get(path.template_index)
        .filter(|t| t.template == path.path_template)
    else {
        errors.push(ValidationError::new(
            ErrorKind::OptionsInconsistent,
            location::request_path(),
            "/paths",
            "memoized path match does not correspond to this document",
        ));
        return stamped(errors, &path.document_uri);
    };

    let method = request.method().as_str().to_ascii_lowercase();
    if method != path.method {
        errors.push(ValidationError::new(
            ErrorKind::OptionsInconsistent,
            location::request_path(),
            path.operation_pointer.clone(),
            format!(
                "memoized method `{}` does not match request method `{method}`",
                path.method
            ),
        ));
    }

    let uri_path = request.uri().path();
    let uri_path = match strip_base {
        Some(base) if !base.is_empty() && uri_path.starts_with(base) => &uri_path[base.len()..],
        _ => uri_path,
    };
    match template.regex().captures(uri_path) {
        Some(caps) => {
            for (i, name) in template.capture_names.iter().enumerate() {
                let derived = decode_segment(caps.get(i + 1).map(|m| m.as_str()).unwrap_or(""));
                if path.capture(name) != Some(derived.as_str()) {
                    errors.push(ValidationError::new(
                        ErrorKind::PathCaptureMismatch,
                        location::request_path(),
                        template.pointer.clone(),
                        format!("memoized capture `{name}` does not match the request URI"),
                    ));
                }
            }
        }
        None => errors.push(ValidationError::new(
            ErrorKind::OptionsInconsistent,
            location::request_path(),
            template.pointer.clone(),
            format!(
                "request path `{uri_path}` does not match memoized template `{}`",
                path.path_template
            ),
        )),
    }
    stamped(errors, &path.document_uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_regex_basic() {
        let (regex, names) = path_to_regex("/pets/{petId}/photos/{photoId}").unwrap();
        assert_eq!(names, vec!["petId", "photoId"]);
        let caps = regex.captures("/pets/42/photos/7").unwrap();
        assert_eq!(&caps[1], "42");
        assert_eq!(&caps[2], "7");
        assert!(!regex.is_match("/pets/42"));
        assert!(!regex.is_match("/pets/42/photos/7/extra"));
    }

    #[test]
    fn test_path_to_regex_escapes_literals() {
        let (regex, _) = path_to_regex("/v1.0/pets").unwrap();
        assert!(regex.is_match("/v1.0/pets"));
        assert!(!regex.is_match("/v1x0/pets"));
    }

    #[test]
    fn test_duplicate_capture_name_rejected() {
        let err = path_to_regex("/x/{id}/y/{id}").unwrap_err();
        assert!(matches!(
            err,
            LoadError::DuplicateCaptureName { ref name, .. } if name == "id"
        ));
    }

    #[test]
    fn test_root_template() {
        let (regex, names) = path_to_regex("/").unwrap();
        assert!(regex.is_match("/"));
        assert!(names.is_empty());
    }

    #[test]
    fn test_capture_segments_do_not_cross_slashes() {
        let (regex, _) = path_to_regex("/files/{name}").unwrap();
        assert!(!regex.is_match("/files/a/b"));
    }
}
