//! Response-side orchestration: response selection by status code with
//! `default` fallback, declared header validation, body dispatch.

use serde_json::Value;

use crate::coerce;
use crate::eval::AccessMode;
use crate::media;
use crate::message::HttpResponse;
use crate::result::{location, Annotation, ErrorKind, ValidationError, ValidationResult};
use crate::router::PathMatch;
use crate::uri::append_token;

use super::{absorb_outcome, body, operation_for, stale_match_error, SpecValidator};

pub(crate) fn validate_response_impl<S: HttpResponse>(
    v: &SpecValidator,
    response: &S,
    path: &PathMatch,
) -> ValidationResult {
    let Some(operation) = operation_for(v, path) else {
        return stale_match_error(path);
    };

    let mut errors = Vec::new();
    let mut annotations = Vec::new();

    let status = response.status().as_u16();
    let Some(response_pointer) = operation.response_pointer(status).map(str::to_string) else {
        errors.push(
            ValidationError::new(
                ErrorKind::NoMatchingResponse,
                "/response",
                format!("{}/responses", operation.pointer),
                format!("no response entry for status {status} and no `default`"),
            )
            .resolved_against(&path.document_uri),
        );
        return ValidationResult::from_parts(errors, annotations);
    };

    validate_headers(
        v,
        response,
        &response_pointer,
        &path.document_uri,
        &mut errors,
        &mut annotations,
    );

    // Absent Content-Length with a non-empty body is tolerated; an empty
    // body has nothing to dispatch.
    if let Some(bytes) = response.body_bytes() {
        let content_pointer = format!("{response_pointer}/content");
        let content_type = response
            .header("content-type")
            .and_then(media::parse_content_type);
        body::validate_payload(
            v,
            &content_pointer,
            content_type,
            response.header("content-type"),
            bytes,
            AccessMode::Response,
            location::response_body(),
            location::response_header("Content-Type"),
            &path.document_uri,
            &mut errors,
            &mut annotations,
        );
    }

    ValidationResult::from_parts(errors, annotations)
}

/// Follow a `$ref` header declaration to its target.
fn deref_header<'a>(root: &'a Value, pointer: String, value: &'a Value) -> (String, &'a Value) {
    if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
        if let Some(fragment) = reference.strip_prefix('#') {
            if let Some(target) = root.pointer(fragment) {
                return (fragment.to_string(), target);
            }
        }
    }
    (pointer, value)
}

/// Validate declared response headers in case-folded sorted order.
/// Lookup on the message is case-insensitive; `Content-Type` is described
/// by the `content` section and skipped here.
fn validate_headers<S: HttpResponse>(
    v: &SpecValidator,
    response: &S,
    response_pointer: &str,
    document_uri: &str,
    errors: &mut Vec<ValidationError>,
    annotations: &mut Vec<Annotation>,
) {
    let headers_pointer = format!("{response_pointer}/headers");
    let Some(declared) = v
        .document()
        .resolve(&headers_pointer)
        .and_then(Value::as_object)
    else {
        return;
    };

    let mut names: Vec<&String> = declared.keys().collect();
    names.sort_by_key(|name| name.to_ascii_lowercase());

    for name in names {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        let pointer = append_token(&headers_pointer, name);
        let (pointer, header) = deref_header(v.document().root(), pointer, &declared[name.as_str()]);
        let required = header
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match response.header(name) {
            None => {
                if required {
                    let required_pointer = format!("{pointer}/required");
                    let keyword = if header.get("required").is_some() {
                        required_pointer
                    } else {
                        pointer
                    };
                    errors.push(
                        ValidationError::new(
                            ErrorKind::MissingRequiredParameter,
                            location::response_header(name),
                            keyword,
                            format!("required response header `{name}` is missing"),
                        )
                        .resolved_against(document_uri),
                    );
                }
            }
            Some(raw) => {
                let schema_pointer = format!("{pointer}/schema");
                let Some(schema) = v.document().resolve(&schema_pointer) else {
                    continue;
                };
                let value = coerce::coerce_scalar(raw, schema);
                let outcome =
                    v.evaluator()
                        .evaluate(&schema_pointer, &value, v.config().collect_annotations);
                absorb_outcome(
                    outcome,
                    ErrorKind::ParameterSchema,
                    &location::response_header(name),
                    document_uri,
                    errors,
                    annotations,
                );
            }
        }
    }
}
