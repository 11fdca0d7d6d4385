//! Body dispatch: select a media type entry, decode the payload and hand
//! it to the schema evaluator.
//!
//! The request side enforces the anti-smuggling rule for GET and HEAD and
//! the `requestBody.required` flag; both sides share the media-type
//! selection (exact, then `type/*`, then `*/*`), charset decoding, numeric
//! coercion, schema evaluation and the `readOnly`/`writeOnly` policy
//! checks.

use serde_json::Value;

use crate::coerce;
use crate::eval::AccessMode;
use crate::media;
use crate::message::HttpRequest;
use crate::result::{location, Annotation, ErrorKind, ValidationError};
use crate::router::PathMatch;
use crate::spec::OperationMeta;
use crate::uri::append_token;

use super::{absorb_outcome, SpecValidator};

/// A schema that accepts anything: absent, `true`, or `{}`.
fn is_empty_schema(schema: Option<&Value>) -> bool {
    match schema {
        None => true,
        Some(Value::Bool(true)) => true,
        Some(Value::Object(obj)) => obj.is_empty(),
        _ => false,
    }
}

fn content_keys(content: &Value) -> Vec<&str> {
    content
        .as_object()
        .map(|obj| obj.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Select the document media-type key for a Content-Type header value.
/// Without a Content-Type only a `*/*` entry can match.
fn select_content_key<'a>(
    content: &'a Value,
    content_type: Option<&media::ContentType>,
) -> Option<&'a str> {
    let keys = content_keys(content);
    match content_type {
        Some(ct) => media::match_content_key(keys.iter().copied(), &ct.essence),
        None => keys
            .iter()
            .copied()
            .find(|k| k.split(';').next().unwrap_or(k).trim() == "*/*"),
    }
}

pub(crate) fn validate_request_body<R: HttpRequest>(
    v: &SpecValidator,
    request: &R,
    path: &PathMatch,
    operation: &OperationMeta,
    errors: &mut Vec<ValidationError>,
    annotations: &mut Vec<Annotation>,
) {
    let body = request.body_bytes();
    let content_length = request
        .header("content-length")
        .and_then(|cl| cl.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let body_present = body.map_or(false, |b| !b.is_empty()) || content_length > 0;

    // Anti-smuggling: a GET/HEAD body is only legitimate when the
    // operation explicitly declares one.
    if matches!(path.method.as_str(), "get" | "head")
        && body_present
        && operation.request_body_pointer.is_none()
    {
        errors.push(
            ValidationError::new(
                ErrorKind::UnexpectedBody,
                location::request_body(),
                operation.pointer.clone(),
                format!(
                    "{} request carries a body but the operation declares no requestBody",
                    path.method.to_uppercase()
                ),
            )
            .resolved_against(&path.document_uri),
        );
        return;
    }

    let Some(body_pointer) = &operation.request_body_pointer else {
        return;
    };
    let content_pointer = format!("{body_pointer}/content");
    let content_type = request.header("content-type").and_then(media::parse_content_type);

    if !body_present {
        if !operation.request_body_required {
            return;
        }
        // An empty schema accepts an empty body even when required.
        if let Some(content) = v.document().resolve(&content_pointer) {
            if let Some(key) = select_content_key(content, content_type.as_ref()) {
                let schema_pointer = append_token(&content_pointer, key) + "/schema";
                if is_empty_schema(v.document().resolve(&schema_pointer)) {
                    return;
                }
            }
        }
        let required_pointer = format!("{body_pointer}/required");
        let keyword = if v.document().resolve(&required_pointer).is_some() {
            required_pointer
        } else {
            body_pointer.clone()
        };
        errors.push(
            ValidationError::new(
                ErrorKind::MissingRequiredBody,
                location::request_body(),
                keyword,
                "request body is required but missing",
            )
            .resolved_against(&path.document_uri),
        );
        return;
    }

    validate_payload(
        v,
        &content_pointer,
        content_type,
        request.header("content-type"),
        body.unwrap_or(&[]),
        AccessMode::Request,
        location::request_body(),
        location::request_header("Content-Type"),
        &path.document_uri,
        errors,
        annotations,
    );
}

/// Media-type selection, decode, coercion, schema evaluation and access
/// policy for one payload. Shared by the request and response sides.
#[allow(clippy::too_many_arguments)]
pub(crate) fn validate_payload(
    v: &SpecValidator,
    content_pointer: &str,
    content_type: Option<media::ContentType>,
    content_type_raw: Option<&str>,
    bytes: &[u8],
    mode: AccessMode,
    instance_root: String,
    header_instance: String,
    document_uri: &str,
    errors: &mut Vec<ValidationError>,
    annotations: &mut Vec<Annotation>,
) {
    let Some(content) = v.document().resolve(content_pointer) else {
        return;
    };

    let Some(key) = select_content_key(content, content_type.as_ref()) else {
        errors.push(
            ValidationError::new(
                ErrorKind::NoMatchingContentType,
                header_instance,
                content_pointer.to_string(),
                format!(
                    "no media type entry matches `{}`",
                    content_type_raw.unwrap_or("<none>")
                ),
            )
            .resolved_against(document_uri),
        );
        return;
    };
    let media_pointer = append_token(content_pointer, key);
    let schema_pointer = format!("{media_pointer}/schema");
    let schema = v.document().resolve(&schema_pointer);

    if let Some(Value::Bool(false)) = schema {
        errors.push(
            ValidationError::new(
                ErrorKind::EntityForbidden,
                instance_root,
                schema_pointer,
                "the entity is forbidden",
            )
            .resolved_against(document_uri),
        );
        return;
    }

    let essence = content_type
        .as_ref()
        .map(|ct| ct.essence.as_str())
        .unwrap_or("application/octet-stream");
    let charset = content_type.as_ref().and_then(|ct| ct.charset.as_deref());
    let Some(decode) = v.media_types().decoder_for(essence) else {
        // Only reachable with an emptied registry; the built-in `*/*`
        // fallback otherwise matches everything.
        errors.push(
            ValidationError::new(
                ErrorKind::DecodingFailed,
                instance_root,
                media_pointer,
                format!("no decoder registered for `{essence}`"),
            )
            .resolved_against(document_uri),
        );
        return;
    };
    let decoded = match decode(bytes, charset) {
        Ok(value) => value,
        Err(message) => {
            errors.push(
                ValidationError::new(
                    ErrorKind::DecodingFailed,
                    instance_root,
                    media_pointer,
                    message,
                )
                .resolved_against(document_uri),
            );
            return;
        }
    };

    let Some(schema) = schema else {
        // Content-agnostic entry: matching and decoding were the check.
        return;
    };
    let decoded = coerce::coerce_value(decoded, schema);

    let outcome = v
        .evaluator()
        .evaluate(&schema_pointer, &decoded, v.config().collect_annotations);
    absorb_outcome(
        outcome,
        ErrorKind::BodySchema,
        &instance_root,
        document_uri,
        errors,
        annotations,
    );

    match v.evaluator().access_violations(&schema_pointer, &decoded, mode) {
        Ok(violations) => {
            let (kind, what) = match mode {
                AccessMode::Request => (ErrorKind::ReadOnlyInRequest, "read-only"),
                AccessMode::Response => (ErrorKind::WriteOnlyInResponse, "write-only"),
            };
            for violation in violations {
                errors.push(
                    ValidationError::new(
                        kind,
                        format!("{instance_root}{}", violation.instance),
                        violation.keyword,
                        format!("{what} value is not allowed here"),
                    )
                    .resolved_against(document_uri),
                );
            }
        }
        Err(recursion) => errors.push(
            ValidationError::new(
                ErrorKind::InfiniteRecursion,
                format!("{instance_root}{}", recursion.instance),
                recursion.keyword,
                recursion.message,
            )
            .resolved_against(document_uri),
        ),
    }
}
