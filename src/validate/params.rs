//! Parameter projection: turn the strings on the wire back into typed
//! values and evaluate them against their declared schemas.
//!
//! Supported serializations are `simple` for path and header parameters
//! and `form` for query parameters, in both cases taking the value as a
//! single scalar string. Parameters declaring other styles are skipped;
//! cookies are skipped entirely. Only the first occurrence of a repeated
//! query or header name is considered.
//!
//! Error order is deterministic: path parameters first, then query
//! parameters in declaration order, then headers in case-folded sorted
//! order.

use std::collections::HashMap;
use tracing::debug;

use crate::coerce;
use crate::media;
use crate::message::HttpRequest;
use crate::result::{location, Annotation, ErrorKind, ValidationError};
use crate::router::PathMatch;
use crate::spec::{OperationMeta, ParameterLocation, ParameterMeta, ParameterStyle};

use super::{absorb_outcome, SpecValidator};

/// Headers handled elsewhere or deliberately ignored as parameters.
const SKIPPED_HEADERS: [&str; 3] = ["content-type", "accept", "authorization"];

/// Parse a query string keeping only the first occurrence of each name.
pub(crate) fn first_value_query(query: Option<&str>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(query) = query {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            out.entry(name.into_owned()).or_insert_with(|| value.into_owned());
        }
    }
    out
}

fn style_supported(param: &ParameterMeta) -> bool {
    let style = param.effective_style();
    match param.location {
        ParameterLocation::Path | ParameterLocation::Header => style == ParameterStyle::Simple,
        ParameterLocation::Query => style == ParameterStyle::Form,
        ParameterLocation::Cookie => false,
    }
}

fn required_keyword(v: &SpecValidator, param: &ParameterMeta) -> String {
    let with_field = format!("{}/required", param.pointer);
    if v.document().resolve(&with_field).is_some() {
        with_field
    } else {
        param.pointer.clone()
    }
}

pub(crate) fn validate_parameters<R: HttpRequest>(
    v: &SpecValidator,
    request: &R,
    path: &PathMatch,
    operation: &OperationMeta,
    errors: &mut Vec<ValidationError>,
    annotations: &mut Vec<Annotation>,
) {
    let query = first_value_query(request.uri().query());

    for param in params_in(operation, ParameterLocation::Path) {
        if !projectable(param) {
            continue;
        }
        match path.capture(&param.name) {
            Some(value) => validate_value(
                v,
                param,
                value,
                location::request_path(),
                &path.document_uri,
                errors,
                annotations,
            ),
            None if param.required => push_missing(
                v,
                param,
                location::request_path(),
                &path.document_uri,
                errors,
            ),
            None => {}
        }
    }

    for param in params_in(operation, ParameterLocation::Query) {
        if !projectable(param) {
            continue;
        }
        match query.get(&param.name) {
            Some(value) => validate_value(
                v,
                param,
                value,
                location::request_query(&param.name),
                &path.document_uri,
                errors,
                annotations,
            ),
            None if param.required => push_missing(
                v,
                param,
                location::request_query(&param.name),
                &path.document_uri,
                errors,
            ),
            None => {}
        }
    }

    // Canonical order so the error stream is a pure function of the input.
    let mut headers: Vec<&ParameterMeta> = params_in(operation, ParameterLocation::Header)
        .filter(|p| {
            !SKIPPED_HEADERS
                .iter()
                .any(|s| p.name.eq_ignore_ascii_case(s))
        })
        .collect();
    headers.sort_by_key(|p| p.name.to_ascii_lowercase());

    for param in headers {
        if !projectable(param) {
            continue;
        }
        match request.header(&param.name) {
            Some(value) => validate_value(
                v,
                param,
                value,
                location::request_header(&param.name),
                &path.document_uri,
                errors,
                annotations,
            ),
            None if param.required => push_missing(
                v,
                param,
                location::request_header(&param.name),
                &path.document_uri,
                errors,
            ),
            None => {}
        }
    }

    for param in params_in(operation, ParameterLocation::Cookie) {
        debug!(parameter = %param.name, "Cookie parameter skipped");
    }
}

fn params_in(
    operation: &OperationMeta,
    location: ParameterLocation,
) -> impl Iterator<Item = &ParameterMeta> {
    operation
        .parameters
        .iter()
        .filter(move |p| p.location == location)
}

fn projectable(param: &ParameterMeta) -> bool {
    if style_supported(param) {
        true
    } else {
        debug!(
            parameter = %param.name,
            location = %param.location,
            style = %param.effective_style(),
            "Parameter with unsupported serialization skipped"
        );
        false
    }
}

fn push_missing(
    v: &SpecValidator,
    param: &ParameterMeta,
    instance: String,
    document_uri: &str,
    errors: &mut Vec<ValidationError>,
) {
    errors.push(
        ValidationError::new(
            ErrorKind::MissingRequiredParameter,
            instance,
            required_keyword(v, param),
            format!(
                "required {} parameter `{}` is missing",
                param.location, param.name
            ),
        )
        .resolved_against(document_uri),
    );
}

/// Validate one extracted string value against its parameter declaration.
pub(crate) fn validate_value(
    v: &SpecValidator,
    param: &ParameterMeta,
    raw: &str,
    instance: String,
    document_uri: &str,
    errors: &mut Vec<ValidationError>,
    annotations: &mut Vec<Annotation>,
) {
    if let Some(schema_pointer) = &param.schema_pointer {
        let Some(schema) = v.document().resolve(schema_pointer) else {
            return;
        };
        let value = coerce::coerce_scalar(raw, schema);
        let outcome = v
            .evaluator()
            .evaluate(schema_pointer, &value, v.config().collect_annotations);
        absorb_outcome(
            outcome,
            ErrorKind::ParameterSchema,
            &instance,
            document_uri,
            errors,
            annotations,
        );
        return;
    }

    // A `content` parameter is an encoded body in miniature: decode with
    // the single declared media type, then evaluate its schema.
    let (Some(content_type), Some(schema_pointer)) =
        (&param.content_type, &param.content_schema_pointer)
    else {
        return;
    };
    let parsed = media::parse_content_type(content_type);
    let essence = parsed
        .as_ref()
        .map(|c| c.essence.clone())
        .unwrap_or_else(|| content_type.clone());
    let charset = parsed.as_ref().and_then(|c| c.charset.clone());

    let Some(decode) = v.media_types().decoder_for(&essence) else {
        errors.push(
            ValidationError::new(
                ErrorKind::NoMatchingContentType,
                instance,
                format!("{}/content", param.pointer),
                format!("no decoder for media type `{content_type}`"),
            )
            .resolved_against(document_uri),
        );
        return;
    };
    match decode(raw.as_bytes(), charset.as_deref()) {
        Ok(decoded) => {
            let decoded = match v.document().resolve(schema_pointer) {
                Some(schema) => coerce::coerce_value(decoded, schema),
                None => decoded,
            };
            let outcome = v
                .evaluator()
                .evaluate(schema_pointer, &decoded, v.config().collect_annotations);
            absorb_outcome(
                outcome,
                ErrorKind::ParameterSchema,
                &instance,
                document_uri,
                errors,
                annotations,
            );
        }
        Err(message) => errors.push(
            ValidationError::new(
                ErrorKind::DecodingFailed,
                instance,
                format!("{}/content", param.pointer),
                message,
            )
            .resolved_against(document_uri),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_query_keeps_first() {
        let q = first_value_query(Some("a=1&a=2&b=x%20y"));
        assert_eq!(q.get("a").map(String::as_str), Some("1"));
        assert_eq!(q.get("b").map(String::as_str), Some("x y"));
    }

    #[test]
    fn test_first_value_query_none() {
        assert!(first_value_query(None).is_empty());
    }
}
