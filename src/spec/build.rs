use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use super::types::{
    LoadError, OperationMeta, ParameterLocation, ParameterMeta, ParameterStyle, TemplateMeta,
};
use crate::router::path_to_regex;
use crate::uri::append_token;

/// HTTP methods recognized as operations on a path item. Other keys
/// (`summary`, `parameters`, extensions) are not operations.
const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Follow a `$ref` to its target inside the same document, returning the
/// target's pointer and value. Non-fragment and unresolvable refs are left
/// in place.
fn deref<'a>(root: &'a Value, pointer: String, value: &'a Value) -> (String, &'a Value) {
    if let Some(ref_path) = value.get("$ref").and_then(Value::as_str) {
        if let Some(fragment) = ref_path.strip_prefix('#') {
            if let Some(target) = root.pointer(fragment) {
                return (fragment.to_string(), target);
            }
        }
    }
    (pointer, value)
}

/// Extract the path component of `servers[0].url` for optional base-path
/// matching. Relative server URLs parse against a dummy scheme.
fn extract_base_path(root: &Value) -> Option<String> {
    let url_str = root.pointer("/servers/0/url")?.as_str()?;
    let parsed = url::Url::parse(url_str)
        .or_else(|_| url::Url::parse(&format!("http://dummy{url_str}")))
        .ok()?;
    let path = parsed.path().trim_end_matches('/');
    if path.is_empty() || path == "/" {
        None
    } else {
        Some(path.to_string())
    }
}

/// Extract parameter metadata from a `parameters` array, resolving `$ref`
/// entries so every pointer lands on a concrete parameter object.
fn extract_parameters(root: &Value, owner_pointer: &str, owner: &Value) -> Vec<ParameterMeta> {
    let Some(list) = owner.get("parameters").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (i, raw) in list.iter().enumerate() {
        let pointer = format!("{owner_pointer}/parameters/{i}");
        let (pointer, param) = deref(root, pointer, raw);

        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(location) = param
            .get("in")
            .and_then(Value::as_str)
            .and_then(ParameterLocation::parse)
        else {
            continue;
        };

        let required = param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(location == ParameterLocation::Path);
        let style = param
            .get("style")
            .and_then(Value::as_str)
            .and_then(ParameterStyle::parse);
        let explode = param.get("explode").and_then(Value::as_bool);

        let schema_pointer = param
            .get("schema")
            .map(|_| format!("{pointer}/schema"));
        let (content_type, content_schema_pointer) = param
            .get("content")
            .and_then(Value::as_object)
            .and_then(|content| content.keys().next())
            .map(|media_type| {
                let schema_ptr = append_token(&format!("{pointer}/content"), media_type) + "/schema";
                (Some(media_type.clone()), Some(schema_ptr))
            })
            .unwrap_or((None, None));

        out.push(ParameterMeta {
            name: name.to_string(),
            location,
            required,
            style,
            explode,
            pointer,
            schema_pointer,
            content_type,
            content_schema_pointer,
        });
    }
    out
}

/// Merge operation-level parameters over path-level ones; the operation
/// wins on a `(name, in)` collision.
fn merge_parameters(
    path_level: &[ParameterMeta],
    operation_level: Vec<ParameterMeta>,
) -> Vec<ParameterMeta> {
    let mut merged: Vec<ParameterMeta> = path_level.to_vec();
    for param in operation_level {
        if let Some(existing) = merged
            .iter_mut()
            .find(|p| p.name == param.name && p.location == param.location)
        {
            *existing = param;
        } else {
            merged.push(param);
        }
    }
    merged
}

fn build_operation(
    root: &Value,
    item_pointer: &str,
    method: &str,
    operation: &Value,
    path_params: &[ParameterMeta],
) -> OperationMeta {
    let pointer = format!("{item_pointer}/{method}");
    let operation_id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let parameters = merge_parameters(
        path_params,
        extract_parameters(root, &pointer, operation),
    );

    let (request_body_pointer, request_body_required) = match operation.get("requestBody") {
        Some(raw) => {
            let (rb_pointer, rb) = deref(root, format!("{pointer}/requestBody"), raw);
            let required = rb.get("required").and_then(Value::as_bool).unwrap_or(false);
            (Some(rb_pointer), required)
        }
        None => (None, false),
    };

    let responses = operation
        .get("responses")
        .and_then(Value::as_object)
        .map(|responses| {
            responses
                .iter()
                .map(|(status, raw)| {
                    let ptr = append_token(&format!("{pointer}/responses"), status);
                    let (ptr, _) = deref(root, ptr, raw);
                    (status.clone(), ptr)
                })
                .collect()
        })
        .unwrap_or_default();

    OperationMeta {
        method: method.to_string(),
        pointer,
        operation_id,
        parameters,
        request_body_pointer,
        request_body_required,
        responses,
    }
}

type Indexes = (
    Vec<TemplateMeta>,
    HashMap<String, (usize, String)>,
    Option<String>,
);

/// Build the path-template and operation indexes for a document.
///
/// Templates keep document order so request-time matching can honor
/// first-match-wins. Duplicate capture names within one template and
/// duplicate `operationId`s across the document are fatal.
pub(crate) fn build_indexes(root: &Value) -> Result<Indexes, LoadError> {
    let Some(paths) = root.get("paths").and_then(Value::as_object) else {
        return Err(LoadError::MissingPaths);
    };

    let base_path = extract_base_path(root);
    let mut templates = Vec::with_capacity(paths.len());
    let mut operation_index: HashMap<String, (usize, String)> = HashMap::new();

    for (template, raw_item) in paths {
        let item_pointer = append_token("/paths", template);
        let (item_pointer, item) = deref(root, item_pointer, raw_item);
        let (regex, capture_names) = path_to_regex(template)?;

        let path_params = extract_parameters(root, &item_pointer, item);
        let mut operations = Vec::new();
        for method in METHODS {
            let Some(operation) = item.get(method) else {
                continue;
            };
            let meta = build_operation(root, &item_pointer, method, operation, &path_params);
            if let Some(id) = &meta.operation_id {
                let slot = (templates.len(), method.to_string());
                if operation_index.insert(id.clone(), slot).is_some() {
                    return Err(LoadError::DuplicateOperationId { id: id.clone() });
                }
            }
            operations.push(meta);
        }

        templates.push(TemplateMeta {
            template: template.clone(),
            pointer: item_pointer,
            regex,
            capture_names,
            operations,
        });
    }

    info!(
        templates = templates.len(),
        operations = templates.iter().map(|t| t.operations.len()).sum::<usize>(),
        base_path = base_path.as_deref().unwrap_or(""),
        "OpenAPI document indexed"
    );

    Ok((templates, operation_index, base_path))
}
