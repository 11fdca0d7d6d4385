use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use super::build::build_indexes;
use super::types::{Document, LoadError};

/// Load an OpenAPI document from a file.
///
/// Supports both YAML and JSON, selected by extension. The file path
/// becomes the document identifier (`openapi_uri`); a relative path is
/// resolved against the request Host at validation time.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML/JSON, or
/// fails structural indexing (duplicate capture names, duplicate
/// `operationId`s, missing `paths`).
pub fn load_document(path: impl AsRef<Path>) -> anyhow::Result<Document> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false);
    let value: Value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(Document::from_value(value, path.display().to_string())?)
}

impl Document {
    /// Index an already-parsed OpenAPI tree.
    ///
    /// `openapi_uri` is the document identifier used for
    /// `absoluteKeywordLocation`; it may be relative.
    pub fn from_value(root: Value, openapi_uri: impl Into<String>) -> Result<Self, LoadError> {
        let (templates, operation_index, base_path) = build_indexes(&root)?;
        Ok(Document {
            root: Arc::new(root),
            openapi_uri: openapi_uri.into(),
            templates,
            operation_index,
            base_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_indexes_templates_in_document_order() {
        let doc = Document::from_value(
            json!({
                "paths": {
                    "/pets/special": {"get": {"responses": {}}},
                    "/pets/{id}": {"get": {"responses": {}}}
                }
            }),
            "openapi.json",
        )
        .unwrap();
        let templates: Vec<_> = doc.templates().iter().map(|t| t.template.as_str()).collect();
        assert_eq!(templates, vec!["/pets/special", "/pets/{id}"]);
    }

    #[test]
    fn test_missing_paths_is_fatal() {
        let err = Document::from_value(json!({"openapi": "3.1.0"}), "doc.json").unwrap_err();
        assert!(matches!(err, LoadError::MissingPaths));
    }

    #[test]
    fn test_duplicate_capture_name_is_fatal() {
        let err = Document::from_value(
            json!({"paths": {"/x/{id}/y/{id}": {"get": {"responses": {}}}}}),
            "doc.json",
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::DuplicateCaptureName { .. }));
    }
}
