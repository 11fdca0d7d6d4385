//! # Document Linter
//!
//! Non-fatal conventions checks over an indexed document. Structural
//! problems that would make validation unsound (duplicate capture names,
//! duplicate `operationId`s) are already fatal at load time; the linter
//! reports the rest:
//!
//! 1. Template variables with no matching path parameter declaration
//! 2. Declared path parameters absent from the template
//! 3. Operations without any response entry
//! 4. Duplicate `(name, in)` pairs within one parameter list
//! 5. Operations without an `operationId`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wirecheck::lint::lint_document;
//!
//! for issue in lint_document(&document) {
//!     eprintln!("[{}] {}: {}", issue.severity, issue.location, issue.message);
//! }
//! ```

use serde_json::Value;
use std::collections::HashSet;

use crate::spec::{Document, ParameterLocation};

/// Severity level for lint issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Will produce wrong or surprising validation results.
    Error,
    /// Legal but likely unintended.
    Warning,
    /// Best practice suggestion.
    Info,
}

impl std::fmt::Display for LintSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LintSeverity::Error => "Error",
            LintSeverity::Warning => "Warning",
            LintSeverity::Info => "Info",
        };
        write!(f, "{s}")
    }
}

/// A lint issue found in a document.
#[derive(Debug, Clone)]
pub struct LintIssue {
    /// Where the issue occurred, e.g. `/pets/{id} -> get`.
    pub location: String,
    pub severity: LintSeverity,
    /// Issue kind, e.g. `undeclared_template_variable`.
    pub kind: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl LintIssue {
    pub fn new(
        location: impl Into<String>,
        severity: LintSeverity,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LintIssue {
            location: location.into(),
            severity,
            kind: kind.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Lint an indexed document.
pub fn lint_document(doc: &Document) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    for template in doc.templates() {
        for operation in template.operations() {
            let location = format!("{} -> {}", template.template, operation.method);

            if operation.operation_id.is_none() {
                issues.push(
                    LintIssue::new(
                        &location,
                        LintSeverity::Warning,
                        "missing_operation_id",
                        "operation has no operationId",
                    )
                    .with_suggestion("add an operationId so callers can route by it"),
                );
            }

            if operation.responses.is_empty() {
                issues.push(LintIssue::new(
                    &location,
                    LintSeverity::Warning,
                    "no_responses",
                    "operation declares no responses; response validation will always fail",
                ));
            }

            let declared: HashSet<&str> = operation
                .parameters
                .iter()
                .filter(|p| p.location == ParameterLocation::Path)
                .map(|p| p.name.as_str())
                .collect();

            for name in &template.capture_names {
                if !declared.contains(name.as_str()) {
                    issues.push(
                        LintIssue::new(
                            &location,
                            LintSeverity::Warning,
                            "undeclared_template_variable",
                            format!("template variable `{{{name}}}` has no path parameter declaration"),
                        )
                        .with_suggestion(format!(
                            "declare `{name}` with `in: path` and `required: true`"
                        )),
                    );
                }
            }

            for param in &operation.parameters {
                if param.location == ParameterLocation::Path
                    && !template.capture_names.iter().any(|n| n == &param.name)
                {
                    issues.push(LintIssue::new(
                        &location,
                        LintSeverity::Error,
                        "parameter_not_in_template",
                        format!(
                            "path parameter `{}` does not appear in template `{}`",
                            param.name, template.template
                        ),
                    ));
                }
            }

            lint_duplicate_pairs(doc, &operation.pointer, &location, &mut issues);
        }

        lint_duplicate_pairs(doc, &template.pointer, &template.template, &mut issues);
    }

    issues
}

/// Duplicate `(name, in)` pairs within one raw `parameters` list. Across
/// levels a duplicate is a legal override; within one list it is not.
fn lint_duplicate_pairs(
    doc: &Document,
    owner_pointer: &str,
    location: &str,
    issues: &mut Vec<LintIssue>,
) {
    let Some(list) = doc
        .resolve(&format!("{owner_pointer}/parameters"))
        .and_then(Value::as_array)
    else {
        return;
    };
    let mut seen = HashSet::new();
    for param in list {
        let (Some(name), Some(loc)) = (
            param.get("name").and_then(Value::as_str),
            param.get("in").and_then(Value::as_str),
        ) else {
            continue;
        };
        if !seen.insert((name.to_string(), loc.to_string())) {
            issues.push(LintIssue::new(
                location,
                LintSeverity::Error,
                "duplicate_parameter",
                format!("parameter `{name}` in `{loc}` is declared twice in one list"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_document_has_no_issues() {
        let doc = Document::from_value(
            json!({
                "paths": {
                    "/pets/{id}": {
                        "get": {
                            "operationId": "get_pet",
                            "parameters": [
                                {"name": "id", "in": "path", "required": true,
                                 "schema": {"type": "string"}}
                            ],
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }),
            "doc.json",
        )
        .unwrap();
        assert!(lint_document(&doc).is_empty());
    }

    #[test]
    fn test_undeclared_template_variable() {
        let doc = Document::from_value(
            json!({
                "paths": {
                    "/pets/{id}": {
                        "get": {
                            "operationId": "get_pet",
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }),
            "doc.json",
        )
        .unwrap();
        let issues = lint_document(&doc);
        assert!(issues
            .iter()
            .any(|i| i.kind == "undeclared_template_variable"));
    }

    #[test]
    fn test_path_parameter_not_in_template() {
        let doc = Document::from_value(
            json!({
                "paths": {
                    "/pets": {
                        "get": {
                            "operationId": "list_pets",
                            "parameters": [
                                {"name": "id", "in": "path", "required": true,
                                 "schema": {"type": "string"}}
                            ],
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }),
            "doc.json",
        )
        .unwrap();
        let issues = lint_document(&doc);
        assert!(issues.iter().any(|i| i.kind == "parameter_not_in_template"
            && i.severity == LintSeverity::Error));
    }

    #[test]
    fn test_duplicate_parameter_in_one_list() {
        let doc = Document::from_value(
            json!({
                "paths": {
                    "/pets": {
                        "get": {
                            "operationId": "list_pets",
                            "parameters": [
                                {"name": "limit", "in": "query", "schema": {"type": "integer"}},
                                {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                            ],
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }),
            "doc.json",
        )
        .unwrap();
        let issues = lint_document(&doc);
        assert!(issues.iter().any(|i| i.kind == "duplicate_parameter"));
    }

    #[test]
    fn test_missing_operation_id_and_responses() {
        let doc = Document::from_value(
            json!({"paths": {"/x": {"get": {}}}}),
            "doc.json",
        )
        .unwrap();
        let issues = lint_document(&doc);
        assert!(issues.iter().any(|i| i.kind == "missing_operation_id"));
        assert!(issues.iter().any(|i| i.kind == "no_responses"));
    }
}
