//! # Schema Evaluator
//!
//! Adapter over the `jsonschema` crate that evaluates any subschema of the
//! OpenAPI document addressed by JSON pointer.
//!
//! The whole document is registered as a schema resource and each
//! subschema is compiled as a `$ref` wrapper pointing into it, so
//! `#/components/...` references resolve in place and every reported
//! keyword location can be traced back to a pointer inside the original
//! document.
//!
//! Compiled validators are cached per subschema pointer. The cache is
//! read-mostly: a read lock on the fast path, a write lock with a
//! double-check on first compilation. Validators are `Arc`-wrapped so
//! concurrent validations share them.
//!
//! The evaluator also owns the `readOnly`/`writeOnly` policy walk. That
//! walk follows `$ref` chains through the document and keeps an active set
//! of `(schema pointer, instance pointer)` pairs; re-entering a pair is
//! reported as an infinite-recursion error record rather than overflowing
//! the stack.

use jsonschema::{BasicOutput, Draft, Resource, Validator};
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

use crate::uri::{append_token, encode_fragment, pointer_tokens};

/// Internal identifier under which the document is registered as a schema
/// resource.
pub(crate) const DOCUMENT_RESOURCE_URI: &str = "urn:wirecheck:document";

/// One schema evaluation error, locations still relative: `instance` to
/// the evaluated instance root, `keyword` a pointer into the document.
#[derive(Debug, Clone)]
pub(crate) struct EvalError {
    pub instance: String,
    pub keyword: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub(crate) struct EvalAnnotation {
    pub instance: String,
    pub keyword: String,
    pub value: Value,
}

#[derive(Debug, Default)]
pub(crate) struct EvalOutcome {
    pub errors: Vec<EvalError>,
    pub annotations: Vec<EvalAnnotation>,
}

/// Which access-policy keyword applies to the message being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessMode {
    /// Request bodies reject `readOnly: true` values.
    Request,
    /// Response bodies reject `writeOnly: true` values.
    Response,
}

impl AccessMode {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            AccessMode::Request => "readOnly",
            AccessMode::Response => "writeOnly",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AccessViolation {
    /// Pointer relative to the evaluated instance root.
    pub instance: String,
    /// Pointer to the offending `readOnly`/`writeOnly` keyword.
    pub keyword: String,
}

/// Thread-safe evaluator for subschemas of one document.
pub(crate) struct SchemaEvaluator {
    root: Arc<Value>,
    cache: RwLock<HashMap<String, Arc<Validator>>>,
    cache_enabled: bool,
}

impl SchemaEvaluator {
    pub(crate) fn new(root: Arc<Value>, cache_enabled: bool) -> Self {
        SchemaEvaluator {
            root,
            cache: RwLock::new(HashMap::new()),
            cache_enabled,
        }
    }

    fn compile_uncached(&self, pointer: &str) -> Result<Validator, String> {
        let wrapper = json!({
            "$ref": format!("{DOCUMENT_RESOURCE_URI}#{}", encode_fragment(pointer))
        });
        let resource =
            Resource::from_contents((*self.root).clone()).map_err(|e| e.to_string())?;
        jsonschema::options()
            .with_draft(Draft::Draft202012)
            .with_resource(DOCUMENT_RESOURCE_URI, resource)
            .build(&wrapper)
            .map_err(|e| e.to_string())
    }

    /// Get a cached validator or compile and cache one.
    fn compile(&self, pointer: &str) -> Result<Arc<Validator>, String> {
        if !self.cache_enabled {
            return self.compile_uncached(pointer).map(Arc::new);
        }

        {
            let cache = self
                .cache
                .read()
                .map_err(|_| "validator cache lock poisoned".to_string())?;
            if let Some(validator) = cache.get(pointer) {
                debug!(schema = pointer, "Schema validator cache hit");
                return Ok(Arc::clone(validator));
            }
        }

        let validator = Arc::new(self.compile_uncached(pointer)?);
        let mut cache = self
            .cache
            .write()
            .map_err(|_| "validator cache lock poisoned".to_string())?;
        // Another thread may have compiled while we waited for the lock.
        if let Some(existing) = cache.get(pointer) {
            return Ok(Arc::clone(existing));
        }
        cache.insert(pointer.to_string(), Arc::clone(&validator));
        debug!(
            schema = pointer,
            cache_size = cache.len(),
            "Schema validator compiled and cached"
        );
        Ok(validator)
    }

    /// Evaluate an instance against the subschema at `pointer`.
    ///
    /// Keyword locations in the outcome are pointers into the document;
    /// instance locations are relative to the evaluated instance and are
    /// prefixed by the caller (`/request/body`, a parameter location,
    /// and so on).
    pub(crate) fn evaluate(
        &self,
        pointer: &str,
        instance: &Value,
        collect_annotations: bool,
    ) -> EvalOutcome {
        let validator = match self.compile(pointer) {
            Ok(v) => v,
            Err(message) => {
                error!(schema = pointer, error = %message, "Subschema failed to compile");
                return EvalOutcome {
                    errors: vec![EvalError {
                        instance: String::new(),
                        keyword: pointer.to_string(),
                        message: format!("schema compilation failed: {message}"),
                    }],
                    annotations: Vec::new(),
                };
            }
        };

        match validator.apply(instance).basic() {
            BasicOutput::Valid(units) => {
                let annotations = if collect_annotations {
                    units
                        .into_iter()
                        .map(|unit| EvalAnnotation {
                            instance: unit.instance_location().to_string(),
                            keyword: self
                                .map_keyword_location(pointer, &unit.keyword_location().to_string()),
                            value: serde_json::to_value(unit.value()).unwrap_or(Value::Null),
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                EvalOutcome {
                    errors: Vec::new(),
                    annotations,
                }
            }
            BasicOutput::Invalid(units) => EvalOutcome {
                errors: units
                    .into_iter()
                    .map(|unit| EvalError {
                        instance: unit.instance_location().to_string(),
                        keyword: self
                            .map_keyword_location(pointer, &unit.keyword_location().to_string()),
                        message: unit.error_description().to_string(),
                    })
                    .collect(),
                annotations: Vec::new(),
            },
        }
    }

    /// Translate a dynamic keyword location (which walks through `$ref`
    /// steps) into a pointer inside the document.
    ///
    /// The compiled schema is a `$ref` wrapper, so the first `$ref` step
    /// lands on `base_pointer`; later `$ref` steps are resolved by reading
    /// the reference value at the current position.
    fn map_keyword_location(&self, base_pointer: &str, dynamic: &str) -> String {
        let mut current: Option<String> = None;
        for token in pointer_tokens(dynamic) {
            if token == "$ref" || token == "$dynamicRef" {
                let target = match &current {
                    None => Some(base_pointer.to_string()),
                    Some(at) => self
                        .root
                        .pointer(at)
                        .and_then(|schema| schema.get(token.as_str()))
                        .and_then(Value::as_str)
                        .and_then(|reference| reference.split('#').nth(1))
                        .map(|fragment| {
                            percent_decode_str(fragment).decode_utf8_lossy().into_owned()
                        }),
                };
                current = Some(target.unwrap_or_else(|| {
                    append_token(current.as_deref().unwrap_or(base_pointer), &token)
                }));
            } else {
                let base = current.clone().unwrap_or_else(|| base_pointer.to_string());
                current = Some(append_token(&base, &token));
            }
        }
        current.unwrap_or_else(|| base_pointer.to_string())
    }

    /// Collect `readOnly`/`writeOnly` violations for an instance.
    ///
    /// Descends `properties`, `prefixItems`/`items`,
    /// `additionalProperties`, `allOf` and `$ref`. `anyOf`/`oneOf`
    /// branches are not guessed, to avoid policy errors from branches
    /// that did not apply.
    pub(crate) fn access_violations(
        &self,
        pointer: &str,
        instance: &Value,
        mode: AccessMode,
    ) -> Result<Vec<AccessViolation>, EvalError> {
        let mut violations = Vec::new();
        let mut active = HashSet::new();
        self.walk_access(pointer, instance, "", mode, &mut active, &mut violations)?;
        Ok(violations)
    }

    fn walk_access(
        &self,
        schema_pointer: &str,
        instance: &Value,
        instance_pointer: &str,
        mode: AccessMode,
        active: &mut HashSet<(String, String)>,
        out: &mut Vec<AccessViolation>,
    ) -> Result<(), EvalError> {
        let Some(schema) = self.root.pointer(schema_pointer) else {
            return Ok(());
        };
        // Boolean schemas carry no access flags.
        let Some(schema_obj) = schema.as_object() else {
            return Ok(());
        };

        let key = (schema_pointer.to_string(), instance_pointer.to_string());
        if !active.insert(key.clone()) {
            return Err(EvalError {
                instance: instance_pointer.to_string(),
                keyword: schema_pointer.to_string(),
                message: format!(
                    "infinite recursion: re-entered schema `{schema_pointer}` at instance `{instance_pointer}`"
                ),
            });
        }

        let result = (|| {
            if schema_obj.get(mode.keyword()).and_then(Value::as_bool) == Some(true) {
                out.push(AccessViolation {
                    instance: instance_pointer.to_string(),
                    keyword: append_token(schema_pointer, mode.keyword()),
                });
            }

            if let Some(reference) = schema_obj.get("$ref").and_then(Value::as_str) {
                if let Some(fragment) = reference.split('#').nth(1) {
                    let target = percent_decode_str(fragment).decode_utf8_lossy().into_owned();
                    self.walk_access(&target, instance, instance_pointer, mode, active, out)?;
                }
            }

            if let Some(all_of) = schema_obj.get("allOf").and_then(Value::as_array) {
                for i in 0..all_of.len() {
                    let branch = format!("{schema_pointer}/allOf/{i}");
                    self.walk_access(&branch, instance, instance_pointer, mode, active, out)?;
                }
            }

            match instance {
                Value::Object(fields) => {
                    let properties = schema_obj.get("properties").and_then(Value::as_object);
                    let additional = schema_obj
                        .get("additionalProperties")
                        .map(Value::is_object)
                        .unwrap_or(false);
                    for (name, value) in fields {
                        let child_instance = append_token(instance_pointer, name);
                        if properties.map_or(false, |p| p.contains_key(name)) {
                            let child_schema =
                                append_token(&append_token(schema_pointer, "properties"), name);
                            self.walk_access(
                                &child_schema,
                                value,
                                &child_instance,
                                mode,
                                active,
                                out,
                            )?;
                        } else if additional {
                            let child_schema =
                                append_token(schema_pointer, "additionalProperties");
                            self.walk_access(
                                &child_schema,
                                value,
                                &child_instance,
                                mode,
                                active,
                                out,
                            )?;
                        }
                    }
                }
                Value::Array(elements) => {
                    let prefix_len = schema_obj
                        .get("prefixItems")
                        .and_then(Value::as_array)
                        .map(Vec::len)
                        .unwrap_or(0);
                    let has_items = schema_obj.get("items").map(Value::is_object).unwrap_or(false);
                    for (i, value) in elements.iter().enumerate() {
                        let child_instance = format!("{instance_pointer}/{i}");
                        if i < prefix_len {
                            let child_schema = format!("{schema_pointer}/prefixItems/{i}");
                            self.walk_access(
                                &child_schema,
                                value,
                                &child_instance,
                                mode,
                                active,
                                out,
                            )?;
                        } else if has_items {
                            let child_schema = append_token(schema_pointer, "items");
                            self.walk_access(
                                &child_schema,
                                value,
                                &child_instance,
                                mode,
                                active,
                                out,
                            )?;
                        }
                    }
                }
                _ => {}
            }
            Ok(())
        })();

        active.remove(&key);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator(root: Value) -> SchemaEvaluator {
        SchemaEvaluator::new(Arc::new(root), true)
    }

    #[test]
    fn test_map_keyword_location_through_wrapper_ref() {
        let ev = evaluator(json!({
            "components": {"schemas": {"Pet": {"type": "object"}}}
        }));
        let mapped = ev.map_keyword_location("/components/schemas/Pet", "/$ref/type");
        assert_eq!(mapped, "/components/schemas/Pet/type");
    }

    #[test]
    fn test_map_keyword_location_follows_component_refs() {
        let ev = evaluator(json!({
            "paths": {
                "/x": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "properties": {
                                            "pet": {"$ref": "#/components/schemas/Pet"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {"schemas": {"Pet": {"type": "object"}}}
        }));
        let base = "/paths/~1x/post/requestBody/content/application~1json/schema";
        let mapped =
            ev.map_keyword_location(base, "/$ref/properties/pet/$ref/type");
        assert_eq!(mapped, "/components/schemas/Pet/type");
    }

    #[test]
    fn test_read_only_violation_found() {
        let ev = evaluator(json!({
            "schema": {
                "type": "object",
                "properties": {
                    "id": {"type": "integer", "readOnly": true},
                    "name": {"type": "string"}
                }
            }
        }));
        let violations = ev
            .access_violations("/schema", &json!({"id": 1, "name": "x"}), AccessMode::Request)
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].instance, "/id");
        assert_eq!(violations[0].keyword, "/schema/properties/id/readOnly");
    }

    #[test]
    fn test_write_only_ignored_in_request_mode() {
        let ev = evaluator(json!({
            "schema": {
                "type": "object",
                "properties": {"secret": {"type": "string", "writeOnly": true}}
            }
        }));
        let violations = ev
            .access_violations("/schema", &json!({"secret": "x"}), AccessMode::Request)
            .unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn test_recursive_ref_detected() {
        let ev = evaluator(json!({
            "components": {
                "schemas": {
                    "Node": {"$ref": "#/components/schemas/Node"}
                }
            }
        }));
        let err = ev
            .access_violations(
                "/components/schemas/Node",
                &json!({"next": null}),
                AccessMode::Request,
            )
            .unwrap_err();
        assert!(err.message.contains("infinite recursion"));
    }

    #[test]
    fn test_recursive_schema_on_distinct_instances_is_fine() {
        // A list schema that refs itself is only a cycle if the instance
        // pointer stops advancing.
        let ev = evaluator(json!({
            "components": {
                "schemas": {
                    "List": {
                        "type": "object",
                        "properties": {
                            "value": {"type": "integer", "readOnly": true},
                            "next": {"$ref": "#/components/schemas/List"}
                        }
                    }
                }
            }
        }));
        let violations = ev
            .access_violations(
                "/components/schemas/List",
                &json!({"value": 1, "next": {"value": 2, "next": null}}),
                AccessMode::Request,
            )
            .unwrap();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].instance, "/value");
        assert_eq!(violations[1].instance, "/next/value");
    }
}
