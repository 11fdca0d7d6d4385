mod common;

use wirecheck::{ErrorKind, PathHints};

use common::{request, response, validator};

fn foo_path(v: &wirecheck::SpecValidator) -> wirecheck::PathMatch {
    let req = request(
        "POST",
        "/foo/bar",
        &[("Content-Type", "application/json")],
        br#"{"hello": "1"}"#,
    );
    v.find_path(Some(&req), &PathHints::new()).unwrap()
}

fn pet_path(v: &wirecheck::SpecValidator) -> wirecheck::PathMatch {
    let req = request("GET", "/pets/42?limit=1", &[], b"");
    v.find_path(Some(&req), &PathHints::new()).unwrap()
}

#[test]
fn test_successful_response() {
    let v = validator();
    let path = foo_path(&v);
    let resp = response(
        200,
        &[
            ("Content-Type", "application/json"),
            ("My-Response-Header", "123"),
        ],
        br#"{"status": "ok"}"#,
    );
    let result = v.validate_response(&resp, &path);
    assert!(result.is_valid(), "unexpected errors: {:?}", result.errors());
}

#[test]
fn test_missing_required_response_header() {
    let v = validator();
    let path = foo_path(&v);
    let resp = response(
        200,
        &[("Content-Type", "application/json")],
        br#"{"status": "ok"}"#,
    );
    let result = v.validate_response(&resp, &path);
    assert!(!result.is_valid());
    let error = &result.errors()[0];
    assert_eq!(error.kind, ErrorKind::MissingRequiredParameter);
    assert_eq!(
        error.instance_location,
        "/response/header/My-Response-Header"
    );
}

#[test]
fn test_response_header_lookup_is_case_insensitive() {
    let v = validator();
    let path = foo_path(&v);
    let resp = response(
        200,
        &[
            ("content-type", "application/json"),
            ("my-response-header", "123"),
        ],
        br#"{"status": "ok"}"#,
    );
    assert!(v.validate_response(&resp, &path).is_valid());
}

#[test]
fn test_status_with_no_entry_and_no_default() {
    let v = validator();
    let path = foo_path(&v);
    let resp = response(404, &[], b"");
    let result = v.validate_response(&resp, &path);
    assert!(!result.is_valid());
    let error = &result.errors()[0];
    assert_eq!(error.kind, ErrorKind::NoMatchingResponse);
    assert_eq!(
        error.keyword_location,
        "/paths/~1foo~1bar/post/responses"
    );
}

#[test]
fn test_default_response_fallback() {
    let v = validator();
    let path = pet_path(&v);
    let resp = response(
        503,
        &[("Content-Type", "application/json")],
        br#"{"message": "overloaded"}"#,
    );
    assert!(v.validate_response(&resp, &path).is_valid());
}

#[test]
fn test_response_body_schema_failure_maps_through_ref() {
    let v = validator();
    let path = pet_path(&v);
    // Pet requires `id`.
    let resp = response(
        200,
        &[("Content-Type", "application/json")],
        br#"{"name": "rex"}"#,
    );
    let result = v.validate_response(&resp, &path);
    assert!(!result.is_valid());
    let error = result
        .errors()
        .iter()
        .find(|e| e.kind == ErrorKind::BodySchema)
        .expect("schema error");
    assert!(error.instance_location.starts_with("/response/body"));
    assert!(
        error
            .keyword_location
            .starts_with("/components/schemas/Pet"),
        "keyword location should land in the referenced schema: {}",
        error.keyword_location
    );
}

#[test]
fn test_write_only_property_rejected_in_response() {
    let v = validator();
    let req = request(
        "POST",
        "/accounts",
        &[("Content-Type", "application/json")],
        br#"{"name": "alice"}"#,
    );
    let path = v.find_path(Some(&req), &PathHints::new()).unwrap();
    let resp = response(
        200,
        &[("Content-Type", "application/json")],
        br#"{"id": 1, "password": "hunter2"}"#,
    );
    let result = v.validate_response(&resp, &path);
    assert!(!result.is_valid());
    let error = &result.errors()[0];
    assert_eq!(error.kind, ErrorKind::WriteOnlyInResponse);
    assert_eq!(error.instance_location, "/response/body/password");
    assert_eq!(
        error.keyword_location,
        "/components/schemas/Account/properties/password/writeOnly"
    );
}

#[test]
fn test_read_only_property_allowed_in_response() {
    let v = validator();
    let req = request(
        "POST",
        "/accounts",
        &[("Content-Type", "application/json")],
        br#"{"name": "alice"}"#,
    );
    let path = v.find_path(Some(&req), &PathHints::new()).unwrap();
    let resp = response(
        200,
        &[("Content-Type", "application/json")],
        br#"{"id": 1, "name": "alice"}"#,
    );
    let result = v.validate_response(&resp, &path);
    assert!(result.is_valid(), "unexpected errors: {:?}", result.errors());
}

#[test]
fn test_empty_response_body_is_not_dispatched() {
    let v = validator();
    let path = pet_path(&v);
    let resp = response(200, &[("Content-Type", "application/json")], b"");
    assert!(v.validate_response(&resp, &path).is_valid());
}

#[test]
fn test_response_content_type_mismatch() {
    let v = validator();
    let path = pet_path(&v);
    let resp = response(200, &[("Content-Type", "text/html")], b"<html></html>");
    let result = v.validate_response(&resp, &path);
    assert!(!result.is_valid());
    let error = &result.errors()[0];
    assert_eq!(error.kind, ErrorKind::NoMatchingContentType);
    assert_eq!(error.instance_location, "/response/header/Content-Type");
}

#[test]
fn test_paired_request_response_share_one_path_match() {
    let v = validator();
    let req = request(
        "POST",
        "/foo/bar",
        &[("Content-Type", "application/json")],
        br#"{"hello": "1"}"#,
    );
    let path = v.find_path(Some(&req), &PathHints::new()).unwrap();
    assert!(v.validate_request(&req, Some(&path)).is_valid());
    let resp = response(
        200,
        &[
            ("Content-Type", "application/json"),
            ("My-Response-Header", "123"),
        ],
        br#"{"status": "ok"}"#,
    );
    assert!(v.validate_response(&resp, &path).is_valid());
}
