#![allow(dead_code)]

use serde_json::{json, Value};
use wirecheck::{Document, SpecValidator};

/// Fixture document shared by the integration suites: a small API with
/// typed path/query/header parameters, `$ref` schemas, readOnly/writeOnly
/// properties, a wildcard media type and a `false` schema.
pub fn fixture() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {"title": "Pet Store", "version": "1.0.0"},
        "servers": [{"url": "https://api.example.com/v1"}],
        "paths": {
            "/foo/bar": {
                "post": {
                    "operationId": "create_foo",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "hello": {"type": "string", "pattern": "^[0-9]+$"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "ok",
                            "headers": {
                                "My-Response-Header": {
                                    "required": true,
                                    "schema": {"type": "string"}
                                }
                            },
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {"status": {"type": "string"}}
                                    }
                                }
                            }
                        }
                    }
                },
                "get": {
                    "operationId": "get_foo",
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/pets/{petId}": {
                "parameters": [
                    {"name": "petId", "in": "path", "required": true,
                     "schema": {"type": "integer"}}
                ],
                "get": {
                    "operationId": "get_pet",
                    "parameters": [
                        {"name": "limit", "in": "query", "required": true,
                         "schema": {"type": "integer"}},
                        {"name": "X-Request-Id", "in": "header",
                         "schema": {"type": "string", "minLength": 3}},
                        {"name": "Authorization", "in": "header", "required": true,
                         "schema": {"type": "string"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Pet"}
                                }
                            }
                        },
                        "default": {
                            "description": "error",
                            "content": {
                                "application/json": {"schema": {"type": "object"}}
                            }
                        }
                    }
                }
            },
            "/upload": {
                "post": {
                    "operationId": "upload_blob",
                    "requestBody": {
                        "content": {"*/*": {"schema": {"type": "object"}}}
                    },
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/forbidden": {
                "post": {
                    "operationId": "forbidden_op",
                    "requestBody": {
                        "content": {"application/json": {"schema": false}}
                    },
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/accounts": {
                "post": {
                    "operationId": "create_account",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/Account"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Account"}
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Pet": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer"},
                        "name": {"type": "string"}
                    },
                    "required": ["id"]
                },
                "Account": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "readOnly": true},
                        "password": {"type": "string", "writeOnly": true},
                        "name": {"type": "string"}
                    }
                }
            }
        }
    })
}

pub fn document() -> Document {
    Document::from_value(fixture(), "openapi.json").expect("fixture document is well-formed")
}

pub fn validator() -> SpecValidator {
    SpecValidator::new(document())
}

/// Build an `http::Request` with a byte body.
pub fn request(
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> http::Request<Vec<u8>> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body.to_vec()).expect("request builds")
}

/// Build an `http::Response` with a byte body.
pub fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> http::Response<Vec<u8>> {
    let mut builder = http::Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body.to_vec()).expect("response builds")
}
