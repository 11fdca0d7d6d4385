//! JSON pointer and document URI helpers.
//!
//! Keyword locations are JSON pointers into the OpenAPI document. When an
//! absolute form is needed (`absoluteKeywordLocation`), a relative document
//! URI is resolved against `https://<Host>/` using the request's Host header
//! and the pointer is carried as a percent-encoded URI fragment.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters that must be percent-encoded inside a URI fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'^')
    .add(b'\\')
    .add(b'|')
    .add(b'[')
    .add(b']');

/// Escape a single JSON pointer token (`~` to `~0`, `/` to `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Append one token to a JSON pointer, escaping it as needed.
pub fn append_token(pointer: &str, token: &str) -> String {
    format!("{pointer}/{}", escape_token(token))
}

/// Split a JSON pointer into unescaped tokens. The empty pointer has none.
pub fn pointer_tokens(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .split('/')
        .skip(1)
        .map(unescape_token)
        .collect()
}

/// Resolve the document identifier against the request Host.
///
/// A relative `openapi_uri` (e.g. `./openapi.yaml`) resolves against
/// `https://<host>/`. Absolute identifiers and identifiers without a host to
/// resolve against are returned unchanged.
pub fn resolve_document_uri(openapi_uri: &str, host: Option<&str>) -> String {
    if url::Url::parse(openapi_uri).is_ok() {
        return openapi_uri.to_string();
    }
    let Some(host) = host else {
        return openapi_uri.to_string();
    };
    url::Url::parse(&format!("https://{host}/"))
        .ok()
        .and_then(|base| base.join(openapi_uri).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| openapi_uri.to_string())
}

/// Percent-encode a JSON pointer for use as a URI fragment.
pub fn encode_fragment(pointer: &str) -> String {
    utf8_percent_encode(pointer, FRAGMENT).to_string()
}

/// Build an `absoluteKeywordLocation`: document URI plus encoded fragment.
pub fn absolute_keyword_location(document_uri: &str, pointer: &str) -> String {
    format!("{document_uri}#{}", encode_fragment(pointer))
}
