//! # Media Type Registry
//!
//! Matches message Content-Types against the media-type keys of an OpenAPI
//! `content` section and decodes payloads into JSON values for schema
//! evaluation.
//!
//! Matching is case-insensitive on type and subtype; parameters after `;`
//! are stripped, except `charset` which is kept for decoding. Precedence is
//! exact match, then `type/*`, then `*/*`. A `*/*` key in a document
//! matches any Content-Type so content-agnostic checks (e.g. length) can
//! still run.
//!
//! Built-in decoders cover `application/json`, `application/*+json`,
//! `text/*` and `application/x-www-form-urlencoded`, plus a `*/*` fallback
//! that attempts JSON and falls back to plain text. Additional
//! `(pattern, decoder)` entries can be registered per validator.

use once_cell::sync::Lazy;
use serde_json::Value;

/// Decode a payload into a JSON value. The second argument is the charset
/// from the Content-Type, if any.
pub type DecodeFn = fn(&[u8], Option<&str>) -> Result<Value, String>;

/// A parsed Content-Type: lower-cased `type/subtype` plus optional charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub essence: String,
    pub charset: Option<String>,
}

/// Parse a Content-Type header value. Returns `None` on syntax errors.
pub fn parse_content_type(raw: &str) -> Option<ContentType> {
    let mut parts = raw.trim().split(';');
    let essence = parts.next()?.trim().to_ascii_lowercase();
    let (ty, subtype) = essence.split_once('/')?;
    if ty.is_empty() || subtype.is_empty() || subtype.contains('/') {
        return None;
    }
    let charset = parts.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    });
    Some(ContentType { essence, charset })
}

/// Select the best-matching key from a `content` section for an essence.
///
/// Keys may themselves carry parameters; only their essence participates in
/// matching. Precedence: exact, then `type/*`, then `*/*`.
pub fn match_content_key<'a, I>(keys: I, essence: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let essence = essence.to_ascii_lowercase();
    let key_essence = |k: &str| {
        k.split(';')
            .next()
            .unwrap_or(k)
            .trim()
            .to_ascii_lowercase()
    };

    if let Some(k) = keys
        .clone()
        .into_iter()
        .find(|k| key_essence(k) == essence)
    {
        return Some(k);
    }
    let ty = essence.split('/').next().unwrap_or("");
    if let Some(k) = keys
        .clone()
        .into_iter()
        .find(|k| key_essence(k) == format!("{ty}/*"))
    {
        return Some(k);
    }
    keys.into_iter().find(|k| key_essence(k) == "*/*")
}

/// Registry of `(pattern, decoder)` entries consulted in insertion order,
/// custom registrations first.
#[derive(Clone)]
pub struct MediaTypeRegistry {
    entries: Vec<(String, DecodeFn)>,
}

static BUILTINS: Lazy<Vec<(String, DecodeFn)>> = Lazy::new(|| {
    vec![
        ("application/json".to_string(), decode_json as DecodeFn),
        ("application/*+json".to_string(), decode_json as DecodeFn),
        (
            "application/x-www-form-urlencoded".to_string(),
            decode_form as DecodeFn,
        ),
        ("text/*".to_string(), decode_text as DecodeFn),
        ("*/*".to_string(), decode_lenient as DecodeFn),
    ]
});

impl Default for MediaTypeRegistry {
    fn default() -> Self {
        MediaTypeRegistry {
            entries: BUILTINS.clone(),
        }
    }
}

impl MediaTypeRegistry {
    /// Register a decoder for a media type pattern (`image/png`,
    /// `application/*+cbor`, `text/*`, `*/*`). Registrations take
    /// precedence over built-ins.
    pub fn register(&mut self, pattern: impl Into<String>, decoder: DecodeFn) {
        self.entries.insert(0, (pattern.into(), decoder));
    }

    /// Find the decoder for a parsed essence. The built-in `*/*` fallback
    /// means this only returns `None` for an emptied registry.
    pub fn decoder_for(&self, essence: &str) -> Option<DecodeFn> {
        let essence = essence.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(pattern, _)| pattern_matches(pattern, &essence))
            .map(|(_, f)| *f)
    }
}

fn pattern_matches(pattern: &str, essence: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    if pattern == "*/*" {
        return true;
    }
    if let Some((ty, rest)) = pattern.split_once("/*+") {
        return essence.starts_with(&format!("{ty}/")) && essence.ends_with(&format!("+{rest}"));
    }
    if let Some(ty) = pattern.strip_suffix("/*") {
        return essence.starts_with(&format!("{ty}/"));
    }
    pattern == essence
}

/// Decode bytes to text honoring the charset. UTF-8 is the default for
/// `text/*` and `+json` types; `us-ascii` and `iso-8859-1` are also
/// supported.
fn decode_charset(bytes: &[u8], charset: Option<&str>) -> Result<String, String> {
    match charset.unwrap_or("utf-8") {
        "utf-8" | "utf8" => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| format!("invalid utf-8: {e}")),
        "us-ascii" | "ascii" => {
            if bytes.is_ascii() {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            } else {
                Err("non-ascii byte in us-ascii payload".to_string())
            }
        }
        "iso-8859-1" | "latin1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        other => Err(format!("unsupported charset `{other}`")),
    }
}

fn decode_json(bytes: &[u8], charset: Option<&str>) -> Result<Value, String> {
    let text = decode_charset(bytes, charset)?;
    serde_json::from_str(&text).map_err(|e| format!("invalid json: {e}"))
}

fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<Value, String> {
    decode_charset(bytes, charset).map(Value::String)
}

/// First occurrence of each name wins, matching the query-string rule.
fn decode_form(bytes: &[u8], _charset: Option<&str>) -> Result<Value, String> {
    let mut obj = serde_json::Map::new();
    for (k, v) in url::form_urlencoded::parse(bytes) {
        obj.entry(k.into_owned())
            .or_insert_with(|| Value::String(v.into_owned()));
    }
    Ok(Value::Object(obj))
}

/// Fallback for types without a dedicated decoder: JSON if it parses,
/// otherwise the payload as text.
fn decode_lenient(bytes: &[u8], charset: Option<&str>) -> Result<Value, String> {
    let text = decode_charset(bytes, charset)?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_content_type_extracts_charset() {
        let ct = parse_content_type("Application/JSON; Charset=UTF-8").unwrap();
        assert_eq!(ct.essence, "application/json");
        assert_eq!(ct.charset.as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_match_precedence_exact_over_wildcard() {
        let keys = ["*/*", "application/*", "application/json"];
        assert_eq!(
            match_content_key(keys, "application/json"),
            Some("application/json")
        );
        assert_eq!(
            match_content_key(keys, "application/xml"),
            Some("application/*")
        );
        assert_eq!(match_content_key(keys, "image/png"), Some("*/*"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let keys = ["application/json"];
        assert_eq!(
            match_content_key(keys, "Application/Json"),
            Some("application/json")
        );
    }

    #[test]
    fn test_suffix_pattern_matches_plus_json() {
        let reg = MediaTypeRegistry::default();
        let dec = reg.decoder_for("application/problem+json").unwrap();
        assert_eq!(dec(br#"{"a":1}"#, None).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_form_decoder_keeps_first_occurrence() {
        let v = decode_form(b"a=1&a=2&b=x", None).unwrap();
        assert_eq!(v, json!({"a": "1", "b": "x"}));
    }

    #[test]
    fn test_lenient_fallback_tries_json_then_text() {
        assert_eq!(decode_lenient(br#"{"ok":true}"#, None).unwrap(), json!({"ok": true}));
        assert_eq!(decode_lenient(b"plain", None).unwrap(), json!("plain"));
    }

    #[test]
    fn test_charset_failures_are_errors() {
        assert!(decode_text(&[0xff, 0xfe], Some("utf-8")).is_err());
        assert!(decode_text(b"abc", Some("utf-16")).is_err());
        assert_eq!(
            decode_text(&[0xe9], Some("iso-8859-1")).unwrap(),
            json!("\u{e9}")
        );
    }

    #[test]
    fn test_custom_registration_wins() {
        fn always_null(_: &[u8], _: Option<&str>) -> Result<Value, String> {
            Ok(Value::Null)
        }
        let mut reg = MediaTypeRegistry::default();
        reg.register("application/json", always_null);
        let dec = reg.decoder_for("application/json").unwrap();
        assert_eq!(dec(b"{}", None).unwrap(), Value::Null);
    }
}
