//! HTTP message abstraction.
//!
//! Validation consumes a minimal capability set instead of a concrete HTTP
//! library type: method, URI, first-value header lookup, header iteration,
//! body bytes, and (for responses) the status code. Implementations are
//! provided for `http::Request<B>` and `http::Response<B>` for any body
//! type viewable as bytes; owning and borrowed bodies go through the same
//! contract.

use http::{Method, StatusCode, Uri};

/// Request-side capabilities consumed by the validator.
pub trait HttpRequest {
    fn method(&self) -> &Method;
    fn uri(&self) -> &Uri;
    /// First value for a header name, case-insensitive. Non-UTF-8 values
    /// are treated as absent.
    fn header(&self, name: &str) -> Option<&str>;
    fn headers(&self) -> Vec<(String, String)>;
    /// Body payload; `None` when the message has no body or an empty one.
    fn body_bytes(&self) -> Option<&[u8]>;

    /// The Host header, used to resolve a relative document URI.
    fn host(&self) -> Option<&str> {
        self.header("host")
    }
}

/// Response-side capabilities consumed by the validator.
pub trait HttpResponse {
    fn status(&self) -> StatusCode;
    fn header(&self, name: &str) -> Option<&str>;
    fn headers(&self) -> Vec<(String, String)>;
    fn body_bytes(&self) -> Option<&[u8]>;
}

impl<B: AsRef<[u8]>> HttpRequest for http::Request<B> {
    fn method(&self) -> &Method {
        http::Request::method(self)
    }

    fn uri(&self) -> &Uri {
        http::Request::uri(self)
    }

    fn header(&self, name: &str) -> Option<&str> {
        http::Request::headers(self)
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    fn headers(&self) -> Vec<(String, String)> {
        collect_headers(http::Request::headers(self))
    }

    fn body_bytes(&self) -> Option<&[u8]> {
        let bytes = self.body().as_ref();
        (!bytes.is_empty()).then_some(bytes)
    }
}

impl<B: AsRef<[u8]>> HttpResponse for http::Response<B> {
    fn status(&self) -> StatusCode {
        http::Response::status(self)
    }

    fn header(&self, name: &str) -> Option<&str> {
        http::Response::headers(self)
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    fn headers(&self) -> Vec<(String, String)> {
        collect_headers(http::Response::headers(self))
    }

    fn body_bytes(&self) -> Option<&[u8]> {
        let bytes = self.body().as_ref();
        (!bytes.is_empty()).then_some(bytes)
    }
}

fn collect_headers(map: &http::HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
