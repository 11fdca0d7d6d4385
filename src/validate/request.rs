//! Request-side orchestration: path resolution, parameter projection,
//! body dispatch.

use crate::message::HttpRequest;
use crate::result::ValidationResult;
use crate::router::{self, PathHints, PathMatch};

use super::{body, operation_for, params, stale_match_error, SpecValidator};

pub(crate) fn validate_request_impl<R: HttpRequest>(
    v: &SpecValidator,
    request: &R,
    path: Option<&PathMatch>,
) -> ValidationResult {
    let resolved;
    let path = match path {
        Some(memoized) => {
            // A caller-held match is verified against the request, never
            // trusted over it.
            let inconsistencies = router::verify_match_against_request(
                v.document(),
                memoized,
                request,
                v.strip_base(),
            );
            if !inconsistencies.is_empty() {
                return ValidationResult::from_parts(inconsistencies, Vec::new());
            }
            memoized
        }
        None => match v.find_path(Some(request), &PathHints::new()) {
            Ok(found) => {
                resolved = found;
                &resolved
            }
            Err(errors) => return ValidationResult::from_parts(errors, Vec::new()),
        },
    };

    let Some(operation) = operation_for(v, path) else {
        return stale_match_error(path);
    };

    let mut errors = Vec::new();
    let mut annotations = Vec::new();
    params::validate_parameters(v, request, path, operation, &mut errors, &mut annotations);
    body::validate_request_body(v, request, path, operation, &mut errors, &mut annotations);
    ValidationResult::from_parts(errors, annotations)
}
