mod coerce;
mod eval;
mod uri;

pub mod lint;
pub mod media;
pub mod message;
pub mod result;
pub mod router;
pub mod spec;
pub mod validate;

pub use message::{HttpRequest, HttpResponse};
pub use result::{Annotation, ErrorKind, ValidationError, ValidationResult};
pub use router::{PathHints, PathMatch};
pub use spec::{load_document, Document, LoadError};
pub use validate::{SpecValidator, ValidatorConfig};
