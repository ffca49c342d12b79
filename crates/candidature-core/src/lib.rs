pub mod domain;
pub mod error;
pub mod input;
pub mod rules;

pub use domain::*;
pub use error::{CoreError, FieldError, FieldErrorKind, ValidationErrors};
pub use input::CandidatureInput;
pub use rules::*;
