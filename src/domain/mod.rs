//! Domain layer - Pure business abstractions
//!
//! This layer contains NO web framework dependencies (no Axum).
//! Error types, enumerated values, validation helpers and pagination.

pub mod enums;
pub mod errors;
pub mod pagination;
pub mod validation;

pub use enums::*;
pub use errors::{DomainError, FieldErrors, NON_FIELD_ERRORS};
pub use pagination::{Page, PageRequest};
