//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! The HTTP mapping lives in `api::error`.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Field name used for errors that are not tied to a single input field.
pub const NON_FIELD_ERRORS: &str = "nonFieldErrors";

/// Itemized validation errors keyed by camelCase field name.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    /// Resource not found
    #[error("Resource not found")]
    NotFound,
    /// Request payload failed validation
    #[error("Validation failed")]
    Validation(FieldErrors),
    /// Request is well-formed but cannot be honoured
    #[error("{0}")]
    BadRequest(String),
    /// Missing or invalid credentials
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,
    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),
    /// Database/persistence error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// External service error (payment gateway, SMTP)
    #[error("External service error: {0}")]
    External(String),
    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand for a validation error on a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        DomainError::Validation(errors)
    }

    pub fn forbidden() -> Self {
        DomainError::Forbidden("You do not have permission to perform this action".to_string())
    }
}
