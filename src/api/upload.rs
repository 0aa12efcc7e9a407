use axum::body::Bytes;
use axum::extract::Multipart;

use crate::domain::DomainError;

pub const FILE_FIELD: &str = "file";

/// Reads the `file` part of a multipart body; other parts are ignored.
pub async fn read_file(mut multipart: Multipart) -> Result<(String, Bytes), DomainError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DomainError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| DomainError::BadRequest(format!("Could not read upload: {}", e)))?;
        return Ok((filename, data));
    }

    Err(DomainError::field(FILE_FIELD, "No file was submitted."))
}
