use crate::auth::AuthenticatedActor;
use crate::constants::{DEFAULT_CONTENT_TYPE, FILE_FIELD};
use crate::error::{ErrorResponse, HttpAppError};
use crate::middleware::RequestId;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use bytes::Bytes;
use folio_core::models::ReplacedFile;
use folio_core::AppError;
use folio_services::ReplaceRequest;
use std::sync::Arc;

/// The single `file` part of a replace request
#[derive(Debug)]
struct UploadedPart {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

async fn read_file_part(mut multipart: Multipart) -> Result<UploadedPart, HttpAppError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name != FILE_FIELD {
            return Err(AppError::InvalidInput(format!(
                "Unexpected multipart field '{}'; only '{}' is accepted",
                name, FILE_FIELD
            ))
            .into());
        }
        if upload.is_some() {
            return Err(AppError::InvalidInput(format!(
                "Multipart body must contain exactly one '{}' field",
                FILE_FIELD
            ))
            .into());
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("The file part has no file name".to_string()))?;
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = field.bytes().await?;

        upload = Some(UploadedPart {
            file_name,
            content_type,
            bytes,
        });
    }

    upload.ok_or_else(|| {
        AppError::InvalidInput(format!("Missing '{}' field in multipart body", FILE_FIELD)).into()
    })
}

/// Replace the content of an existing file, keeping its id and storage path
#[utoipa::path(
    put,
    path = "/api/v0/files/{id}/content",
    tag = "files",
    params(("id" = String, Path, description = "File record id")),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Content replaced", body = ReplacedFile),
        (status = 400, description = "Path traversal or disallowed type", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not allowed to replace this file", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 409, description = "Another replace of this file is in progress", body = ErrorResponse),
        (status = 413, description = "Empty or oversized file", body = ErrorResponse),
        (status = 500, description = "Replace failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_file_content(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(file_id): Path<String>,
    request_id: Option<Extension<RequestId>>,
    multipart: Multipart,
) -> Result<Json<ReplacedFile>, HttpAppError> {
    state
        .replace_service
        .check_access(&actor, &file_id)
        .await?;

    let upload = read_file_part(multipart).await?;

    tracing::debug!(
        file_id = %file_id,
        file_name = %upload.file_name,
        content_type = %upload.content_type,
        size_bytes = upload.bytes.len(),
        "Received replacement content"
    );

    let replaced = state
        .replace_service
        .replace(ReplaceRequest {
            actor,
            file_id,
            bytes: upload.bytes,
            declared_name: upload.file_name,
            declared_type: upload.content_type,
            correlation_id: request_id.map(|Extension(RequestId(id))| id),
        })
        .await?;

    Ok(Json(replaced))
}
