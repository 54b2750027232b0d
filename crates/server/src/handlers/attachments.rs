//! Attachment download

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use prethesis_common::{
    attachments::is_safe_filename,
    auth::Actor,
    errors::{AppError, Result},
};

use crate::AppState;

/// Stream a stored attachment if the caller may read its thesis
pub async fn get_attachment(
    State(state): State<AppState>,
    actor: Actor,
    Path(filename): Path<String>,
) -> Result<Response> {
    if !is_safe_filename(&filename) {
        return Err(AppError::NotFound {
            resource_type: "Attachment".to_string(),
            id: filename,
        });
    }

    let (attachment, contents) = state.theses().attachment(&actor, &filename).await?;

    let content_type = HeaderValue::from_str(&attachment.mimetype)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        attachment.originalname.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        contents,
    )
        .into_response())
}
