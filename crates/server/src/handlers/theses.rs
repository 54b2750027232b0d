//! Thesis handlers

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use prethesis_common::{
    access::ThesisView,
    attachments::Upload,
    auth::Actor,
    db::{models::AttachmentLabel, views::ThesisData},
    errors::{AppError, Result},
};

use crate::services::theses::{parse_thesis_id, ThesisInput};
use crate::AppState;

/// Name of the multipart part carrying the thesis JSON
const JSON_PART: &str = "json";

/// List the theses visible to the caller
pub async fn list_theses(State(state): State<AppState>, actor: Actor) -> Result<Json<Vec<ThesisData>>> {
    let theses = state.theses().list(&actor, ThesisView::Listing).await?;
    Ok(Json(theses))
}

pub async fn get_thesis(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<ThesisData>> {
    let id = parse_thesis_id(&id)?;
    let thesis = state.theses().get(&actor, id).await?;
    Ok(Json(thesis))
}

/// Create a thesis from a multipart form with both attachments
pub async fn create_thesis(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ThesisData>)> {
    let limit = state.config.storage.max_upload_bytes;
    let (input, uploads) = read_thesis_form(multipart, limit).await?;

    let thesis = state.theses().create(&actor, input, uploads).await?;
    Ok((StatusCode::CREATED, Json(thesis)))
}

/// Update a thesis; attachments not sent are kept
pub async fn update_thesis(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ThesisData>> {
    let id = parse_thesis_id(&id)?;
    let limit = state.config.storage.max_upload_bytes;
    let (input, uploads) = read_thesis_form(multipart, limit).await?;

    let thesis = state.theses().update(&actor, id, input, uploads).await?;
    Ok(Json(thesis))
}

pub async fn delete_thesis(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_thesis_id(&id)?;
    state.theses().delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Read the `json` part and the attachment file parts. Unknown parts are
/// skipped; empty file parts count as not sent.
async fn read_thesis_form(mut multipart: Multipart, limit: usize) -> Result<(ThesisInput, Vec<Upload>)> {
    let mut input: Option<ThesisInput> = None;
    let mut uploads: Vec<Upload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == JSON_PART {
            let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
            let parsed = serde_json::from_str(&text).map_err(|e| AppError::InvalidFormat {
                message: format!("Invalid thesis data: {}", e),
            })?;
            input = Some(parsed);
            continue;
        }

        let Some(label) = AttachmentLabel::from_field_name(&name) else {
            tracing::debug!(field = %name, "Skipping unknown multipart field");
            continue;
        };

        let original_name = field.file_name().unwrap_or_default().to_string();
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let contents = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        if contents.is_empty() && original_name.is_empty() {
            continue;
        }

        uploads.push(Upload {
            label,
            original_name,
            mimetype,
            contents,
        });
    }

    let input = input.ok_or_else(|| AppError::MissingField {
        field: JSON_PART.to_string(),
    })?;

    Ok((input, uploads))
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::InvalidFormat {
            message: err.body_text(),
        }
    }
}
