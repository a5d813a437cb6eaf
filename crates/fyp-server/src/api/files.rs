use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use fyp_shared::types::{DeadlineId, ProjectId};
use fyp_store::{Project, Submission};

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::work::{self, NewSubmission};

#[derive(Serialize)]
pub struct UploadResponse {
    id: Uuid,
    url: String,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    project: Project,
    submission: Submission,
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, ServerError> {
    multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))
}

/// Read a file field chunk by chunk, refusing it once it passes `max`.
async fn read_file(mut field: Field<'_>, max: usize) -> Result<Vec<u8>, ServerError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > max {
            return Err(ServerError::UploadTooLarge {
                size: data.len(),
                max,
            });
        }
    }
    Ok(data)
}

async fn read_text(field: Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))
}

/// Upload a standalone file, such as a proposal document.
pub async fn upload(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() == Some("file") {
            let data = read_file(field, state.files.max_size()).await?;
            let id = state.files.store(&data).await?;
            info!(id = %id, size = data.len(), user = %caller.id, "file uploaded");
            let url = state.config.file_url(id);
            return Ok((StatusCode::CREATED, Json(UploadResponse { id, url })));
        }
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

/// Served without a session so that links open directly in a browser.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.files.get(id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

/// Upload a deliverable and record it as a submission on the project.
///
/// Form fields: `file` (required), `title` (required) and `deadlineId`.
/// The database lock is not held while the file is written; if recording
/// the submission then fails, the stored file is discarded.
pub async fn upload_submission(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse>), ServerError> {
    work::check_uploader(&*state.db.lock().await, &caller, id)?;

    let mut data = None;
    let mut title = None;
    let mut deadline_id = None;
    while let Some(field) = next_field(&mut multipart).await? {
        match field.name() {
            Some("file") => data = Some(read_file(field, state.files.max_size()).await?),
            Some("title") => title = Some(read_text(field).await?),
            Some("deadlineId") => {
                let raw = read_text(field).await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let parsed = DeadlineId::parse(raw)
                        .map_err(|_| ServerError::BadRequest("invalid deadlineId".into()))?;
                    deadline_id = Some(parsed);
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| {
        ServerError::BadRequest("Missing 'file' field in multipart form".to_string())
    })?;
    let title = title.unwrap_or_default();

    let file_id = state.files.store(&data).await?;
    let input = NewSubmission {
        title,
        file_url: state.config.file_url(file_id),
        deadline_id,
    };

    let recorded = {
        let mut db = state.db.lock().await;
        work::add_submission(&mut db, &caller, id, input)
    };
    match recorded {
        Ok((project, submission)) => {
            info!(
                project = %id,
                submission = %submission.id,
                file = %file_id,
                size = data.len(),
                "deliverable submitted"
            );
            Ok((
                StatusCode::CREATED,
                Json(SubmissionResponse {
                    project,
                    submission,
                }),
            ))
        }
        Err(e) => {
            state.files.discard(file_id).await;
            Err(e)
        }
    }
}
