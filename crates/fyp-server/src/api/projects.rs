use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use fyp_shared::types::{PhaseId, ProjectId, ProjectStatus, Role, SubmissionId, TaskId, UserId};
use fyp_store::{Deadline, Project, ProjectFilter, RoadmapPhase};

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::work::{self, NewPhase, NewTask, PhaseUpdate, Review, TaskUpdate};
use crate::workflow::{self, ProposalInput};

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(input): Json<ProposalInput>,
) -> Result<(StatusCode, Json<Project>), ServerError> {
    let mut db = state.db.lock().await;
    let project = workflow::submit_proposal(&mut db, &caller, input)?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<ProjectStatus>,
}

/// Admins see every project. Supervisors see what they supervise or have
/// been asked to; students see their own team.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Project>>, ServerError> {
    let mut filter = ProjectFilter {
        status: query.status,
        ..Default::default()
    };
    match caller.role {
        Role::Admin => {}
        Role::Supervisor => filter.supervisor = Some(caller.id),
        Role::Student => filter.member = Some(caller.id),
    }
    let projects = state.db.lock().await.list_projects(&filter)?;
    Ok(Json(projects))
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<Project>, ServerError> {
    let project = workflow::load_project(&*state.db.lock().await, id)?;
    if !workflow::can_view(&caller, &project) {
        return Err(ServerError::Forbidden("you cannot view this project".into()));
    }
    Ok(Json(project))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    supervisor_id: Option<UserId>,
}

impl ApproveRequest {
    /// An empty body approves without a supervisor; anything else must
    /// parse in full.
    fn parse(body: &[u8]) -> Result<Self, ServerError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ServerError::BadRequest(format!("invalid approval request: {e}")))
    }
}

/// Approve a pending proposal, optionally assigning a supervisor in the
/// same step.
pub async fn approve(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    body: Bytes,
) -> Result<Json<Project>, ServerError> {
    let supervisor_id = ApproveRequest::parse(&body)?.supervisor_id;
    let mut db = state.db.lock().await;
    let project = match supervisor_id {
        Some(supervisor) => workflow::approve_with_supervisor(&mut db, &caller, id, supervisor)?,
        None => workflow::approve(&mut db, &caller, id)?,
    };
    Ok(Json(project))
}

pub async fn reject(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    Ok(Json(workflow::reject(&mut db, &caller, id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorRequest {
    supervisor_id: UserId,
}

pub async fn request_supervisor(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(req): Json<SupervisorRequest>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = workflow::request_supervisor(&mut db, &caller, id, req.supervisor_id)?;
    Ok(Json(project))
}

#[derive(Deserialize)]
pub struct RespondRequest {
    accept: bool,
}

pub async fn respond(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = workflow::respond_to_request(&mut db, &caller, id, req.accept)?;
    Ok(Json(project))
}

pub async fn assign(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(req): Json<SupervisorRequest>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = workflow::assign_supervisor(&mut db, &caller, id, req.supervisor_id)?;
    Ok(Json(project))
}

pub async fn submit_for_evaluation(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    Ok(Json(workflow::submit_for_evaluation(&mut db, &caller, id)?))
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    feedback: String,
}

pub async fn request_revision(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = workflow::request_revision(&mut db, &caller, id, &req.feedback)?;
    Ok(Json(project))
}

#[derive(Deserialize)]
pub struct GradeRequest {
    score: i32,
    #[serde(default)]
    feedback: String,
}

pub async fn grade(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(req): Json<GradeRequest>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = workflow::grade(&mut db, &caller, id, req.score, &req.feedback)?;
    Ok(Json(project))
}

pub async fn admin_feedback(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = work::set_admin_feedback(&mut db, &caller, id, &req.feedback)?;
    Ok(Json(project))
}

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RoadmapResponse {
    roadmap: Vec<RoadmapPhase>,
    deadlines: Vec<Deadline>,
}

pub async fn roadmap(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<RoadmapResponse>, ServerError> {
    let db = state.db.lock().await;
    let project = workflow::load_project(&db, id)?;
    if !workflow::can_view(&caller, &project) {
        return Err(ServerError::Forbidden("you cannot view this project".into()));
    }
    let deadlines = db.list_project_deadlines(id)?;
    Ok(Json(RoadmapResponse {
        roadmap: project.roadmap,
        deadlines,
    }))
}

pub async fn add_phase(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(input): Json<NewPhase>,
) -> Result<(StatusCode, Json<Project>), ServerError> {
    let mut db = state.db.lock().await;
    let project = work::add_phase(&mut db, &caller, id, input)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_phase(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path((id, phase_id)): Path<(ProjectId, PhaseId)>,
    Json(update): Json<PhaseUpdate>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    Ok(Json(work::update_phase(&mut db, &caller, id, phase_id, update)?))
}

pub async fn add_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<ProjectId>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Project>), ServerError> {
    let mut db = state.db.lock().await;
    let project = work::add_task(&mut db, &caller, id, input)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path((id, task_id)): Path<(ProjectId, TaskId)>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    Ok(Json(work::update_task(&mut db, &caller, id, task_id, update)?))
}

pub async fn review_submission(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path((id, submission_id)): Path<(ProjectId, SubmissionId)>,
    Json(review): Json<Review>,
) -> Result<Json<Project>, ServerError> {
    let mut db = state.db.lock().await;
    let project = work::review_submission(&mut db, &caller, id, submission_id, review)?;
    Ok(Json(project))
}
