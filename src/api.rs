use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::audit::AuditTrail;
use crate::errors::{StoreError, WorkflowError};
use crate::models::{FileKind, FileStatus, Priority, WorkflowAction};
use crate::store::attachments::BlobStore;
use crate::store::{DbHandle, FileFilter, FileUpdate, NewFile};
use crate::workflow::TransitionRequest;
use crate::ws::{broadcast_message, WsMessage};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
    pub blobs: BlobStore,
    pub audit: Arc<AuditTrail>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub designation: Option<String>,
    pub office: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateFileRequest {
    pub title: String,
    pub body: Option<String>,
    pub kind: Option<String>,
    pub priority: Option<String>,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct UpdateFileRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub kind: Option<String>,
    pub priority: Option<String>,
    /// Absent leaves the assignee alone; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i64>>,
}

/// Keeps "field absent" and "field set to null" distinguishable.
fn double_option<'de, D>(d: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(d).map(Some)
}

/// Body shared by the `submit` / `approve` / `return` / `resubmit` /
/// `archive` endpoints.
#[derive(Deserialize)]
pub struct ActionRequest {
    pub acted_by: i64,
    pub remarks: Option<String>,
    /// Only meaningful for `submit`.
    pub assigned_to: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub author_id: i64,
    pub body: String,
}

#[derive(Deserialize, Default)]
pub struct ListFilesQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub created_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub user_id: i64,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::FileNotFound { .. }
            | StoreError::UserNotFound { .. }
            | StoreError::AttachmentNotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Workflow(w) => match w {
                WorkflowError::NotPermitted { .. } => ApiError::Forbidden(err.to_string()),
                WorkflowError::AssigneeRequired | WorkflowError::RemarksRequired => {
                    ApiError::BadRequest(err.to_string())
                }
                WorkflowError::InvalidTransition { .. }
                | WorkflowError::NotEditable { .. }
                | WorkflowError::NotDeletable { .. } => ApiError::Conflict(err.to_string()),
            },
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

fn parse_field<T: FromStr<Err = String>>(value: &str, what: &str) -> Result<T, ApiError> {
    value
        .parse::<T>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {}: '{}'", what, value)))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", get(get_user))
        .route("/api/files", get(list_files).post(create_file))
        .route(
            "/api/files/:id",
            get(get_file_detail).patch(update_file).delete(delete_file),
        )
        .route("/api/files/:id/submit", post(submit_file))
        .route("/api/files/:id/approve", post(approve_file))
        .route("/api/files/:id/return", post(return_file))
        .route("/api/files/:id/resubmit", post(resubmit_file))
        .route("/api/files/:id/archive", post(archive_file))
        .route("/api/files/:id/history", get(list_history))
        .route(
            "/api/files/:id/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/files/:id/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route(
            "/api/attachments/:id",
            get(download_attachment).delete(delete_attachment),
        )
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/audit/recent", get(recent_audit))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_users(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.call(move |db| db.list_users()).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<SharedState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("User name must not be empty".into()));
    }
    let designation = req.designation.unwrap_or_default();
    let office = req.office.unwrap_or_default();
    let user = state
        .db
        .call(move |db| db.create_user(&name, &designation, &office))
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.call(move |db| db.get_user(id)).await?;
    Ok(Json(user))
}

async fn list_files(
    State(state): State<SharedState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut filter = FileFilter {
        created_by: query.created_by,
        assigned_to: query.assigned_to,
        q: query.q.filter(|q| !q.trim().is_empty()),
        ..Default::default()
    };
    if let Some(ref s) = query.status {
        filter.status = Some(parse_field::<FileStatus>(s, "status")?);
    }
    if let Some(ref k) = query.kind {
        filter.kind = Some(parse_field::<FileKind>(k, "kind")?);
    }
    let files = state.db.call(move |db| db.list_files(&filter)).await?;
    Ok(Json(files))
}

async fn create_file(
    State(state): State<SharedState>,
    Json(req): Json<CreateFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::BadRequest("File title must not be empty".into()));
    }
    let kind = match req.kind {
        Some(ref k) => parse_field::<FileKind>(k, "kind")?,
        None => FileKind::Letter,
    };
    let priority = match req.priority {
        Some(ref p) => parse_field::<Priority>(p, "priority")?,
        None => Priority::Routine,
    };
    let new = NewFile {
        title,
        body: req.body.unwrap_or_default(),
        kind,
        priority,
        created_by: req.created_by,
        assigned_to: req.assigned_to,
    };
    let file = state.db.call(move |db| db.create_file(&new)).await?;
    broadcast_message(&state.ws_tx, &WsMessage::FileCreated { file: file.clone() });
    Ok((StatusCode::CREATED, Json(file)))
}

async fn get_file_detail(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.db.call(move |db| db.get_file_detail(id)).await?;
    Ok(Json(detail))
}

async fn update_file(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ref t) = req.title {
        if t.trim().is_empty() {
            return Err(ApiError::BadRequest("File title must not be empty".into()));
        }
    }
    let update = FileUpdate {
        title: req.title.map(|t| t.trim().to_string()),
        body: req.body,
        kind: match req.kind {
            Some(ref k) => Some(parse_field::<FileKind>(k, "kind")?),
            None => None,
        },
        priority: match req.priority {
            Some(ref p) => Some(parse_field::<Priority>(p, "priority")?),
            None => None,
        },
        assigned_to: req.assigned_to,
    };
    let file = state.db.call(move |db| db.update_file(id, &update)).await?;
    broadcast_message(&state.ws_tx, &WsMessage::FileUpdated { file: file.clone() });
    Ok(Json(file))
}

async fn delete_file(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let attachments = state.db.call(move |db| db.delete_file(id)).await?;

    // Blob cleanup is best-effort; the records are already gone.
    let blobs = state.blobs.clone();
    tokio::task::spawn_blocking(move || {
        for att in &attachments {
            if let Err(e) = blobs.remove(&att.rel_path) {
                tracing::warn!("failed to remove blob {}: {}", att.rel_path, e);
            }
        }
    });

    broadcast_message(&state.ws_tx, &WsMessage::FileDeleted { file_id: id });
    Ok(StatusCode::NO_CONTENT)
}

// ── Workflow actions ──────────────────────────────────────────────────

async fn submit_file(
    state: State<SharedState>,
    path: Path<i64>,
    req: Json<ActionRequest>,
) -> Result<Response, ApiError> {
    run_action(state, path, WorkflowAction::Submit, req).await
}

async fn approve_file(
    state: State<SharedState>,
    path: Path<i64>,
    req: Json<ActionRequest>,
) -> Result<Response, ApiError> {
    run_action(state, path, WorkflowAction::Approve, req).await
}

async fn return_file(
    state: State<SharedState>,
    path: Path<i64>,
    req: Json<ActionRequest>,
) -> Result<Response, ApiError> {
    run_action(state, path, WorkflowAction::Return, req).await
}

async fn resubmit_file(
    state: State<SharedState>,
    path: Path<i64>,
    req: Json<ActionRequest>,
) -> Result<Response, ApiError> {
    run_action(state, path, WorkflowAction::Resubmit, req).await
}

async fn archive_file(
    state: State<SharedState>,
    path: Path<i64>,
    req: Json<ActionRequest>,
) -> Result<Response, ApiError> {
    run_action(state, path, WorkflowAction::Archive, req).await
}

async fn run_action(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    action: WorkflowAction,
    Json(req): Json<ActionRequest>,
) -> Result<Response, ApiError> {
    let transition = TransitionRequest {
        action,
        actor_id: req.acted_by,
        remarks: req.remarks.unwrap_or_default(),
        assign_to: req.assigned_to,
    };
    let (file, entry) = state
        .db
        .call(move |db| db.apply_transition(id, &transition))
        .await?;

    // The transition is committed; a failed audit append must not fail
    // the request.
    if let Err(e) = state.audit.record(&file.file_number, &entry) {
        tracing::warn!("failed to write audit record: {}", e);
    }

    broadcast_message(
        &state.ws_tx,
        &WsMessage::StatusChanged {
            file: file.clone(),
            entry: entry.clone(),
        },
    );
    Ok(Json(serde_json::json!({"file": file, "entry": entry})).into_response())
}

async fn list_history(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .db
        .call(move |db| {
            db.get_file(id)?;
            db.list_history(id)
        })
        .await?;
    Ok(Json(history))
}

// ── Comments ──────────────────────────────────────────────────────────

async fn list_comments(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = state
        .db
        .call(move |db| {
            db.get_file(id)?;
            db.list_comments(id)
        })
        .await?;
    Ok(Json(comments))
}

async fn add_comment(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Comment must not be empty".into()));
    }
    let author_id = req.author_id;
    let comment = state
        .db
        .call(move |db| db.add_comment(id, author_id, &body))
        .await?;
    broadcast_message(
        &state.ws_tx,
        &WsMessage::CommentAdded {
            comment: comment.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(comment)))
}

// ── Attachments ───────────────────────────────────────────────────────

async fn list_attachments(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let attachments = state
        .db
        .call(move |db| {
            db.get_file(id)?;
            db.list_attachments(id)
        })
        .await?;
    Ok(Json(attachments))
}

/// Multipart upload; the uploader comes from the `user_id` query
/// parameter, the content from the `file` part.
async fn upload_attachment(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let uploaded_by = query.user_id;
    let mut file_name: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|n| n.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            data = Some(bytes.to_vec());
        }
    }

    let data = data.ok_or_else(|| ApiError::BadRequest("Missing file field".into()))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".into()));
    }
    let file_name = file_name.unwrap_or_else(|| "attachment".to_string());

    // Make sure the file and uploader exist before writing the blob.
    state
        .db
        .call(move |db| {
            db.get_file(id)?;
            db.get_user(uploaded_by)
        })
        .await?;

    let blobs = state.blobs.clone();
    let blob = tokio::task::spawn_blocking(move || blobs.save(&file_name, &data))
        .await
        .map_err(|e| ApiError::Internal(format!("Blob task panicked: {}", e)))??;

    let attachment = state
        .db
        .call(move |db| {
            db.insert_attachment(
                id,
                &blob.file_name,
                &blob.content_type,
                blob.byte_size,
                &blob.sha256,
                &blob.rel_path,
                uploaded_by,
            )
        })
        .await?;

    broadcast_message(
        &state.ws_tx,
        &WsMessage::AttachmentAdded {
            attachment: attachment.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(attachment)))
}

async fn download_attachment(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let attachment = state.db.call(move |db| db.get_attachment(id)).await?;

    let blobs = state.blobs.clone();
    let rel_path = attachment.rel_path.clone();
    let data = tokio::task::spawn_blocking(move || blobs.read(&rel_path))
        .await
        .map_err(|e| ApiError::Internal(format!("Blob task panicked: {}", e)))??;

    let disposition = format!("attachment; filename=\"{}\"", attachment.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

async fn delete_attachment(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let attachment = state.db.call(move |db| db.delete_attachment(id)).await?;

    let blobs = state.blobs.clone();
    let rel_path = attachment.rel_path.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = blobs.remove(&rel_path) {
            tracing::warn!("failed to remove blob {}: {}", rel_path, e);
        }
    });

    broadcast_message(
        &state.ws_tx,
        &WsMessage::AttachmentDeleted {
            file_id: attachment.file_id,
            attachment_id: attachment.id,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

// ── Dashboard and audit ───────────────────────────────────────────────

async fn get_dashboard(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.db.call(move |db| db.get_dashboard(10)).await?;
    Ok(Json(summary))
}

async fn recent_audit(
    State(state): State<SharedState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(20);
    let audit = state.audit.clone();
    let records = tokio::task::spawn_blocking(move || audit.recent(limit))
        .await
        .map_err(|e| ApiError::Internal(format!("Audit task panicked: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(records))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorkflowDb;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    // The TempDir must outlive the router or blob writes hit a
    // removed directory.
    fn test_app() -> (Router, tempfile::TempDir) {
        let db = WorkflowDb::new_in_memory().unwrap();
        let (ws_tx, _) = broadcast::channel(16);
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            ws_tx,
            blobs: BlobStore::new(dir.path().join("attachments")),
            audit: Arc::new(AuditTrail::new(&dir.path().join("audit"))),
        });
        (api_router().with_state(state), dir)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    /// Create two users and a draft file routed from the first to the
    /// second, returning the file's JSON.
    async fn seed_draft(app: &Router) -> serde_json::Value {
        for (name, designation) in [("A. Clerk", "Section Officer"), ("B. Chief", "Director")] {
            let resp = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/users",
                    serde_json::json!({"name": name, "designation": designation}),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files",
                serde_json::json!({
                    "title": "Leave application",
                    "body": "Requesting leave.",
                    "kind": "letter",
                    "created_by": 1,
                    "assigned_to": 2
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp.into_body()).await
    }

    async fn submit(app: &Router) {
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/1/submit",
                serde_json::json!({"acted_by": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _dir) = test_app();
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_create_and_list_users() {
        let (app, _dir) = test_app();
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/users",
                serde_json::json!({"name": "A. Clerk", "office": "Records"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let user: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(user["name"], "A. Clerk");
        assert_eq!(user["office"], "Records");

        let resp = app.oneshot(get_request("/api/users")).await.unwrap();
        let users: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_create_user_empty_name_rejected() {
        let (app, _dir) = test_app();
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/users",
                serde_json::json!({"name": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_file_returns_draft_with_number() {
        let (app, _dir) = test_app();
        let file = seed_draft(&app).await;
        assert_eq!(file["status"], "draft");
        assert_eq!(file["priority"], "routine");
        assert!(file["file_number"].as_str().unwrap().starts_with("F-"));
    }

    #[tokio::test]
    async fn test_create_file_unknown_creator_is_404() {
        let (app, _dir) = test_app();
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files",
                serde_json::json!({"title": "x", "created_by": 99}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_file_bad_kind_is_400() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files",
                serde_json::json!({"title": "x", "kind": "scroll", "created_by": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(resp.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("kind"));
    }

    #[tokio::test]
    async fn test_list_files_with_filters() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .clone()
            .oneshot(get_request("/api/files?status=draft"))
            .await
            .unwrap();
        let files: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert_eq!(files.len(), 1);

        let resp = app
            .clone()
            .oneshot(get_request("/api/files?status=pending"))
            .await
            .unwrap();
        let files: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert!(files.is_empty());

        let resp = app
            .clone()
            .oneshot(get_request("/api/files?q=Leave"))
            .await
            .unwrap();
        let files: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert_eq!(files.len(), 1);

        let resp = app
            .oneshot(get_request("/api/files?q=nomatch"))
            .await
            .unwrap();
        let files: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_get_file_detail_and_not_found() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .clone()
            .oneshot(get_request("/api/files/1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let detail: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(detail["file"]["id"], 1);
        assert!(detail["history"].as_array().unwrap().is_empty());

        let resp = app.oneshot(get_request("/api/files/99")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_draft_file() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .oneshot(json_request(
                "PATCH",
                "/api/files/1",
                serde_json::json!({"title": "Revised application", "priority": "urgent"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let file: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(file["title"], "Revised application");
        assert_eq!(file["priority"], "urgent");
    }

    #[tokio::test]
    async fn test_submit_then_edit_is_conflict() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app
            .clone()
            .oneshot(get_request("/api/files/1/history"))
            .await
            .unwrap();
        let history: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["action"], "submit");
        assert_eq!(history[0]["to_status"], "pending");

        let resp = app
            .oneshot(json_request(
                "PATCH",
                "/api/files/1",
                serde_json::json!({"title": "Too late"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_approve_by_wrong_actor_is_forbidden() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/1/approve",
                serde_json::json!({"acted_by": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_return_without_remarks_is_400() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/1/return",
                serde_json::json!({"acted_by": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_return_and_resubmit_flow() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/1/return",
                serde_json::json!({"acted_by": 2, "remarks": "Missing annexure"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(body["file"]["status"], "returned");
        assert_eq!(body["entry"]["remarks"], "Missing annexure");

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/1/resubmit",
                serde_json::json!({"acted_by": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(body["file"]["status"], "pending");
        assert_eq!(body["file"]["assigned_to"], 2);
    }

    #[tokio::test]
    async fn test_approve_draft_is_conflict() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/1/approve",
                serde_json::json!({"acted_by": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_approve_then_archive() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/1/approve",
                serde_json::json!({"acted_by": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/1/archive",
                serde_json::json!({"acted_by": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(body["file"]["status"], "archived");
    }

    #[tokio::test]
    async fn test_delete_draft_then_gone() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/files/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.oneshot(get_request("/api/files/1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_comments_roundtrip() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/1/comments",
                serde_json::json!({"author_id": 2, "body": "Please attach the annexure"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .oneshot(get_request("/api/files/1/comments"))
            .await
            .unwrap();
        let comments: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0]["body"], "Please attach the annexure");
    }

    #[tokio::test]
    async fn test_empty_comment_rejected() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/1/comments",
                serde_json::json!({"author_id": 2, "body": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    fn multipart_request(uri: &str, file_name: &str, content: &str) -> Request<Body> {
        let boundary = "XFILEROUTEBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
             Content-Type: text/plain\r\n\r\n{content}\r\n--{b}--\r\n",
            b = boundary,
            name = file_name,
            content = content,
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_and_download_attachment() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .clone()
            .oneshot(multipart_request(
                "/api/files/1/attachments?user_id=1",
                "note.txt",
                "attachment body",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let attachment: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(attachment["file_name"], "note.txt");
        assert_eq!(attachment["byte_size"], 15);
        assert_eq!(attachment["uploaded_by"], 1);

        let resp = app
            .oneshot(get_request("/api/attachments/1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"attachment body");
    }

    #[tokio::test]
    async fn test_delete_attachment() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        app.clone()
            .oneshot(multipart_request(
                "/api/files/1/attachments?user_id=1",
                "a.txt",
                "x",
            ))
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/attachments/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(get_request("/api/attachments/1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_to_missing_file_is_404() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;

        let resp = app
            .oneshot(multipart_request(
                "/api/files/9/attachments?user_id=1",
                "a.txt",
                "x",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app.oneshot(get_request("/api/dashboard")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let dash: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(dash["total"], 1);
        let counts = dash["by_status"].as_array().unwrap();
        let pending = counts.iter().find(|c| c["status"] == "pending").unwrap();
        assert_eq!(pending["count"], 1);
        assert_eq!(dash["recent"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_recent_after_transition() {
        let (app, _dir) = test_app();
        seed_draft(&app).await;
        submit(&app).await;

        let resp = app
            .oneshot(get_request("/api/audit/recent?limit=5"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let records: Vec<serde_json::Value> = body_json(resp.into_body()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["action"], "submit");
        assert_eq!(records[0]["actor_id"], 1);
        assert_eq!(records[0]["from_status"], "draft");
        assert_eq!(records[0]["to_status"], "pending");
    }
}
