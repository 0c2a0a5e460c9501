use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Config;
use crate::dashboard::{Dashboard, DashboardOptions, export_table};
use crate::downloader::{self, ExportKind};
use crate::error::{ExportError, LoadError};
use crate::filter::FilterSelection;
use crate::loader::{self, LoadReport};
use crate::mailer::{self, Attachment, Mailer, ShareRequest};
use crate::session::{Session, SessionStore};

pub const SESSION_COOKIE: &str = "session";
pub const UPLOAD_FIRST: &str = "Upload a file!";

pub struct AppState {
    pub sessions: SessionStore,
    /// `None` when no SMTP settings were supplied.
    pub mailer: Option<Arc<Mailer>>,
    pub options: DashboardOptions,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, crate::error::MailError> {
        let mailer = match &config.smtp {
            Some(settings) => Some(Arc::new(Mailer::new(settings)?)),
            None => {
                warn!("SMTP settings not provided; sharing is disabled");
                None
            }
        };

        Ok(AppState {
            sessions: SessionStore::new(config.session_ttl),
            mailer,
            options: DashboardOptions {
                currency_symbol: config.currency_symbol.clone(),
                ..DashboardOptions::default()
            },
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

/// Errors returned to the browser as `{"status": "error", "message": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", UPLOAD_FIRST)]
    NoSession,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error("{0}")]
    Share(String),
    #[error("{}", mailer::NOT_CONFIGURED)]
    SharingDisabled,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NoSession | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Load(LoadError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Load(_) => StatusCode::BAD_REQUEST,
            AppError::Export(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart(e) => e.status(),
            AppError::Json(e) => e.status(),
            AppError::Share(_) => StatusCode::BAD_GATEWAY,
            AppError::SharingDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self);
        }
        let body = StatusResponse {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    file_name: String,
    report: LoadReport,
    dashboard: Dashboard,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Deserialize)]
struct ShareBody {
    #[serde(default)]
    to: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    attachment: Option<ExportKind>,
    #[serde(default)]
    selection: FilterSelection,
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(&config)?);

    let listener = TcpListener::bind(config.bind).await?;
    info!("listening on http://{}", config.bind);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let limits = ServiceBuilder::new()
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes));

    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/dashboard", post(dashboard))
        .route("/api/export/:kind", post(export))
        .route("/api/share", post(share))
        .route("/api/session", delete(end_session))
        .layer(limits)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn current_session(state: &AppState, jar: &CookieJar) -> Result<Session, AppError> {
    let id = jar.get(SESSION_COOKIE).ok_or(AppError::NoSession)?;
    state.sessions.get(id.value()).ok_or(AppError::NoSession)
}

async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<UploadResponse>), AppError> {
    let mut received = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            received = Some((file_name, bytes));
        }
    }

    let (file_name, bytes) =
        received.ok_or_else(|| AppError::BadRequest("No file data received".to_string()))?;
    if bytes.is_empty() {
        return Err(LoadError::Empty.into());
    }

    let name = file_name.clone();
    let loaded = tokio::task::spawn_blocking(move || loader::load_bytes(&name, &bytes))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let dashboard =
        Dashboard::compute_with(&loaded.dataset, &FilterSelection::default(), &state.options);
    let report = loaded.report;

    if let Some(old) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(old.value());
    }
    let session_id = state.sessions.create(&file_name, loaded);

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        Json(UploadResponse {
            status: "ok",
            file_name,
            report,
            dashboard,
        }),
    ))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<FilterSelection>, JsonRejection>,
) -> Result<Json<Dashboard>, AppError> {
    let session = current_session(&state, &jar)?;
    let Json(selection) = payload?;

    Ok(Json(Dashboard::compute_with(
        &session.dataset,
        &selection,
        &state.options,
    )))
}

async fn export(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(kind): Path<String>,
    Query(query): Query<ExportQuery>,
    payload: Result<Json<FilterSelection>, JsonRejection>,
) -> Result<Response, AppError> {
    let kind: ExportKind = kind.parse().map_err(AppError::NotFound)?;
    let session = current_session(&state, &jar)?;
    // A download without a JSON body covers the whole dataset.
    let selection = match payload {
        Ok(Json(selection)) => selection,
        Err(JsonRejection::MissingJsonContentType(_)) => FilterSelection::default(),
        Err(e) => return Err(e.into()),
    };

    let table = export_table(&session.dataset, &selection, kind);

    let (bytes, content_type, file_name) = match query.format.as_deref() {
        None | Some("csv") => (
            downloader::to_csv(&table)?,
            "text/csv",
            kind.file_name().to_string(),
        ),
        Some("xlsx") => (
            downloader::to_xlsx(&table)?,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            kind.file_name().replace(".csv", ".xlsx"),
        ),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "unsupported export format '{}'",
                other
            )));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn share(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<ShareBody>, JsonRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let session = current_session(&state, &jar)?;
    let Json(body) = payload?;
    let mailer = state.mailer.clone().ok_or(AppError::SharingDisabled)?;

    let mut request = ShareRequest::new(&body.to, &body.subject, &body.body);
    if !request.is_complete() {
        return Err(AppError::BadRequest(mailer::MISSING_FIELDS.to_string()));
    }

    if let Some(kind) = body.attachment {
        let table = export_table(&session.dataset, &body.selection, kind);
        let bytes = downloader::to_csv(&table)?;
        request = request.with_attachment(Attachment::csv(kind.file_name(), bytes));
    }

    let outcome = tokio::task::spawn_blocking(move || mailer.share(&request))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match outcome {
        Ok(message) => Ok(Json(StatusResponse {
            status: "ok",
            message,
        })),
        Err(message) => Err(AppError::Share(message)),
    }
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    if let Some(id) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(id.value());
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}
