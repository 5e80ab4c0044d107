//! Hand-off from the authoring side: a host registers a session, then
//! drives it over the websocket.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::session::{NewSession, Question, SessionId, SessionSettings, SessionStatus};
use crate::error::AppError;
use crate::extractors::current_actor::CurrentActor;
use crate::state::app_state::AppState;

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    title: String,
    questions: Vec<Question>,
    #[serde(default)]
    settings: SessionSettings,
    #[serde(default, with = "time::serde::rfc3339::option")]
    scheduled_at: Option<OffsetDateTime>,
    #[serde(default)]
    auto_start: bool,
}

#[derive(Debug, Serialize)]
struct SessionCreated {
    session_id: SessionId,
    status: SessionStatus,
    question_count: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    scheduled_at: Option<OffsetDateTime>,
    version: i32,
}

async fn create_session(
    CurrentActor(caller): CurrentActor,
    app_state: web::Data<AppState>,
    body: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let new = NewSession {
        host_id: caller.user_id,
        title: body.title,
        questions: body.questions,
        settings: body.settings,
        scheduled_at: body.scheduled_at,
        auto_start: body.auto_start,
    };
    let session = app_state
        .engine
        .create_session(&caller, new, OffsetDateTime::now_utc())
        .await?;

    Ok(HttpResponse::Created().json(SessionCreated {
        session_id: session.id,
        status: session.status,
        question_count: session.questions.len(),
        scheduled_at: session.scheduled_at,
        version: session.version,
    }))
}

/// Same payload as the websocket `sync` reply.
async fn get_session(
    CurrentActor(caller): CurrentActor,
    app_state: web::Data<AppState>,
    path: web::Path<SessionId>,
) -> Result<HttpResponse, AppError> {
    let payload = app_state
        .engine
        .sync(&caller, path.into_inner(), OffsetDateTime::now_utc())
        .await?;
    Ok(HttpResponse::Ok().json(payload))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create_session))
        .route("/{session_id}", web::get().to(get_session));
}
