use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tracing::info;

use crate::extractors::current_actor::CurrentActor;
use crate::state::app_state::AppState;
use crate::ws::session::WsSession;

/// Authentication happens in the extractor, before the upgrade; a bad or
/// missing token never reaches the websocket handshake.
async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    CurrentActor(caller): CurrentActor,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    info!(user_id = caller.user_id, role = ?caller.role, "websocket upgrade");
    ws::start(WsSession::new(caller, app_state), &req, stream)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(upgrade));
}
