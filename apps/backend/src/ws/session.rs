use std::time::Instant;

use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::web;
use actix_web_actors::ws;
use time::OffsetDateTime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::identity;
use crate::error::domain_error_code;
use crate::errors::domain::{DomainError, InfraErrorKind};
use crate::errors::ErrorCode;
use crate::services::session_engine::JoinOutcome;
use crate::state::app_state::AppState;
use crate::ws::hub::Outbound;
use crate::ws::protocol::{ClientMsg, JoinedAs, ServerMsg, PROTOCOL_VERSION};

pub struct WsSession {
    conn_id: Uuid,
    caller: identity::Actor,
    app_state: web::Data<AppState>,
    tx: Outbound,
    rx: Option<UnboundedReceiver<ServerMsg>>,
    /// Feeds the connection's command worker; set once the actor starts.
    commands: Option<UnboundedSender<ClientMsg>>,
    last_heartbeat: Instant,
    hello_done: bool,
}

impl WsSession {
    pub fn new(caller: identity::Actor, app_state: web::Data<AppState>) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            conn_id: Uuid::new_v4(),
            caller,
            app_state,
            tx,
            rx: Some(rx),
            commands: None,
            last_heartbeat: Instant::now(),
            hello_done: false,
        }
    }

    fn send_json(ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMsg) {
        match serde_json::to_string(msg) {
            Ok(payload) => ctx.text(payload),
            Err(err) => warn!(error = %err, "[WS SESSION] failed to serialize outbound message"),
        }
    }

    fn send_error_and_close(
        &self,
        ctx: &mut ws::WebsocketContext<Self>,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        Self::send_json(ctx, &ServerMsg::error(code, message, false));
        ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
        ctx.stop();
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let interval = self.app_state.config.ws_heartbeat_interval;
        let timeout = self.app_state.config.ws_client_timeout;
        ctx.run_interval(interval, move |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > timeout {
                warn!(
                    conn_id = %actor.conn_id,
                    user_id = actor.caller.user_id,
                    "[WS SESSION] heartbeat timed out"
                );
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
                ctx.stop();
                return;
            }
            ctx.ping(b"keepalive");
        });
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let Ok(cmd) = serde_json::from_str::<ClientMsg>(text) else {
            self.send_error_and_close(ctx, ErrorCode::BadRequest, "Malformed JSON");
            return;
        };

        if let ClientMsg::Hello { protocol } = cmd {
            if protocol != PROTOCOL_VERSION {
                self.send_error_and_close(
                    ctx,
                    ErrorCode::BadProtocol,
                    "Unsupported protocol version",
                );
                return;
            }
            self.hello_done = true;
            Self::send_json(
                ctx,
                &ServerMsg::HelloAck {
                    protocol: PROTOCOL_VERSION,
                    user_id: self.caller.user_id,
                },
            );
            return;
        }

        if !self.hello_done {
            self.send_error_and_close(ctx, ErrorCode::BadRequest, "Must send hello first");
            return;
        }

        let Some(commands) = &self.commands else {
            return;
        };
        if commands.send(cmd).is_err() {
            warn!(conn_id = %self.conn_id, "[WS SESSION] command worker gone");
        }
    }
}

/// One task per connection runs its commands in arrival order. Closing the
/// connection drops the sender; the worker drains what was already queued,
/// so an accepted command is never cut off half-way.
fn spawn_command_worker(
    state: web::Data<AppState>,
    caller: identity::Actor,
    conn_id: Uuid,
    tx: Outbound,
) -> UnboundedSender<ClientMsg> {
    let (commands, mut queue) = unbounded_channel::<ClientMsg>();
    tokio::spawn(async move {
        while let Some(cmd) = queue.recv().await {
            let span = info_span!(
                "ws_command",
                conn_id = %conn_id,
                user_id = caller.user_id,
                command = cmd.name()
            );
            let reply = match dispatch(&state, &caller, conn_id, cmd).instrument(span).await {
                Ok(msg) => msg,
                Err(err) => error_frame(&err),
            };
            if tx.send(reply).is_err() {
                debug!(conn_id = %conn_id, "connection gone before reply");
            }
        }
        debug!(conn_id = %conn_id, "command worker finished");
    });
    commands
}

fn error_frame(err: &DomainError) -> ServerMsg {
    match err {
        DomainError::Infra(kind, _) => {
            warn!(error = %err, "command failed");
            let message = match kind {
                InfraErrorKind::DataCorruption => "stored data is unreadable",
                _ => "temporarily unavailable, try again",
            };
            ServerMsg::error(domain_error_code(err), message, err.is_retryable())
        }
        _ => {
            debug!(error = %err, "command rejected");
            ServerMsg::error(domain_error_code(err), err.detail(), err.is_retryable())
        }
    }
}

/// Run one accepted command against the engine.
async fn dispatch(
    state: &AppState,
    caller: &identity::Actor,
    conn_id: Uuid,
    cmd: ClientMsg,
) -> Result<ServerMsg, DomainError> {
    let engine = &state.engine;
    let now = OffsetDateTime::now_utc();
    let command = cmd.name();

    let msg = match cmd {
        ClientMsg::Hello { protocol } => ServerMsg::HelloAck {
            protocol,
            user_id: caller.user_id,
        },
        ClientMsg::Join { session_id } => {
            let outcome = engine.join(caller, session_id, now).await?;
            state
                .registry
                .join_session(conn_id, session_id, outcome.is_host());
            let (role, rejoined) = match &outcome {
                JoinOutcome::Host { .. } => (JoinedAs::Host, false),
                JoinOutcome::Participant { rejoined, .. } => (JoinedAs::Participant, *rejoined),
            };
            ServerMsg::Joined {
                session_id,
                role,
                rejoined,
                snapshot: outcome.snapshot().clone(),
            }
        }
        ClientMsg::Start { session_id } => {
            let outcome = engine.start(caller, session_id, now).await?;
            ServerMsg::Ack {
                command,
                session_id,
                status: Some(outcome.session.status),
            }
        }
        ClientMsg::Advance { session_id } => {
            let outcome = engine.advance(caller, session_id, now).await?;
            ServerMsg::Ack {
                command,
                session_id,
                status: Some(outcome.session.status),
            }
        }
        ClientMsg::End { session_id } => {
            let outcome = engine.end(caller, session_id, now).await?;
            ServerMsg::Ack {
                command,
                session_id,
                status: Some(outcome.session.status),
            }
        }
        ClientMsg::SubmitAnswer {
            session_id,
            question_id,
            answer,
            time_taken_ms,
        } => {
            let receipt = engine
                .submit_answer(caller, session_id, question_id, answer, time_taken_ms, now)
                .await?;
            ServerMsg::AnswerReceipt {
                session_id,
                receipt,
            }
        }
        ClientMsg::ReportTabSwitch { session_id } => {
            engine.report_tab_switch(caller, session_id, now).await?;
            ServerMsg::Ack {
                command,
                session_id,
                status: None,
            }
        }
        ClientMsg::Complete { session_id } => {
            engine.complete(caller, session_id, now).await?;
            ServerMsg::Ack {
                command,
                session_id,
                status: None,
            }
        }
        ClientMsg::Sync { session_id } => ServerMsg::Sync {
            payload: engine.sync(caller, session_id, now).await?,
        },
    };
    Ok(msg)
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            conn_id = %self.conn_id,
            user_id = self.caller.user_id,
            "[WS SESSION] started"
        );
        self.app_state
            .registry
            .register_connection(self.conn_id, self.caller.user_id, self.tx.clone());
        if let Some(rx) = self.rx.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }
        self.commands = Some(spawn_command_worker(
            self.app_state.clone(),
            self.caller.clone(),
            self.conn_id,
            self.tx.clone(),
        ));
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.commands = None;
        self.app_state.registry.unregister_connection(self.conn_id);
        info!(
            conn_id = %self.conn_id,
            user_id = self.caller.user_id,
            "[WS SESSION] stopped"
        );
    }
}

/// Outbound frames: engine fan-out and command replies.
impl StreamHandler<ServerMsg> for WsSession {
    fn handle(&mut self, msg: ServerMsg, ctx: &mut Self::Context) {
        Self::send_json(ctx, &msg);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.handle_text(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
                self.send_error_and_close(ctx, ErrorCode::BadRequest, "Binary not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {
                self.last_heartbeat = Instant::now();
            }
            Err(err) => {
                warn!(
                    conn_id = %self.conn_id,
                    user_id = self.caller.user_id,
                    error = %err,
                    "[WS SESSION] protocol error"
                );
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                ctx.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::identity::Role;
    use crate::domain::participant::ParticipantStatus;
    use crate::domain::session::{NewSession, SessionSettings};
    use crate::errors::domain::ConflictKind;
    use crate::infra::state::build_state;
    use crate::repos::memory::InMemoryStore;

    #[tokio::test]
    async fn queued_commands_run_in_order_and_survive_disconnect() {
        let store = Arc::new(InMemoryStore::new());
        let state = build_state()
            .with_memory_store(store)
            .build()
            .await
            .unwrap();
        let session = state
            .store()
            .create_session(
                NewSession {
                    host_id: 1,
                    title: "t".into(),
                    questions: vec![],
                    settings: SessionSettings::default(),
                    scheduled_at: None,
                    auto_start: false,
                },
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap();
        let caller = identity::Actor {
            user_id: 10,
            display_name: "ann".into(),
            role: Role::Participant,
        };
        let (tx, mut replies) = unbounded_channel();

        let commands =
            spawn_command_worker(web::Data::new(state.clone()), caller, Uuid::new_v4(), tx);
        commands
            .send(ClientMsg::Join {
                session_id: session.id,
            })
            .unwrap();
        commands
            .send(ClientMsg::Complete {
                session_id: session.id,
            })
            .unwrap();
        drop(commands);

        assert!(matches!(replies.recv().await, Some(ServerMsg::Joined { .. })));
        assert!(matches!(
            replies.recv().await,
            Some(ServerMsg::Ack {
                command: "complete",
                ..
            })
        ));
        assert!(replies.recv().await.is_none());

        let record = state
            .store()
            .find_participant_record(session.id, 10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ParticipantStatus::Completed);
    }

    #[test]
    fn rejection_frames_carry_detail() {
        let frame = error_frame(&DomainError::conflict(
            ConflictKind::DuplicateAnswer,
            "question 3 already answered",
        ));
        let value = serde_json::to_value(frame).unwrap();
        assert_eq!(value["code"], "DUPLICATE_ANSWER");
        assert_eq!(value["message"], "question 3 already answered");
        assert_eq!(value["retryable"], false);
    }

    #[test]
    fn infra_frames_hide_internals() {
        let frame = error_frame(&DomainError::infra(
            InfraErrorKind::DbUnavailable,
            "connection refused at 10.0.0.5:5432",
        ));
        let value = serde_json::to_value(frame).unwrap();
        assert_eq!(value["code"], "DB_UNAVAILABLE");
        assert_eq!(value["retryable"], true);
        assert!(!value["message"].as_str().unwrap().contains("10.0.0.5"));
    }
}
