use actix::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::MoveRejection;
use crate::game::{MoveRequest, Stone};
use crate::models::{coordinate, AppState, ClientMessage, Outbound, ServerMessage, SessionId};
use crate::routes::visitor_id;

/// WebSocket handler for one connection
pub struct RenjuWebSocket {
    pub id: String,
    /// Opaque identity of the browser behind this connection.
    pub visitor: String,
    pub app_state: web::Data<AppState>,
    pub session_id: Option<SessionId>,
    pub color: Option<Stone>,
}

impl Actor for RenjuWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("WebSocket connection started: {} (visitor {})", self.id, self.visitor);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(session_id) = self.session_id.take() {
            self.app_state.groups.leave(session_id, &self.id);

            let app_state = self.app_state.clone();
            actix::spawn(async move {
                app_state.cache.detach(session_id).await;
            });
        }

        info!("WebSocket connection closed: {}", self.id);
        Running::Stop
    }
}

impl Handler<Outbound> for RenjuWebSocket {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        debug!("Forwarding message to {}: {}", self.id, msg.0);
        ctx.text(msg.0);
    }
}

// WebSocket message handler
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RenjuWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                debug!("Received text message from {}: {}", self.id, text);
                match serde_json::from_str::<ClientMessage>(text.as_ref()) {
                    Ok(client_msg) => self.handle_message(client_msg, ctx),
                    Err(e) => {
                        warn!("Error parsing client message: {}", e);
                        self.send(ctx, &ServerMessage::error(format!("Invalid message format: {}", e)));
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
                self.send(ctx, &ServerMessage::error("Binary messages are not supported"));
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl RenjuWebSocket {
    pub fn new(visitor: String, app_state: web::Data<AppState>) -> Self {
        RenjuWebSocket {
            id: Uuid::new_v4().to_string(),
            visitor,
            app_state,
            session_id: None,
            color: None,
        }
    }

    /// Send one message to this connection only.
    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(text) => ctx.text(text),
            Err(e) => warn!("Error serializing message: {}", e),
        }
    }

    fn broadcast(&self, session_id: SessionId, message: &ServerMessage) {
        let sent = self.app_state.groups.broadcast(session_id, message);
        debug!("Broadcast to {} connections of game {}", sent, session_id);
    }

    /// Save in the background; failures are logged and retried later.
    fn flush_later(&self, session_id: SessionId) {
        let app_state = self.app_state.clone();
        actix::spawn(async move {
            if let Err(e) = app_state.cache.flush(session_id).await {
                debug!("Game {} stays dirty until the idle flush: {}", session_id, e);
            }
        });
    }

    pub fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg {
            ClientMessage::Handshake { session_id } => self.handle_handshake(session_id, ctx),
            ClientMessage::FetchState => self.handle_fetch_state(ctx),
            ClientMessage::Move {
                x,
                y,
                claimed_sequence_number,
            } => {
                let request = MoveRequest::new(coordinate(&x), coordinate(&y), claimed_sequence_number);
                self.handle_move(request, ctx);
            }
        }
    }

    fn handle_handshake(&mut self, session_id: SessionId, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(current) = self.session_id {
            warn!("Double handshake on {} (already watching game {})", self.id, current);
            self.send(ctx, &ServerMessage::error("Double handshake"));
            return;
        }

        let app_state = self.app_state.clone();
        let visitor = self.visitor.clone();
        let attach = async move { app_state.cache.attach(session_id, &visitor).await };

        // Later messages from this connection wait until the attach is done.
        ctx.wait(attach.into_actor(self).map(move |result, act, ctx| match result {
            Ok(attachment) => {
                if !ctx.state().alive() {
                    // Connection went away while loading; give the slot back.
                    let app_state = act.app_state.clone();
                    actix::spawn(async move { app_state.cache.detach(session_id).await });
                    return;
                }

                act.session_id = Some(session_id);
                act.color = attachment.role;
                act.app_state
                    .groups
                    .join(session_id, &act.id, ctx.address().recipient());

                act.send(
                    ctx,
                    &ServerMessage::HandshakeResponse {
                        color: attachment.role,
                        status: attachment.status,
                    },
                );

                // The newcomer always gets the board; watchers only when it changed.
                if attachment.changed {
                    act.broadcast(session_id, &ServerMessage::Update(attachment.snapshot));
                    act.flush_later(session_id);
                } else {
                    act.send(ctx, &ServerMessage::Update(attachment.snapshot));
                }
            }
            Err(e) => {
                error!("Handshake of {} with game {} failed: {}", act.id, session_id, e);
                act.send(ctx, &ServerMessage::error(e.client_reason()));
            }
        }));
    }

    fn handle_fetch_state(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(session_id) = self.session_id else {
            self.send(ctx, &ServerMessage::error(MoveRejection::NotAttached.to_string()));
            return;
        };

        let app_state = self.app_state.clone();
        let fetch = async move { app_state.cache.snapshot(session_id).await };
        ctx.wait(fetch.into_actor(self).map(move |snapshot, act, _| match snapshot {
            Some(snapshot) => act.broadcast(session_id, &ServerMessage::Update(snapshot)),
            None => warn!("Game {} vanished from cache while {} watched it", session_id, act.id),
        }));
    }

    fn handle_move(&mut self, request: MoveRequest, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(session_id) = self.session_id else {
            self.send(ctx, &ServerMessage::error(MoveRejection::NotAttached.to_string()));
            return;
        };

        let app_state = self.app_state.clone();
        let visitor = self.visitor.clone();
        let apply = async move { app_state.cache.apply_move(session_id, &visitor, request).await };

        ctx.wait(apply.into_actor(self).map(move |result, act, ctx| match result {
            Ok(Some(snapshot)) => {
                act.broadcast(session_id, &ServerMessage::Update(snapshot));
                act.flush_later(session_id);
            }
            Ok(None) => {
                debug!("Move from {} ignored, game {} is not in progress", act.id, session_id);
            }
            Err(rejection) => {
                info!(
                    "Rejected move from {} ({:?}) in game {}: {}",
                    act.id, act.color, session_id, rejection
                );
                act.send(ctx, &ServerMessage::error(rejection.to_string()));
            }
        }));
    }
}

/// WebSocket connection handler
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let visitor = visitor_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());
    info!("New WebSocket connection request from visitor {}", visitor);

    ws::start(RenjuWebSocket::new(visitor, app_state), &req, stream)
}
