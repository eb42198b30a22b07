//! WebSocket transport adapter
//!
//! One long-lived socket per client at `/ws`. Inbound text frames decode
//! into [`ClientEvent`] and dispatch to the owning room under its lock; a
//! writer task drains the connection's bounded frame queue. The adapter
//! also owns the application-level heartbeat: a `ping_heartbeat` every 15
//! seconds, and a close after 30 seconds without a `pong_heartbeat`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use trivion_core::{code, Error};

use crate::bus::{ConnHandle, SEND_QUEUE_CAPACITY};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::reconnect::{self, Attachment};
use crate::AppHandle;

/// Cadence of server pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// A connection with no pong for this long is considered dead.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Optional room code carried in the URL, used as the default for
    /// `join_room`.
    pub code: Option<String>,
}

pub async fn ws_handler(
    State(app): State<AppHandle>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, app, params.code))
}

struct ConnCtx {
    conn: ConnHandle,
    attached: Option<Attachment>,
    default_code: Option<String>,
    last_pong: Instant,
}

impl ConnCtx {
    fn send(&self, event: &ServerEvent) {
        self.conn.send(event);
    }

    fn send_error(&self, err: &Error) {
        self.conn.send(&ServerEvent::error(err));
    }
}

/// Handle a single client connection until it closes.
async fn handle_connection(socket: WebSocket, app: AppHandle, url_code: Option<String>) {
    let conn_id = Uuid::new_v4();
    debug!(conn_id = %conn_id, "Connection opened");

    let (mut sink, mut stream) = socket.split();
    let (frames_tx, mut frames_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_CAPACITY);
    let kill = Arc::new(Notify::new());
    let conn = ConnHandle::new(conn_id, frames_tx, kill.clone());

    // Writer task: the only place that touches the sink.
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            if sink.send(Message::Text(frame.as_ref().clone())).await.is_err() {
                break;
            }
        }
    });

    let mut ctx = ConnCtx {
        conn,
        attached: None,
        default_code: url_code.map(|c| code::normalize(&c)).filter(|c| !c.is_empty()),
        last_pong: Instant::now(),
    };
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => dispatch(&app, &mut ctx, event).await,
                        Err(e) => {
                            debug!(conn_id = %conn_id, error = %e, "Malformed event");
                            ctx.send(&ServerEvent::Error {
                                message: "Evento desconhecido ou malformado".into(),
                            });
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(conn_id = %conn_id, error = %e, "Read error");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if ctx.last_pong.elapsed() > HEARTBEAT_TIMEOUT {
                    warn!(conn_id = %conn_id, "Heartbeat timed out");
                    break;
                }
                ctx.send(&ServerEvent::PingHeartbeat);
            }
            _ = kill.notified() => {
                debug!(conn_id = %conn_id, "Connection killed by bus");
                break;
            }
        }
    }

    // Detach first: every path (disconnect, kick, room close) ends with the
    // bus holding no sender clone, so dropping ours closes the frame channel
    // and the writer drains what is already queued before exiting.
    if let Some(att) = ctx.attached.take() {
        reconnect::handle_disconnect(
            &app.rooms,
            &app.reconnect,
            &att.room_code,
            att.member_id,
            conn_id,
        )
        .await;
    }
    drop(ctx);
    let mut writer = writer;
    if tokio::time::timeout(Duration::from_secs(5), &mut writer).await.is_err() {
        debug!(conn_id = %conn_id, "Writer did not drain in time");
        writer.abort();
    }
    debug!(conn_id = %conn_id, "Connection closed");
}

/// Route one inbound event to the owning room.
async fn dispatch(app: &AppHandle, ctx: &mut ConnCtx, event: ClientEvent) {
    match event {
        ClientEvent::PongHeartbeat => {
            ctx.last_pong = Instant::now();
        }

        ClientEvent::ListRooms => {
            let rooms = app
                .rooms
                .list_public()
                .await
                .iter()
                .map(|summary| summary.listing())
                .collect();
            ctx.send(&ServerEvent::AvailableRooms { rooms });
        }

        ClientEvent::CreateRoom {
            name,
            public,
            password,
        } => match app.rooms.create(&name, public, password.as_deref()).await {
            Ok(room) => {
                let st = room.lock().await;
                let summary = st.summary();
                drop(st);
                ctx.send(&ServerEvent::RoomCreated {
                    code: summary.code.clone(),
                    room: summary,
                });
            }
            Err(e) => ctx.send_error(&e),
        },

        ClientEvent::JoinRoom {
            code,
            name,
            password,
            as_admin,
        } => join_room(app, ctx, code, name, password, as_admin).await,

        ClientEvent::LeaveRoom => leave_room(app, ctx).await,

        ClientEvent::Reconnect { member_id } => {
            if ctx.attached.is_some() {
                ctx.send_error(&Error::NotConnected);
                return;
            }
            match reconnect::handle_reconnect(
                &app.rooms,
                &app.reconnect,
                member_id,
                ctx.conn.clone(),
            )
            .await
            {
                Ok(att) => ctx.attached = Some(att),
                Err(e) => {
                    let message = match e {
                        Error::RoomNotFound => "Sala não encontrada".to_string(),
                        _ => "Sessão expirada".to_string(),
                    };
                    ctx.send(&ServerEvent::ReconnectFailed { message });
                }
            }
        }

        ClientEvent::Answer { choice, timestamp } => {
            let result = match attached_room(app, ctx).await {
                Ok((room, member_id)) => {
                    room.lock().await.submit_answer(member_id, choice, timestamp)
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                ctx.send_error(&e);
            }
        }

        ClientEvent::GetState => match attached_room(app, ctx).await {
            Ok((room, _)) => {
                let snapshot = room.lock().await.snapshot();
                ctx.send(&ServerEvent::State(snapshot));
            }
            Err(e) => ctx.send_error(&e),
        },

        ClientEvent::StartGame => admin_command(app, ctx, AdminOp::Start).await,
        ClientEvent::Next => admin_command(app, ctx, AdminOp::Next).await,
        ClientEvent::EndGame => admin_command(app, ctx, AdminOp::End).await,
        ClientEvent::BackToLobby => admin_command(app, ctx, AdminOp::BackToLobby).await,

        ClientEvent::RemoveMember { member_id } => {
            let result = match attached_room(app, ctx).await {
                Ok((room, actor)) => {
                    let mut st = room.lock().await;
                    let removed = st.kick_member(Some(actor), member_id);
                    let empty = st.roster.is_empty();
                    drop(st);
                    match removed {
                        Ok(member) => {
                            app.reconnect.purge_member(member.id).await;
                            if empty {
                                if let Some(att) = &ctx.attached {
                                    app.rooms.destroy_if_empty(&att.room_code).await;
                                }
                            }
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                ctx.send_error(&e);
            }
        }
    }
}

async fn join_room(
    app: &AppHandle,
    ctx: &mut ConnCtx,
    code: Option<String>,
    name: String,
    password: Option<String>,
    as_admin: bool,
) {
    // A stale attachment (member kicked, room destroyed) must not block a
    // fresh join.
    if let Some(att) = &ctx.attached {
        let still_member = match app.rooms.find(&att.room_code).await {
            Some(room) => room.lock().await.roster.find(att.member_id).is_some(),
            None => false,
        };
        if still_member {
            ctx.send(&ServerEvent::Error {
                message: "Você já está em uma sala".into(),
            });
            return;
        }
        ctx.attached = None;
    }

    let code = code
        .map(|c| code::normalize(&c))
        .filter(|c| !c.is_empty())
        .or_else(|| ctx.default_code.clone());
    let Some(code) = code else {
        ctx.send_error(&Error::RoomNotFound);
        return;
    };
    let name = name.trim().to_string();

    let Some(room) = app.rooms.find(&code).await else {
        ctx.send_error(&Error::RoomNotFound);
        return;
    };
    let mut st = room.lock().await;
    match st.join(&name, password.as_deref(), as_admin, ctx.conn.clone()) {
        Ok(member) => {
            let summary = st.summary();
            let state = st.snapshot();
            drop(st);
            ctx.attached = Some(Attachment {
                room_code: code,
                member_id: member.id,
            });
            ctx.send(&ServerEvent::Welcome {
                member,
                room: summary,
                state,
            });
        }
        Err(e) => {
            drop(st);
            ctx.send_error(&e);
        }
    }
}

async fn leave_room(app: &AppHandle, ctx: &mut ConnCtx) {
    let Some(att) = ctx.attached.take() else {
        ctx.send_error(&Error::NotConnected);
        return;
    };
    if let Some(room) = app.rooms.find(&att.room_code).await {
        let mut st = room.lock().await;
        st.leave(att.member_id);
        let empty = st.roster.is_empty();
        drop(st);
        app.reconnect.purge_member(att.member_id).await;
        if empty {
            app.rooms.destroy_if_empty(&att.room_code).await;
        }
    }
}

/// Resolve the room this connection is attached to.
async fn attached_room(
    app: &AppHandle,
    ctx: &ConnCtx,
) -> trivion_core::Result<(Arc<crate::room::Room>, Uuid)> {
    let att = ctx.attached.as_ref().ok_or(Error::NotConnected)?;
    let room = app
        .rooms
        .find(&att.room_code)
        .await
        .ok_or(Error::RoomNotFound)?;
    Ok((room, att.member_id))
}

enum AdminOp {
    Start,
    Next,
    End,
    BackToLobby,
}

/// Run an administrator command against the attached room, reporting any
/// failure as a targeted error.
async fn admin_command(app: &AppHandle, ctx: &mut ConnCtx, op: AdminOp) {
    let result = match attached_room(app, ctx).await {
        Ok((room, actor)) => {
            let mut st = room.lock().await;
            match op {
                AdminOp::Start => st.start_game(Some(actor), &app.rooms),
                AdminOp::Next => st.next(Some(actor), &app.rooms),
                AdminOp::End => st.end_game(Some(actor)),
                AdminOp::BackToLobby => st.back_to_lobby(Some(actor)),
            }
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        ctx.send_error(&e);
    }
}
