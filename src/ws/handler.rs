//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::matchmaking::directory::DisconnectOutcome;
use crate::matchmaking::outbound::OutboundStream;
use crate::matchmaking::{JoinOutcome, SessionDirectory};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::ConnId;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    user_agent: Option<TypedHeader<UserAgent>>,
    State(state): State<AppState>,
) -> Response {
    let agent = user_agent
        .map(|TypedHeader(agent)| agent.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    debug!(user_agent = %agent, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state.sessions))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, sessions: SessionDirectory) {
    let (conn_id, outbound_rx) = sessions.connect();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    run_session(conn_id, &sessions, ws_sink, ws_stream, outbound_rx).await;

    // Exactly one disconnect per connection, whatever ended the session
    match sessions.handle_disconnect(conn_id) {
        DisconnectOutcome::MatchEnded {
            match_id,
            final_state,
        } => {
            info!(
                conn_id = %conn_id,
                match_id = %match_id,
                score1 = final_state.score1,
                score2 = final_state.score2,
                "WebSocket connection closed, match abandoned"
            );
        }
        outcome => {
            info!(conn_id = %conn_id, outcome = ?outcome, "WebSocket connection closed");
        }
    }
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: ConnId,
    sessions: &SessionDirectory,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbound_rx: OutboundStream,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Spawn writer task: outbound channel -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session directory
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    if rate_limiter.rejected() == 1 {
                        warn!(conn_id = %conn_id, "Rate limiting input messages");
                    } else {
                        debug!(conn_id = %conn_id, rejected = rate_limiter.rejected(), "Rate limited input message");
                    }
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => dispatch(sessions, conn_id, client_msg),
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        reply(
                            sessions,
                            conn_id,
                            ServerMsg::error("bad_message", e.to_string()),
                        );
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Route one client message to the session directory
fn dispatch(sessions: &SessionDirectory, conn_id: ConnId, msg: ClientMsg) {
    match msg {
        ClientMsg::JoinGame => match sessions.request_match(conn_id) {
            JoinOutcome::AlreadyInMatch(match_id) => {
                debug!(conn_id = %conn_id, match_id = %match_id, "Join ignored, already in a match");
            }
            outcome => {
                debug!(conn_id = %conn_id, outcome = ?outcome, "Join handled");
            }
        },
        ClientMsg::PaddleMove { room, position } => {
            sessions.handle_input(conn_id, room, position);
        }
        ClientMsg::Ping { t } => {
            reply(
                sessions,
                conn_id,
                ServerMsg::Pong {
                    t,
                    server_time: unix_millis(),
                },
            );
        }
    }
}

fn reply(sessions: &SessionDirectory, conn_id: ConnId, msg: ServerMsg) {
    if let Err(e) = sessions.send_to(conn_id, msg) {
        debug!(conn_id = %conn_id, error = %e, "Reply not delivered");
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatchId;
    use crate::util::time::tick_period;

    #[tokio::test]
    async fn dispatch_join_and_move() {
        let sessions = SessionDirectory::new(tick_period());
        let (a, mut rx_a) = sessions.connect();
        let (b, _rx_b) = sessions.connect();

        dispatch(&sessions, a, ClientMsg::JoinGame);
        dispatch(&sessions, b, ClientMsg::JoinGame);

        let (match_id, _) = sessions.match_of(a).unwrap();
        dispatch(
            &sessions,
            a,
            ClientMsg::PaddleMove {
                room: match_id,
                position: 1_000.0,
            },
        );

        assert_eq!(sessions.match_state(match_id).unwrap().paddle1_y, 500.0);
        assert_eq!(rx_a.try_recv(), Some(ServerMsg::waiting()));
        assert!(matches!(
            rx_a.try_recv(),
            Some(ServerMsg::StartGame { player_number: 1, .. })
        ));
    }

    #[tokio::test]
    async fn dispatch_ping_replies_with_pong() {
        let sessions = SessionDirectory::new(tick_period());
        let (a, mut rx) = sessions.connect();

        dispatch(&sessions, a, ClientMsg::Ping { t: 77 });

        match rx.try_recv().expect("pong reply") {
            ServerMsg::Pong { t, server_time } => {
                assert_eq!(t, 77);
                assert!(server_time > 0);
            }
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_move_for_missing_match_is_silent() {
        let sessions = SessionDirectory::new(tick_period());
        let (a, mut rx) = sessions.connect();

        dispatch(
            &sessions,
            a,
            ClientMsg::PaddleMove {
                room: MatchId::from_raw(404),
                position: 10.0,
            },
        );

        assert_eq!(rx.try_recv(), None);
    }
}
