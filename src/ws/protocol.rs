//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::MatchId;

/// Message sent to a connection parked in the waiting slot
pub const WAITING_MESSAGE: &str = "Waiting for another player to join...";

/// Message sent to the remaining participant when the other one leaves
pub const OPPONENT_LEFT_MESSAGE: &str = "The other player disconnected.";

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Ask to be paired with another player
    JoinGame,

    /// Move own paddle to an absolute vertical offset
    PaddleMove {
        /// Match the input belongs to
        room: MatchId,
        /// Requested top edge of the paddle, unclamped
        position: f32,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// No opponent yet, connection holds the waiting slot
    Waiting { message: String },

    /// Paired with an opponent
    StartGame {
        room: MatchId,
        /// 1 = left paddle, 2 = right paddle
        player_number: u8,
    },

    /// Full simulation state, sent every tick
    GameStateUpdate { state: GameState },

    /// The opponent left and the match is over
    PlayerDisconnected { message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn waiting() -> Self {
        Self::Waiting {
            message: WAITING_MESSAGE.to_string(),
        }
    }

    pub fn opponent_left() -> Self {
        Self::PlayerDisconnected {
            message: OPPONENT_LEFT_MESSAGE.to_string(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Authoritative state of one match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Ball centre X
    pub ball_x: f32,
    /// Ball centre Y
    pub ball_y: f32,
    /// Horizontal travel per tick
    pub velocity_x: f32,
    /// Vertical travel per tick
    pub velocity_y: f32,
    /// Top edge of the left paddle
    pub paddle1_y: f32,
    /// Top edge of the right paddle
    pub paddle2_y: f32,
    pub score1: u32,
    pub score2: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_camel_case_tags() {
        let join: ClientMsg = serde_json::from_str(r#"{"type":"joinGame"}"#).unwrap();
        assert_eq!(join, ClientMsg::JoinGame);

        let moved: ClientMsg =
            serde_json::from_str(r#"{"type":"paddleMove","room":7,"position":-12.5}"#).unwrap();
        assert_eq!(
            moved,
            ClientMsg::PaddleMove {
                room: MatchId::from_raw(7),
                position: -12.5,
            }
        );
    }

    #[test]
    fn unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"shoot"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"paddleMove","room":1}"#).is_err());
    }

    #[test]
    fn start_game_payload_shape() {
        let msg = ServerMsg::StartGame {
            room: MatchId::from_raw(3),
            player_number: 2,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "type": "startGame", "room": 3, "playerNumber": 2 })
        );
    }

    #[test]
    fn state_update_carries_full_state() {
        let state = GameState {
            ball_x: 400.0,
            ball_y: 300.0,
            velocity_x: -4.0,
            velocity_y: 3.0,
            paddle1_y: 250.0,
            paddle2_y: 0.0,
            score1: 2,
            score2: 5,
        };
        let value = serde_json::to_value(ServerMsg::GameStateUpdate { state }).unwrap();
        assert_eq!(value["type"], "gameStateUpdate");
        assert_eq!(value["state"]["ballX"], 400.0);
        assert_eq!(value["state"]["velocityX"], -4.0);
        assert_eq!(value["state"]["paddle1Y"], 250.0);
        assert_eq!(value["state"]["paddle2Y"], 0.0);
        assert_eq!(value["state"]["score2"], 5);
    }

    #[test]
    fn notices_carry_messages() {
        let value = serde_json::to_value(ServerMsg::opponent_left()).unwrap();
        assert_eq!(value["type"], "playerDisconnected");
        assert_eq!(value["message"], OPPONENT_LEFT_MESSAGE);

        let value = serde_json::to_value(ServerMsg::waiting()).unwrap();
        assert_eq!(value["type"], "waiting");
    }
}
