//! Per-connection outbound routing.
//!
//! Control messages (`waiting`, `startGame`, `playerDisconnected`, replies)
//! go through an unbounded queue and are never dropped. Simulation state is
//! published on a watch channel, so a slow reader skips to the newest state
//! instead of building a backlog.

use tokio::sync::{mpsc, watch};

use crate::ws::protocol::{GameState, ServerMsg};

/// Directory-side handle for one connection
pub struct Outbound {
    control: mpsc::UnboundedSender<ServerMsg>,
    state: watch::Sender<Option<GameState>>,
}

/// Writer-side stream for one connection
pub struct OutboundStream {
    control: mpsc::UnboundedReceiver<ServerMsg>,
    state: watch::Receiver<Option<GameState>>,
}

/// Create a connected outbound pair
pub fn channel() -> (Outbound, OutboundStream) {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(None);

    (
        Outbound {
            control: control_tx,
            state: state_tx,
        },
        OutboundStream {
            control: control_rx,
            state: state_rx,
        },
    )
}

impl Outbound {
    /// Queue a control message. Fails only if the writer is gone.
    pub fn send(&self, msg: ServerMsg) -> Result<(), ServerMsg> {
        self.control.send(msg).map_err(|e| e.0)
    }

    /// Replace the pending state update with `state`
    pub fn publish(&self, state: GameState) {
        self.state.send_replace(Some(state));
    }

    /// Withdraw any state update the writer has not picked up yet
    pub fn clear_state(&self) {
        self.state.send_replace(None);
    }
}

impl OutboundStream {
    /// Next message to write. Control messages go first. Returns `None` once
    /// the connection has been unregistered and the control queue is drained.
    pub async fn recv(&mut self) -> Option<ServerMsg> {
        loop {
            tokio::select! {
                biased;

                msg = self.control.recv() => return msg,
                changed = self.state.changed() => {
                    if changed.is_err() {
                        // State sender gone; flush what is left of the control queue
                        return self.control.recv().await;
                    }
                    if let Some(state) = *self.state.borrow_and_update() {
                        return Some(ServerMsg::GameStateUpdate { state });
                    }
                }
            }
        }
    }

    /// Non-blocking variant of `recv`
    pub fn try_recv(&mut self) -> Option<ServerMsg> {
        if let Ok(msg) = self.control.try_recv() {
            return Some(msg);
        }

        if self.state.has_changed().unwrap_or(false) {
            if let Some(state) = *self.state.borrow_and_update() {
                return Some(ServerMsg::GameStateUpdate { state });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(ball_x: f32) -> GameState {
        GameState {
            ball_x,
            ball_y: 300.0,
            velocity_x: 4.0,
            velocity_y: 3.0,
            paddle1_y: 250.0,
            paddle2_y: 250.0,
            score1: 0,
            score2: 0,
        }
    }

    #[test]
    fn newest_state_wins() {
        let (tx, mut rx) = channel();

        for x in 0..500 {
            tx.publish(state_at(x as f32));
        }

        assert_eq!(
            rx.try_recv(),
            Some(ServerMsg::GameStateUpdate {
                state: state_at(499.0)
            })
        );
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn control_messages_are_never_dropped() {
        let (tx, mut rx) = channel();

        for _ in 0..1_000 {
            tx.publish(state_at(1.0));
            tx.send(ServerMsg::waiting()).unwrap();
        }

        let mut control = 0;
        while let Some(msg) = rx.try_recv() {
            if msg == ServerMsg::waiting() {
                control += 1;
            }
        }
        assert_eq!(control, 1_000);
    }

    #[test]
    fn cleared_state_is_not_delivered() {
        let (tx, mut rx) = channel();

        tx.publish(state_at(10.0));
        tx.clear_state();
        tx.send(ServerMsg::opponent_left()).unwrap();

        assert_eq!(rx.try_recv(), Some(ServerMsg::opponent_left()));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn recv_prefers_control_and_ends_after_drop() {
        let (tx, mut rx) = channel();

        tx.publish(state_at(20.0));
        tx.send(ServerMsg::opponent_left()).unwrap();

        assert_eq!(rx.recv().await, Some(ServerMsg::opponent_left()));
        assert!(matches!(
            rx.recv().await,
            Some(ServerMsg::GameStateUpdate { .. })
        ));

        tx.send(ServerMsg::waiting()).unwrap();
        drop(tx);
        assert_eq!(rx.recv().await, Some(ServerMsg::waiting()));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn send_fails_once_reader_is_gone() {
        let (tx, rx) = channel();
        drop(rx);

        assert!(tx.send(ServerMsg::waiting()).is_err());
    }
}
