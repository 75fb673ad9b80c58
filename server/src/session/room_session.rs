use std::sync::Arc;

use anyhow::Context;
use comms::{command::UserCommand, event::Event};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::{AbortHandle, JoinSet},
};

use crate::room_manager::{RoomManager, RoomMembership, SessionAndUser};

/// [RoomSession] tracks which room a single connection is in and funnels the
/// events destined for that connection into one channel. A connection is in
/// at most one room at a time.
pub(super) struct RoomSession {
    session_id: String,
    room_manager: Arc<RoomManager>,
    active_room: Option<(RoomMembership, AbortHandle)>,
    join_set: JoinSet<()>,
    mpsc_tx: mpsc::Sender<Event>,
    mpsc_rx: mpsc::Receiver<Event>,
}

impl RoomSession {
    pub fn new(session_id: &str, room_manager: Arc<RoomManager>) -> Self {
        let (mpsc_tx, mpsc_rx) = mpsc::channel(100);

        RoomSession {
            session_id: String::from(session_id),
            room_manager,
            active_room: None,
            join_set: JoinSet::new(),
            mpsc_tx,
            mpsc_rx,
        }
    }

    /// Handle a single command in the context of this connection
    pub async fn handle_command(&mut self, cmd: UserCommand) -> anyhow::Result<()> {
        match cmd {
            UserCommand::JoinRoom(cmd) => {
                // Joining while already in a room leaves the old room first.
                // A repeated join of the same room produces a fresh snapshot.
                self.leave_active_room().await;

                let session_and_user = SessionAndUser {
                    session_id: self.session_id.clone(),
                    user_id: cmd.user_id,
                    user_name: cmd.user_name,
                };

                let (snapshot, mut broadcast_rx, membership) = self
                    .room_manager
                    .join_room(&cmd.room, &session_and_user)
                    .await;

                tracing::info!(
                    session_id = %self.session_id,
                    room = %cmd.room,
                    user_id = %session_and_user.user_id,
                    "user joined room"
                );

                // The joiner is the only connection that receives the
                // snapshot. It goes out before the forward task starts, the
                // receiver subscribed at join buffers the announcement that
                // follows it.
                self.mpsc_tx
                    .send(Event::RoomState(snapshot))
                    .await
                    .context("could not queue the room snapshot for the session")?;

                // Forward room broadcasts into the session's own channel,
                // skipping the ones this session originated.
                let abort_handle = self.join_set.spawn({
                    let mpsc_tx = self.mpsc_tx.clone();
                    let session_id = self.session_id.clone();

                    async move {
                        loop {
                            let broadcast = match broadcast_rx.recv().await {
                                Ok(broadcast) => broadcast,
                                // A connection that falls behind skips the
                                // overwritten broadcasts and stays subscribed
                                Err(RecvError::Lagged(_)) => continue,
                                Err(RecvError::Closed) => break,
                            };

                            if broadcast
                                .exclude_session
                                .as_deref()
                                .is_some_and(|excluded| excluded == session_id)
                            {
                                continue;
                            }

                            let _ = mpsc_tx.send(broadcast.event).await;
                        }
                    }
                });

                self.active_room = Some((membership, abort_handle));
            }
            UserCommand::LeaveRoom(cmd) => {
                // Leaving a room this connection is not in is accepted and
                // ignored
                if self
                    .active_room
                    .as_ref()
                    .is_some_and(|(membership, _)| membership.room() == cmd.room)
                {
                    self.leave_active_room().await;
                }
            }
            UserCommand::CodeChange(cmd) => {
                self.room_manager
                    .apply_code_change(&cmd.room, &self.session_id, cmd.code)
                    .await;
            }
            UserCommand::LanguageChange(cmd) => {
                self.room_manager
                    .apply_language_change(&cmd.room, &self.session_id, cmd.language)
                    .await;
            }
            UserCommand::ProblemChange(cmd) => {
                self.room_manager
                    .apply_problem_change(&cmd.room, &self.session_id, cmd.problem)
                    .await;
            }
        }

        Ok(())
    }

    /// Leave the active room if there is one. Also runs when the connection
    /// goes away, an abrupt disconnect is an implicit leave. The forward task
    /// is aborted first so the leaver never observes its own departure.
    pub async fn leave_active_room(&mut self) {
        if let Some((membership, abort_handle)) = self.active_room.take() {
            tracing::info!(
                session_id = %self.session_id,
                room = %membership.room(),
                "user left room"
            );

            abort_handle.abort();
            self.room_manager.leave_room(membership).await;
        }
    }

    /// Receive the next event destined for this connection
    pub async fn recv(&mut self) -> anyhow::Result<Event> {
        self.mpsc_rx
            .recv()
            .await
            .context("could not recv from the session event channel")
    }
}
