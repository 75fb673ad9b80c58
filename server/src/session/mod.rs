use std::sync::Arc;

use comms::transport;
use nanoid::nanoid;
use tokio::{net::TcpStream, sync::broadcast};
use tokio_stream::StreamExt;

use crate::room_manager::RoomManager;

use self::room_session::RoomSession;

mod room_session;

/// Given a tcp stream and the room manager, handles the connection's session
/// until the client disconnects or the server shuts down
pub async fn handle_session(
    room_manager: Arc<RoomManager>,
    mut quit_rx: broadcast::Receiver<()>,
    stream: TcpStream,
) -> anyhow::Result<()> {
    let session_id = nanoid!();
    // Split the tcp stream into a command stream and an event writer with better ergonomics
    let (mut commands, mut event_writer) = transport::server::split_tcp_stream(stream);
    let mut room_session = RoomSession::new(&session_id, room_manager);

    tracing::debug!(session_id = %session_id, "session started");

    loop {
        tokio::select! {
            cmd = commands.next() => match cmd {
                // The client closed its end of the stream. Clean up so the
                // remaining members observe the departure.
                None => {
                    room_session.leave_active_room().await;
                    break;
                }
                Some(Ok(cmd)) => {
                    room_session.handle_command(cmd).await?;
                }
                // A line we could not read or parse. The command is dropped,
                // the connection stays alive.
                Some(Err(err)) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %err,
                        "dropping malformed command"
                    );
                }
            },
            // Events aggregated for this connection are written back to the client
            Ok(event) = room_session.recv() => {
                if event_writer.write(&event).await.is_err() {
                    // A failed write means the client is gone, same cleanup
                    // as a closed stream
                    room_session.leave_active_room().await;
                    break;
                }
            }
            // If the server is shutting down, we can just close the tcp streams
            // and exit the session handler. Since the server is shutting down,
            // we don't need to notify other users about the user's departure or cleanup resources
            Ok(_) = quit_rx.recv() => {
                drop(event_writer);
                tracing::debug!(session_id = %session_id, "closing session for server shutdown");
                break;
            }
        }
    }

    tracing::debug!(session_id = %session_id, "session ended");

    Ok(())
}
