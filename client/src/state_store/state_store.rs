use anyhow::Context;
use comms::{
    command,
    transport::{
        self,
        client::{CommandWriter, EventStream},
    },
};
use tokio::{
    net::{tcp::OwnedWriteHalf, TcpStream},
    sync::{
        broadcast,
        mpsc::{self, UnboundedReceiver, UnboundedSender},
    },
};
use tokio_stream::StreamExt;

use crate::{Interrupted, Terminator};

use super::{action::Action, State};

pub struct StateStore {
    state_tx: UnboundedSender<State>,
}

impl StateStore {
    pub fn new() -> (Self, UnboundedReceiver<State>) {
        let (state_tx, state_rx) = mpsc::unbounded_channel::<State>();

        (StateStore { state_tx }, state_rx)
    }
}

type ServerHandle = (EventStream, CommandWriter<OwnedWriteHalf>);

async fn create_server_handle(addr: &str) -> anyhow::Result<ServerHandle> {
    let stream = TcpStream::connect(addr).await?;
    let (event_stream, command_writer) = transport::client::split_tcp_stream(stream);

    Ok((event_stream, command_writer))
}

impl StateStore {
    async fn connect_to_server(
        &self,
        state: &mut State,
        addr: String,
    ) -> anyhow::Result<Option<ServerHandle>> {
        state.mark_connection_request_start();
        // emit the connecting status so observers can re-render right away
        self.state_tx.send(state.clone())?;

        match create_server_handle(&addr).await {
            Ok(server_handle) => {
                state.process_connection_request_result(Ok(addr));

                Ok(Some(server_handle))
            }
            Err(err) => {
                state.process_connection_request_result(Err(err));

                Ok(None)
            }
        }
    }

    pub async fn main_loop(
        self,
        mut terminator: Terminator,
        mut action_rx: UnboundedReceiver<Action>,
        mut interrupt_rx: broadcast::Receiver<Interrupted>,
    ) -> anyhow::Result<Interrupted> {
        let mut opt_server_handle: Option<ServerHandle> = None;
        let mut state = State::default();

        // the initial state once
        self.state_tx.send(state.clone())?;

        let result = loop {
            if let Some((event_stream, command_writer)) = opt_server_handle.as_mut() {
                tokio::select! {
                    // Handle the server events as they come in
                    maybe_event = event_stream.next() => match maybe_event {
                        Some(Ok(event)) => {
                            state.handle_server_event(&event);
                        },
                        // server disconnected, we need to reset the state
                        None => {
                            opt_server_handle = None;
                            state = State::default();
                        },
                        _ => (),
                    },
                    // Handle the actions coming from the surrounding application
                    // and process them to do async operations
                    Some(action) = action_rx.recv() => match action {
                        Action::ConnectToServerRequest { addr } => {
                            // drop the current connection before dialing the new address
                            drop(opt_server_handle.take());
                            state = State::default();

                            opt_server_handle = self.connect_to_server(&mut state, addr).await?;
                        },
                        Action::DisconnectFromServer => {
                            opt_server_handle = None;
                            state = State::default();
                        },
                        Action::JoinRoom { room, user_id, user_name } => {
                            state.begin_join(&room, &user_id, &user_name);

                            command_writer
                                .write(&command::UserCommand::JoinRoom(command::JoinRoomCommand {
                                    room,
                                    user_id,
                                    user_name,
                                }))
                                .await
                                .context("could not send the join command")?;
                        },
                        Action::LeaveRoom => {
                            if let Some(room_view) = state.active_room.as_ref() {
                                let leave_command =
                                    command::UserCommand::LeaveRoom(command::LeaveRoomCommand {
                                        room: room_view.room.clone(),
                                        user_id: state.user_id.clone(),
                                    });

                                state.clear_active_room();
                                command_writer
                                    .write(&leave_command)
                                    .await
                                    .context("could not send the leave command")?;
                            }
                        },
                        Action::EditCode { code } => {
                            if let Some(room_view) = state.active_room.as_ref() {
                                let change_command =
                                    command::UserCommand::CodeChange(command::CodeChangeCommand {
                                        room: room_view.room.clone(),
                                        code: code.clone(),
                                        user_id: state.user_id.clone(),
                                    });

                                state.apply_local_code_edit(code);
                                command_writer
                                    .write(&change_command)
                                    .await
                                    .context("could not send the code change")?;
                            }
                        },
                        Action::SelectLanguage { language } => {
                            if let Some(room_view) = state.active_room.as_ref() {
                                let change_command = command::UserCommand::LanguageChange(
                                    command::LanguageChangeCommand {
                                        room: room_view.room.clone(),
                                        language: language.clone(),
                                        user_id: state.user_id.clone(),
                                    },
                                );

                                state.apply_local_language_selection(language);
                                command_writer
                                    .write(&change_command)
                                    .await
                                    .context("could not send the language change")?;
                            }
                        },
                        Action::SelectProblem { problem } => {
                            if let Some(room_view) = state.active_room.as_ref() {
                                let change_command = command::UserCommand::ProblemChange(
                                    command::ProblemChangeCommand {
                                        room: room_view.room.clone(),
                                        problem: problem.clone(),
                                        user_id: state.user_id.clone(),
                                    },
                                );

                                state.apply_local_problem_selection(problem);
                                command_writer
                                    .write(&change_command)
                                    .await
                                    .context("could not send the problem change")?;
                            }
                        },
                        Action::Exit => {
                            let _ = terminator.terminate(Interrupted::UserInt);

                            break Interrupted::UserInt;
                        },
                    },
                    // Catch and handle interrupt signal to gracefully shutdown
                    Ok(interrupted) = interrupt_rx.recv() => {
                        break interrupted;
                    }
                }
            } else {
                tokio::select! {
                    Some(action) = action_rx.recv() => match action {
                        Action::ConnectToServerRequest { addr } => {
                            opt_server_handle = self.connect_to_server(&mut state, addr).await?;
                        },
                        Action::Exit => {
                            let _ = terminator.terminate(Interrupted::UserInt);

                            break Interrupted::UserInt;
                        },
                        // room actions and repeated disconnects while offline are ignored
                        _ => (),
                    },
                    // Catch and handle interrupt signal to gracefully shutdown
                    Ok(interrupted) = interrupt_rx.recv() => {
                        break interrupted;
                    }
                }
            }

            self.state_tx.send(state.clone())?;
        };

        Ok(result)
    }
}
