use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpStream},
};
use tokio_stream::{wrappers::LinesStream, StreamExt};

use crate::{command, event};

use super::common::{BoxedStream, NEW_LINE};

/// [CommandStream] is a stream of [crate::command::UserCommand]s sent by a single client
///
/// # Cancel Safety
///
/// This stream is cancel-safe, meaning that it can be used in [tokio::select!]
/// without the risk of missing commands.
pub type CommandStream = BoxedStream<anyhow::Result<command::UserCommand>>;

/// [EventWriter] writes newline delimited [crate::event::Event]s to any async
/// writer, usually the write half of a client's [TcpStream]
pub struct EventWriter<W: AsyncWrite + Unpin> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize a [crate::event::Event] and write it to the backing writer
    ///
    /// # Cancel Safety
    ///
    /// This method is not cancellation safe. If it loses a [tokio::select!]
    /// race to another branch the event may be partially written, and the
    /// next call starts over with a fresh buffer, corrupting the line
    /// protocol on the wire.
    pub async fn write(&mut self, event: &event::Event) -> anyhow::Result<()> {
        let mut serialized_bytes = serde_json::to_vec(event)?;
        serialized_bytes.extend_from_slice(NEW_LINE);

        self.writer.write_all(serialized_bytes.as_slice()).await?;

        Ok(())
    }
}

/// Splits a client TCP stream into a stream of commands and an event writer.
/// A malformed line surfaces as an error item on the stream rather than
/// ending it, the session layer decides how to react.
pub fn split_tcp_stream(stream: TcpStream) -> (CommandStream, EventWriter<OwnedWriteHalf>) {
    let (reader, writer) = stream.into_split();

    (
        Box::pin(
            LinesStream::new(BufReader::new(reader).lines()).map(|line| {
                line.context("could not read line from the client")
                    .and_then(|line| {
                        serde_json::from_str::<command::UserCommand>(&line)
                            .context("failed to deserialize command from client")
                    })
            }),
        ),
        EventWriter::new(writer),
    )
}
