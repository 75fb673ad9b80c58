use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpStream},
};
use tokio_stream::{wrappers::LinesStream, StreamExt};

use crate::{command, event};

use super::common::{BoxedStream, NEW_LINE};

/// [EventStream] is a stream of [crate::event::Event]s sent by the broker
///
/// # Cancel Safety
///
/// This stream is cancel-safe, meaning that it can be used in [tokio::select!]
/// without the risk of missing events.
pub type EventStream = BoxedStream<anyhow::Result<event::Event>>;

/// [CommandWriter] writes newline delimited [crate::command::UserCommand]s to
/// any async writer, usually the write half of the connection to the broker
pub struct CommandWriter<W: AsyncWrite + Unpin> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> CommandWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize a [crate::command::UserCommand] and write it to the backing writer
    ///
    /// # Cancel Safety
    ///
    /// This method is not cancellation safe. If it loses a [tokio::select!]
    /// race to another branch the command may be partially written, and the
    /// next call starts over with a fresh buffer, corrupting the line
    /// protocol on the wire.
    pub async fn write(&mut self, command: &command::UserCommand) -> anyhow::Result<()> {
        let mut serialized_bytes = serde_json::to_vec(command)?;
        serialized_bytes.extend_from_slice(NEW_LINE);

        self.writer.write_all(serialized_bytes.as_slice()).await?;

        Ok(())
    }
}

/// Splits the TCP stream connected to the broker into a stream of events and
/// a command writer.
pub fn split_tcp_stream(stream: TcpStream) -> (EventStream, CommandWriter<OwnedWriteHalf>) {
    let (reader, writer) = stream.into_split();

    (
        Box::pin(
            LinesStream::new(BufReader::new(reader).lines()).map(|line| {
                line.context("could not read line from the broker")
                    .and_then(|line| {
                        serde_json::from_str::<event::Event>(&line)
                            .context("failed to deserialize event from the broker")
                    })
            }),
        ),
        CommandWriter::new(writer),
    )
}
