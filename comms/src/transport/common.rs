use std::pin::Pin;

use tokio_stream::Stream;

/// Frame delimiter for the newline separated JSON protocol.
pub const NEW_LINE: &[u8; 2] = b"\r\n";

/// Type erased stream of items produced by a framed TCP reader.
pub type BoxedStream<Item> = Pin<Box<dyn Stream<Item = Item> + Send>>;
