/// Set of commands which the broker can receive and process
pub mod command;
/// Set of events split into Broadcast and Reply events according to their source
pub mod event;
/// Problem definitions shared by commands, events and both sides of the wire
pub mod problem;
/// Implementation of event and command transportation over TCP Streams.
/// Requires 'server' or 'client' features to be enabled and will bring in tokio dependency alongside with other dependencies
pub mod transport;
