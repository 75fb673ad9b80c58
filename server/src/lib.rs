/// Room state store: the lazily created room map and per-room fan-out
pub mod room_manager;
/// Per-connection session handling on top of the TCP transport
pub mod session;
