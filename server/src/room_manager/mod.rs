pub use self::room::{RoomBroadcast, RoomMembership, SessionAndUser};
pub use self::room_manager::RoomManager;

mod room;
#[allow(clippy::module_inception)]
mod room_manager;
