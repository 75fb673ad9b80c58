mod code_room;
mod member_roster;
mod room_membership;

pub use self::code_room::{CodeRoom, RoomBroadcast};
pub use self::room_membership::{RoomMembership, SessionAndUser};
