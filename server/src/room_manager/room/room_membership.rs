/// Identity of a single connection inside a room: the connection's session id
/// plus the user identity the surrounding application supplied at join time.
#[derive(Debug, Clone)]
pub struct SessionAndUser {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug)]
/// [RoomMembership] is handed out when a connection joins a room and consumed
/// again when it leaves. Holding one is the proof of membership the session
/// layer keeps for its single active room.
///
/// State-change commands are deliberately not routed through this handle, any
/// connection may write to any room id.
pub struct RoomMembership {
    /// The room this membership belongs to
    room: String,
    /// The session id of the owning connection
    session_id: String,
}

impl RoomMembership {
    pub(super) fn new(room: String, session_id: String) -> Self {
        RoomMembership { room, session_id }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub(super) fn session_id(&self) -> &str {
        &self.session_id
    }
}
