use std::{collections::HashMap, sync::Arc};

use comms::{event::RoomStateReplyEvent, problem::Problem};
use tokio::sync::{broadcast, Mutex, RwLock};

use super::room::{CodeRoom, RoomBroadcast, RoomMembership, SessionAndUser};

pub type RoomJoinResult = (
    RoomStateReplyEvent,
    broadcast::Receiver<RoomBroadcast>,
    RoomMembership,
);

#[derive(Debug)]
/// [RoomManager] owns the map of live rooms. Rooms are created lazily by the
/// first operation that touches them and removed when their last member
/// leaves. Each room's state sits behind its own lock, so rooms never contend
/// with each other.
pub struct RoomManager {
    rooms: RwLock<HashMap<String, Arc<Mutex<CodeRoom>>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        RoomManager {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Join a connection to a room, creating the room if this is its first
    /// member
    ///
    /// # Returns
    ///
    /// - The snapshot to reply to the joiner with, taken before the roster
    ///   changed
    /// - The broadcast receiver for the room's events
    /// - The membership handle for the eventual leave
    pub async fn join_room(
        &self,
        room_id: &str,
        session_and_user: &SessionAndUser,
    ) -> RoomJoinResult {
        // The map lock is held across the room lock so a join can never land
        // in a room a concurrent leave is removing. Lock order is always the
        // map first, then the room.
        let mut rooms = self.rooms.write().await;
        let room = Self::get_or_create(&mut rooms, room_id);
        let mut room = room.lock().await;

        let snapshot = room.snapshot();
        let (broadcast_rx, membership) = room.join(session_and_user);

        (snapshot, broadcast_rx, membership)
    }

    /// Remove a connection from its room, dropping the room entirely when the
    /// last member is gone
    pub async fn leave_room(&self, membership: RoomMembership) {
        let mut rooms = self.rooms.write().await;

        let room_id = String::from(membership.room());
        if let Some(room) = rooms.get(&room_id) {
            let mut room = room.lock().await;
            room.leave(membership);

            if room.is_empty() {
                drop(room);
                rooms.remove(&room_id);
            }
        }
    }

    pub async fn apply_code_change(&self, room_id: &str, origin_session: &str, code: String) {
        self.apply(room_id, move |room| {
            room.apply_code_change(origin_session, code)
        })
        .await;
    }

    pub async fn apply_language_change(
        &self,
        room_id: &str,
        origin_session: &str,
        language: String,
    ) {
        self.apply(room_id, move |room| {
            room.apply_language_change(origin_session, language)
        })
        .await;
    }

    pub async fn apply_problem_change(
        &self,
        room_id: &str,
        origin_session: &str,
        problem: Problem,
    ) {
        self.apply(room_id, move |room| {
            room.apply_problem_change(origin_session, problem)
        })
        .await;
    }

    /// Run a state transition against a room. A transition may target an id
    /// nobody has joined: the room is auto-created, the change applied and
    /// announced, but a memberless room is not retained afterwards.
    async fn apply<F>(&self, room_id: &str, transition: F)
    where
        F: FnOnce(&mut CodeRoom),
    {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(room_id) {
                transition(&mut *room.lock().await);
                return;
            }
        }

        let mut rooms = self.rooms.write().await;
        let room = Self::get_or_create(&mut rooms, room_id);
        let mut room_guard = room.lock().await;
        transition(&mut room_guard);
        let is_empty = room_guard.is_empty();
        drop(room_guard);

        if is_empty {
            rooms.remove(room_id);
        }
    }

    /// Look up a room in the map, creating it on the spot when the id is new.
    /// The caller holds the map's write lock.
    fn get_or_create(
        rooms: &mut HashMap<String, Arc<Mutex<CodeRoom>>>,
        room_id: &str,
    ) -> Arc<Mutex<CodeRoom>> {
        Arc::clone(
            rooms
                .entry(String::from(room_id))
                .or_insert_with(|| Arc::new(Mutex::new(CodeRoom::new(room_id)))),
        )
    }
}
