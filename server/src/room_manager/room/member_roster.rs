use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use comms::event::Member;

use super::room_membership::SessionAndUser;

/// Palette the roster assigns display colors from, readable on both light and
/// dark editor themes.
const MEMBER_COLOR_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
];

#[derive(Debug)]
struct RosterEntry {
    session_id: String,
    member: Member,
}

#[derive(Debug)]
/// [MemberRoster] keeps the members of a room keyed by their connection's
/// session id. Join order is also the display order of the member lists that
/// travel in presence events.
///
/// The same user id may appear once per live connection, every connection is
/// its own member entry.
pub(super) struct MemberRoster {
    entries: Vec<RosterEntry>,
}

impl MemberRoster {
    pub fn new() -> Self {
        MemberRoster {
            entries: Vec::new(),
        }
    }

    /// Add a member entry for the given connection and assign it a display
    /// color, which stays fixed until the connection leaves the room.
    pub fn insert(&mut self, session_and_user: &SessionAndUser) -> Member {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.session_id == session_and_user.session_id)
        {
            // A repeated insert on the same connection keeps the color it
            // already holds
            entry.member.user_id = session_and_user.user_id.clone();
            entry.member.user_name = session_and_user.user_name.clone();

            return entry.member.clone();
        }

        let member = Member {
            user_id: session_and_user.user_id.clone(),
            user_name: session_and_user.user_name.clone(),
            color: self.pick_color(&session_and_user.session_id),
        };

        self.entries.push(RosterEntry {
            session_id: session_and_user.session_id.clone(),
            member: member.clone(),
        });

        member
    }

    /// Remove the entry of the given connection, returns false when the
    /// connection was not in the roster
    pub fn remove(&mut self, session_id: &str) -> bool {
        let count_before = self.entries.len();
        self.entries.retain(|entry| entry.session_id != session_id);

        self.entries.len() < count_before
    }

    /// The member list in join order, as it travels in presence events
    pub fn members(&self) -> Vec<Member> {
        self.entries
            .iter()
            .map(|entry| entry.member.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First palette color no current member holds, falling back to hashing
    /// the session id into the palette once every color is taken
    fn pick_color(&self, session_id: &str) -> String {
        let unused_color = MEMBER_COLOR_PALETTE.iter().find(|color| {
            !self
                .entries
                .iter()
                .any(|entry| entry.member.color == **color)
        });

        let color = match unused_color {
            Some(color) => color,
            None => {
                let mut hasher = DefaultHasher::new();
                session_id.hash(&mut hasher);

                &MEMBER_COLOR_PALETTE
                    [(hasher.finish() % MEMBER_COLOR_PALETTE.len() as u64) as usize]
            }
        };

        String::from(*color)
    }
}
