use comms::{
    event::{self, Event, RoomStateReplyEvent},
    problem::{Problem, DEFAULT_LANGUAGE},
};
use tokio::sync::broadcast;

use super::{
    member_roster::MemberRoster, room_membership::RoomMembership, SessionAndUser,
};

const BROADCAST_CHANNEL_CAPACITY: usize = 100;

/// Envelope for events fanned out to the members of a room. Events the
/// originating connection must not receive back carry its session id in
/// `exclude_session`; the per-session forward task filters on it.
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    pub exclude_session: Option<String>,
    pub event: Event,
}

#[derive(Debug)]
/// [CodeRoom] holds the authoritative collaborative state of a single room
/// and the primary broadcast channel its members listen on. A [RoomMembership]
/// is handed out to a connection when it joins the room.
pub struct CodeRoom {
    room_id: String,
    code: String,
    language: String,
    active_problem_id: Option<String>,
    active_problem: Option<Problem>,
    roster: MemberRoster,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
}

impl CodeRoom {
    pub fn new(room_id: &str) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);

        CodeRoom {
            room_id: String::from(room_id),
            code: String::new(),
            language: String::from(DEFAULT_LANGUAGE),
            active_problem_id: None,
            active_problem: None,
            roster: MemberRoster::new(),
            broadcast_tx,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Full state snapshot, as replied to a connection right after it joins
    pub fn snapshot(&self) -> RoomStateReplyEvent {
        RoomStateReplyEvent {
            room: self.room_id.clone(),
            code: self.code.clone(),
            language: self.language.clone(),
            active_problem_id: self.active_problem_id.clone(),
            problem: self.active_problem.clone(),
        }
    }

    /// Add a connection to the room and announce the updated member list
    ///
    /// # Returns
    ///
    /// - A broadcast receiver for the events fanned out to the room. It is
    ///   subscribed before the announcement is sent, so the joiner observes
    ///   its own `user_joined`.
    /// - A [RoomMembership] to be consumed by [CodeRoom::leave] later on.
    pub fn join(
        &mut self,
        session_and_user: &SessionAndUser,
    ) -> (broadcast::Receiver<RoomBroadcast>, RoomMembership) {
        let broadcast_rx = self.broadcast_tx.subscribe();

        self.roster.insert(session_and_user);
        let membership =
            RoomMembership::new(self.room_id.clone(), session_and_user.session_id.clone());

        let _ = self.broadcast_tx.send(RoomBroadcast {
            exclude_session: None,
            event: Event::UserJoined(event::UserJoinedBroadcastEvent {
                room: self.room_id.clone(),
                members: self.roster.members(),
            }),
        });

        (broadcast_rx, membership)
    }

    /// Remove a connection from the room and announce the post-removal member
    /// list to the remaining members. Consumes the [RoomMembership].
    pub fn leave(&mut self, membership: RoomMembership) {
        if self.roster.remove(membership.session_id()) {
            let _ = self.broadcast_tx.send(RoomBroadcast {
                exclude_session: None,
                event: Event::UserLeft(event::UserLeftBroadcastEvent {
                    room: self.room_id.clone(),
                    members: self.roster.members(),
                }),
            });
        }
    }

    /// Unconditionally overwrite the source text. Last write wins, concurrent
    /// writers are not merged.
    pub fn set_code(&mut self, code: String) {
        self.code = code;
    }

    /// Switch the language. When the active problem carries a starter snippet
    /// for the new language, the source text is replaced by that snippet;
    /// otherwise the source text stays untouched.
    pub fn set_language(&mut self, language: String) {
        self.language = language;
        self.load_starter_snippet();
    }

    /// Replace the active problem, keeping the problem and its id in step,
    /// then load the starter snippet for the current language if the new
    /// problem has one.
    pub fn set_problem(&mut self, problem: Problem) {
        self.active_problem_id = Some(problem.id.clone());
        self.active_problem = Some(problem);
        self.load_starter_snippet();
    }

    fn load_starter_snippet(&mut self) {
        if let Some(snippet) = self
            .active_problem
            .as_ref()
            .and_then(|problem| problem.snippet_for(&self.language))
        {
            self.code = String::from(snippet);
        }
    }

    /// Overwrite the source text and announce it to everyone but the originator
    pub fn apply_code_change(&mut self, origin_session: &str, code: String) {
        self.set_code(code.clone());

        let _ = self.broadcast_tx.send(RoomBroadcast {
            exclude_session: Some(String::from(origin_session)),
            event: Event::CodeChange(event::CodeChangeBroadcastEvent {
                room: self.room_id.clone(),
                code,
            }),
        });
    }

    /// Switch the language and announce it to everyone but the originator.
    /// The announcement carries only the language, every receiver derives the
    /// snippet side effect locally.
    pub fn apply_language_change(&mut self, origin_session: &str, language: String) {
        self.set_language(language.clone());

        let _ = self.broadcast_tx.send(RoomBroadcast {
            exclude_session: Some(String::from(origin_session)),
            event: Event::LanguageChange(event::LanguageChangeBroadcastEvent {
                room: self.room_id.clone(),
                language,
            }),
        });
    }

    /// Replace the active problem and announce it to everyone but the originator
    pub fn apply_problem_change(&mut self, origin_session: &str, problem: Problem) {
        self.set_problem(problem.clone());

        let _ = self.broadcast_tx.send(RoomBroadcast {
            exclude_session: Some(String::from(origin_session)),
            event: Event::ProblemChange(event::ProblemChangeBroadcastEvent {
                room: self.room_id.clone(),
                problem,
            }),
        });
    }
}
