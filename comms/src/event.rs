use serde::{Deserialize, Serialize};

use crate::problem::Problem;

/// A user currently present in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// The id of the user.
    #[serde(rename = "u")]
    pub user_id: String,
    /// The display name of the user.
    #[serde(rename = "n")]
    pub user_name: String,
    /// The hex color assigned to the user for cursor and highlight rendering.
    /// Stays the same for as long as the user remains in the room.
    #[serde(rename = "c")]
    pub color: String,
}

/// Full snapshot of a room, sent to a user right after they join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStateReplyEvent {
    /// The room this snapshot describes.
    #[serde(rename = "r")]
    pub room: String,
    /// The current source text of the room.
    #[serde(rename = "c")]
    pub code: String,
    /// The currently selected language.
    #[serde(rename = "l")]
    pub language: String,
    /// The id of the active problem, if one has been loaded.
    #[serde(rename = "pid")]
    pub active_problem_id: Option<String>,
    /// The full active problem definition, if one has been loaded.
    #[serde(rename = "p")]
    pub problem: Option<Problem>,
}

/// A user has joined the room. Sent to every member, the joiner included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinedBroadcastEvent {
    /// The room the user has joined.
    #[serde(rename = "r")]
    pub room: String,
    /// The updated member list of the room.
    #[serde(rename = "m")]
    pub members: Vec<Member>,
}

/// A user has left the room. Sent to every remaining member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeftBroadcastEvent {
    /// The room the user has left.
    #[serde(rename = "r")]
    pub room: String,
    /// The updated member list of the room.
    #[serde(rename = "m")]
    pub members: Vec<Member>,
}

/// The room's source text was overwritten. Sent to every member except
/// the one whose edit produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChangeBroadcastEvent {
    /// The room the edit applies to.
    #[serde(rename = "r")]
    pub room: String,
    /// The complete new source text.
    #[serde(rename = "c")]
    pub code: String,
}

/// The room's language was switched. Sent to every member except the one
/// that switched it. Receivers derive the accompanying snippet themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageChangeBroadcastEvent {
    /// The room the change applies to.
    #[serde(rename = "r")]
    pub room: String,
    /// The newly selected language.
    #[serde(rename = "l")]
    pub language: String,
}

/// A different problem was loaded into the room. Sent to every member
/// except the one that loaded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemChangeBroadcastEvent {
    /// The room the change applies to.
    #[serde(rename = "r")]
    pub room: String,
    /// The full new problem definition.
    #[serde(rename = "p")]
    pub problem: Problem,
}

/// An event which can be received by a user from the broker. Events
/// suffixed with `Reply` can only be received after sending a command,
/// whereas events suffixed with `Broadcast` can be received at any time
/// while the user is a member of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Event {
    RoomState(RoomStateReplyEvent),
    UserJoined(UserJoinedBroadcastEvent),
    UserLeft(UserLeftBroadcastEvent),
    CodeChange(CodeChangeBroadcastEvent),
    LanguageChange(LanguageChangeBroadcastEvent),
    ProblemChange(ProblemChangeBroadcastEvent),
}
