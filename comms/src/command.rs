use serde::{Deserialize, Serialize};

use crate::problem::Problem;

/// User Command for joining a code room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomCommand {
    // The room to join.
    #[serde(rename = "r")]
    pub room: String,
    // The id of the joining user, supplied by the surrounding application.
    #[serde(rename = "u")]
    pub user_id: String,
    // The display name of the joining user.
    #[serde(rename = "n")]
    pub user_name: String,
}

/// User Command for leaving a code room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRoomCommand {
    // The room to leave.
    #[serde(rename = "r")]
    pub room: String,
    // The id of the leaving user.
    #[serde(rename = "u")]
    pub user_id: String,
}

/// User Command for overwriting the room's source text. Last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChangeCommand {
    // The room the edit applies to.
    #[serde(rename = "r")]
    pub room: String,
    // The complete new source text.
    #[serde(rename = "c")]
    pub code: String,
    // The id of the editing user.
    #[serde(rename = "u")]
    pub user_id: String,
}

/// User Command for switching the room's programming language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageChangeCommand {
    // The room the change applies to.
    #[serde(rename = "r")]
    pub room: String,
    // The new language identifier.
    #[serde(rename = "l")]
    pub language: String,
    // The id of the user making the change.
    #[serde(rename = "u")]
    pub user_id: String,
}

/// User Command for loading a different problem into the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemChangeCommand {
    // The room the change applies to.
    #[serde(rename = "r")]
    pub room: String,
    // The full problem definition, fetched by the initiating client.
    #[serde(rename = "p")]
    pub problem: Problem,
    // The id of the user making the change.
    #[serde(rename = "u")]
    pub user_id: String,
}

/// A user command which can be sent to the broker by a single connection.
/// All commands are processed in arrival order in the context of the
/// connection that sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_ct", rename_all = "snake_case")]
pub enum UserCommand {
    JoinRoom(JoinRoomCommand),
    LeaveRoom(LeaveRoomCommand),
    CodeChange(CodeChangeCommand),
    LanguageChange(LanguageChangeCommand),
    ProblemChange(ProblemChangeCommand),
}
